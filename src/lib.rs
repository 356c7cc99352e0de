mod api;
mod auth;
mod case_insensitive_string_ext;
mod config;
mod error;
mod routes;
mod types;

pub use api::*;
pub use auth::*;
pub use config::*;
pub use error::*;
pub use routes::*;
pub use types::*;

pub use jsonwebtoken::Algorithm;
