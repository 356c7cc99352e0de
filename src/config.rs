use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use jsonwebtoken::Algorithm;

use crate::auth::{is_hmac, AuthConfig, CredentialStore, SigningSecret};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Process-wide settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub token_secret: SigningSecret,
    pub token_ttl: Duration,
    pub token_algorithm: Algorithm,
    // Credentials accepted by the stub credential check
    pub login_username: String,
    pub login_password: String,
    pub login_account_number: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("token_ttl", &self.token_ttl)
            .field("token_algorithm", &self.token_algorithm)
            .field("login_username", &self.login_username)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = match lookup("PORT") {
            Some(s) => s.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 8080,
        };

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let token_secret = lookup("TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .map(SigningSecret::from)
            .ok_or(ConfigError::Missing("TOKEN_SECRET"))?;

        let token_ttl = match lookup("TOKEN_TTL_SECONDS") {
            Some(s) => s
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid("TOKEN_TTL_SECONDS"))?,
            None => Duration::from_secs(60 * 60),
        };

        let token_algorithm = match lookup("TOKEN_ALGORITHM") {
            Some(s) => Algorithm::from_str(s.trim())
                .ok()
                .filter(|alg| is_hmac(*alg))
                .ok_or(ConfigError::Invalid("TOKEN_ALGORITHM"))?,
            None => Algorithm::HS512,
        };

        let login_username = lookup("LOGIN_USERNAME").unwrap_or_else(|| "admin".to_string());
        let login_password = lookup("LOGIN_PASSWORD").unwrap_or_else(|| "password".to_string());
        let login_account_number =
            lookup("LOGIN_ACCOUNT_NUMBER").unwrap_or_else(|| "123456789".to_string());

        Ok(Self {
            addr,
            token_secret,
            token_ttl,
            token_algorithm,
            login_username,
            login_password,
            login_account_number,
        })
    }

    pub fn auth_config(&self, credentials: Arc<dyn CredentialStore>) -> AuthConfig {
        AuthConfig {
            token_secret: self.token_secret.clone(),
            token_lifetime: self.token_ttl,
            token_algorithm: self.token_algorithm,
            credentials,
        }
    }
}
