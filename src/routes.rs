use std::{convert::Infallible, sync::Arc};

use serde::Deserialize;
use tracing::{info, warn};
use warp::{
    http::{header::WWW_AUTHENTICATE, HeaderMap, HeaderValue, StatusCode},
    path, Filter, Rejection, Reply,
};

use crate::{
    auth::{Auth, AuthInternal},
    error::AuthError,
    types::{Username, VerifiedIdentity},
};

pub fn build_api_route_filter(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_login)
}

/// Attach the caller's identity, if any, to the filter chain.
///
/// This filter never rejects. Protected handlers must pass the extracted value
/// through [`require_identity`].
pub fn with_identity(
    auth: &Auth,
) -> impl Filter<Extract = (Option<VerifiedIdentity>,), Error = Infallible> + Clone {
    warp::header::headers_cloned()
        .and(with_auth_state(auth.internal.clone()))
        .map(|headers: HeaderMap, auth: Arc<AuthInternal>| auth.authenticate(&headers))
}

pub fn require_identity(
    identity: Option<VerifiedIdentity>,
) -> Result<VerifiedIdentity, AuthError> {
    identity.ok_or(AuthError::Unauthenticated)
}

pub async fn handle_auth_errors(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(auth_error) = err.find::<AuthError>() {
        let (status, message, challenge) = match &auth_error {
            AuthError::CredentialMismatch | AuthError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "access denied", Some("Bearer"))
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "an unknown error has occurred",
                None,
            ),
        };

        let mut response = warp::reply::with_status(message, status).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        return Ok(response);
    }

    Err(err)
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub username: String,
    pub password: String,
}

async fn user_login(
    input: LoginQuery,
    auth: Arc<AuthInternal>,
) -> Result<impl Reply, Rejection> {
    let username = Username(input.username);

    let token = auth
        .login(&username, &input.password)
        .await
        .map_err(|e| {
            if matches!(e, AuthError::CredentialMismatch) {
                warn!(username = %username.0, "login rejected");
            }
            e
        })?;

    info!(username = %username.0, "issued token");

    Ok(warp::reply::with_status(token, StatusCode::OK))
}

// functor that adds a reference to the internal auth state into the filter chain
fn with_auth_state(
    auth: Arc<AuthInternal>,
) -> impl Filter<Extract = (Arc<AuthInternal>,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}
