use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};
use warp::{path, Filter, Rejection, Reply};

use crate::{
    auth::Auth,
    routes::{build_api_route_filter, handle_auth_errors, require_identity, with_identity},
    types::VerifiedIdentity,
};

/// Everything the server exposes: login, the protected sample routes and error recovery.
pub fn build_app(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health = path!("health").and(warp::get()).map(|| "ok");

    health
        .or(build_api_route_filter(auth))
        .or(build_demo_route_filter(auth))
        .recover(handle_auth_errors)
}

/// Sample routes that each require a verified identity.
pub fn build_demo_route_filter(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let protected = path!("protected-route")
        .and(warp::get())
        .and(with_identity(auth))
        .and_then(protected_route);

    let get_with_params = path!("api" / "get-with-params")
        .and(warp::get())
        .and(warp::query::<GetParams>())
        .and(with_identity(auth))
        .and_then(get_with_params);

    let post_with_body = path!("api" / "post-with-body")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_identity(auth))
        .and_then(post_with_body);

    let put_with_path = path!("api" / "put-with-path" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_identity(auth))
        .and_then(put_with_path);

    let delete_with_params = path!("api" / "delete-with-params")
        .and(warp::delete())
        .and(warp::query::<DeleteParams>())
        .and(with_identity(auth))
        .and_then(delete_with_params);

    protected
        .or(get_with_params)
        .or(post_with_body)
        .or(put_with_path)
        .or(delete_with_params)
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub param1: String,
    pub param2: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: String,
}

fn user_details(identity: &VerifiedIdentity) -> Value {
    json!({
        "username": identity.username.0,
        "accountNumber": identity.account_number,
    })
}

async fn protected_route(identity: Option<VerifiedIdentity>) -> Result<impl Reply, Rejection> {
    let identity = require_identity(identity)?;

    Ok(format!(
        "Access granted to protected route. Token received from user: {}",
        identity.username.0
    ))
}

async fn get_with_params(
    params: GetParams,
    identity: Option<VerifiedIdentity>,
) -> Result<impl Reply, Rejection> {
    let identity = require_identity(identity)?;

    Ok(warp::reply::json(&json!({
        "message": "GET request received",
        "userDetails": user_details(&identity),
        "param1": params.param1,
        "param2": params.param2.as_deref().unwrap_or("not provided"),
    })))
}

async fn post_with_body(
    body: BTreeMap<String, String>,
    identity: Option<VerifiedIdentity>,
) -> Result<impl Reply, Rejection> {
    let identity = require_identity(identity)?;

    Ok(warp::reply::json(&json!({
        "message": "POST request received",
        "userDetails": user_details(&identity),
        "body": body,
    })))
}

async fn put_with_path(
    id: String,
    body: BTreeMap<String, String>,
    identity: Option<VerifiedIdentity>,
) -> Result<impl Reply, Rejection> {
    let identity = require_identity(identity)?;

    Ok(warp::reply::json(&json!({
        "message": "PUT request received",
        "userDetails": user_details(&identity),
        "pathId": id,
        "body": body,
    })))
}

async fn delete_with_params(
    params: DeleteParams,
    identity: Option<VerifiedIdentity>,
) -> Result<impl Reply, Rejection> {
    let identity = require_identity(identity)?;

    Ok(warp::reply::json(&json!({
        "message": "DELETE request received",
        "userDetails": user_details(&identity),
        "deletedRecordId": params.id,
    })))
}
