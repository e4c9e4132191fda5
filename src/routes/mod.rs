//! HTTP routes for Astra

pub mod auth_routes;
pub mod conversations;
pub mod enrichment;
pub mod gamification;
pub mod health;
pub mod users;
pub mod voice;

pub use auth_routes::handle_auth_request;
pub use conversations::{handle_complete_conversation, handle_create_conversation, handle_list_conversations};
pub use enrichment::{handle_birth_chart, handle_horoscope};
pub use gamification::{handle_gamification_read, handle_gamification_update};
pub use health::{health_check, readiness_check, version_info};
pub use users::{handle_me_get, handle_me_update};
pub use voice::handle_signed_url;

use bson::doc;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{extract_token_from_header, Claims};
use crate::db::schemas::UserDoc;
use crate::server::AppState;
use crate::types::{AstraError, Result};

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Standard error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Standard success body for mutations without a payload
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

/// Translate an error into its JSON response
pub(crate) fn error_response(err: &AstraError) -> Response<BoxBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
            code: Some(err.code().to_string()),
        },
    )
}

/// 302 redirect
pub(crate) fn redirect_response(location: &str) -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location)
        .header("Cache-Control", "no-store")
        .body(empty_body())
        .unwrap()
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<Incoming>,
) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| AstraError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 65536 {
        return Err(AstraError::BadRequest("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| AstraError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Like parse_json_body, but an empty body parses as the type's default
pub(crate) async fn parse_json_body_or_default<T>(req: Request<Incoming>) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let body = req
        .collect()
        .await
        .map_err(|e| AstraError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.is_empty() {
        return Ok(T::default());
    }
    if bytes.len() > 65536 {
        return Err(AstraError::BadRequest("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| AstraError::BadRequest(format!("Invalid JSON: {}", e)))
}

pub(crate) fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Claims from the bearer token, if one is present and valid
pub(crate) fn claims_from_request(state: &AppState, req: &Request<Incoming>) -> Option<Claims> {
    let header = get_auth_header(req)?;
    let token = extract_token_from_header(header)?;
    state.jwt.validate(token).ok()
}

/// Authenticate the request and load the caller's user record.
///
/// Verifies the token version against the stored record so logout
/// invalidates outstanding tokens.
pub(crate) async fn authenticate_user(
    state: &Arc<AppState>,
    req: &Request<Incoming>,
) -> Result<(Claims, UserDoc)> {
    let claims = claims_from_request(state, req)
        .ok_or_else(|| AstraError::Unauthorized("Missing or invalid bearer token".into()))?;

    let user = load_user_by_id(state, &claims.sub).await?;

    if user.token_version != claims.token_version {
        return Err(AstraError::Unauthorized("Token has been invalidated".into()));
    }
    if !user.is_active {
        return Err(AstraError::Unauthorized("Account is disabled".into()));
    }

    Ok((claims, user))
}

/// Load a user by hex document id; unknown or malformed ids are NotFound
pub(crate) async fn load_user_by_id(state: &Arc<AppState>, user_id: &str) -> Result<UserDoc> {
    let oid = bson::oid::ObjectId::parse_str(user_id)
        .map_err(|_| AstraError::NotFound(format!("Unknown user {}", user_id)))?;

    state
        .users()?
        .find_one(doc! { "_id": oid })
        .await?
        .ok_or_else(|| AstraError::NotFound(format!("Unknown user {}", user_id)))
}
