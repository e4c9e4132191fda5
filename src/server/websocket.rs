//! WebSocket upgrade for voice sessions
//!
//! Authenticates the caller (query token or Authorization header), fetches a
//! signed agent URL, renders the responder prompt with the user's dynamic
//! variables, then hands both legs to the voice relay.
//!
//! Authentication flow:
//! 1. Try JWT token from query string (?token=...)
//! 2. Try JWT token from Authorization header

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::astrology::sun_sign_from_birth_date;
use crate::auth::extract_token_from_header;
use crate::db::schemas::UserDoc;
use crate::routes::gamification::gamification_vars;
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::types::{AstraError, Result};
use crate::voice::{run_relay, VoiceSession};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

#[derive(Debug, Default, Deserialize)]
struct SessionQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Handle the voice session WebSocket upgrade
pub async fn handle_voice_upgrade(
    state: Arc<AppState>,
    mut req: Request<Incoming>,
) -> Response<BoxBody> {
    let (user_id, user) = match authenticate(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Voice session auth failed: {}", e);
            return error_response(StatusCode::UNAUTHORIZED, &e.to_string());
        }
    };

    // Fetch the signed URL and render the prompt before upgrading so
    // failures still produce an HTTP error
    let signed_url = match state.elevenlabs.get_signed_url().await {
        Ok(url) => url,
        Err(e) => {
            error!("Signed URL fetch failed: {}", e);
            return error_response(StatusCode::BAD_GATEWAY, &e.to_string());
        }
    };

    let vars = dynamic_variables(&user);
    let prompt = match state
        .prompts
        .render(Path::new(&state.args.responder_template_path), &vars)
    {
        Ok(p) => p,
        Err(e) => {
            error!("Responder prompt render failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    let initiation = state.elevenlabs.initiation_payload(&prompt, &vars);

    match hyper_tungstenite::upgrade(&mut req, None) {
        Ok((response, websocket)) => {
            let usage = state.usage.clone();
            info!(user = %user_id, "Voice session upgrade accepted");

            tokio::spawn(async move {
                match websocket.await {
                    Ok(ws) => {
                        let session = Arc::new(VoiceSession::new());
                        let started = Instant::now();
                        usage.log_voice_opened(&user_id).await;

                        if let Err(e) = run_relay(ws, &signed_url, initiation, session).await {
                            error!(user = %user_id, "Voice relay error: {}", e);
                        }

                        usage
                            .log_voice_closed(&user_id, started.elapsed().as_millis() as u64)
                            .await;
                    }
                    Err(e) => {
                        error!("WebSocket upgrade failed: {:?}", e);
                    }
                }
            });

            let (parts, _) = response.into_parts();
            to_boxed(Response::from_parts(parts, Full::new(Bytes::new())))
        }
        Err(e) => {
            error!("WebSocket upgrade error: {:?}", e);
            error_response(
                StatusCode::BAD_REQUEST,
                &format!("WebSocket upgrade failed: {}", e),
            )
        }
    }
}

/// Authenticate from the query token or Authorization header and load the user
async fn authenticate(
    state: &Arc<AppState>,
    req: &Request<Incoming>,
) -> Result<(String, UserDoc)> {
    let query: SessionQuery = req
        .uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let token = query.token.or_else(|| {
        req.headers()
            .get(hyper::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_token_from_header)
            .map(String::from)
    });

    let token =
        token.ok_or_else(|| AstraError::Unauthorized("Missing voice session token".into()))?;
    let claims = state.jwt.validate(&token)?;

    let oid = bson::oid::ObjectId::parse_str(&claims.sub)
        .map_err(|_| AstraError::NotFound("Unknown user".into()))?;
    let user = state
        .users()?
        .find_one(doc! { "_id": oid })
        .await?
        .ok_or_else(|| AstraError::NotFound("Unknown user".into()))?;

    if user.token_version != claims.token_version {
        return Err(AstraError::Unauthorized("Token has been invalidated".into()));
    }

    Ok((claims.sub, user))
}

/// Per-user dynamic variables injected into the agent prompt
fn dynamic_variables(user: &UserDoc) -> HashMap<String, String> {
    let mut vars = gamification_vars(user);

    vars.insert("display_name".to_string(), user.display_name.clone());
    if let Some(ref birth_date) = user.birth_date {
        vars.insert("birth_date".to_string(), birth_date.clone());
        if let Some(sign) = sun_sign_from_birth_date(birth_date) {
            vars.insert("sun_sign".to_string(), sign.to_string());
        }
    }
    if let Some(ref chart) = user.birth_chart {
        vars.insert("astro_snapshot".to_string(), chart.to_string());
    }

    let recent_topics: Vec<&str> = user
        .recent_conversations
        .iter()
        .flat_map(|c| c.topics.iter().map(String::as_str))
        .collect();
    if !recent_topics.is_empty() {
        vars.insert("recent_topics".to_string(), recent_topics.join(", "));
    }

    vars
}

fn error_response(status: StatusCode, message: &str) -> Response<BoxBody> {
    let body = serde_json::json!({ "error": message });
    to_boxed(
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_variables_include_sun_sign() {
        let mut user = UserDoc::new("sub".into(), "a@b.c".into(), "Ada".into());
        user.birth_date = Some("1990-04-12".into());

        let vars = dynamic_variables(&user);
        assert_eq!(vars.get("display_name").map(String::as_str), Some("Ada"));
        assert_eq!(vars.get("sun_sign").map(String::as_str), Some("Aries"));
        assert!(!vars.contains_key("recent_topics"));
    }
}
