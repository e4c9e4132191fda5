//! Voice session HTTP routes
//!
//! - GET /api/voice/signed-url - pre-authenticated session URL for the caller
//!
//! The WebSocket relay upgrade lives in server::websocket.

use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{authenticate_user, error_response, json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub signed_url: String,
    pub agent_id: String,
}

/// GET /api/voice/signed-url
pub async fn handle_signed_url(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(e) = authenticate_user(&state, &req).await {
        return error_response(&e);
    }

    match state.elevenlabs.get_signed_url().await {
        Ok(signed_url) => json_response(
            StatusCode::OK,
            &SignedUrlResponse {
                signed_url,
                agent_id: state.args.elevenlabs.elevenlabs_agent_id.clone(),
            },
        ),
        Err(e) => error_response(&e),
    }
}
