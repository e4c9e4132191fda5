//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling; requests route through a
//! single match on method and path.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{GoogleAuthClient, JwtValidator};
use crate::config::Args;
use crate::db::schemas::{
    ConversationDoc, LoginStateDoc, UserDoc, CONVERSATION_COLLECTION, LOGIN_STATE_COLLECTION,
    USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::logging::UsageLogger;
use crate::routes;
use crate::server::websocket;
use crate::services::{ElevenLabsClient, JulepClient, PromptStore, TaskTemplateStore};
use crate::types::{AstraError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    users: Option<MongoCollection<UserDoc>>,
    conversations: Option<MongoCollection<ConversationDoc>>,
    login_states: Option<MongoCollection<LoginStateDoc>>,
    /// Google OAuth flow + People API
    pub google: GoogleAuthClient,
    /// Task-runner API (users, sessions, task executions)
    pub julep: JulepClient,
    /// Voice provider API (signed session URLs)
    pub elevenlabs: ElevenLabsClient,
    /// Task definition templates, injected rather than global
    pub templates: Arc<TaskTemplateStore>,
    /// Prompt templates for the voice session
    pub prompts: Arc<PromptStore>,
    /// Session token validator
    pub jwt: JwtValidator,
    /// JSONL usage logger
    pub usage: UsageLogger,
}

impl AppState {
    /// Create application state, wiring typed collections when MongoDB is
    /// available (dev mode may run without it).
    pub async fn new(args: Args, mongo: Option<MongoClient>) -> Result<Self> {
        let (users, conversations, login_states) = match &mongo {
            Some(client) => (
                Some(client.collection::<UserDoc>(USER_COLLECTION).await?),
                Some(
                    client
                        .collection::<ConversationDoc>(CONVERSATION_COLLECTION)
                        .await?,
                ),
                Some(
                    client
                        .collection::<LoginStateDoc>(LOGIN_STATE_COLLECTION)
                        .await?,
                ),
            ),
            None => (None, None, None),
        };

        let google = GoogleAuthClient::new(args.google.clone(), args.request_timeout_ms)?;
        let julep = JulepClient::new(&args.julep, args.request_timeout_ms)?;
        let elevenlabs = ElevenLabsClient::new(args.elevenlabs.clone(), args.request_timeout_ms)?;
        let templates = Arc::new(TaskTemplateStore::new(args.task_template_dir.clone()));
        let prompts = Arc::new(PromptStore::new());
        let jwt = JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds);
        let usage = UsageLogger::new(args.node_id.to_string());

        Ok(Self {
            args,
            mongo,
            users,
            conversations,
            login_states,
            google,
            julep,
            elevenlabs,
            templates,
            prompts,
            jwt,
            usage,
        })
    }

    /// Users collection, or a database error when MongoDB is absent
    pub fn users(&self) -> Result<&MongoCollection<UserDoc>> {
        self.users
            .as_ref()
            .ok_or_else(|| AstraError::Database("MongoDB is not available".into()))
    }

    /// Conversations collection, or a database error when MongoDB is absent
    pub fn conversations(&self) -> Result<&MongoCollection<ConversationDoc>> {
        self.conversations
            .as_ref()
            .ok_or_else(|| AstraError::Database("MongoDB is not available".into()))
    }

    /// Login state collection, or a database error when MongoDB is absent
    pub fn login_states(&self) -> Result<&MongoCollection<LoginStateDoc>> {
        self.login_states
            .as_ref()
            .ok_or_else(|| AstraError::Database("MongoDB is not available".into()))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Astra listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - relaxed configuration requirements");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    // Auth routes (/auth/*) consume the request
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(not_found_response(&path));
    }

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe (MongoDB ping)
        (Method::GET, "/ready") => routes::readiness_check(Arc::clone(&state)).await,

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => routes::cors_preflight(),

        // ====================================================================
        // User profile
        // ====================================================================
        (Method::GET, "/api/users/me") => {
            routes::handle_me_get(req, Arc::clone(&state)).await
        }
        (Method::PATCH, "/api/users/me") => {
            routes::handle_me_update(req, Arc::clone(&state)).await
        }

        // ====================================================================
        // Conversations
        // ====================================================================
        (Method::GET, "/api/conversations") => {
            routes::handle_list_conversations(req, Arc::clone(&state)).await
        }
        (Method::POST, "/api/conversations") => {
            routes::handle_create_conversation(req, Arc::clone(&state)).await
        }
        (Method::POST, p)
            if p.starts_with("/api/conversations/") && p.ends_with("/complete") =>
        {
            let conversation_id = p
                .strip_prefix("/api/conversations/")
                .and_then(|s| s.strip_suffix("/complete"))
                .unwrap_or("");
            routes::handle_complete_conversation(req, Arc::clone(&state), conversation_id).await
        }

        // ====================================================================
        // Gamification
        // ====================================================================
        (Method::POST, "/api/gamification/update") => {
            routes::handle_gamification_update(req, Arc::clone(&state)).await
        }
        (Method::GET, "/api/gamification") => {
            routes::handle_gamification_read(req, Arc::clone(&state)).await
        }

        // ====================================================================
        // Enrichment tasks
        // ====================================================================
        (Method::POST, "/api/enrichment/birth-chart") => {
            routes::handle_birth_chart(req, Arc::clone(&state)).await
        }
        (Method::POST, "/api/enrichment/horoscope") => {
            routes::handle_horoscope(req, Arc::clone(&state)).await
        }

        // ====================================================================
        // Voice sessions
        // ====================================================================
        (Method::GET, "/api/voice/signed-url") => {
            routes::handle_signed_url(req, Arc::clone(&state)).await
        }
        (Method::GET, "/api/voice/session") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                websocket::handle_voice_upgrade(Arc::clone(&state), req).await
            } else {
                bad_request_response("WebSocket upgrade required for /api/voice/session")
            }
        }

        // Not found
        _ => not_found_response(&path),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
pub(crate) fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// Not found response
fn not_found_response(path: &str) -> Response<BoxBody> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    to_boxed(
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap(),
    )
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<BoxBody> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message,
    });

    to_boxed(
        Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap(),
    )
}
