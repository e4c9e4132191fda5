//! HTTP Routes for Authentication
//!
//! Google OAuth 2.0 authorization-code flow plus session management:
//! - GET  /auth/google          - redirect to the Google consent screen
//! - GET  /auth/google/callback - code exchange, user upsert, JWT issue
//! - GET  /auth/me              - current user info from token
//! - POST /auth/logout          - invalidate all outstanding tokens

use bson::doc;
use hyper::{body::Incoming, Method, Request, Response, StatusCode};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{LoginStateDoc, UserDoc};
use crate::routes::{
    authenticate_user, cors_preflight, error_response, json_response, redirect_response, BoxBody,
    ErrorResponse, SuccessResponse,
};
use crate::server::AppState;
use crate::types::{AstraError, Result};

/// Query parameters on the consent redirect request
#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    #[serde(default)]
    redirect_to: Option<String>,
}

/// Query parameters Google sends to the callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub julep_linked: bool,
}

/// Route /auth/* requests. Returns None for paths outside this prefix.
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (method, path.as_str()) {
        (Method::OPTIONS, p) if p.starts_with("/auth") => cors_preflight(),
        (Method::GET, "/auth/google") => handle_login_redirect(req, state).await,
        (Method::GET, "/auth/google/callback") => handle_callback(req, state).await,
        (Method::GET, "/auth/me") => handle_me(req, state).await,
        (Method::POST, "/auth/logout") => handle_logout(req, state).await,
        (_, p) if p.starts_with("/auth") => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: format!("Unknown auth route: {}", p),
                code: None,
            },
        ),
        _ => return None,
    };

    Some(response)
}

/// GET /auth/google
///
/// Stores a single-use CSRF state and redirects to the consent screen.
async fn handle_login_redirect(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let query: LoginQuery = req
        .uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let csrf_state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let redirect_to = query.redirect_to.unwrap_or_else(|| "/".to_string());

    let login_states = match state.login_states() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = login_states
        .insert_one(LoginStateDoc::new(csrf_state.clone(), redirect_to))
        .await
    {
        return error_response(&e);
    }

    let url = state.google.authorization_url(&csrf_state);
    redirect_response(&url)
}

/// GET /auth/google/callback
///
/// Flow:
/// 1. Validate and consume the CSRF state
/// 2. Exchange the authorization code for tokens
/// 3. Fetch the Google profile (name, email, photo, birthday)
/// 4. Upsert the user; seed birth_date from the Google birthday when absent
/// 5. Link a task-runner user on first login
/// 6. Issue a session JWT and redirect to the frontend
async fn handle_callback(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let query: CallbackQuery = match req
        .uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
    {
        Some(q) => q,
        None => {
            return error_response(&AstraError::BadRequest("Missing callback query".into()));
        }
    };

    if let Some(error) = query.error {
        warn!("Google consent denied: {}", error);
        return redirect_response(&format!(
            "{}/auth/error?reason={}",
            state.args.frontend_url,
            urlencoding::encode(&error)
        ));
    }

    let (code, csrf_state) = match (query.code, query.state) {
        (Some(code), Some(s)) => (code, s),
        _ => {
            return error_response(&AstraError::BadRequest(
                "Callback requires code and state".into(),
            ));
        }
    };

    match complete_login(&state, &code, &csrf_state).await {
        Ok((token, redirect_to)) => {
            // Token travels in the fragment so it never reaches server logs
            redirect_response(&format!(
                "{}{}#token={}",
                state.args.frontend_url, redirect_to, token
            ))
        }
        Err(e) => {
            warn!("Login failed: {}", e);
            error_response(&e)
        }
    }
}

async fn complete_login(
    state: &Arc<AppState>,
    code: &str,
    csrf_state: &str,
) -> Result<(String, String)> {
    let login_states = state.login_states()?;

    let login = login_states
        .find_one(doc! { "state": csrf_state })
        .await?
        .ok_or_else(|| AstraError::Unauthorized("Unknown OAuth state".into()))?;

    if !login.is_valid() {
        return Err(AstraError::Unauthorized("OAuth state expired or reused".into()));
    }

    // Consume the state before talking to Google so a replayed callback fails
    login_states
        .update_one(
            doc! { "state": csrf_state },
            doc! { "$set": { "used": true, "metadata.updated_at": bson::DateTime::now() } },
        )
        .await?;

    let tokens = state.google.exchange_code(code).await?;
    let profile = state.google.fetch_user_profile(&tokens.access_token).await?;

    let users = state.users()?;

    let user = match users.find_one(doc! { "google_sub": &profile.sub }).await? {
        Some(existing) => {
            let mut set = doc! {
                "email": &profile.email,
                "display_name": &profile.name,
                "metadata.updated_at": bson::DateTime::now(),
            };
            if let Some(ref picture) = profile.picture {
                set.insert("picture", picture);
            }
            // The Google birthday only seeds an empty birth profile
            if existing.birth_date.is_none() {
                if let Some(ref birthday) = profile.birthday {
                    set.insert("birth_date", birthday);
                }
            }
            users
                .update_one(doc! { "google_sub": &profile.sub }, doc! { "$set": set })
                .await?;
            users
                .find_one(doc! { "google_sub": &profile.sub })
                .await?
                .ok_or_else(|| AstraError::Internal("User vanished during login".into()))?
        }
        None => {
            let mut new_user =
                UserDoc::new(profile.sub.clone(), profile.email.clone(), profile.name.clone());
            new_user.picture = profile.picture.clone();
            new_user.birth_date = profile.birthday.clone();
            let id = users.insert_one(new_user).await?;
            info!("Registered new user {} ({})", id.to_hex(), profile.email);
            users
                .find_one(doc! { "_id": id })
                .await?
                .ok_or_else(|| AstraError::Internal("User vanished after insert".into()))?
        }
    };

    // Link a task-runner user on first login. Linkage failure is non-fatal
    // for login; enrichment and gamification will report it instead.
    let user = if user.julep_user_id.is_none() && !state.args.julep.julep_api_key.is_empty() {
        match state
            .julep
            .create_user(&user.display_name, &format!("Astra user {}", user.email))
            .await
        {
            Ok(julep_user) => {
                users
                    .update_one(
                        doc! { "google_sub": &profile.sub },
                        doc! { "$set": {
                            "julep_user_id": &julep_user.id,
                            "metadata.updated_at": bson::DateTime::now(),
                        } },
                    )
                    .await?;
                let mut linked = user;
                linked.julep_user_id = Some(julep_user.id);
                linked
            }
            Err(e) => {
                warn!("Task-runner linkage failed (continuing): {}", e);
                user
            }
        }
    } else {
        user
    };

    let user_id = user
        .id
        .map(|oid| oid.to_hex())
        .ok_or_else(|| AstraError::Internal("User document missing id".into()))?;

    let (token, _) = state
        .jwt
        .generate(&user_id, &user.email, user.token_version)?;

    state.usage.log_login(&user_id).await;
    info!("Login completed for {}", user.email);

    Ok((token, login.redirect_to))
}

/// GET /auth/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let (claims, user) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &MeResponse {
            user_id: claims.sub,
            email: user.email,
            display_name: user.display_name,
            picture: user.picture,
            julep_linked: user.julep_user_id.is_some(),
        },
    )
}

/// POST /auth/logout
///
/// Bumps the stored token version, invalidating every outstanding token.
async fn handle_logout(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let (claims, _) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    let users = match state.users() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let oid = match bson::oid::ObjectId::parse_str(&claims.sub) {
        Ok(oid) => oid,
        Err(_) => return error_response(&AstraError::NotFound("Unknown user".into())),
    };

    if let Err(e) = users
        .update_one(
            doc! { "_id": oid },
            doc! {
                "$inc": { "token_version": 1 },
                "$set": { "metadata.updated_at": bson::DateTime::now() },
            },
        )
        .await
    {
        return error_response(&e);
    }

    json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Logged out".into(),
        },
    )
}
