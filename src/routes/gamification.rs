//! Gamification routes
//!
//! - POST /api/gamification/update - recompute streaks and milestones
//! - GET  /api/gamification        - read the stored state
//!
//! The recompute reads the user's completed conversations, runs the pure
//! calculator, and persists the new state with a single document update.
//! Concurrent recomputes for the same user are last-write-wins; the metric is
//! idempotent-ish so the race is accepted rather than locked around.

use bson::doc;
use chrono::Utc;
use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::UserDoc;
use crate::gamification::{
    celebration_message, recompute, GamificationState, RecomputeInput,
};
use crate::routes::{
    claims_from_request, error_response, json_response, load_user_by_id,
    parse_json_body_or_default, BoxBody,
};
use crate::server::AppState;
use crate::types::{AstraError, Result};

/// Recompute trigger body; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    /// Target user; defaults to the authenticated caller
    #[serde(default)]
    pub user_id: Option<String>,
    /// Conversation that triggered the recompute (informational)
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Event that triggered the recompute (informational)
    #[serde(default)]
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub gamification: GamificationState,
    pub new_milestones: Vec<String>,
    pub milestone_celebration: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub success: bool,
    pub gamification: Option<GamificationState>,
}

#[derive(Debug, Default, Deserialize)]
struct ReadQuery {
    #[serde(default)]
    user_id: Option<String>,
}

/// Resolve the target user id: explicit body/query value first, then the
/// authenticated caller. No identity at all is a 401.
fn resolve_user_id(
    state: &AppState,
    req: &Request<Incoming>,
    explicit: Option<String>,
) -> Result<String> {
    if let Some(user_id) = explicit.filter(|id| !id.is_empty()) {
        return Ok(user_id);
    }
    claims_from_request(state, req)
        .map(|claims| claims.sub)
        .ok_or_else(|| AstraError::Unauthorized("Authentication or user_id required".into()))
}

/// POST /api/gamification/update
pub async fn handle_gamification_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    // Identity can come from the body, so pull it before consuming the request
    let claims_user = claims_from_request(&state, &req).map(|c| c.sub);

    let body: UpdateRequest = match parse_json_body_or_default(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let user_id = match body.user_id.filter(|id| !id.is_empty()).or(claims_user) {
        Some(id) => id,
        None => {
            return error_response(&AstraError::Unauthorized(
                "Authentication or user_id required".into(),
            ));
        }
    };

    match run_recompute(&state, &user_id, body.event_type.as_deref()).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => {
            warn!(user = %user_id, error = %e, "Gamification recompute failed");
            error_response(&e)
        }
    }
}

/// GET /api/gamification
pub async fn handle_gamification_read(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let query: ReadQuery = req
        .uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let user_id = match resolve_user_id(&state, &req, query.user_id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let user = match load_user_by_id(&state, &user_id).await {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &ReadResponse {
            success: true,
            gamification: user.gamification,
        },
    )
}

/// Read inputs, run the pure calculator, persist the result
async fn run_recompute(
    state: &Arc<AppState>,
    user_id: &str,
    event_type: Option<&str>,
) -> Result<UpdateResponse> {
    let user = load_user_by_id(state, user_id).await?;

    if user.julep_user_id.is_none() {
        return Err(AstraError::UnlinkedAccount(user_id.to_string()));
    }

    let input = build_input(state, user_id, &user).await?;
    let previous = user.gamification.clone().unwrap_or_default();

    let outcome = recompute(&previous, &input, Utc::now().date_naive());

    // Single atomic replace of the gamification sub-record
    let state_bson = bson::to_bson(&outcome.state)
        .map_err(|e| AstraError::Internal(format!("BSON error: {}", e)))?;
    let oid = bson::oid::ObjectId::parse_str(user_id)
        .map_err(|_| AstraError::NotFound(format!("Unknown user {}", user_id)))?;

    state
        .users()?
        .update_one(
            doc! { "_id": oid },
            doc! { "$set": {
                "gamification": state_bson,
                "metadata.updated_at": bson::DateTime::now(),
            } },
        )
        .await?;

    for milestone_id in &outcome.new_milestones {
        state.usage.log_milestone(user_id, milestone_id).await;
    }

    info!(
        user = %user_id,
        event = event_type.unwrap_or("manual"),
        streak = outcome.state.streak_days,
        total = outcome.state.total_conversations,
        new_milestones = outcome.new_milestones.len(),
        "Gamification state recomputed"
    );

    let milestone_celebration = outcome
        .new_milestones
        .first()
        .and_then(|id| celebration_message(id))
        .map(String::from);

    Ok(UpdateResponse {
        success: true,
        gamification: outcome.state,
        new_milestones: outcome.new_milestones,
        milestone_celebration,
    })
}

/// Gather recompute inputs from storage
async fn build_input(
    state: &Arc<AppState>,
    user_id: &str,
    user: &UserDoc,
) -> Result<RecomputeInput> {
    let completed = state
        .conversations()?
        .find_many(doc! { "user_id": user_id, "status": "completed" })
        .await?;

    let completed_dates = completed
        .iter()
        .filter_map(|c| c.ended_at)
        .map(|d| d.to_chrono().date_naive())
        .collect();

    let last_conversation_date = completed
        .iter()
        .filter_map(|c| c.ended_at)
        .max()
        .map(|d| d.to_chrono());

    let recent_topics: Vec<Vec<String>> = user
        .recent_conversations
        .iter()
        .map(|summary| summary.topics.clone())
        .collect();

    Ok(RecomputeInput {
        completed_dates,
        total_conversations: completed.len() as u64,
        recent_topics,
        birth_profile: user.birth_profile_flags(),
        last_conversation_date,
    })
}

/// Dynamic variables describing the user's gamification standing, used by the
/// voice session prompt
pub fn gamification_vars(user: &UserDoc) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    if let Some(ref g) = user.gamification {
        vars.insert("streak_days".to_string(), g.streak_days.to_string());
        vars.insert(
            "total_conversations".to_string(),
            g.total_conversations.to_string(),
        );
        vars.insert(
            "topics_explored".to_string(),
            g.topics_explored.join(", "),
        );
    }
    vars
}
