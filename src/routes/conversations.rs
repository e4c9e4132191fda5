//! Conversation routes
//!
//! - GET  /api/conversations               - recent conversations for the caller
//! - POST /api/conversations               - open a conversation (task-runner session)
//! - POST /api/conversations/{id}/complete - close with topics and summary

use bson::doc;
use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{ConversationDoc, ConversationStatus, ConversationSummary};
use crate::routes::{
    authenticate_user, error_response, json_response, parse_json_body, BoxBody, SuccessResponse,
};
use crate::server::AppState;
use crate::types::AstraError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub status: ConversationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub julep_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

fn to_response(conv: &ConversationDoc) -> ConversationResponse {
    ConversationResponse {
        conversation_id: conv.id.map(|oid| oid.to_hex()).unwrap_or_default(),
        status: conv.status,
        julep_session_id: conv.julep_session_id.clone(),
        started_at: conv.started_at.map(|d| d.try_to_rfc3339_string().unwrap_or_default()),
        ended_at: conv.ended_at.map(|d| d.try_to_rfc3339_string().unwrap_or_default()),
        topics: conv.topics.clone(),
        summary: conv.summary.clone(),
    }
}

/// GET /api/conversations
pub async fn handle_list_conversations(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let (claims, _) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    let conversations = match state.conversations() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let docs = match conversations
        .find_sorted(
            doc! { "user_id": &claims.sub },
            Some(doc! { "metadata.created_at": -1 }),
            Some(50),
        )
        .await
    {
        Ok(docs) => docs,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &ConversationListResponse {
            conversations: docs.iter().map(to_response).collect(),
        },
    )
}

/// POST /api/conversations
///
/// Opens a task-runner session and records a pending conversation. Requires
/// the caller's account to be linked.
pub async fn handle_create_conversation(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let (claims, user) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    let julep_user_id = match user.julep_user_id {
        Some(id) => id,
        None => {
            return error_response(&AstraError::UnlinkedAccount(claims.sub));
        }
    };

    let session = match state
        .julep
        .create_session(&julep_user_id, &state.args.julep.julep_agent_id)
        .await
    {
        Ok(s) => s,
        Err(e) => return error_response(&e),
    };

    let conversations = match state.conversations() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let mut conv = ConversationDoc::new(claims.sub.clone(), Some(session.id.clone()));
    conv.status = ConversationStatus::Active;

    let id = match conversations.insert_one(conv).await {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    info!(user = %claims.sub, conversation = %id.to_hex(), "Conversation opened");

    json_response(
        StatusCode::OK,
        &ConversationResponse {
            conversation_id: id.to_hex(),
            status: ConversationStatus::Active,
            julep_session_id: Some(session.id),
            started_at: None,
            ended_at: None,
            topics: Vec::new(),
            summary: None,
        },
    )
}

/// POST /api/conversations/{id}/complete
///
/// Marks the conversation completed and refreshes the caller's cached
/// recent-conversation summaries (the topic source for gamification).
pub async fn handle_complete_conversation(
    req: Request<Incoming>,
    state: Arc<AppState>,
    conversation_id: &str,
) -> Response<BoxBody> {
    let (claims, user) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    let body: CompleteRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let oid = match bson::oid::ObjectId::parse_str(conversation_id) {
        Ok(oid) => oid,
        Err(_) => {
            return error_response(&AstraError::NotFound(format!(
                "Unknown conversation {}",
                conversation_id
            )));
        }
    };

    let conversations = match state.conversations() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let conv = match conversations
        .find_one(doc! { "_id": oid, "user_id": &claims.sub })
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => {
            return error_response(&AstraError::NotFound(format!(
                "Unknown conversation {}",
                conversation_id
            )));
        }
        Err(e) => return error_response(&e),
    };

    if conv.status == ConversationStatus::Completed {
        return error_response(&AstraError::BadRequest(
            "Conversation already completed".into(),
        ));
    }

    let ended_at = bson::DateTime::now();
    if let Err(e) = conversations
        .update_one(
            doc! { "_id": oid },
            doc! { "$set": {
                "status": "completed",
                "ended_at": ended_at,
                "topics": &body.topics,
                "summary": &body.summary,
                "metadata.updated_at": bson::DateTime::now(),
            } },
        )
        .await
    {
        return error_response(&e);
    }

    // Refresh the capped recent-conversation cache, newest first
    let mut recent = user.recent_conversations.clone();
    recent.insert(
        0,
        ConversationSummary {
            conversation_id: conversation_id.to_string(),
            ended_at: Some(ended_at),
            topics: body.topics.clone(),
            summary: body.summary.clone(),
        },
    );
    recent.truncate(state.args.recent_conversation_limit);

    let users = match state.users() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let recent_bson = match bson::to_bson(&recent) {
        Ok(b) => b,
        Err(e) => return error_response(&AstraError::Internal(format!("BSON error: {}", e))),
    };

    let user_oid = match bson::oid::ObjectId::parse_str(&claims.sub) {
        Ok(oid) => oid,
        Err(_) => return error_response(&AstraError::NotFound("Unknown user".into())),
    };

    if let Err(e) = users
        .update_one(
            doc! { "_id": user_oid },
            doc! { "$set": {
                "recent_conversations": recent_bson,
                "metadata.updated_at": bson::DateTime::now(),
            } },
        )
        .await
    {
        return error_response(&e);
    }

    info!(
        user = %claims.sub,
        conversation = %conversation_id,
        topics = body.topics.len(),
        "Conversation completed"
    );

    json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Conversation completed".into(),
        },
    )
}
