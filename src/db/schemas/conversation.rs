//! Conversation document schema
//!
//! One record per conversation session with the companion. Only records in
//! the `Completed` state participate in gamification.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for conversations
pub const CONVERSATION_COLLECTION: &str = "conversations";

/// Lifecycle state of a conversation
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Created, session not yet started
    #[default]
    Pending,
    /// Session in progress
    Active,
    /// Finished normally (the only state gamification counts)
    Completed,
    /// Aborted or errored
    Failed,
}

/// Conversation document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConversationDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user document id (hex)
    pub user_id: String,

    /// Task-runner session backing this conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub julep_session_id: Option<String>,

    /// Lifecycle state
    #[serde(default)]
    pub status: ConversationStatus,

    /// When the session started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,

    /// When the session ended (set on completion)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime>,

    /// Topics touched in the conversation
    #[serde(default)]
    pub topics: Vec<String>,

    /// One-line summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ConversationDoc {
    /// Create a new pending conversation for a user
    pub fn new(user_id: String, julep_session_id: Option<String>) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id,
            julep_session_id,
            status: ConversationStatus::Pending,
            started_at: Some(DateTime::now()),
            ended_at: None,
            topics: Vec::new(),
            summary: None,
        }
    }
}

impl IntoIndexes for ConversationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Per-user history queries sort newest-first
            (
                doc! { "user_id": 1, "ended_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_ended_at_index".to_string())
                        .build(),
                ),
            ),
            // Status filter for gamification recomputes
            (
                doc! { "user_id": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ConversationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_is_pending() {
        let conv = ConversationDoc::new("user-1".into(), Some("sess-1".into()));
        assert_eq!(conv.status, ConversationStatus::Pending);
        assert!(conv.started_at.is_some());
        assert!(conv.ended_at.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ConversationStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
