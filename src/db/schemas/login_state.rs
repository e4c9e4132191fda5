//! OAuth login state schema
//!
//! Stores CSRF state values for the Google OAuth flow. States are
//! short-lived (10 minutes) and single-use.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};

/// Collection name for login states
pub const LOGIN_STATE_COLLECTION: &str = "login_states";

/// Pending OAuth login.
///
/// Created when the consent redirect is issued; consumed exactly once by the
/// callback handler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginStateDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Random CSRF state passed through the consent screen
    #[serde(default)]
    pub state: String,

    /// Frontend path to land on after the callback
    #[serde(default)]
    pub redirect_to: String,

    /// When the state expires (10 minutes from creation)
    #[serde(default = "default_expires_at")]
    pub expires_at: DateTime<Utc>,

    /// Whether the state has been consumed (states are single-use)
    #[serde(default)]
    pub used: bool,
}

fn default_expires_at() -> DateTime<Utc> {
    Utc::now()
}

impl LoginStateDoc {
    /// Create a new login state with 10-minute expiry.
    pub fn new(state: String, redirect_to: String) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            state,
            redirect_to,
            expires_at: Utc::now() + chrono::Duration::minutes(10),
            used: false,
        }
    }

    /// Check if the state is still valid.
    pub fn is_valid(&self) -> bool {
        !self.used && !self.metadata.is_deleted && Utc::now() < self.expires_at
    }
}

impl IntoIndexes for LoginStateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the state value
            (
                doc! { "state": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("state_unique".to_string())
                        .build(),
                ),
            ),
            // TTL index for automatic expiration cleanup
            (
                doc! { "expires_at": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(std::time::Duration::from_secs(0))
                        .name("expires_at_ttl".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LoginStateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_is_valid() {
        let state = LoginStateDoc::new("abc123".to_string(), "/".to_string());
        assert!(state.is_valid());
    }

    #[test]
    fn test_used_state_is_invalid() {
        let mut state = LoginStateDoc::new("abc123".to_string(), "/".to_string());
        state.used = true;
        assert!(!state.is_valid());
    }

    #[test]
    fn test_expired_state_is_invalid() {
        let mut state = LoginStateDoc::new("abc123".to_string(), "/".to_string());
        state.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert!(!state.is_valid());
    }
}
