//! User document schema
//!
//! Stores the Google identity, the astrology birth profile, external service
//! linkage, enrichment results, and the gamification sub-record.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::gamification::{BirthProfileFlags, GamificationState};

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Google account subject (stable unique identifier)
    pub google_sub: String,

    /// Primary email from the Google profile
    pub email: String,

    /// Display name from the Google profile
    #[serde(default)]
    pub display_name: String,

    /// Profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    // === Birth profile (astrology inputs, all optional until provided) ===
    /// Date of birth, YYYY-MM-DD (or MM-DD when Google withholds the year)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    /// Time of birth, HH:MM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<String>,

    /// Birth location, free text ("City, Country")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_location: Option<String>,

    /// IANA timezone of the birth location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    // === External linkage ===
    /// Task-runner user id; enrichment and gamification require this link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub julep_user_id: Option<String>,

    // === Enrichment results (opaque task outputs) ===
    /// Computed birth chart document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_chart: Option<Document>,

    /// Latest generated horoscope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horoscope: Option<HoroscopeRecord>,

    /// Capped cache of recent conversation summaries, newest first
    #[serde(default)]
    pub recent_conversations: Vec<ConversationSummary>,

    /// Gamification sub-record, replaced wholesale on each recompute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamification: Option<GamificationState>,

    /// Token version for invalidation (increment to invalidate all tokens)
    #[serde(default)]
    pub token_version: i32,

    /// Whether the user account is active
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Latest horoscope with its generation timestamp
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HoroscopeRecord {
    /// When the horoscope was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<bson::DateTime>,

    /// Task output
    pub content: Document,
}

/// Cached summary of a recent conversation, embedded in the user document.
/// The topics here feed the topics_explored metric.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConversationSummary {
    /// Conversation document id (hex)
    pub conversation_id: String,

    /// When the conversation ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<bson::DateTime>,

    /// Topics touched in the conversation
    #[serde(default)]
    pub topics: Vec<String>,

    /// One-line summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl UserDoc {
    /// Create a new user document from a Google profile
    pub fn new(google_sub: String, email: String, display_name: String) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            google_sub,
            email,
            display_name,
            picture: None,
            birth_date: None,
            birth_time: None,
            birth_location: None,
            timezone: None,
            julep_user_id: None,
            birth_chart: None,
            horoscope: None,
            recent_conversations: Vec::new(),
            gamification: None,
            token_version: 1,
            is_active: true,
        }
    }

    /// Presence flags for the four birth-profile fields
    pub fn birth_profile_flags(&self) -> BirthProfileFlags {
        fn present(field: &Option<String>) -> bool {
            field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }

        BirthProfileFlags {
            has_birth_date: present(&self.birth_date),
            has_birth_time: present(&self.birth_time),
            has_birth_location: present(&self.birth_location),
            has_timezone: present(&self.timezone),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the Google subject
            (
                doc! { "google_sub": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("google_sub_unique".to_string())
                        .build(),
                ),
            ),
            // Index on email for lookups
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .name("email_index".to_string())
                        .build(),
                ),
            ),
            // Index on the task-runner linkage
            (
                doc! { "julep_user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("julep_user_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birth_profile_flags_count_presence() {
        let mut user = UserDoc::new("sub-1".into(), "a@example.com".into(), "A".into());
        assert_eq!(user.birth_profile_flags(), BirthProfileFlags::default());

        user.birth_date = Some("1990-04-12".into());
        user.timezone = Some("Europe/Berlin".into());
        let flags = user.birth_profile_flags();
        assert!(flags.has_birth_date);
        assert!(flags.has_timezone);
        assert!(!flags.has_birth_time);
        assert!(!flags.has_birth_location);
    }

    #[test]
    fn test_blank_fields_do_not_count() {
        let mut user = UserDoc::new("sub-1".into(), "a@example.com".into(), "A".into());
        user.birth_location = Some("   ".into());
        assert!(!user.birth_profile_flags().has_birth_location);
    }
}
