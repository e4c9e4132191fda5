//! Database schemas for Astra
//!
//! Defines MongoDB document structures for users, conversations, and OAuth
//! login states.

mod conversation;
mod login_state;
mod metadata;
mod user;

pub use conversation::{ConversationDoc, ConversationStatus, CONVERSATION_COLLECTION};
pub use login_state::{LoginStateDoc, LOGIN_STATE_COLLECTION};
pub use metadata::Metadata;
pub use user::{ConversationSummary, HoroscopeRecord, UserDoc, USER_COLLECTION};
