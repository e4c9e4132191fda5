//! Live voice sessions
//!
//! State machine and WebSocket relay between the browser and the
//! conversational voice agent.

pub mod relay;
pub mod session;

pub use relay::run_relay;
pub use session::{VoiceSession, VoiceSessionState};
