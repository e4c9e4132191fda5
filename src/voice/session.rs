//! Voice session lifecycle
//!
//! Explicit state machine for a live voice session:
//! Idle -> Connecting -> Connected -> Ending -> Closed, with cancellation via
//! an explicit abort signal rather than ad hoc flags. The relay observes the
//! abort signal and drives the Ending/Closed transitions.

use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::types::{AstraError, Result};

/// Lifecycle state of a voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSessionState {
    /// Created, nothing dialed yet
    Idle,
    /// Dialing the upstream agent endpoint
    Connecting,
    /// Both legs up, frames flowing
    Connected,
    /// Teardown in progress (normal close or abort)
    Ending,
    /// Fully torn down, terminal
    Closed,
}

impl fmt::Display for VoiceSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoiceSessionState::Idle => "idle",
            VoiceSessionState::Connecting => "connecting",
            VoiceSessionState::Connected => "connected",
            VoiceSessionState::Ending => "ending",
            VoiceSessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

impl VoiceSessionState {
    /// Whether a transition from self to `next` is legal
    fn can_transition_to(&self, next: VoiceSessionState) -> bool {
        use VoiceSessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connecting, Ending)
                | (Connected, Ending)
                | (Ending, Closed)
        )
    }

    /// States where the session still has live resources
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            VoiceSessionState::Connecting | VoiceSessionState::Connected
        )
    }
}

/// A single voice session with observable state and an abort signal
pub struct VoiceSession {
    state: Mutex<VoiceSessionState>,
    abort_tx: watch::Sender<bool>,
}

impl VoiceSession {
    pub fn new() -> Self {
        let (abort_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(VoiceSessionState::Idle),
            abort_tx,
        }
    }

    /// Current state
    pub fn state(&self) -> VoiceSessionState {
        *self.state.lock().expect("voice session state poisoned")
    }

    /// Attempt a transition; illegal transitions are errors
    pub fn transition(&self, next: VoiceSessionState) -> Result<VoiceSessionState> {
        let mut state = self.state.lock().expect("voice session state poisoned");
        if !state.can_transition_to(next) {
            return Err(AstraError::Internal(format!(
                "Illegal voice session transition {} -> {}",
                *state, next
            )));
        }
        *state = next;
        Ok(next)
    }

    /// Signal the session to stop; moves a live session to Ending.
    ///
    /// Idempotent: aborting an already-ending or closed session is a no-op.
    pub fn abort(&self) {
        {
            let mut state = self.state.lock().expect("voice session state poisoned");
            if state.is_live() {
                *state = VoiceSessionState::Ending;
            }
        }
        let _ = self.abort_tx.send(true);
    }

    /// Whether abort has been requested
    pub fn is_aborted(&self) -> bool {
        *self.abort_tx.borrow()
    }

    /// Receiver the relay selects on for cancellation
    pub fn abort_signal(&self) -> watch::Receiver<bool> {
        self.abort_tx.subscribe()
    }
}

impl Default for VoiceSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let session = VoiceSession::new();
        assert_eq!(session.state(), VoiceSessionState::Idle);

        session.transition(VoiceSessionState::Connecting).unwrap();
        session.transition(VoiceSessionState::Connected).unwrap();
        session.transition(VoiceSessionState::Ending).unwrap();
        session.transition(VoiceSessionState::Closed).unwrap();
        assert_eq!(session.state(), VoiceSessionState::Closed);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let session = VoiceSession::new();
        assert!(session.transition(VoiceSessionState::Connected).is_err());
        assert!(session.transition(VoiceSessionState::Closed).is_err());

        session.transition(VoiceSessionState::Connecting).unwrap();
        assert!(session.transition(VoiceSessionState::Idle).is_err());
    }

    #[test]
    fn test_dial_failure_can_end_from_connecting() {
        let session = VoiceSession::new();
        session.transition(VoiceSessionState::Connecting).unwrap();
        session.transition(VoiceSessionState::Ending).unwrap();
        session.transition(VoiceSessionState::Closed).unwrap();
    }

    #[test]
    fn test_abort_moves_live_session_to_ending() {
        let session = VoiceSession::new();
        session.transition(VoiceSessionState::Connecting).unwrap();
        session.transition(VoiceSessionState::Connected).unwrap();

        session.abort();
        assert_eq!(session.state(), VoiceSessionState::Ending);
        assert!(session.is_aborted());

        // Idempotent, and the terminal transition still applies
        session.abort();
        session.transition(VoiceSessionState::Closed).unwrap();
        assert_eq!(session.state(), VoiceSessionState::Closed);
    }

    #[test]
    fn test_abort_signal_observable() {
        let session = VoiceSession::new();
        let rx = session.abort_signal();
        assert!(!*rx.borrow());

        session.abort();
        assert!(*rx.borrow());
    }

    #[test]
    fn test_abort_on_idle_does_not_close() {
        let session = VoiceSession::new();
        session.abort();
        // Idle has no live resources; state stays Idle, only the signal fires
        assert_eq!(session.state(), VoiceSessionState::Idle);
        assert!(session.is_aborted());
    }
}
