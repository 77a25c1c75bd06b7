//! Error types for the session layer.

use crate::SessionStatus;

/// Usage errors at the session boundary.
///
/// These are local and synchronous — they never touch timers or the
/// network, and they never cause a state transition.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start` was called while a session is already underway.
    /// One orchestrator drives at most one session at a time.
    #[error("a verification session is already active ({status})")]
    AlreadyActive {
        /// The status of the session that blocked the start.
        status: SessionStatus,
    },
}
