//! The read-only session view published to consumers.

use std::time::Instant;

use veriflow_gateway::IdentityData;
use veriflow_session::{AuthSession, CurrentChallenge, SessionStatus};

/// A snapshot of the observable session state.
///
/// Published through a `tokio::sync::watch` channel on every change.
/// Consumers read it; they never mutate it — the orchestrator actor is
/// the only writer. This is the single source of truth for UI layers:
/// they react to state changes instead of catching errors from polling.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// The challenge to render, if one is current.
    pub challenge: Option<CurrentChallenge>,
    /// Hard expiry deadline, while a session exists.
    pub expires_at: Option<Instant>,
    /// Verified identity data, populated once `completed`.
    pub identity: Option<IdentityData>,
    /// Last surfaced error (advisory for transient poll failures, the
    /// cause for `expired`/`failed`).
    pub last_error: Option<String>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            challenge: None,
            expires_at: None,
            identity: None,
            last_error: None,
        }
    }
}

impl SessionView {
    /// Snapshot for the short window while the create call is in flight.
    pub(crate) fn initiating() -> Self {
        Self {
            status: SessionStatus::Initiating,
            ..Self::default()
        }
    }

    /// Snapshot after a failed create: back to `idle`, error surfaced.
    pub(crate) fn idle_with_error(error: String) -> Self {
        Self {
            status: SessionStatus::Idle,
            last_error: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn from_session(session: &AuthSession) -> Self {
        Self {
            status: session.status,
            challenge: session.challenge.clone(),
            expires_at: Some(session.expires_at),
            identity: session.identity.clone(),
            last_error: session.last_error.clone(),
        }
    }

    /// Whole seconds until hard expiry; `None` when no session exists,
    /// 0 once the deadline has passed.
    pub fn seconds_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()).as_secs())
    }
}
