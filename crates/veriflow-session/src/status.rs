//! The session status state machine.

/// Lifecycle state of one verification session.
///
/// ```text
/// idle → initiating → awaiting_scan → completed   (terminal)
///            |              |  \-----→ expired     (terminal)
///            |              |  \-----→ failed      (terminal)
///            |              \--------→ cancelled   (terminal, user-driven)
///            \-----------------------→ cancelled
/// ```
///
/// A failed session *creation* transitions `initiating → idle` instead of
/// reaching a terminal state: a session that was never created on the
/// remote side consumes no terminal transition and the caller may retry.
///
/// All terminal states are absorbing — no transition leaves them. This is
/// the invariant the orchestrator's whole design protects: once a session
/// ends, nothing (a late timer fire, a slow poll response) may change it
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session exists. The orchestrator's resting state.
    Idle,
    /// `start` was called; the create request is in flight.
    Initiating,
    /// The session exists remotely; the user has a challenge to scan.
    /// All three scheduled tasks are running.
    AwaitingScan,
    /// Handshake completed and verify-and-fetch succeeded.
    Completed,
    /// The hard TTL elapsed, or the backend reported the session gone.
    Expired,
    /// Handshake completed but the verify-and-fetch step failed.
    Failed,
    /// The user aborted the session.
    Cancelled,
}

impl SessionStatus {
    /// Returns `true` for the four absorbing end states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Expired | Self::Failed | Self::Cancelled
        )
    }

    /// Returns `true` while a session is underway and may still change.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initiating | Self::AwaitingScan)
    }

    /// Returns `true` if transitioning to `target` is legal.
    pub fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Idle => matches!(target, Self::Initiating),
            Self::Initiating => {
                matches!(target, Self::AwaitingScan | Self::Idle | Self::Cancelled)
            }
            Self::AwaitingScan => matches!(
                target,
                Self::Completed | Self::Expired | Self::Failed | Self::Cancelled
            ),
            // Terminal states are absorbing.
            Self::Completed | Self::Expired | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Initiating => "initiating",
            Self::AwaitingScan => "awaiting_scan",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}
