//! Session record and configuration.

use std::time::{Duration, Instant};

use veriflow_gateway::{Challenge, IdentityData, SessionRef};

use crate::SessionStatus;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing configuration for a verification session.
///
/// The defaults mirror the remote authenticator's characteristics: the QR
/// challenge goes stale after roughly a second, completion is worth
/// checking every couple of seconds, and the whole attempt has a hard
/// two-minute ceiling.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hard lifetime of one attempt. The expiry timer fires at
    /// `created_at + session_ttl` regardless of what polling reports.
    pub session_ttl: Duration,

    /// How often the challenge (QR payload) is refreshed.
    pub challenge_cadence: Duration,

    /// How often completion is checked.
    pub status_cadence: Duration,

    /// Per-request timeout for gateway calls. Kept well below both
    /// cadences' worth of slack and far below the TTL — a hung request
    /// is one lost tick, not a lost session.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(120),
            challenge_cadence: Duration::from_secs(1),
            status_cadence: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// CurrentChallenge
// ---------------------------------------------------------------------------

/// The challenge currently presented to the user, with the local time it
/// was (re)issued.
///
/// At most one challenge is current per session; a newer fetch replaces
/// the value wholesale. The orchestrator's generation guard ensures a
/// stale in-flight fetch can never overwrite a value produced after the
/// task cycle it belonged to was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentChallenge {
    /// Opaque QR payload to render.
    pub payload: String,
    /// When this payload was fetched (local monotonic clock).
    pub issued_at: Instant,
}

impl CurrentChallenge {
    /// Wraps a freshly fetched wire challenge, stamping it now.
    pub fn issued_now(challenge: Challenge) -> Self {
        Self {
            payload: challenge.payload,
            issued_at: Instant::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// The record of one verification attempt.
///
/// Owned exclusively by the orchestrator; pollers report events upward
/// and never touch this struct. That single-writer discipline is what
/// makes the absorbing-terminal invariant enforceable without locks.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Opaque reference assigned by the backend at creation. Immutable.
    pub session_ref: SessionRef,
    /// The personal identifier this session verifies. Immutable.
    pub subject_id: String,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the session was created locally.
    pub created_at: Instant,
    /// Hard expiry deadline: `created_at + session_ttl`, set once.
    pub expires_at: Instant,
    /// The challenge currently presented to the user, if any.
    pub challenge: Option<CurrentChallenge>,
    /// Verified identity data, populated on successful hand-off.
    pub identity: Option<IdentityData>,
    /// Last surfaced error. Advisory: transient poll failures land here
    /// without affecting the session's status.
    pub last_error: Option<String>,
}

impl AuthSession {
    /// Creates a session record in `awaiting_scan`, carrying the initial
    /// challenge returned by the create call.
    pub fn begin(
        session_ref: SessionRef,
        subject_id: String,
        initial_challenge: Challenge,
        ttl: Duration,
    ) -> Self {
        let created_at = Instant::now();
        Self {
            session_ref,
            subject_id,
            status: SessionStatus::AwaitingScan,
            created_at,
            expires_at: created_at + ttl,
            challenge: Some(CurrentChallenge::issued_now(initial_challenge)),
            identity: None,
            last_error: None,
        }
    }

    /// Whole seconds until the hard expiry deadline (0 once passed).
    pub fn seconds_remaining(&self) -> u64 {
        self.expires_at
            .saturating_duration_since(Instant::now())
            .as_secs()
    }

    /// Applies a status transition, clearing `last_error` on success.
    ///
    /// Returns `false` (and changes nothing) if the transition is not
    /// legal from the current status — in particular, when the current
    /// status is terminal. Callers treat a `false` from a terminal state
    /// as normal absorption, not an error.
    pub fn transition(&mut self, to: SessionStatus) -> bool {
        if !self.status.can_transition_to(to) {
            tracing::trace!(
                session_ref = %self.session_ref,
                from = %self.status,
                %to,
                "transition refused"
            );
            return false;
        }
        tracing::info!(
            session_ref = %self.session_ref,
            from = %self.status,
            %to,
            "session transition"
        );
        self.status = to;
        self.last_error = None;
        true
    }
}
