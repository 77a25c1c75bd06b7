//! Unified error type for the Veriflow facade.

use veriflow_gateway::GatewayError;
use veriflow_session::SessionError;

/// Errors surfaced by [`OrchestratorHandle`](crate::OrchestratorHandle)
/// calls.
///
/// Note what is *not* here: polling failures. Those never reach the
/// caller as errors — they show up as state (`last_error`, or a terminal
/// `expired`/`failed` status) on the observable [`SessionView`]
/// (crate::SessionView).
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A local usage error (e.g. `start` while a session is active).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The session-create call failed; no session was started and the
    /// orchestrator is back in `idle`.
    #[error("failed to create verification session")]
    Create(#[source] GatewayError),

    /// The orchestrator task has shut down and can no longer accept
    /// commands.
    #[error("orchestrator is no longer running")]
    Unavailable,
}
