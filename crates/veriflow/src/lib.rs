//! # Veriflow
//!
//! Orchestrates one BankID-style verification session: create it on the
//! remote backend, keep a scannable challenge fresh, poll for completion,
//! enforce a hard expiry, and exchange a completed handshake for verified
//! identity data — with exactly-once terminal transitions and leak-free
//! cancellation of every timer.
//!
//! # Architecture
//!
//! The orchestrator is a single Tokio task (actor model) that owns the
//! session record and three generation-counted scheduled tasks. Pollers
//! never mutate session state; they send tagged events upward and the
//! actor decides. Callers hold a cheap, cloneable [`OrchestratorHandle`]
//! and observe the session through a `watch`-published [`SessionView`].
//!
//! ```text
//!            ┌────────────── SessionOrchestrator (actor) ──────────────┐
//! start ───► │ create session ─► AwaitingScan                          │
//! cancel ──► │   ├─ ExpiryTimer ────── Expired{gen} ──┐                │
//!            │   ├─ ChallengePoller ── Challenge{gen} ─┤► state machine │ ──► SessionView
//!            │   └─ StatusPoller ───── Completed{gen} ─┘   (single      │      (watch)
//!            │                         └► verify-and-fetch  writer)    │
//!            └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use veriflow::{spawn_orchestrator, HttpGateway, SessionConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new("http://localhost:5000")?;
//! let handle = spawn_orchestrator(gateway, SessionConfig::default());
//!
//! handle.start("199001011234", "+46701234567").await?;
//! let mut view = handle.watch();
//! while view.changed().await.is_ok() {
//!     let snapshot = view.borrow().clone();
//!     println!("{}", snapshot.status);
//!     if snapshot.status.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod orchestrator;
mod poller;
mod view;

pub use error::OrchestratorError;
pub use orchestrator::{OrchestratorHandle, spawn_orchestrator};
pub use view::SessionView;

// Re-export the pieces callers need from the lower layers.
pub use veriflow_gateway::{
    AuthGateway, Challenge, GatewayError, HttpGateway, IdentityData, SessionRef,
};
pub use veriflow_session::{CurrentChallenge, SessionConfig, SessionError, SessionStatus};
