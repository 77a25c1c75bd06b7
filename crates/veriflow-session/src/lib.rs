//! Verification session model for Veriflow.
//!
//! This crate owns the data side of one authentication attempt:
//!
//! 1. **Status machine** ([`SessionStatus`]) — the seven lifecycle states
//!    and which transitions between them are legal. Terminal states are
//!    absorbing.
//! 2. **Session record** ([`AuthSession`]) — the single mutable record of
//!    an attempt: reference, subject, current challenge, expiry deadline,
//!    last advisory error, verified identity.
//! 3. **Configuration** ([`SessionConfig`]) — TTL and poll cadences.
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (above)  ← sole writer of AuthSession, drives transitions
//!     ↕
//! Session Layer (this crate)  ← what a session is, which transitions are legal
//!     ↕
//! Gateway Layer (below)  ← wire types: SessionRef, Challenge, IdentityData
//! ```
//!
//! Nothing here performs I/O or schedules anything; the orchestrator does.

mod error;
mod session;
mod status;

pub use error::SessionError;
pub use session::{AuthSession, CurrentChallenge, SessionConfig};
pub use status::SessionStatus;
