//! HTTP gateway to the remote authentication backend.
//!
//! This crate defines the boundary between Veriflow and the BankID-style
//! backend service:
//!
//! - **Types** ([`SessionRef`], [`Challenge`], [`IdentityData`], the
//!   request/response pairs) — the JSON structures on the wire.
//! - **Client** ([`AuthGateway`] trait, [`HttpGateway`]) — how the five
//!   remote operations are issued.
//! - **Errors** ([`GatewayError`]) — what can go wrong, and crucially,
//!   which class of failure it is (authoritative vs transient).
//!
//! # Architecture
//!
//! The gateway knows nothing about sessions, timers, or polling policy.
//! It issues one request, classifies the outcome, and returns. Deciding
//! what a `SessionNotFound` or a timeout *means* for the running session
//! is the orchestrator's job.
//!
//! ```text
//! Orchestrator (policy) → Gateway (this crate) → remote backend (HTTP)
//! ```

mod client;
mod error;
mod types;

pub use client::{AuthGateway, HttpGateway, DEFAULT_REQUEST_TIMEOUT};
pub use error::GatewayError;
pub use types::{
    Challenge, ChallengeResponse, CreateSessionRequest, CreateSessionResponse,
    IdentityData, RemoteStatus, SessionRef, StatusResponse, VerifyRequest,
    VerifyResponse,
};
