//! Wire types exchanged with the authentication backend.
//!
//! Field names are camelCase on the wire because the backend is a
//! JavaScript service; `#[serde(rename_all = "camelCase")]` keeps the
//! Rust side idiomatic.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque reference identifying one verification session with the remote
/// authenticator. Assigned by the backend at session creation, immutable
/// for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionRef(pub String);

impl std::fmt::Display for SessionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// The scannable credential presented to the user's authenticator app.
///
/// The payload is opaque to us — typically a QR token that the UI layer
/// renders. It is only valid for a short refresh window, which is why the
/// orchestrator replaces it about once per second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Opaque QR payload to render.
    pub payload: String,
}

// ---------------------------------------------------------------------------
// Session creation
// ---------------------------------------------------------------------------

/// Request body for `POST /api/bankid/auth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// The personal identifier the session verifies.
    pub personal_number: String,
    /// Contact number forwarded to the backend for the handshake.
    pub mobile_number: String,
}

/// Successful response from `POST /api/bankid/auth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_ref: SessionRef,
    /// The initial challenge, so the caller has something to render
    /// before the first refresh.
    pub challenge: Challenge,
    /// The backend's own idea of when the session expires. Advisory
    /// display data — the hard expiry ceiling is enforced locally.
    #[serde(default)]
    pub expires_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Successful response from `GET /api/bankid/qr/{sessionRef}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge: Challenge,
}

/// Completion state reported by the backend.
///
/// Completion is monotonic: once the backend reports `Completed` for a
/// session it never reports `Pending` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Completed,
}

/// Successful response from `GET /api/bankid/status/{sessionRef}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: RemoteStatus,
}

// ---------------------------------------------------------------------------
// Verify and fetch
// ---------------------------------------------------------------------------

/// Request body for `POST /api/clients/authenticate-bankid`, issued once
/// after the handshake completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub personal_number: String,
}

/// Verified identity data returned by the backend after a completed
/// handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityData {
    pub name: String,
    pub personal_number: String,
    pub address: String,
    pub city: String,
}

/// Successful response from the verify-and-fetch call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub status: String,
    pub data: IdentityData,
}
