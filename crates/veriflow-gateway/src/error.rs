//! Error types for the gateway layer.

/// Errors that can occur while talking to the authentication backend.
///
/// The important distinction for callers is *class*, not variant:
///
/// - **Authoritative** ([`GatewayError::SessionNotFound`]): the backend no
///   longer knows the session. Polling it again can never succeed, so the
///   session must end immediately.
/// - **Transient** (everything else): a timeout, a 5xx, a body that failed
///   to decode. The next poll tick may well succeed; the session keeps
///   going.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The backend returned 404 — the session is unknown or already
    /// reclaimed by the remote authenticator.
    #[error("session not known to the authenticator")]
    SessionNotFound,

    /// The backend answered with a status outside 2xx/404. The response
    /// body is kept for logging; it is not parsed.
    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The request itself failed: connection refused, timeout, or a
    /// 2xx body that did not decode as the expected JSON shape.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The configured base URL could not be parsed or joined.
    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),
}

impl GatewayError {
    /// Returns `true` if this error means the session itself is gone on
    /// the remote side. Authoritative errors bypass retry entirely.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::SessionNotFound)
    }
}
