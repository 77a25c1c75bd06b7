//! The gateway client: the [`AuthGateway`] trait and its reqwest-backed
//! implementation.
//!
//! The trait exists so the orchestrator can be driven by anything that
//! speaks these five operations — the real HTTP backend in production, a
//! scripted in-memory fake in tests — without changing orchestrator code.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::GatewayError;
use crate::types::{
    ChallengeResponse, CreateSessionRequest, CreateSessionResponse, SessionRef,
    StatusResponse, VerifyRequest, VerifyResponse,
};

/// Per-request timeout. Deliberately much shorter than the session TTL:
/// a hung request is a transient error on one poll tick, never a reason
/// to sit on the session's whole lifetime.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The five operations the remote authentication backend exposes.
///
/// # Trait bounds
///
/// - `Send + Sync` → the gateway is shared across the orchestrator task
///   and its poller tasks behind an `Arc`.
/// - `'static` → it doesn't borrow temporary data; it lives as long as
///   the orchestrator.
pub trait AuthGateway: Send + Sync + 'static {
    /// Starts the remote handshake for a subject. The response carries
    /// the session reference and the initial challenge.
    fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> impl std::future::Future<Output = Result<CreateSessionResponse, GatewayError>> + Send;

    /// Fetches the current challenge for a session.
    /// 404 ⇒ [`GatewayError::SessionNotFound`].
    fn fetch_challenge(
        &self,
        session_ref: &SessionRef,
    ) -> impl std::future::Future<Output = Result<ChallengeResponse, GatewayError>> + Send;

    /// Checks whether the remote side reports completion.
    /// 404 ⇒ [`GatewayError::SessionNotFound`].
    fn check_status(
        &self,
        session_ref: &SessionRef,
    ) -> impl std::future::Future<Output = Result<StatusResponse, GatewayError>> + Send;

    /// Exchanges a completed handshake for the verified identity data.
    /// Called exactly once per session, after completion is observed.
    fn verify_and_fetch(
        &self,
        request: &VerifyRequest,
    ) -> impl std::future::Future<Output = Result<VerifyResponse, GatewayError>> + Send;

    /// Tells the backend to abandon the session. Best-effort: callers
    /// fire this on user cancel and only log the outcome.
    fn cancel_session(
        &self,
        session_ref: &SessionRef,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;
}

/// [`AuthGateway`] implementation over HTTP.
///
/// Holds one pooled [`reqwest::Client`] with a bounded per-request
/// timeout; cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base: Url,
    client: Client,
}

impl HttpGateway {
    /// Creates a gateway for the given base URL (e.g.
    /// `http://localhost:5000`) with the default request timeout.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a gateway with an explicit per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base.join(path)?)
    }

    /// Maps a response to the expected JSON body, classifying 404 as
    /// authoritative and any other non-2xx as transient.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::SessionNotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

impl AuthGateway for HttpGateway {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, GatewayError> {
        let url = self.endpoint("/api/bankid/auth")?;
        debug!(%url, "creating verification session");
        let response = self.client.post(url).json(request).send().await?;
        Self::decode(response).await
    }

    async fn fetch_challenge(
        &self,
        session_ref: &SessionRef,
    ) -> Result<ChallengeResponse, GatewayError> {
        let url = self.endpoint(&format!("/api/bankid/qr/{session_ref}"))?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn check_status(
        &self,
        session_ref: &SessionRef,
    ) -> Result<StatusResponse, GatewayError> {
        let url = self.endpoint(&format!("/api/bankid/status/{session_ref}"))?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn verify_and_fetch(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, GatewayError> {
        let url = self.endpoint("/api/clients/authenticate-bankid")?;
        debug!(%url, "exchanging completed handshake for identity data");
        let response = self.client.post(url).json(request).send().await?;
        Self::decode(response).await
    }

    async fn cancel_session(&self, session_ref: &SessionRef) -> Result<(), GatewayError> {
        let url = self.endpoint("/api/bankid/cancel")?;
        let body = serde_json::json!({ "sessionRef": session_ref });
        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::SessionNotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
