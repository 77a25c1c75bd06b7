//! End-to-end orchestrator tests over a scripted in-memory gateway.
//!
//! All tests run on a paused Tokio clock: the runtime auto-advances
//! virtual time whenever every task is blocked, so a full two-minute
//! session lifetime plays out in milliseconds while keeping the real
//! cadences (1s challenge refresh, 2s status poll, 120s TTL).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use veriflow::{
    spawn_orchestrator, AuthGateway, Challenge, GatewayError, IdentityData,
    OrchestratorError, SessionConfig, SessionError, SessionRef, SessionStatus, SessionView,
};
use veriflow_gateway::{
    ChallengeResponse, CreateSessionRequest, CreateSessionResponse, RemoteStatus,
    StatusResponse, VerifyRequest, VerifyResponse,
};

// ---------------------------------------------------------------------------
// Fake gateway
// ---------------------------------------------------------------------------

/// One scripted step of the status poller's world.
enum StatusStep {
    Pending,
    Completed,
    /// Backend no longer knows the session (404).
    Gone,
    /// Transient failure (e.g. 503).
    Error,
}

#[derive(Default)]
struct FakeState {
    fail_create: AtomicBool,
    challenge_calls: AtomicU64,
    /// The next N challenge fetches fail transiently.
    challenge_failures: AtomicU64,
    status_calls: AtomicU64,
    /// Consumed front-to-back; an exhausted script keeps answering
    /// `pending`.
    status_script: Mutex<VecDeque<StatusStep>>,
    fail_verify: AtomicBool,
    verify_calls: AtomicU64,
    cancel_calls: AtomicU64,
}

#[derive(Clone, Default)]
struct FakeGateway {
    inner: Arc<FakeState>,
}

impl FakeGateway {
    fn with_status_script(steps: impl IntoIterator<Item = StatusStep>) -> Self {
        let gateway = Self::default();
        *gateway.inner.status_script.lock().unwrap() = steps.into_iter().collect();
        gateway
    }

    fn identity() -> IdentityData {
        IdentityData {
            name: "Erik Perera".into(),
            personal_number: "199001011234".into(),
            address: "Storgatan 1".into(),
            city: "Stockholm".into(),
        }
    }

    fn transient() -> GatewayError {
        GatewayError::UnexpectedStatus {
            status: 503,
            body: "service unavailable".into(),
        }
    }
}

impl AuthGateway for FakeGateway {
    async fn create_session(
        &self,
        _request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, GatewayError> {
        if self.inner.fail_create.load(Ordering::SeqCst) {
            return Err(Self::transient());
        }
        Ok(CreateSessionResponse {
            session_ref: SessionRef::from("ref-1"),
            challenge: Challenge {
                payload: "qr-0".into(),
            },
            expires_at: None,
        })
    }

    async fn fetch_challenge(
        &self,
        _session_ref: &SessionRef,
    ) -> Result<ChallengeResponse, GatewayError> {
        let call = self.inner.challenge_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failures = &self.inner.challenge_failures;
        if failures.load(Ordering::SeqCst) > 0 {
            failures.fetch_sub(1, Ordering::SeqCst);
            return Err(Self::transient());
        }
        Ok(ChallengeResponse {
            challenge: Challenge {
                payload: format!("qr-{call}"),
            },
        })
    }

    async fn check_status(
        &self,
        _session_ref: &SessionRef,
    ) -> Result<StatusResponse, GatewayError> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.inner.status_script.lock().unwrap().pop_front();
        match step {
            None | Some(StatusStep::Pending) => Ok(StatusResponse {
                status: RemoteStatus::Pending,
            }),
            Some(StatusStep::Completed) => Ok(StatusResponse {
                status: RemoteStatus::Completed,
            }),
            Some(StatusStep::Gone) => Err(GatewayError::SessionNotFound),
            Some(StatusStep::Error) => Err(Self::transient()),
        }
    }

    async fn verify_and_fetch(
        &self,
        _request: &VerifyRequest,
    ) -> Result<VerifyResponse, GatewayError> {
        self.inner.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_verify.load(Ordering::SeqCst) {
            return Err(Self::transient());
        }
        Ok(VerifyResponse {
            status: "success".into(),
            data: Self::identity(),
        })
    }

    async fn cancel_session(&self, _session_ref: &SessionRef) -> Result<(), GatewayError> {
        self.inner.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Waits (in virtual time) until the published view satisfies `pred`.
async fn wait_until(
    view: &mut watch::Receiver<SessionView>,
    mut pred: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let snapshot = view.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            view.changed().await.expect("orchestrator dropped its view");
        }
    })
    .await
    .expect("condition not reached within virtual timeout")
}

async fn wait_for_status(
    view: &mut watch::Receiver<SessionView>,
    wanted: SessionStatus,
) -> SessionView {
    wait_until(view, |v| v.status == wanted).await
}

/// Lets detached tasks (e.g. the best-effort remote cancel) run.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_start_reaches_awaiting_scan_with_challenge() {
    let gateway = FakeGateway::default();
    let handle = spawn_orchestrator(gateway, SessionConfig::default());

    let session_ref = handle.start("199001011234", "+46701234567").await.unwrap();
    assert_eq!(session_ref, SessionRef::from("ref-1"));

    let view = handle.view();
    assert_eq!(view.status, SessionStatus::AwaitingScan);
    let challenge = view.challenge.as_ref().expect("initial challenge available");
    assert!(!challenge.payload.is_empty());
    // Full TTL (give or take the test's own execution time) remaining
    // right after start.
    let remaining = view.seconds_remaining().expect("deadline present");
    assert!((119..=120).contains(&remaining), "got {remaining}");
}

#[tokio::test(start_paused = true)]
async fn test_challenge_refreshes_on_cadence() {
    let gateway = FakeGateway::default();
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let mut view = handle.watch();
    // The refresh poller replaces the creation-time payload, then keeps
    // rotating it once per second.
    let first = wait_until(&mut view, |v| {
        v.challenge.as_ref().is_some_and(|c| c.payload == "qr-1")
    })
    .await;
    assert_eq!(first.status, SessionStatus::AwaitingScan);

    wait_until(&mut view, |v| {
        v.challenge.as_ref().is_some_and(|c| c.payload == "qr-3")
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_completed_handshake_yields_identity() {
    let gateway =
        FakeGateway::with_status_script([StatusStep::Pending, StatusStep::Completed]);
    let state = Arc::clone(&gateway.inner);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let started = tokio::time::Instant::now();
    let mut view = handle.watch();
    let done = wait_for_status(&mut view, SessionStatus::Completed).await;

    // Second status poll fires at 4s of virtual time.
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(done.identity, Some(FakeGateway::identity()));
    assert!(done.last_error.is_none());
    assert_eq!(state.verify_calls.load(Ordering::SeqCst), 1);

    // No polling survives the terminal transition.
    let challenges = state.challenge_calls.load(Ordering::SeqCst);
    let statuses = state.status_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(state.challenge_calls.load(Ordering::SeqCst), challenges);
    assert_eq!(state.status_calls.load(Ordering::SeqCst), statuses);
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_session_expires_at_ttl_without_completion() {
    let gateway = FakeGateway::default();
    let state = Arc::clone(&gateway.inner);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let started = tokio::time::Instant::now();
    let mut view = handle.watch();
    let expired = wait_for_status(&mut view, SessionStatus::Expired).await;

    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(
        expired.last_error.as_deref(),
        Some("session expired after 120s")
    );
    assert!(expired.identity.is_none());

    let challenges = state.challenge_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(state.challenge_calls.load(Ordering::SeqCst), challenges);
}

#[tokio::test(start_paused = true)]
async fn test_backend_404_expires_session_early() {
    let gateway = FakeGateway::with_status_script([StatusStep::Pending, StatusStep::Gone]);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let started = tokio::time::Instant::now();
    let mut view = handle.watch();
    let expired = wait_for_status(&mut view, SessionStatus::Expired).await;

    // Authoritative 404 at the second poll (4s), not the 120s TTL.
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        expired.last_error.as_deref(),
        Some("session no longer known to the authenticator")
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_failed_identity_fetch_fails_session() {
    let gateway = FakeGateway::with_status_script([StatusStep::Completed]);
    gateway.inner.fail_verify.store(true, Ordering::SeqCst);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let mut view = handle.watch();
    let failed = wait_for_status(&mut view, SessionStatus::Failed).await;

    assert!(failed.identity.is_none());
    let error = failed.last_error.expect("cause recorded");
    assert!(error.starts_with("identity fetch failed"), "got {error}");
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_surface_without_state_change() {
    let gateway = FakeGateway::default();
    gateway.inner.challenge_failures.store(2, Ordering::SeqCst);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let mut view = handle.watch();
    // The failed fetch lands as advisory state only.
    let advisory = wait_until(&mut view, |v| v.last_error.is_some()).await;
    assert_eq!(advisory.status, SessionStatus::AwaitingScan);

    // Once the backend recovers, refresh resumes on the same session.
    let recovered = wait_until(&mut view, |v| {
        v.challenge.as_ref().is_some_and(|c| c.payload == "qr-3")
    })
    .await;
    assert_eq!(recovered.status, SessionStatus::AwaitingScan);
}

#[tokio::test(start_paused = true)]
async fn test_status_poll_errors_are_retried() {
    let gateway = FakeGateway::with_status_script([
        StatusStep::Error,
        StatusStep::Error,
        StatusStep::Completed,
    ]);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let mut view = handle.watch();
    let done = wait_for_status(&mut view, SessionStatus::Completed).await;
    assert_eq!(done.identity, Some(FakeGateway::identity()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_returns_to_idle_and_allows_retry() {
    let gateway = FakeGateway::default();
    gateway.inner.fail_create.store(true, Ordering::SeqCst);
    let state = Arc::clone(&gateway.inner);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());

    let result = handle.start("199001011234", "+46701234567").await;
    assert!(matches!(result, Err(OrchestratorError::Create(_))));

    let view = handle.view();
    assert_eq!(view.status, SessionStatus::Idle);
    assert!(view.last_error.is_some());

    // No session was consumed; a retry succeeds.
    state.fail_create.store(false, Ordering::SeqCst);
    handle.start("199001011234", "+46701234567").await.unwrap();
    assert_eq!(handle.view().status, SessionStatus::AwaitingScan);
}

// ---------------------------------------------------------------------------
// Cancellation and exclusivity
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_all_polling() {
    let gateway = FakeGateway::default();
    let state = Arc::clone(&gateway.inner);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    handle.cancel().await.unwrap();
    settle().await;

    assert_eq!(handle.view().status, SessionStatus::Cancelled);
    assert_eq!(state.cancel_calls.load(Ordering::SeqCst), 1);

    let challenges = state.challenge_calls.load(Ordering::SeqCst);
    let statuses = state.status_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(state.challenge_calls.load(Ordering::SeqCst), challenges);
    assert_eq!(state.status_calls.load(Ordering::SeqCst), statuses);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let gateway = FakeGateway::default();
    let state = Arc::clone(&gateway.inner);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());

    // Cancel with nothing running is a no-op.
    handle.cancel().await.unwrap();
    assert_eq!(handle.view().status, SessionStatus::Idle);

    handle.start("199001011234", "+46701234567").await.unwrap();
    handle.cancel().await.unwrap();
    handle.cancel().await.unwrap();
    settle().await;

    assert_eq!(handle.view().status, SessionStatus::Cancelled);
    // Only the first cancel reached the backend.
    assert_eq!(state.cancel_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_active_is_rejected() {
    let gateway = FakeGateway::default();
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let result = handle.start("199001011234", "+46701234567").await;
    assert!(matches!(
        result,
        Err(OrchestratorError::Session(SessionError::AlreadyActive {
            status: SessionStatus::AwaitingScan
        }))
    ));
    // The running session is untouched.
    assert_eq!(handle.view().status, SessionStatus::AwaitingScan);
}

#[tokio::test(start_paused = true)]
async fn test_new_session_possible_after_terminal() {
    let gateway = FakeGateway::with_status_script([StatusStep::Completed]);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());

    handle.start("199001011234", "+46701234567").await.unwrap();
    let mut view = handle.watch();
    wait_for_status(&mut view, SessionStatus::Completed).await;

    // The slot is free again; the script is exhausted so the second
    // session just polls `pending`.
    handle.start("199001011234", "+46701234567").await.unwrap();
    assert_eq!(handle.view().status, SessionStatus::AwaitingScan);
}

// ---------------------------------------------------------------------------
// Terminal absorption
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_terminal_state_absorbs_later_expiry() {
    let gateway = FakeGateway::with_status_script([StatusStep::Completed]);
    let handle = spawn_orchestrator(gateway, SessionConfig::default());
    handle.start("199001011234", "+46701234567").await.unwrap();

    let mut view = handle.watch();
    wait_for_status(&mut view, SessionStatus::Completed).await;

    // Ride well past the original TTL: the completed outcome must hold.
    tokio::time::sleep(Duration::from_secs(300)).await;
    let view = handle.view();
    assert_eq!(view.status, SessionStatus::Completed);
    assert_eq!(view.identity, Some(FakeGateway::identity()));
}
