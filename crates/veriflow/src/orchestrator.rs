//! The session orchestrator actor and its handle.
//!
//! One orchestrator drives at most one verification session at a time.
//! It is the sole writer of the session record: the expiry timer and the
//! two pollers only *propose* events, each tagged with the generation of
//! the task cycle that produced it, and the actor discards anything from
//! a superseded cycle before touching state. Combined with the absorbing
//! terminal states of the status machine, this gives the two guarantees
//! everything else leans on:
//!
//! - exactly one of `completed | expired | failed | cancelled` is ever
//!   reached per session, and nothing mutates the session after it;
//! - cancelling (for any reason) stops all three scheduled tasks in the
//!   same logical step, so no zombie polling outlives the session.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use veriflow_gateway::{
    AuthGateway, Challenge, CreateSessionRequest, SessionRef, VerifyRequest,
};
use veriflow_sched::{Generation, ScheduledTask};
use veriflow_session::{
    AuthSession, CurrentChallenge, SessionConfig, SessionError, SessionStatus,
};

use crate::error::OrchestratorError;
use crate::poller;
use crate::view::SessionView;

/// Command channel depth. Commands are rare (start/cancel); events are
/// bounded by poll cadence. Small buffers are plenty.
const CHANNEL_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Commands sent from handles to the actor.
pub(crate) enum Command {
    /// Begin a verification session for a subject.
    Start {
        subject_id: String,
        mobile_number: String,
        reply: oneshot::Sender<Result<SessionRef, OrchestratorError>>,
    },
    /// User-initiated abort. Idempotent; replies once processed.
    Cancel { reply: oneshot::Sender<()> },
}

/// Events proposed by the three scheduled tasks. Every variant carries
/// the generation of the cycle that produced it; the actor validates the
/// tag against the owning task before acting.
pub(crate) enum PollEvent {
    /// A fresh challenge arrived.
    ChallengeFetched {
        generation: Generation,
        challenge: Challenge,
    },
    /// Challenge fetch hit a transient error; the poller retries on its
    /// next tick.
    ChallengeFailed {
        generation: Generation,
        error: String,
    },
    /// The backend no longer knows the session (404 on challenge fetch).
    ChallengeGone { generation: Generation },
    /// The remote side reports the handshake completed.
    StatusCompleted { generation: Generation },
    /// Status check hit a transient error; the poller keeps going.
    StatusFailed {
        generation: Generation,
        error: String,
    },
    /// The backend no longer knows the session (404 on status check).
    StatusGone { generation: Generation },
    /// The hard TTL elapsed.
    Expired { generation: Generation },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running orchestrator. Cheap to clone.
///
/// Dropping every handle shuts the orchestrator down, which cancels any
/// running session's timers with it.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
}

impl OrchestratorHandle {
    /// Starts a verification session for `subject_id`.
    ///
    /// On success the session is in `awaiting_scan` with an initial
    /// challenge already available, and the returned [`SessionRef`]
    /// identifies it with the remote authenticator.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyActive`] (wrapped) if a session is
    ///   underway — one orchestrator drives one session at a time.
    /// - [`OrchestratorError::Create`] if the backend rejected the
    ///   create call; the orchestrator is back in `idle` and `start`
    ///   may be retried.
    pub async fn start(
        &self,
        subject_id: impl Into<String>,
        mobile_number: impl Into<String>,
    ) -> Result<SessionRef, OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Start {
                subject_id: subject_id.into(),
                mobile_number: mobile_number.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| OrchestratorError::Unavailable)?;
        reply_rx.await.map_err(|_| OrchestratorError::Unavailable)?
    }

    /// Aborts the running session, if any.
    ///
    /// Idempotent: cancelling twice, or with no active session, is a
    /// no-op. By the time this returns, all scheduled tasks are stopped
    /// and no further state mutation can occur for that session.
    pub async fn cancel(&self) -> Result<(), OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Cancel { reply: reply_tx })
            .await
            .map_err(|_| OrchestratorError::Unavailable)?;
        reply_rx.await.map_err(|_| OrchestratorError::Unavailable)
    }

    /// Current snapshot of the observable session state.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that yields on every published state change.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Spawns a session orchestrator onto the current Tokio runtime and
/// returns a handle to it.
pub fn spawn_orchestrator<G: AuthGateway>(
    gateway: G,
    config: SessionConfig,
) -> OrchestratorHandle {
    let (command_tx, command_rx) = mpsc::channel(CHANNEL_SIZE);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_SIZE);
    let (view_tx, view_rx) = watch::channel(SessionView::default());

    let actor = Orchestrator {
        gateway: Arc::new(gateway),
        config,
        session: None,
        expiry: ScheduledTask::new("expiry"),
        challenge: ScheduledTask::new("challenge-refresh"),
        status: ScheduledTask::new("status-poll"),
        commands: command_rx,
        events: event_rx,
        event_tx,
        view: view_tx,
    };
    tokio::spawn(actor.run());

    OrchestratorHandle {
        commands: command_tx,
        view: view_rx,
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The orchestrator's internal state. Runs inside one Tokio task.
struct Orchestrator<G: AuthGateway> {
    gateway: Arc<G>,
    config: SessionConfig,
    /// The active session record, `None` when idle. Terminal records are
    /// dropped on transition; the watch channel keeps the final snapshot.
    session: Option<AuthSession>,
    expiry: ScheduledTask,
    challenge: ScheduledTask,
    status: ScheduledTask,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<PollEvent>,
    /// Cloned into the scheduled tasks each time a session starts.
    event_tx: mpsc::Sender<PollEvent>,
    view: watch::Sender<SessionView>,
}

impl<G: AuthGateway> Orchestrator<G> {
    async fn run(mut self) {
        info!("session orchestrator started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // Every handle dropped: shut down. The Drop impls
                        // on the scheduled tasks abort their loops.
                        None => break,
                    }
                }
                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }
            }
        }

        info!("session orchestrator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                subject_id,
                mobile_number,
                reply,
            } => {
                let result = self.handle_start(subject_id, mobile_number).await;
                let _ = reply.send(result);
            }
            Command::Cancel { reply } => {
                self.handle_cancel();
                let _ = reply.send(());
            }
        }
    }

    async fn handle_start(
        &mut self,
        subject_id: String,
        mobile_number: String,
    ) -> Result<SessionRef, OrchestratorError> {
        if let Some(session) = &self.session {
            // Terminal records are dropped on transition, so anything
            // still here is a live session.
            return Err(SessionError::AlreadyActive {
                status: session.status,
            }
            .into());
        }

        self.publish(SessionView::initiating());

        let request = CreateSessionRequest {
            personal_number: subject_id.clone(),
            mobile_number,
        };
        let created = match self.gateway.create_session(&request).await {
            Ok(created) => created,
            Err(error) => {
                warn!(%error, "session creation failed");
                // No session was created remotely: back to idle, no
                // terminal transition consumed, caller may retry.
                self.publish(SessionView::idle_with_error(error.to_string()));
                return Err(OrchestratorError::Create(error));
            }
        };

        let session = AuthSession::begin(
            created.session_ref.clone(),
            subject_id,
            created.challenge,
            self.config.session_ttl,
        );
        info!(
            session_ref = %session.session_ref,
            ttl_secs = self.config.session_ttl.as_secs(),
            "verification session created"
        );
        self.session = Some(session);
        self.start_tasks(created.session_ref.clone());
        self.publish_session();

        Ok(created.session_ref)
    }

    /// Starts the expiry timer and both pollers for the active session.
    fn start_tasks(&mut self, session_ref: SessionRef) {
        poller::start_expiry(
            &mut self.expiry,
            self.config.session_ttl,
            self.event_tx.clone(),
        );
        poller::start_challenge(
            &mut self.challenge,
            Arc::clone(&self.gateway),
            session_ref.clone(),
            self.config.challenge_cadence,
            self.event_tx.clone(),
        );
        poller::start_status(
            &mut self.status,
            Arc::clone(&self.gateway),
            session_ref,
            self.config.status_cadence,
            self.event_tx.clone(),
        );
    }

    /// Stops all three scheduled tasks, bumping their generations so any
    /// event already queued from the old cycles is discarded on receipt.
    fn stop_tasks(&mut self) {
        self.expiry.cancel();
        self.challenge.cancel();
        self.status.cancel();
    }

    fn handle_cancel(&mut self) {
        let Some(session) = &self.session else {
            debug!("cancel with no active session — no-op");
            return;
        };

        // Let the backend reclaim the session. Best-effort and detached:
        // local cancellation never waits on the network.
        let gateway = Arc::clone(&self.gateway);
        let session_ref = session.session_ref.clone();
        tokio::spawn(async move {
            if let Err(error) = gateway.cancel_session(&session_ref).await {
                debug!(%session_ref, %error, "remote cancel failed");
            }
        });

        self.terminate(SessionStatus::Cancelled, None);
    }

    async fn handle_event(&mut self, event: PollEvent) {
        if !self.event_is_current(&event) {
            trace!("discarding event from superseded task cycle");
            return;
        }

        match event {
            PollEvent::ChallengeFetched { challenge, .. } => {
                if let Some(session) = self.session.as_mut() {
                    session.challenge = Some(CurrentChallenge::issued_now(challenge));
                }
                self.publish_session();
            }
            PollEvent::ChallengeFailed { error, .. }
            | PollEvent::StatusFailed { error, .. } => {
                debug!(%error, "transient poll error surfaced as advisory state");
                if let Some(session) = self.session.as_mut() {
                    session.last_error = Some(error);
                }
                self.publish_session();
            }
            PollEvent::ChallengeGone { .. } | PollEvent::StatusGone { .. } => {
                // Authoritative: the remote authenticator no longer knows
                // the session. Expire now, don't wait for the TTL.
                self.terminate(
                    SessionStatus::Expired,
                    Some("session no longer known to the authenticator".into()),
                );
            }
            PollEvent::Expired { .. } => {
                self.terminate(
                    SessionStatus::Expired,
                    Some(format!(
                        "session expired after {}s",
                        self.config.session_ttl.as_secs()
                    )),
                );
            }
            PollEvent::StatusCompleted { .. } => {
                self.handle_completion().await;
            }
        }
    }

    /// Validates an event's generation against the task that owns it.
    fn event_is_current(&self, event: &PollEvent) -> bool {
        match event {
            PollEvent::ChallengeFetched { generation, .. }
            | PollEvent::ChallengeFailed { generation, .. }
            | PollEvent::ChallengeGone { generation } => {
                self.challenge.is_current(*generation)
            }
            PollEvent::StatusCompleted { generation }
            | PollEvent::StatusFailed { generation, .. }
            | PollEvent::StatusGone { generation } => self.status.is_current(*generation),
            PollEvent::Expired { generation } => self.expiry.is_current(*generation),
        }
    }

    /// The hand-off: the remote handshake completed, exchange it for the
    /// verified identity data.
    async fn handle_completion(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        info!(
            session_ref = %session.session_ref,
            "handshake completed, fetching verified identity"
        );
        let request = VerifyRequest {
            personal_number: session.subject_id.clone(),
        };

        // Stop everything before the verify call so an expiry fire or a
        // challenge response queued behind this event is stale on arrival.
        self.stop_tasks();
        let result = self.gateway.verify_and_fetch(&request).await;
        match result {
            Ok(verified) => {
                if let Some(session) = self.session.as_mut() {
                    session.identity = Some(verified.data);
                }
                self.terminate(SessionStatus::Completed, None);
            }
            Err(error) => {
                // The *authentication* handshake succeeded but the
                // registration workflow did not: `failed`, not
                // `completed`, so the caller can tell the two apart.
                warn!(%error, "verify-and-fetch failed after completed handshake");
                self.terminate(
                    SessionStatus::Failed,
                    Some(format!("identity fetch failed: {error}")),
                );
            }
        }
    }

    /// Performs a terminal transition: stops all tasks, publishes the
    /// final snapshot, and drops the session record — all in one logical
    /// step. Safe to call when no session is active.
    fn terminate(&mut self, to: SessionStatus, error: Option<String>) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if !session.transition(to) {
            return;
        }
        session.last_error = error;
        self.stop_tasks();
        self.publish(SessionView::from_session(&session));
        // `session` is dropped here; the watch channel keeps the final
        // snapshot for observers.
    }

    fn publish(&self, view: SessionView) {
        self.view.send_replace(view);
    }

    fn publish_session(&self) {
        if let Some(session) = &self.session {
            self.publish(SessionView::from_session(session));
        }
    }
}
