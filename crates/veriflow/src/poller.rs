//! Scheduled-task bodies: the expiry timer and the two pollers.
//!
//! Each function arms one [`ScheduledTask`] with a closure that performs
//! a single tick of work and reports upward through the event channel.
//! The closures capture the generation handed to them by the scheduler
//! and tag every event with it, so the actor can tell live cycles from
//! superseded ones. None of them touch session state directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use veriflow_gateway::{AuthGateway, RemoteStatus, SessionRef};
use veriflow_sched::{Cadence, ScheduledTask, TaskFlow};

use crate::orchestrator::PollEvent;

/// Arms the hard-expiry timer: fires exactly once after `ttl`.
pub(crate) fn start_expiry(
    task: &mut ScheduledTask,
    ttl: Duration,
    events: mpsc::Sender<PollEvent>,
) {
    task.start(Cadence::once_after(ttl), move |generation| {
        let events = events.clone();
        async move {
            let _ = events.send(PollEvent::Expired { generation }).await;
            TaskFlow::Stop
        }
    });
}

/// Arms the challenge-refresh poller.
///
/// First tick fires immediately so a rotating challenge is fresh right
/// after start, then every `cadence`. Transient errors are reported and
/// retried; a 404 means the backend dropped the session and the poller
/// stops itself after reporting it.
pub(crate) fn start_challenge<G: AuthGateway>(
    task: &mut ScheduledTask,
    gateway: Arc<G>,
    session_ref: SessionRef,
    cadence: Duration,
    events: mpsc::Sender<PollEvent>,
) {
    task.start(Cadence::recurring(cadence), move |generation| {
        let gateway = Arc::clone(&gateway);
        let session_ref = session_ref.clone();
        let events = events.clone();
        async move {
            match gateway.fetch_challenge(&session_ref).await {
                Ok(response) => {
                    let _ = events
                        .send(PollEvent::ChallengeFetched {
                            generation,
                            challenge: response.challenge,
                        })
                        .await;
                    TaskFlow::Continue
                }
                Err(error) if error.is_authoritative() => {
                    let _ = events
                        .send(PollEvent::ChallengeGone { generation })
                        .await;
                    TaskFlow::Stop
                }
                Err(error) => {
                    warn!(%session_ref, %error, "challenge fetch failed, will retry");
                    let _ = events
                        .send(PollEvent::ChallengeFailed {
                            generation,
                            error: error.to_string(),
                        })
                        .await;
                    TaskFlow::Continue
                }
            }
        }
    });
}

/// Arms the completion-status poller.
///
/// First tick is delayed one full `cadence` (the handshake cannot have
/// completed instantly). Stops itself once it has reported `completed`
/// or an authoritative 404; transient errors are reported and retried.
pub(crate) fn start_status<G: AuthGateway>(
    task: &mut ScheduledTask,
    gateway: Arc<G>,
    session_ref: SessionRef,
    cadence: Duration,
    events: mpsc::Sender<PollEvent>,
) {
    task.start(Cadence::recurring_delayed(cadence), move |generation| {
        let gateway = Arc::clone(&gateway);
        let session_ref = session_ref.clone();
        let events = events.clone();
        async move {
            match gateway.check_status(&session_ref).await {
                Ok(response) => match response.status {
                    RemoteStatus::Completed => {
                        let _ = events
                            .send(PollEvent::StatusCompleted { generation })
                            .await;
                        TaskFlow::Stop
                    }
                    RemoteStatus::Pending => TaskFlow::Continue,
                },
                Err(error) if error.is_authoritative() => {
                    let _ = events.send(PollEvent::StatusGone { generation }).await;
                    TaskFlow::Stop
                }
                Err(error) => {
                    warn!(%session_ref, %error, "status check failed, will retry");
                    let _ = events
                        .send(PollEvent::StatusFailed {
                            generation,
                            error: error.to_string(),
                        })
                        .await;
                    TaskFlow::Continue
                }
            }
        }
    });
}
