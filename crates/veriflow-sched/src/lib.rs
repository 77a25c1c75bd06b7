//! Generation-counted scheduled tasks.
//!
//! One [`ScheduledTask`] is a slot that holds at most one running timer
//! loop (a Tokio task) and a monotonically increasing generation counter.
//! Every (re)start bumps the generation and hands the new value to the
//! work closure; every cancel bumps it again and aborts the loop.
//!
//! The counter is the cancellation mechanism that makes the scheme
//! race-free: a result produced under generation N can still be sitting
//! in a channel when the task is cancelled or restarted. The consumer
//! checks [`ScheduledTask::is_current`] before applying it, and anything
//! tagged with a superseded generation is discarded unconditionally —
//! there is no need to chase the in-flight work itself.
//!
//! # Integration
//!
//! The owner keeps the `ScheduledTask` and a channel receiver; the work
//! closure sends tagged events into the channel:
//!
//! ```ignore
//! let generation = task.start(Cadence::recurring(period), move |generation| {
//!     let tx = tx.clone();
//!     async move {
//!         let outcome = poll_once().await;
//!         let _ = tx.send(Event { generation, outcome }).await;
//!         TaskFlow::Continue
//!     }
//! });
//! // later, on receipt:
//! if !task.is_current(event.generation) { /* stale — drop it */ }
//! ```

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Tag identifying one (re)start cycle of a [`ScheduledTask`].
///
/// Strictly increasing per task; two cycles of the same task never share
/// a generation, so a stale tag can never collide with a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// When and how often a scheduled task runs.
#[derive(Debug, Clone, Copy)]
pub enum Cadence {
    /// First run immediately on start, then repeat every period.
    Recurring {
        period: Duration,
        /// `false` delays the first run by one full period.
        immediate: bool,
    },
    /// Single run when the deadline is reached, then the loop ends.
    Once { deadline: Instant },
}

impl Cadence {
    /// Recurring with the first run fired immediately.
    pub fn recurring(period: Duration) -> Self {
        Self::Recurring {
            period,
            immediate: true,
        }
    }

    /// Recurring with the first run after one full period.
    pub fn recurring_delayed(period: Duration) -> Self {
        Self::Recurring {
            period,
            immediate: false,
        }
    }

    /// One-shot at `now + delay`.
    pub fn once_after(delay: Duration) -> Self {
        Self::Once {
            deadline: Instant::now() + delay,
        }
    }
}

/// Signal returned by recurring work to keep or stop the schedule.
///
/// Stopping from inside the work (e.g. a status poller that just observed
/// completion) ends the loop but does *not* bump the generation — only
/// the owner's [`ScheduledTask::cancel`]/restart does that, so an event
/// the work sent just before stopping still validates as current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFlow {
    Continue,
    Stop,
}

// ---------------------------------------------------------------------------
// ScheduledTask
// ---------------------------------------------------------------------------

/// A slot owning one cancellable, generation-counted timer loop.
///
/// Not `Clone` on purpose: exactly one owner may start or cancel a task,
/// which gives each task a single cancellation point instead of interval
/// handles scattered across the codebase.
pub struct ScheduledTask {
    name: &'static str,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Creates an empty slot. Nothing runs until [`start`](Self::start).
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: 0,
            handle: None,
        }
    }

    /// The slot's name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The current generation. Only events tagged with exactly this value
    /// belong to the running cycle.
    pub fn generation(&self) -> Generation {
        Generation(self.generation)
    }

    /// Returns `true` if `generation` belongs to the current cycle.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation() && self.handle.is_some()
    }

    /// Returns `true` while a cycle's loop is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// (Re)starts the task: cancels any previous cycle, bumps the
    /// generation, and spawns a new loop with the given cadence.
    ///
    /// `work` is called once per tick with the cycle's generation and
    /// decides via [`TaskFlow`] whether the loop continues. For
    /// [`Cadence::Once`] the loop always ends after the single run.
    ///
    /// Returns the new cycle's generation.
    pub fn start<F, Fut>(&mut self, cadence: Cadence, mut work: F) -> Generation
    where
        F: FnMut(Generation) -> Fut + Send + 'static,
        Fut: Future<Output = TaskFlow> + Send + 'static,
    {
        self.cancel();
        let generation = self.generation();
        let name = self.name;
        debug!(task = name, %generation, ?cadence, "task started");

        let handle = tokio::spawn(async move {
            match cadence {
                Cadence::Once { deadline } => {
                    time::sleep_until(deadline).await;
                    let _ = work(generation).await;
                }
                Cadence::Recurring { period, immediate } => {
                    let first = if immediate {
                        Instant::now()
                    } else {
                        Instant::now() + period
                    };
                    let mut interval = time::interval_at(first, period);
                    // Never burst to catch up after a slow tick; just
                    // resume the cadence from the delayed tick.
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        trace!(task = name, %generation, "tick");
                        if work(generation).await == TaskFlow::Stop {
                            break;
                        }
                    }
                }
            }
            trace!(task = name, %generation, "loop ended");
        });
        self.handle = Some(handle);
        generation
    }

    /// Cancels the running cycle, if any: aborts the loop and bumps the
    /// generation so anything the old cycle already produced is stale.
    ///
    /// Safe to call repeatedly and on a never-started slot.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(task = self.name, generation = self.generation, "task cancelled");
        }
        self.generation += 1;
    }
}

/// Aborting on drop means an orchestrator that goes away takes its
/// timer loops with it — no zombie polling.
impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
