use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;

use crate::clock::Clock;
use crate::config::WarmupConfig;
use crate::poll::{FailureCause, PollState, Transition};
use crate::poller::Poller;
use crate::presenter::{present, MessageCycle, ViewModel};
use crate::probe::Prober;
use crate::Result;

/// Host callback fired once the backend answered and the grace delay passed.
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

// ─── Phase / Frame / Outcome ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Mounted and showing the waiting screen (including the failure view).
    Waiting,
    /// The ready callback has fired; nothing is rendered any more.
    Ready,
    Unmounted,
}

/// One published snapshot of the screen. `view` is `None` when there is
/// nothing to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub view: Option<ViewModel>,
}

/// How a mounted screen ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "cause", rename_all = "snake_case")]
pub enum Outcome {
    Ready,
    Failed(FailureCause),
    Unmounted,
}

// ─── WarmupScreen ─────────────────────────────────────────────────────────

/// A mounted waiting screen.
///
/// [`mount`](Self::mount) spawns one controller task that owns every timer
/// and in-flight probe. The host observes it through [`subscribe`] /
/// [`watch`] and ends it with [`unmount`]. Dropping the screen aborts the
/// controller task, which releases everything it owns and guarantees the
/// ready callback can no longer run.
///
/// [`subscribe`]: Self::subscribe
/// [`watch`]: Self::watch
/// [`unmount`]: Self::unmount
pub struct WarmupScreen {
    config: WarmupConfig,
    prober: Arc<dyn Prober>,
    frames: Arc<watch::Sender<Frame>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Outcome>>,
    outcome: Option<Outcome>,
}

impl WarmupScreen {
    /// Start waiting for the backend. Must be called inside a Tokio runtime.
    pub fn mount<F>(config: WarmupConfig, prober: Arc<dyn Prober>, on_ready: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        config.ensure_valid()?;

        let clock = Clock::start();
        let cycle = MessageCycle::default();
        let initial = present(&clock, &PollState::new(config.max_attempts), &cycle, &config);
        let (frames, _) = watch::channel(Frame {
            phase: Phase::Waiting,
            started_at: clock.started_at_utc(),
            view: Some(initial),
        });
        let frames = Arc::new(frames);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let controller = Controller {
            config: config.clone(),
            clock,
            cycle,
            poller: Poller::new(Arc::clone(&prober), config.max_attempts),
            frames: Arc::clone(&frames),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(controller.run(Box::new(on_ready)));

        Ok(Self {
            config,
            prober,
            frames,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            outcome: None,
        })
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    /// The most recently published frame.
    pub fn frame(&self) -> Frame {
        self.frames.borrow().clone()
    }

    /// Raw watch receiver, for hosts that want `changed()` / `wait_for()`.
    pub fn watch(&self) -> watch::Receiver<Frame> {
        self.frames.subscribe()
    }

    /// Stream of frames: the current one first, then every change.
    ///
    /// The stream stays open while the screen exists, so a failure view keeps
    /// being the last item until the host unmounts.
    pub fn subscribe(&self) -> WatchStream<Frame> {
        WatchStream::new(self.frames.subscribe())
    }

    /// Wait until the screen reaches a terminal outcome.
    pub async fn finished(&mut self) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let outcome = match self.task.as_mut() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    tracing::error!(error = %e, "waiting screen controller panicked");
                    Outcome::Failed(FailureCause::Crashed)
                }
                Err(_) => Outcome::Unmounted,
            },
            None => Outcome::Unmounted,
        };
        self.task = None;
        self.outcome = Some(outcome);
        outcome
    }

    /// Cancel every timer and in-flight probe. Safe to call more than once;
    /// once this returns the ready callback will never be invoked.
    pub async fn unmount(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The controller may already have exited after a terminal state.
            let _ = shutdown.send(());
        }
        let outcome = self.finished().await;
        if self.frames.borrow().phase == Phase::Unmounted {
            return;
        }
        tracing::info!(?outcome, "waiting screen unmounted");
        self.frames.send_modify(|frame| {
            frame.phase = Phase::Unmounted;
            frame.view = None;
        });
    }

    /// Full reload: tear this screen down and mount a fresh one with the same
    /// configuration and prober.
    pub async fn reload<F>(mut self, on_ready: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        self.unmount().await;
        tracing::info!("reloading waiting screen");
        Self::mount(self.config.clone(), Arc::clone(&self.prober), on_ready)
    }
}

impl Drop for WarmupScreen {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─── Controller ───────────────────────────────────────────────────────────

/// Why the waiting loop stopped.
enum Exit {
    Ready,
    Failed(FailureCause),
    Unmounted,
}

/// The state-owning task behind a [`WarmupScreen`].
struct Controller {
    config: WarmupConfig,
    clock: Clock,
    cycle: MessageCycle,
    poller: Poller,
    frames: Arc<watch::Sender<Frame>>,
    shutdown: oneshot::Receiver<()>,
}

impl Controller {
    async fn run(mut self, on_ready: ReadyCallback) -> Outcome {
        let mut on_ready = Some(on_ready);
        tracing::info!(
            url = %self.config.health_url(),
            max_attempts = self.config.max_attempts,
            "waiting for backend"
        );

        let exit = self.wait().await;
        // Timers were locals of `wait` and are gone; drop any probe still running.
        self.poller.cancel_in_flight();

        match exit {
            Exit::Unmounted => Outcome::Unmounted,
            Exit::Failed(cause) => {
                tracing::warn!(
                    ?cause,
                    attempts = self.poller.state().attempt,
                    elapsed_seconds = self.clock.elapsed_seconds(),
                    "backend did not become ready"
                );
                self.publish(Phase::Waiting);
                Outcome::Failed(cause)
            }
            Exit::Ready => {
                self.publish(Phase::Waiting);
                tokio::select! {
                    biased;
                    _ = &mut self.shutdown => return Outcome::Unmounted,
                    _ = tokio::time::sleep(self.config.grace_delay()) => {}
                }
                if let Some(callback) = on_ready.take() {
                    callback();
                }
                self.frames.send_modify(|frame| {
                    frame.phase = Phase::Ready;
                    frame.view = None;
                });
                Outcome::Ready
            }
        }
    }

    /// The waiting phase: three repeating timers plus probe completions,
    /// folded one event at a time until something terminal happens.
    async fn wait(&mut self) -> Exit {
        let now = Instant::now();
        let mut tick = repeating(now, self.config.tick_interval(), MissedTickBehavior::Skip);
        let mut rotate = repeating(now, self.config.message_interval(), MissedTickBehavior::Skip);
        let mut dispatch =
            repeating(now, self.config.dispatch_interval(), MissedTickBehavior::Delay);

        self.publish(Phase::Waiting);
        self.poller.dispatch();

        loop {
            tokio::select! {
                _ = &mut self.shutdown => return Exit::Unmounted,
                _ = tick.tick() => {
                    let elapsed = self.clock.tick();
                    if elapsed > self.config.failure_margin_secs {
                        if let Transition::Failed(cause) =
                            self.poller.fail(FailureCause::ElapsedOverrun)
                        {
                            return Exit::Failed(cause);
                        }
                    }
                }
                _ = rotate.tick() => {
                    self.cycle.advance();
                }
                _ = dispatch.tick(), if self.poller.can_dispatch() => {
                    self.poller.dispatch();
                }
                Some((token, outcome)) = self.poller.next_completed(), if self.poller.has_in_flight() => {
                    for transition in self.poller.resolve(token, outcome) {
                        match transition {
                            Transition::Ready => return Exit::Ready,
                            Transition::Failed(cause) => return Exit::Failed(cause),
                            Transition::Continue | Transition::Discarded => {}
                        }
                    }
                }
            }
            self.publish(Phase::Waiting);
        }
    }

    fn publish(&self, phase: Phase) {
        let view = present(&self.clock, self.poller.state(), &self.cycle, &self.config);
        self.frames.send_modify(|frame| {
            frame.phase = phase;
            frame.view = Some(view);
        });
    }
}

/// A repeating timer whose first tick is one full period after `start`.
fn repeating(start: Instant, period: std::time::Duration, missed: MissedTickBehavior) -> Interval {
    let mut interval = interval_at(start + period, period);
    interval.set_missed_tick_behavior(missed);
    interval
}
