//! Bounded polling of the token endpoint for one device flow.
//!
//! Each flow gets one task driven by two timers: the tick timer (every
//! `poll_interval_ms`, first tick one interval after start) and the lifetime
//! timer (once, at `expires_at`). The lifetime timer wins when both are due.
//! The task also stops as soon as the store moves past its generation, so a
//! cleared or superseded flow never reaches the token endpoint again.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn, Instrument};

use super::backend::AuthBackend;
use super::device_code::{DeviceFlow, TokenPoll};
use super::store::{FlowOutcome, FlowStateStore, FlowView};

/// Interval increment applied on `slow_down`.
pub const DEFAULT_SLOW_DOWN_INCREMENT_MS: u64 = 5_000;

/// Scheduling policy shared by every flow.
#[derive(Debug, Clone, Builder)]
pub struct PollPolicy {
    #[builder(default = DEFAULT_SLOW_DOWN_INCREMENT_MS)]
    pub slow_down_increment_ms: u64,
    /// Consecutive failed polls tolerated before the flow is forced to
    /// `Expired`. `0` keeps retrying until the lifetime timer fires.
    #[builder(default)]
    pub max_consecutive_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Handle to a running poll task. [`cancel`](Self::cancel) is the only stop point.
///
/// Dropping the handle also stops the task at its next timer.
#[derive(Debug)]
pub struct PollHandle {
    generation: u64,
    abort_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the task immediately, including any in-flight request.
    ///
    /// Returns `true` if the task was still listening for the signal.
    pub fn cancel(&mut self) -> bool {
        let signalled = self
            .abort_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false);
        self.task.abort();
        signalled
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the task exits on its own or after cancellation.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Spawns one poll task per flow generation.
#[derive(Clone)]
pub struct PollScheduler {
    backend: Arc<dyn AuthBackend>,
    store: Arc<FlowStateStore>,
    policy: PollPolicy,
}

impl PollScheduler {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<FlowStateStore>, policy: PollPolicy) -> Self {
        Self {
            backend,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Arm both timers for `flow` tracked as `generation` in the store.
    pub fn spawn(&self, generation: u64, flow: &DeviceFlow) -> PollHandle {
        let (abort_tx, abort_rx) = oneshot::channel();
        let job = PollJob {
            backend: self.backend.clone(),
            store: self.store.clone(),
            policy: self.policy.clone(),
            generation,
            device_code: flow.device_code.clone(),
            interval: flow.poll_interval(),
            lifetime: flow.lifetime(),
        };
        let span = tracing::info_span!("device_flow", generation, user_code = %flow.user_code);
        let task = tokio::spawn(job.run(abort_rx).instrument(span));
        PollHandle {
            generation,
            abort_tx: Some(abort_tx),
            task,
        }
    }
}

struct PollJob {
    backend: Arc<dyn AuthBackend>,
    store: Arc<FlowStateStore>,
    policy: PollPolicy,
    generation: u64,
    device_code: String,
    interval: Duration,
    lifetime: Duration,
}

impl PollJob {
    async fn run(mut self, mut abort_rx: oneshot::Receiver<()>) {
        let started = Instant::now();
        let lifetime_timer = sleep_until(started + self.lifetime);
        tokio::pin!(lifetime_timer);
        let mut next_tick = started + self.interval;
        let mut failures: u32 = 0;
        let mut view_rx = self.store.subscribe();

        loop {
            tokio::select! {
                biased;
                _ = &mut abort_rx => {
                    debug!("poll scheduler cancelled");
                    return;
                }
                _ = &mut lifetime_timer => {
                    self.finish(FlowOutcome::Expired, "device flow expired before approval");
                    return;
                }
                _ = left_generation(&mut view_rx, self.generation) => {
                    debug!("flow cleared or superseded; stopping poll scheduler");
                    return;
                }
                _ = sleep_until(next_tick) => {}
            }

            let polled = tokio::select! {
                biased;
                _ = &mut lifetime_timer => {
                    self.finish(FlowOutcome::Expired, "device flow expired before approval");
                    return;
                }
                _ = left_generation(&mut view_rx, self.generation) => {
                    debug!("flow cleared or superseded during poll; stopping poll scheduler");
                    return;
                }
                polled = self.backend.poll_token(&self.device_code) => polled,
            };

            if self.store.generation() != self.generation {
                debug!("flow superseded; stopping poll scheduler");
                return;
            }

            match polled {
                Ok(TokenPoll::Authorized(credential)) => {
                    let user = match self.backend.fetch_user_info(&credential.access_token).await {
                        Ok(user) => Some(user),
                        Err(err) => {
                            warn!(error = %err, "user info fetch failed after approval");
                            None
                        }
                    };
                    self.finish(
                        FlowOutcome::Approved { credential, user },
                        "device flow approved",
                    );
                    return;
                }
                Ok(TokenPoll::Pending) => {
                    failures = 0;
                    debug!("authorization pending");
                }
                Ok(TokenPoll::SlowDown) => {
                    failures = 0;
                    self.interval += Duration::from_millis(self.policy.slow_down_increment_ms);
                    let interval_ms = self.interval.as_millis() as u64;
                    self.store.raise_interval(self.generation, interval_ms);
                    info!(interval_ms, "authorization server asked to slow down");
                }
                Ok(TokenPoll::Expired) => {
                    self.finish(FlowOutcome::Expired, "device code expired");
                    return;
                }
                Ok(TokenPoll::Denied) => {
                    self.finish(FlowOutcome::Denied, "device flow denied by user");
                    return;
                }
                Ok(TokenPoll::Other { code, description }) => {
                    warn!(
                        error = %code,
                        description = description.as_deref().unwrap_or(""),
                        "token endpoint returned terminal error"
                    );
                    self.finish(FlowOutcome::Denied, "device flow denied");
                    return;
                }
                Err(err) => {
                    failures += 1;
                    warn!(error = %err, failures, "token poll failed; retrying on next tick");
                    let cap = self.policy.max_consecutive_failures;
                    if cap > 0 && failures >= cap {
                        self.finish(FlowOutcome::Expired, "giving up after repeated poll failures");
                        return;
                    }
                }
            }

            next_tick = Instant::now() + self.interval;
        }
    }

    fn finish(&self, outcome: FlowOutcome, message: &str) {
        if self.store.complete(self.generation, outcome) {
            info!("{message}");
        } else {
            debug!("terminal outcome dropped for stale flow");
        }
    }
}

/// Resolves once the store publishes a view from another generation.
async fn left_generation(rx: &mut watch::Receiver<FlowView>, generation: u64) {
    loop {
        if rx.borrow_and_update().generation != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
