pub mod aggregator;
pub mod clock;
pub mod evaluator;
pub mod scheduler;
pub mod vu;

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::RequestExecutor;
use crate::executor::aggregator::MetricsAggregator;
use crate::executor::clock::RunClock;
use crate::executor::scheduler::RampScheduler;
use crate::executor::vu::{IterationFn, VirtualUser};
use crate::models::dsl_model::TestConfig;
use crate::models::metrics::{Metrics, ThresholdResult};

/// Ticks between info-level progress lines.
const PROGRESS_EVERY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Ramping,
    Draining,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    pub phase: RunPhase,
    pub active_vus: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metrics: Metrics,
    pub thresholds: Vec<ThresholdResult>,
    pub elapsed: Duration,
    pub peak_vus: u64,
    /// VUs aborted because they outlived the graceful stop period.
    pub forced_stops: usize,
    pub interrupted: bool,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }
}

struct ActiveVu {
    id: u64,
    stop: CancellationToken,
}

/// Owns the VU tally and drives a run through
/// `Idle -> Ramping -> Draining -> Completed`.
pub struct RunController {
    config: Arc<TestConfig>,
    aggregator: Arc<MetricsAggregator>,
    interrupt: CancellationToken,
    drain: CancellationToken,
    state: RunState,
    state_tx: watch::Sender<RunState>,
    active: Vec<ActiveVu>,
    tasks: JoinSet<u64>,
    next_id: u64,
    peak_vus: u64,
}

impl RunController {
    pub fn new(config: TestConfig) -> Self {
        let state = RunState {
            phase: RunPhase::Idle,
            active_vus: 0,
            elapsed: Duration::ZERO,
        };
        let (state_tx, _) = watch::channel(state);
        Self {
            config: Arc::new(config),
            aggregator: Arc::new(MetricsAggregator::new()),
            interrupt: CancellationToken::new(),
            drain: CancellationToken::new(),
            state,
            state_tx,
            active: Vec::new(),
            tasks: JoinSet::new(),
            next_id: 0,
            peak_vus: 0,
        }
    }

    /// Cancelling this ends the ramp early; the run still drains and reports.
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Runs with the configured GET as the iteration body.
    pub async fn run(self) -> RunOutcome {
        let executor = RequestExecutor::new(&self.config);
        let iteration: IterationFn = Arc::new(move || {
            let executor = executor.clone();
            async move { executor.execute().await }.boxed()
        });
        self.run_with(iteration).await
    }

    pub async fn run_with(mut self, iteration: IterationFn) -> RunOutcome {
        let scheduler = RampScheduler::new(self.config.profile.clone());
        let total = scheduler.total_duration();
        info!(
            name = %self.config.name,
            url = %self.config.url,
            duration = ?total,
            max_vus = self.config.profile.max_vus(),
            "starting load test"
        );

        let clock = RunClock::start();
        self.set_phase(RunPhase::Ramping, clock.elapsed());

        let mut interrupted = false;
        let mut ticks: u32 = 0;
        loop {
            let elapsed = clock.elapsed();
            if elapsed >= total {
                break;
            }
            let target = scheduler.target_at(elapsed);
            self.reconcile(target, &iteration);
            self.reap_finished();
            self.publish(elapsed);

            if ticks % PROGRESS_EVERY == 0 {
                info!(
                    elapsed = ?elapsed,
                    vus = self.active.len(),
                    requests = self.aggregator.count(),
                    "progress"
                );
            } else {
                debug!(elapsed = ?elapsed, target, vus = self.active.len(), "tick");
            }

            ticks += 1;
            let next = (self.config.tick * ticks).min(total);
            tokio::select! {
                _ = clock.sleep_until(next) => {}
                _ = self.interrupt.cancelled() => {
                    warn!(elapsed = ?clock.elapsed(), "run interrupted, draining");
                    interrupted = true;
                    break;
                }
            }
        }

        self.set_phase(RunPhase::Draining, clock.elapsed());
        let forced_stops = self.drain_all().await;

        let elapsed = clock.elapsed();
        self.set_phase(RunPhase::Completed, elapsed);

        let thresholds =
            evaluator::evaluate(&self.config.thresholds, &self.aggregator, elapsed);
        let metrics = self.aggregator.summary(elapsed);
        info!(
            requests = metrics.total_requests,
            success_ratio = metrics.success_ratio,
            elapsed = ?elapsed,
            "load test finished"
        );

        RunOutcome {
            metrics,
            thresholds,
            elapsed,
            peak_vus: self.peak_vus,
            forced_stops,
            interrupted,
        }
    }

    /// Spawns or retires VUs until the active count equals `target`. Retired
    /// VUs finish their current iteration on their own.
    fn reconcile(&mut self, target: u64, iteration: &IterationFn) {
        let active = self.active.len() as u64;
        if active < target {
            for _ in active..target {
                self.spawn_vu(iteration);
            }
        } else {
            for _ in target..active {
                if let Some(vu) = self.active.pop() {
                    debug!(vu = vu.id, "retiring virtual user");
                    vu.stop.cancel();
                }
            }
        }
        self.peak_vus = self.peak_vus.max(self.active.len() as u64);
    }

    fn spawn_vu(&mut self, iteration: &IterationFn) {
        let id = self.next_id;
        self.next_id += 1;
        let stop = self.drain.child_token();
        let vu = VirtualUser::new(
            id,
            Arc::clone(iteration),
            Arc::clone(&self.aggregator),
            self.config.sleep,
            stop.clone(),
        );
        self.tasks.spawn(vu.run());
        self.active.push(ActiveVu { id, stop });
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_exit(result);
        }
    }

    /// Stops every VU and waits up to `graceful_stop`. Returns how many had to
    /// be aborted.
    async fn drain_all(&mut self) -> usize {
        self.drain.cancel();
        self.active.clear();

        let grace = self.config.graceful_stop;
        let tasks = &mut self.tasks;
        let drained = timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                log_exit(result);
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }
        let forced = self.tasks.len();
        warn!(forced, grace = ?grace, "graceful stop expired, aborting virtual users");
        self.tasks.shutdown().await;
        forced
    }

    fn set_phase(&mut self, phase: RunPhase, elapsed: Duration) {
        debug!(from = ?self.state.phase, to = ?phase, "run phase");
        self.state.phase = phase;
        self.publish(elapsed);
    }

    fn publish(&mut self, elapsed: Duration) {
        self.state.active_vus = self.active.len() as u64;
        self.state.elapsed = elapsed;
        self.state_tx.send_replace(self.state);
    }
}

fn log_exit(result: Result<u64, JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!(error = %e, "virtual user panicked");
        }
    }
}
