//! Orchestrator loop.
//!
//! Each pass dispatches pending profiles, then reads the in-flight counter to
//! decide whether the current evaluation window should close:
//!
//! ```text
//! Idle → Dispatching → Polling → (Triggered | NotTriggered) → Idle
//! ```
//!
//! The counter is a debounce signal, not a barrier. It is deleted after every
//! trigger, so an absent counter means "nothing dispatched since the last
//! check" and resets the window. Evaluation runs are spawned detached; at
//! shutdown the loop waits for them instead of aborting them.

mod dispatch;
mod trigger;

pub use trigger::{Decision, TriggerReason, decide};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::ForgeConfig;
use crate::evaluator::Evaluator;
use crate::launcher::WorkerLauncher;
use crate::store::CoordinationStore;
use dispatch::Dispatcher;

// ─────────────────────────────────────────────────────────────────────────────
// Settings & Stats
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub profile_queue: String,
    pub pull_count: usize,
    pub proposal_queue: String,
    pub in_flight_key: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub main_sleep: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            profile_queue: config.queues.profiles.name.clone(),
            pull_count: config.queues.profiles.pull_count,
            proposal_queue: config.queues.proposals.name.clone(),
            in_flight_key: config.orchestrator.in_flight_key.clone(),
            poll_interval: config.orchestrator.poll_interval(),
            max_wait: config.orchestrator.max_wait(),
            main_sleep: config.orchestrator.main_sleep(),
        }
    }
}

/// Running totals, updated from the loop and from dispatch tasks.
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    pub dispatched: AtomicU64,
    pub launched: AtomicU64,
    pub launch_failures: AtomicU64,
    pub malformed_profiles: AtomicU64,
    pub evaluations_started: AtomicU64,
    pub evaluation_failures: AtomicU64,
    pub empty_triggers: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub launched: u64,
    pub launch_failures: u64,
    pub malformed_profiles: u64,
    pub evaluations_started: u64,
    pub evaluation_failures: u64,
    pub empty_triggers: u64,
}

impl OrchestratorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            launched: self.launched.load(Ordering::Relaxed),
            launch_failures: self.launch_failures.load(Ordering::Relaxed),
            malformed_profiles: self.malformed_profiles.load(Ordering::Relaxed),
            evaluations_started: self.evaluations_started.load(Ordering::Relaxed),
            evaluation_failures: self.evaluation_failures.load(Ordering::Relaxed),
            empty_triggers: self.empty_triggers.load(Ordering::Relaxed),
        }
    }
}

/// Result of one loop pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Counter absent; window restarted
    NoActivity,
    /// Counter could not be read; nothing changed
    CounterUnavailable,
    /// Workers still in flight inside the window
    Holding { in_flight: i64 },
    /// Window closed; counter deleted and window restarted
    Triggered {
        reason: TriggerReason,
        evaluation_started: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

pub struct Orchestrator {
    store: Arc<dyn CoordinationStore>,
    evaluator: Arc<Evaluator>,
    dispatcher: Dispatcher,
    settings: OrchestratorSettings,
    stats: Arc<OrchestratorStats>,
    window_start: Instant,
    /// Dispatch tasks and evaluation runs
    tasks: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        launcher: Arc<dyn WorkerLauncher>,
        evaluator: Evaluator,
        settings: OrchestratorSettings,
    ) -> Self {
        let stats = Arc::new(OrchestratorStats::default());
        let dispatcher = Dispatcher {
            store: store.clone(),
            launcher,
            profile_queue: settings.profile_queue.clone(),
            pull_count: settings.pull_count,
            in_flight_key: settings.in_flight_key.clone(),
            stats: stats.clone(),
        };
        Self {
            store,
            evaluator: Arc::new(evaluator),
            dispatcher,
            settings,
            stats,
            window_start: Instant::now(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn from_config(
        store: Arc<dyn CoordinationStore>,
        launcher: Arc<dyn WorkerLauncher>,
        config: &ForgeConfig,
    ) -> Self {
        let evaluator = Evaluator::from_config(store.clone(), config);
        Self::new(store, launcher, evaluator, OrchestratorSettings::from_config(config))
    }

    pub fn stats(&self) -> Arc<OrchestratorStats> {
        self.stats.clone()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// One Dispatching → Polling → trigger pass.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.dispatcher.dispatch(&self.tasks).await {
            Ok(0) => {}
            Ok(n) => debug!(dispatched = n, "profiles dispatched"),
            Err(e) => warn!(error = %e, "failed to pop match profiles"),
        }

        let key = self.settings.in_flight_key.as_str();
        let counter = match self.store.counter_get(key).await {
            Ok(counter) => counter,
            Err(e) => {
                warn!(key, error = %e, "failed to read in-flight counter");
                return TickOutcome::CounterUnavailable;
            }
        };

        match decide(counter, self.window_start.elapsed(), self.settings.max_wait) {
            Decision::NoActivity => {
                debug!(key, "in-flight counter absent, restarting window");
                self.window_start = Instant::now();
                TickOutcome::NoActivity
            }
            Decision::Hold => TickOutcome::Holding {
                in_flight: counter.unwrap_or_default(),
            },
            Decision::Fire(reason) => self.close_window(reason).await,
        }
    }

    async fn close_window(&mut self, reason: TriggerReason) -> TickOutcome {
        match reason {
            TriggerReason::IntervalExceeded => info!(
                reason = %reason,
                max_wait_ms = self.settings.max_wait.as_millis() as u64,
                "maximum evaluation interval exceeded"
            ),
            TriggerReason::AllWorkersComplete => info!(reason = %reason, "all match functions complete"),
        }

        let queue = self.settings.proposal_queue.as_str();
        let evaluation_started = match self.store.set_cardinality(queue).await {
            Ok(0) => {
                info!(queue, "nothing to evaluate");
                self.stats.empty_triggers.fetch_add(1, Ordering::Relaxed);
                false
            }
            Ok(count) => {
                info!(queue, proposals = count, "proposals available, evaluating");
                self.spawn_evaluation(reason);
                true
            }
            Err(e) => {
                error!(queue, error = %e, "failed to read proposal queue length");
                false
            }
        };

        if let Err(e) = self.store.counter_delete(&self.settings.in_flight_key).await {
            error!(error = %e, "failed to delete in-flight counter");
        }
        self.window_start = Instant::now();

        TickOutcome::Triggered {
            reason,
            evaluation_started,
        }
    }

    fn spawn_evaluation(&self, reason: TriggerReason) {
        self.stats.evaluations_started.fetch_add(1, Ordering::Relaxed);
        let evaluator = self.evaluator.clone();
        let stats = self.stats.clone();
        self.tasks.spawn(async move {
            match evaluator.run().await {
                Ok(report) => debug!(
                    reason = %reason,
                    approved = report.approved.len(),
                    rejected = report.rejected.len(),
                    "evaluation finished"
                ),
                Err(e) => {
                    stats.evaluation_failures.fetch_add(1, Ordering::Relaxed);
                    error!(reason = %reason, error = %e, "evaluation failed");
                }
            }
        });
    }

    /// Sleep before the next pass.
    pub fn pause_after(&self, outcome: &TickOutcome) -> Duration {
        match outcome {
            TickOutcome::NoActivity | TickOutcome::CounterUnavailable => self.settings.poll_interval,
            TickOutcome::Holding { .. } | TickOutcome::Triggered { .. } => self.settings.main_sleep,
        }
    }

    /// Wait for every spawned dispatch task and evaluation run to finish.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Loop until `cancel` fires, then wait for in-progress work.
    ///
    /// A pass that has started always completes; cancellation only cuts the
    /// sleep between passes.
    pub async fn run(mut self, cancel: CancellationToken) -> StatsSnapshot {
        info!(
            profile_queue = %self.settings.profile_queue,
            proposal_queue = %self.settings.proposal_queue,
            max_wait_ms = self.settings.max_wait.as_millis() as u64,
            "orchestrator started"
        );
        self.window_start = Instant::now();

        while !cancel.is_cancelled() {
            let outcome = self.tick().await;
            let pause = self.pause_after(&outcome);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(pending = self.tasks.len(), "orchestrator stopping, waiting for running evaluations");
        self.tasks.close();
        self.tasks.wait().await;

        let stats = self.stats.snapshot();
        info!(?stats, "orchestrator stopped");
        stats
    }
}
