//! Profile dispatch.
//!
//! Pops pending profile requests and hands each to the launcher on its own
//! task. The in-flight counter is incremented per request before the task is
//! spawned and is never rolled back here; the worker decrements it.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::OrchestratorStats;
use crate::error::{Error, Result};
use crate::ids::ResultId;
use crate::launcher::{WorkerJob, WorkerLauncher};
use crate::records;
use crate::store::CoordinationStore;
use crate::worker;

pub(crate) struct Dispatcher {
    pub(crate) store: Arc<dyn CoordinationStore>,
    pub(crate) launcher: Arc<dyn WorkerLauncher>,
    pub(crate) profile_queue: String,
    pub(crate) pull_count: usize,
    pub(crate) in_flight_key: String,
    pub(crate) stats: Arc<OrchestratorStats>,
}

impl Dispatcher {
    /// Pop up to `pull_count` requests and dispatch them. Returns how many
    /// were dispatched.
    pub(crate) async fn dispatch(&self, tasks: &TaskTracker) -> Result<usize> {
        let requests = self
            .store
            .set_pop_random(&self.profile_queue, self.pull_count)
            .await?;
        if requests.is_empty() {
            debug!(queue = %self.profile_queue, "no match profiles pending");
            return Ok(0);
        }
        info!(count = requests.len(), "starting match functions");

        let mut dispatched = 0;
        for raw in requests {
            let result_id = match raw.parse::<ResultId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(request = %raw, error = %e, "skipping malformed profile request");
                    self.stats.malformed_profiles.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if let Err(e) = self.store.counter_increment(&self.in_flight_key).await {
                error!(request = %raw, error = %e, "failed to count dispatched match function");
            }
            self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
            dispatched += 1;

            let store = self.store.clone();
            let launcher = self.launcher.clone();
            let stats = self.stats.clone();
            tasks.spawn(async move {
                dispatch_one(store.as_ref(), launcher.as_ref(), &stats, result_id).await;
            });
        }
        Ok(dispatched)
    }
}

async fn dispatch_one(
    store: &dyn CoordinationStore,
    launcher: &dyn WorkerLauncher,
    stats: &OrchestratorStats,
    result_id: ResultId,
) {
    let profile_key = result_id.profile_id.clone();
    let profile = match records::fetch_profile(store, &profile_key).await {
        Ok(profile) => profile,
        Err(e) => {
            error!(profile = %profile_key, error = %e, "failed to read profile; not running match function");
            stats.malformed_profiles.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    if let Err(e) = profile.properties_json() {
        let e = Error::malformed_profile(&profile_key, e.to_string());
        warn!(error = %e, "profile properties are not valid JSON");
        stats.malformed_profiles.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let job = WorkerJob::new(result_id, profile, worker::now_timestamp());
    match launcher.launch(&job).await {
        Ok(()) => {
            stats.launched.fetch_add(1, Ordering::Relaxed);
            debug!(job = %job.job_name(), "match function launched");
        }
        Err(e) => {
            stats.launch_failures.fetch_add(1, Ordering::Relaxed);
            error!(job = %job.job_name(), error = %e, "failed to launch match function");
        }
    }
}
