//! Launcher for match functions linked into the current process.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{WorkerJob, WorkerLauncher};
use crate::error::Result;
use crate::store::CoordinationStore;
use crate::worker::{self, MatchFunction, WorkerKeys};

/// Runs a [`MatchFunction`] on a spawned task under the worker contract.
pub struct InProcessLauncher {
    store: Arc<dyn CoordinationStore>,
    keys: WorkerKeys,
    mmf: Arc<dyn MatchFunction>,
}

impl InProcessLauncher {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        keys: WorkerKeys,
        mmf: Arc<dyn MatchFunction>,
    ) -> Self {
        Self { store, keys, mmf }
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn launch(&self, job: &WorkerJob) -> Result<()> {
        let store = self.store.clone();
        let keys = self.keys.clone();
        let mmf = self.mmf.clone();
        let job = job.clone();
        debug!(job = %job.job_name(), "spawning in-process match function");

        tokio::spawn(async move {
            let name = job.job_name();
            match worker::run_match_function(store, &keys, job, mmf).await {
                Ok(outcome) => debug!(job = %name, ?outcome, "in-process match function finished"),
                Err(e) => debug!(job = %name, error = %e, "in-process match function aborted"),
            }
        });
        Ok(())
    }
}
