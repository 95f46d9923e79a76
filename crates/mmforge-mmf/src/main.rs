//! mmforge-mmf - default match function worker
//!
//! Launched by mmforged once per dispatched profile. The job arrives through
//! `MMF_*` environment variables and the store location through the same
//! configuration file the daemon uses (`$MMFORGE_CONFIG`).

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mmforge_core::config as core_config;
use mmforge_core::launcher::ENV_ERROR_ID;
use mmforge_core::worker::{self, WorkerKeys};
use mmforge_core::{ForgeConfig, store};

mod pool_fill;

use pool_fill::PoolFill;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout is left to the match function's owner; logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("mmforge_mmf=info".parse()?)
                .add_directive("mmforge_core=info".parse()?),
        )
        .init();

    let config_path = core_config::config_path();
    let config = ForgeConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let store = store::open(&config.store).context("failed to open coordination store")?;
    let keys = WorkerKeys::from_config(&config);

    let job = match worker::job_from_env(store.as_ref()).await {
        Ok(job) => job,
        Err(e) => {
            // Only a dispatched run holds an in-flight slot
            if std::env::var_os(ENV_ERROR_ID).is_some() {
                if let Err(dec) = store.counter_decrement(&keys.in_flight_key).await {
                    error!(error = %dec, "failed to decrement in-flight counter");
                }
            }
            return Err(e).context("failed to read job from environment");
        }
    };
    info!(job = %job.job_name(), profile = %job.profile.id, "match function starting");

    let mmf = Arc::new(PoolFill::new(store.clone()));
    let outcome = worker::run_match_function(store, &keys, job, mmf).await?;
    info!(?outcome, "match function finished");
    Ok(())
}
