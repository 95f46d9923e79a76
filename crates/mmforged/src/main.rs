//! mmforged - mmforge orchestrator daemon
//!
//! Pulls match profiles, launches match functions and evaluates their
//! proposals until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mmforge_core::config as core_config;
use mmforge_core::launcher::ProfileRouter;
use mmforge_core::orchestrator::Orchestrator;
use mmforge_core::store;

mod config;

/// mmforge orchestrator daemon
#[derive(Parser, Debug)]
#[command(name = "mmforged")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to $MMFORGE_CONFIG or ~/.mmforge/config.toml)
    #[arg(short, long, env = "MMFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Evaluate without writing results or touching the ignorelist
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("mmforged=info".parse()?)
                .add_directive("mmforge_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!("mmforged v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::Config::load(args.config.as_deref())?;
    if args.dry_run {
        config.forge.evaluator.dry_run = true;
    }
    info!(
        path = %config.config_path.display(),
        backend = ?config.forge.store.backend,
        resolver = ?config.forge.evaluator.resolver,
        dry_run = config.forge.evaluator.dry_run,
        "config loaded"
    );

    // The loop cannot make progress without the store
    let store = store::open(&config.forge.store).context("failed to open coordination store")?;
    store.ping().await.context("coordination store is unreachable")?;
    info!(path = %config.forge.store.path.display(), "coordination store ready");

    // Local workers read the same config file, and so the same store
    let launcher = ProfileRouter::new(config.forge.launcher.clone())
        .context("failed to build match function launcher")?
        .with_command_env(core_config::CONFIG_ENV, config.config_path.display().to_string());
    let orchestrator = Orchestrator::from_config(store, Arc::new(launcher), &config.forge);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down...");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    let stats = orchestrator.run(cancel).await;
    info!(
        dispatched = stats.dispatched,
        launched = stats.launched,
        launch_failures = stats.launch_failures,
        malformed_profiles = stats.malformed_profiles,
        evaluations = stats.evaluations_started,
        "mmforged exited"
    );

    Ok(())
}
