//! mmforge - operator CLI
//!
//! Talks to the coordination store directly; the daemon does not need to be
//! running.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mmforge_core::ForgeConfig;
use mmforge_core::config as core_config;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("mmforge=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.unwrap_or_else(core_config::config_path);
    let config = ForgeConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    // Execute command
    match cli.command {
        Commands::Evaluate { dry_run, json } => {
            commands::evaluate::execute(dry_run, json, &config).await
        }
        Commands::Profile(cmd) => commands::profile::execute(cmd, &config).await,
        Commands::Result(cmd) => commands::result::execute(cmd, &config).await,
        Commands::Ignorelist(cmd) => commands::ignorelist::execute(cmd, &config).await,
        Commands::Pool(cmd) => commands::pool::execute(cmd, &config).await,
        Commands::Status { json } => commands::status::execute(json, &config).await,
        Commands::Version => {
            println!("mmforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
