//! Coordination store status dashboard.
//!
//! Shows the keys the daemon and the match functions coordinate through:
//! - The in-flight match function counter
//! - Pending profile requests and proposals
//! - Players currently held on the ignorelist
//!
//! Supports JSON output for programmatic use.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use mmforge_core::config::StoreBackend;
use mmforge_core::ignorelist::{self, IgnorelistWindow};
use mmforge_core::{CoordinationStore, ForgeConfig};

/// Full status for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ForgeStatus {
    pub timestamp: String,
    pub store: StoreStatus,
    /// `None` when no evaluation window is open
    pub in_flight: Option<i64>,
    pub queues: Vec<QueueStatus>,
    pub ignorelist: QueueStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub backend: StoreBackend,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub name: String,
    pub size: usize,
}

pub async fn execute(json: bool, config: &ForgeConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let status = gather_status(store.as_ref(), config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_dashboard(&status);
    }

    Ok(())
}

async fn gather_status(store: &dyn CoordinationStore, config: &ForgeConfig) -> Result<ForgeStatus> {
    let in_flight = store.counter_get(&config.orchestrator.in_flight_key).await?;

    let mut queues = Vec::new();
    for name in [&config.queues.profiles.name, &config.queues.proposals.name] {
        queues.push(QueueStatus {
            name: name.clone(),
            size: store.set_cardinality(name).await?,
        });
    }

    let proposed = &config.ignorelists.proposed;
    let ignored = ignorelist::retrieve(store, &proposed.name, IgnorelistWindow::from(proposed)).await?;

    Ok(ForgeStatus {
        timestamp: Utc::now().to_rfc3339(),
        store: StoreStatus {
            backend: config.store.backend,
            path: config.store.path.display().to_string(),
        },
        in_flight,
        queues,
        ignorelist: QueueStatus {
            name: proposed.name.clone(),
            size: ignored.len(),
        },
    })
}

fn print_dashboard(status: &ForgeStatus) {
    println!();
    println!("{}", "mmforge Status".cyan().bold());
    println!("{}", "─".repeat(50));

    print!("  {} ", "Store:".cyan().bold());
    match status.store.backend {
        StoreBackend::Sqlite => println!("sqlite {}", status.store.path),
        StoreBackend::Memory => println!("{}", "memory (not shared)".yellow()),
    }

    println!();
    print!("  {} ", "Match functions:".cyan().bold());
    match status.in_flight {
        None => println!("{}", "IDLE".normal()),
        Some(n) if n > 0 => println!("{} ({} in flight)", "RUNNING".green().bold(), n),
        Some(_) => println!("{}", "EVALUATION PENDING".yellow()),
    }

    println!();
    println!("  {}", "Queues:".cyan().bold());
    for queue in &status.queues {
        println!("    {:<20} {}", queue.name, queue.size);
    }

    println!();
    println!("  {}", "Ignorelist:".cyan().bold());
    println!("    {:<20} {}", status.ignorelist.name, status.ignorelist.size);
    println!();
}
