//! Match result lookup.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::cli::{ResultAction, ResultCommand};
use mmforge_core::types::MatchObject;
use mmforge_core::{CoordinationStore, ForgeConfig, ResultId, records};

/// Where a match request currently stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultState {
    /// No result record yet; still queued, running or awaiting evaluation
    Pending,
    Matched { result: MatchObject },
    Failed { error: String, result: MatchObject },
}

pub async fn execute(cmd: ResultCommand, config: &ForgeConfig) -> Result<()> {
    match cmd.action {
        ResultAction::Get { result_id, json } => get(&result_id, json, config).await,
    }
}

async fn get(raw: &str, json: bool, config: &ForgeConfig) -> Result<()> {
    let result_id: ResultId = raw.parse().context("invalid result ID")?;
    let store = super::open_store(config).await?;
    let state = lookup(store.as_ref(), &result_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("{}", format!("Result: {}", result_id).cyan().bold());
    println!("{}", "─".repeat(50));
    match &state {
        ResultState::Pending => println!("  {}", "PENDING".yellow()),
        ResultState::Matched { result } => {
            println!("  {}", "MATCHED".green().bold());
            for roster in &result.rosters {
                let players: Vec<&str> = roster.players.iter().map(|p| p.id.as_str()).collect();
                println!("    {}: {}", roster.name.bold(), players.join(", "));
            }
        }
        ResultState::Failed { error, .. } => {
            println!("  {} {}", "FAILED".red().bold(), error);
        }
    }
    Ok(())
}

async fn lookup(store: &dyn CoordinationStore, result_id: &ResultId) -> Result<ResultState> {
    let key = result_id.to_string();
    match records::fetch_match_object(store, &key).await {
        Ok(result) if result.is_error() => Ok(ResultState::Failed {
            error: result.error.clone(),
            result,
        }),
        Ok(result) => Ok(ResultState::Matched { result }),
        Err(e) if e.is_not_found() => Ok(ResultState::Pending),
        Err(e) => Err(e).with_context(|| format!("failed to read result {}", key)),
    }
}
