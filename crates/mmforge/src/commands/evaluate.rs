//! One-shot evaluation run.

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use mmforge_core::evaluator::{EvaluationReport, Evaluator};
use mmforge_core::{CoordinationStore, ForgeConfig};

pub async fn execute(dry_run: bool, json: bool, config: &ForgeConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let report = evaluate(store, config, dry_run).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// `dry_run` can only switch dry-run mode on, never off.
async fn evaluate(
    store: Arc<dyn CoordinationStore>,
    config: &ForgeConfig,
    dry_run: bool,
) -> Result<EvaluationReport> {
    let evaluator =
        Evaluator::from_config(store, config).with_dry_run(dry_run || config.evaluator.dry_run);
    Ok(evaluator.run().await?)
}

fn print_report(report: &EvaluationReport) {
    let title = if report.dry_run {
        "Evaluation (dry run)"
    } else {
        "Evaluation"
    };
    println!("{}", title.cyan().bold());
    println!("{}", "─".repeat(50));

    if report.is_empty() {
        println!("  No pending proposals");
        return;
    }

    println!("  Resolver:  {}", report.resolver);
    if report.fallback {
        println!(
            "  {} resolver returned overlapping approvals; first-wins used instead",
            "⚠".yellow()
        );
    }
    println!("  Proposals: {}", report.batch.len());

    let verb = if report.dry_run { "Would approve" } else { "Approved" };
    println!();
    println!("  {} ({})", verb.green().bold(), report.approved.len());
    for id in &report.approved {
        println!("    {} {}", "✓".green(), id);
    }

    if !report.rejected.is_empty() {
        let verb = if report.dry_run { "Would reject" } else { "Rejected" };
        println!();
        println!("  {} ({})", verb.red().bold(), report.rejected.len());
        for id in &report.rejected {
            println!("    {} {}", "✗".red(), id);
        }
    }

    if !report.released_players.is_empty() {
        println!();
        println!(
            "  Players released from ignorelist: {}",
            report.released_players.join(", ")
        );
        if let Some(err) = &report.release_error {
            println!("  {} release failed: {}", "⚠".yellow(), err);
        }
    }

    for (label, ids) in [
        ("Dropped", &report.dropped),
        ("Already resolved", &report.stale),
        ("Failed", &report.failed),
    ] {
        if !ids.is_empty() {
            println!();
            println!("  {} {} ({})", "⚠".yellow(), label, ids.len());
            for id in ids {
                println!("    • {}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmforge_core::records;
    use mmforge_core::store::MemoryStore;
    use mmforge_core::types::{MatchObject, Roster};

    async fn propose(store: &MemoryStore, id: &str, players: &[&str]) {
        let mo = MatchObject {
            id: id.to_string(),
            rosters: vec![Roster::new("team", players)],
            ..Default::default()
        };
        records::put_match_object(store, id, &mo).await.unwrap();
        store.set_add("proposalq", &[id.to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        propose(&store, "proposal.1.mo1.ranked", &["a", "b"]).await;
        propose(&store, "proposal.1.mo2.ranked", &["b", "c"]).await;

        let report = evaluate(store.clone(), &ForgeConfig::default(), true).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.approved.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 2);
        assert!(store.record_get("mo1.ranked").await.unwrap().is_none());
        assert!(store.record_get("mo2.ranked").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evaluation_writes_results() {
        let store = Arc::new(MemoryStore::new());
        propose(&store, "proposal.1.mo1.ranked", &["a", "b"]).await;

        let report = evaluate(store.clone(), &ForgeConfig::default(), false).await.unwrap();

        assert_eq!(report.approved, vec!["proposal.1.mo1.ranked"]);
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 0);
        let result = records::fetch_match_object(store.as_ref(), "mo1.ranked").await.unwrap();
        assert_eq!(result.player_ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_config_dry_run_cannot_be_overridden() {
        let store = Arc::new(MemoryStore::new());
        propose(&store, "proposal.1.mo1.ranked", &["a"]).await;
        let mut config = ForgeConfig::default();
        config.evaluator.dry_run = true;

        let report = evaluate(store.clone(), &config, false).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 1);
    }
}
