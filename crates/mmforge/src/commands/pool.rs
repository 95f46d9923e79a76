//! Player pools for the bundled match function.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::{PoolAction, PoolCommand};
use mmforge_core::records::pool_key;
use mmforge_core::{CoordinationStore, ForgeConfig};

#[derive(Debug, Serialize)]
struct PoolListing {
    pool: String,
    players: Vec<String>,
}

pub async fn execute(cmd: PoolCommand, config: &ForgeConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    match cmd.action {
        PoolAction::Add { pool, players } => {
            let added = add_players(store.as_ref(), &pool, &players).await?;
            println!(
                "{} Added {} new player(s) to pool {}",
                "✓".green(),
                added,
                pool.cyan()
            );
        }
        PoolAction::List { pool, json } => {
            let players = store.set_members(&pool_key(&pool)).await?;
            let listing = PoolListing { pool, players };
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!(
                    "{} ({})",
                    format!("Pool: {}", listing.pool).cyan().bold(),
                    listing.players.len()
                );
                println!("{}", "─".repeat(50));
                for player in &listing.players {
                    println!("  • {}", player);
                }
            }
        }
    }
    Ok(())
}

async fn add_players(store: &dyn CoordinationStore, pool: &str, players: &[String]) -> Result<usize> {
    Ok(store.set_add(&pool_key(pool), players).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmforge_core::store::MemoryStore;

    #[tokio::test]
    async fn test_add_players_counts_new_members() {
        let store = MemoryStore::new();
        let players = vec!["p1".to_string(), "p2".to_string()];
        assert_eq!(add_players(&store, "everyone", &players).await.unwrap(), 2);
        assert_eq!(add_players(&store, "everyone", &players[..1]).await.unwrap(), 0);

        let mut members = store.set_members("pool.everyone").await.unwrap();
        members.sort();
        assert_eq!(members, players);
    }
}
