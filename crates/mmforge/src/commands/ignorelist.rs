//! Ignorelist inspection and maintenance.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::{IgnorelistAction, IgnorelistCommand};
use mmforge_core::ForgeConfig;
use mmforge_core::ignorelist::{self, IgnorelistWindow};

#[derive(Debug, Serialize)]
struct Listing<'a> {
    list: &'a str,
    duration_secs: i64,
    offset_secs: i64,
    players: Vec<String>,
}

pub async fn execute(cmd: IgnorelistCommand, config: &ForgeConfig) -> Result<()> {
    let list = config.ignorelists.proposed.name.as_str();
    match cmd.action {
        IgnorelistAction::List {
            duration,
            offset,
            json,
        } => {
            let window = window(config, duration, offset);
            let store = super::open_store(config).await?;
            let players = ignorelist::retrieve(store.as_ref(), list, window).await?;
            let listing = Listing {
                list,
                duration_secs: window.duration_secs,
                offset_secs: window.offset_secs,
                players,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&listing);
            }
            Ok(())
        }
        IgnorelistAction::Release { players } => {
            let store = super::open_store(config).await?;
            let removed = store.ignorelist_remove(list, &players).await?;
            println!(
                "{} Released {} of {} player(s) from {}",
                "✓".green(),
                removed,
                players.len(),
                list.cyan()
            );
            Ok(())
        }
        IgnorelistAction::Move { from, to, players } => {
            let from = from.as_deref().unwrap_or(list);
            let store = super::open_store(config).await?;
            let removed = ignorelist::move_players(store.as_ref(), from, &to, &players).await?;
            println!(
                "{} Moved {} player(s) from {} to {} ({} were on {})",
                "✓".green(),
                players.len(),
                from.cyan(),
                to.cyan(),
                removed,
                from
            );
            Ok(())
        }
    }
}

/// Configured window with command-line overrides.
fn window(config: &ForgeConfig, duration: Option<i64>, offset: Option<i64>) -> IgnorelistWindow {
    let configured = IgnorelistWindow::from(&config.ignorelists.proposed);
    IgnorelistWindow::new(
        duration.unwrap_or(configured.duration_secs),
        offset.unwrap_or(configured.offset_secs),
    )
}

fn print_listing(listing: &Listing<'_>) {
    println!(
        "{} ({})",
        format!("Ignorelist: {}", listing.list).cyan().bold(),
        listing.players.len()
    );
    println!("{}", "─".repeat(50));
    if listing.duration_secs > 0 || listing.offset_secs > 0 {
        println!(
            "  Window: {}s ending {}s ago",
            listing.duration_secs, listing.offset_secs
        );
    }
    if listing.players.is_empty() {
        println!("  No players");
    }
    for player in &listing.players {
        println!("  • {}", player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_overrides() {
        let mut config = ForgeConfig::default();
        config.ignorelists.proposed.duration_secs = 600;
        config.ignorelists.proposed.offset_secs = 5;

        let configured = window(&config, None, None);
        assert_eq!((configured.duration_secs, configured.offset_secs), (600, 5));

        let overridden = window(&config, Some(0), None);
        assert_eq!((overridden.duration_secs, overridden.offset_secs), (0, 5));
    }
}
