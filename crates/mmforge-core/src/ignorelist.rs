//! Ignorelist maintenance.
//!
//! An ignorelist names players that match functions must not be offered,
//! each stamped with the epoch second it was added. Retrieval is windowed so
//! stale claims (for example from a crashed worker) can be aged out.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IgnorelistConfig;
use crate::error::Result;
use crate::store::CoordinationStore;

/// Time window applied when reading an ignorelist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnorelistWindow {
    /// Only entries added within this many seconds before `until` count (0 = no lower bound)
    pub duration_secs: i64,
    /// Skip entries newer than this many seconds (0 = up to now)
    pub offset_secs: i64,
}

impl IgnorelistWindow {
    pub fn new(duration_secs: i64, offset_secs: i64) -> Self {
        Self {
            duration_secs,
            offset_secs,
        }
    }

    /// Inclusive `[from, until]` bounds relative to `now` (epoch seconds).
    pub fn bounds(&self, now: i64) -> (i64, i64) {
        let until = if self.offset_secs > 0 {
            now - self.offset_secs
        } else {
            now
        };
        let from = if self.duration_secs > 0 {
            until - self.duration_secs
        } else {
            0
        };
        (from, until)
    }
}

impl From<&IgnorelistConfig> for IgnorelistWindow {
    fn from(config: &IgnorelistConfig) -> Self {
        Self::new(config.duration_secs, config.offset_secs)
    }
}

/// Players currently on `list` within `window`, oldest first.
pub async fn retrieve(
    store: &dyn CoordinationStore,
    list: &str,
    window: IgnorelistWindow,
) -> Result<Vec<String>> {
    let (from, until) = window.bounds(Utc::now().timestamp());
    let players = store.ignorelist_retrieve(list, from, until).await?;
    debug!(list, from, until, count = players.len(), "ignorelist retrieved");
    Ok(players)
}

/// Add players to `list` stamped with the current time.
pub async fn add(store: &dyn CoordinationStore, list: &str, player_ids: &[String]) -> Result<()> {
    if player_ids.is_empty() {
        return Ok(());
    }
    store
        .ignorelist_add(list, player_ids, Utc::now().timestamp())
        .await
}

/// Move players from one ignorelist to another: add to `dest`, then remove from `src`.
pub async fn move_players(
    store: &dyn CoordinationStore,
    src: &str,
    dest: &str,
    player_ids: &[String],
) -> Result<usize> {
    add(store, dest, player_ids).await?;
    let removed = store.ignorelist_remove(src, player_ids).await?;
    debug!(src, dest, moved = player_ids.len(), removed, "ignorelist players moved");
    Ok(removed)
}
