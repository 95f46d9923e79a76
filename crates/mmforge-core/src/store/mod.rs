//! Shared coordination store.
//!
//! The store is the only channel between the orchestrator, match function
//! workers and evaluation runs. Every method is atomic on its own; callers never
//! read-modify-write these keys client-side.
//!
//! Backends:
//! - [`MemoryStore`]: in-process maps, for tests and single-process deployments
//! - [`SqliteStore`]: SQLite file shared between processes (feature `db`)

mod memory;
#[cfg(feature = "db")]
pub mod migrations;
#[cfg(feature = "db")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::types::Record;

/// Operations the orchestration core needs from its key-value store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    // ── Counters ─────────────────────────────────────────────────────────────

    /// Create the counter at 0 if absent, add 1, return the new value.
    async fn counter_increment(&self, key: &str) -> Result<i64>;

    /// Create the counter at 0 if absent, subtract 1, return the new value.
    async fn counter_decrement(&self, key: &str) -> Result<i64>;

    /// Current value, or `None` if never set or deleted since.
    async fn counter_get(&self, key: &str) -> Result<Option<i64>>;

    /// Remove the counter entirely.
    async fn counter_delete(&self, key: &str) -> Result<()>;

    // ── Sets ─────────────────────────────────────────────────────────────────

    /// Add members; returns how many were not already present.
    async fn set_add(&self, key: &str, members: &[String]) -> Result<usize>;

    /// Atomically remove and return up to `count` random members.
    async fn set_pop_random(&self, key: &str, count: usize) -> Result<Vec<String>>;

    /// Return up to `count` random members without removing them.
    async fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    async fn set_cardinality(&self, key: &str) -> Result<usize>;

    // ── Records ──────────────────────────────────────────────────────────────

    /// Write the given fields, leaving other fields of the record untouched.
    async fn record_put(&self, key: &str, fields: &Record) -> Result<()>;

    /// All fields, or `None` if the record does not exist.
    async fn record_get(&self, key: &str) -> Result<Option<Record>>;

    async fn record_field_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Write the given fields only if the record exists, in one step.
    /// Returns whether the record existed.
    async fn record_update(&self, key: &str, fields: &Record) -> Result<bool>;

    /// Move a record to a new key, replacing any record already there.
    /// Fails with `Error::NotFound` iff `old_key` does not exist.
    async fn record_rename(&self, old_key: &str, new_key: &str) -> Result<()>;

    /// Returns whether a record was removed.
    async fn record_delete(&self, key: &str) -> Result<bool>;

    // ── Ignorelists ──────────────────────────────────────────────────────────

    /// Add players stamped with `added_at` (epoch seconds); re-adding refreshes the stamp.
    async fn ignorelist_add(&self, list: &str, player_ids: &[String], added_at: i64) -> Result<()>;

    /// Returns how many players were removed.
    async fn ignorelist_remove(&self, list: &str, player_ids: &[String]) -> Result<usize>;

    /// Players whose stamp lies in `[from, until]`, oldest first.
    async fn ignorelist_retrieve(&self, list: &str, from: i64, until: i64) -> Result<Vec<String>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Open the backend named by the configuration.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn CoordinationStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "db")]
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open_path(&config.path)?)),
        #[cfg(not(feature = "db"))]
        StoreBackend::Sqlite => Err(crate::error::Error::Other(
            "sqlite store requires the `db` feature".to_string(),
        )),
    }
}
