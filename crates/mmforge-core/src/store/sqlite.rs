//! SQLite-backed coordination store.
//!
//! Several processes (orchestrator daemon, CLI, match functions) can share one
//! database file. Multi-statement operations run inside a single transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::CoordinationStore;
use super::migrations;
use crate::error::{Error, Result};
use crate::types::Record;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordination store in a SQLite database.
///
/// Thread-safe via internal Mutex. All operations acquire the lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at a specific path
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    fn add_to_counter(&self, key: &str, delta: i64) -> Result<i64> {
        let conn = self.lock()?;
        let value: i64 = conn.query_row(
            "INSERT INTO coord_counters (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = value + ?2
             RETURNING value",
            params![key, delta],
            |row| row.get(0),
        )?;
        debug!(key, value, "counter updated");
        Ok(value)
    }

    fn sample_members(conn: &Connection, key: &str, count: usize) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT member FROM coord_set_members
             WHERE set_key = ?1
             ORDER BY RANDOM()
             LIMIT ?2",
        )?;
        let members = stmt
            .query_map(params![key, count as i64], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(members)
    }
}

#[async_trait]
impl CoordinationStore for SqliteStore {
    async fn counter_increment(&self, key: &str) -> Result<i64> {
        self.add_to_counter(key, 1)
    }

    async fn counter_decrement(&self, key: &str) -> Result<i64> {
        self.add_to_counter(key, -1)
    }

    async fn counter_get(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT value FROM coord_counters WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn counter_delete(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM coord_counters WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut added = 0;
        for member in members {
            added += tx.execute(
                "INSERT OR IGNORE INTO coord_set_members (set_key, member) VALUES (?1, ?2)",
                params![key, member],
            )?;
        }
        tx.commit()?;
        Ok(added)
    }

    async fn set_pop_random(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let members = Self::sample_members(&tx, key, count)?;
        for member in &members {
            tx.execute(
                "DELETE FROM coord_set_members WHERE set_key = ?1 AND member = ?2",
                params![key, member],
            )?;
        }
        tx.commit()?;
        debug!(key, popped = members.len(), "set members popped");
        Ok(members)
    }

    async fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let conn = self.lock()?;
        Self::sample_members(&conn, key, count)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT member FROM coord_set_members WHERE set_key = ?1 ORDER BY member",
        )?;
        let members = stmt
            .query_map(params![key], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(members)
    }

    async fn set_cardinality(&self, key: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM coord_set_members WHERE set_key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn record_put(&self, key: &str, fields: &Record) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (field, value) in fields {
            tx.execute(
                "INSERT INTO coord_record_fields (record_key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(record_key, field) DO UPDATE SET value = excluded.value",
                params![key, field, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn record_get(&self, key: &str) -> Result<Option<Record>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT field, value FROM coord_record_fields WHERE record_key = ?1")?;
        let record = stmt
            .query_map(params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Record, _>>()?;
        Ok(if record.is_empty() { None } else { Some(record) })
    }

    async fn record_field_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO coord_record_fields (record_key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(record_key, field) DO UPDATE SET value = excluded.value",
            params![key, field, value],
        )?;
        Ok(())
    }

    async fn record_update(&self, key: &str, fields: &Record) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM coord_record_fields WHERE record_key = ?1)",
            params![key],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(false);
        }
        for (field, value) in fields {
            tx.execute(
                "INSERT INTO coord_record_fields (record_key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(record_key, field) DO UPDATE SET value = excluded.value",
                params![key, field, value],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }

    async fn record_rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM coord_record_fields WHERE record_key = ?1)",
            params![old_key],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::not_found(old_key));
        }
        if old_key != new_key {
            tx.execute(
                "DELETE FROM coord_record_fields WHERE record_key = ?1",
                params![new_key],
            )?;
            tx.execute(
                "UPDATE coord_record_fields SET record_key = ?2 WHERE record_key = ?1",
                params![old_key, new_key],
            )?;
        }
        tx.commit()?;
        debug!(old_key, new_key, "record renamed");
        Ok(())
    }

    async fn record_delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM coord_record_fields WHERE record_key = ?1",
            params![key],
        )?;
        Ok(removed > 0)
    }

    async fn ignorelist_add(&self, list: &str, player_ids: &[String], added_at: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for id in player_ids {
            tx.execute(
                "INSERT INTO coord_ignorelist_entries (list, player_id, added_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(list, player_id) DO UPDATE SET added_at = excluded.added_at",
                params![list, id, added_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn ignorelist_remove(&self, list: &str, player_ids: &[String]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for id in player_ids {
            removed += tx.execute(
                "DELETE FROM coord_ignorelist_entries WHERE list = ?1 AND player_id = ?2",
                params![list, id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    async fn ignorelist_retrieve(&self, list: &str, from: i64, until: i64) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT player_id FROM coord_ignorelist_entries
             WHERE list = ?1 AND added_at BETWEEN ?2 AND ?3
             ORDER BY added_at, player_id",
        )?;
        let ids = stmt
            .query_map(params![list, from, until], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }
}
