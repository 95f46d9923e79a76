//! Coordination store database migrations
//!
//! SQL migrations are embedded as strings and executed when the store is opened.

use rusqlite::Connection;

use crate::error::Result;

/// Coordination tables SQL (001)
pub const COORDINATION_TABLES_SQL: &str = include_str!("001_coordination_tables.sql");

/// Run all coordination store migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(COORDINATION_TABLES_SQL)?;
    Ok(())
}
