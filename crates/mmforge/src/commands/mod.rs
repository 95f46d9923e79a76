//! Command implementations for the mmforge CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod evaluate;
pub mod ignorelist;
pub mod pool;
pub mod profile;
pub mod result;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::debug;

use mmforge_core::config::StoreBackend;
use mmforge_core::{CoordinationStore, ForgeConfig, store};

/// Open the configured store and make sure it answers.
pub(crate) async fn open_store(config: &ForgeConfig) -> Result<Arc<dyn CoordinationStore>> {
    if config.store.backend == StoreBackend::Memory {
        eprintln!(
            "{} store.backend is \"memory\"; nothing is shared with mmforged",
            "⚠".yellow()
        );
    }
    let store = store::open(&config.store).context("failed to open coordination store")?;
    store.ping().await.context("coordination store is unreachable")?;
    debug!(backend = ?config.store.backend, path = %config.store.path.display(), "store opened");
    Ok(store)
}
