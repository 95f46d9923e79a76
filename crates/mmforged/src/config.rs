//! Daemon configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use mmforge_core::ForgeConfig;
use mmforge_core::config as core_config;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path the configuration was read from (may not exist)
    pub config_path: PathBuf,
    pub forge: ForgeConfig,
}

impl Config {
    /// Load from `path`, or from `$MMFORGE_CONFIG` / `$MMFORGE_DIR/config.toml`
    /// / `~/.mmforge/config.toml` when no path is given.
    ///
    /// A missing file yields the defaults:
    /// ```text
    /// ~/.mmforge/
    /// ├── config.toml           # Main configuration
    /// └── coordination.db       # SQLite coordination store
    /// ```
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(core_config::config_path);

        let forge = ForgeConfig::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?;

        Ok(Self { config_path, forge })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmforge_core::config::StoreBackend;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("absent.toml");

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.config_path, path);
        assert_eq!(config.forge.queues.profiles.name, "profileq");
        assert_eq!(config.forge.orchestrator.in_flight_key, "concurrentMMFs");
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("mmforged.toml");
        std::fs::write(
            &path,
            r#"
[store]
backend = "memory"

[orchestrator]
max_wait_ms = 2500
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.forge.store.backend, StoreBackend::Memory);
        assert_eq!(config.forge.orchestrator.max_wait_ms, 2500);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[queues.profiles]\npull_count = 0\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
