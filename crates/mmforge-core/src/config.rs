//! Configuration for mmforge.
//!
//! Every field has a default so a missing or partial `config.toml` is valid.
//! Values consumed by the orchestration core: poll interval, maximum wait
//! before the timeout trigger, profile dispatch batch size and the dry-run flag.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluator::ResolverKind;

/// Overrides the config file location
pub const CONFIG_ENV: &str = "MMFORGE_CONFIG";

/// Overrides the mmforge home directory (default `~/.mmforge`)
pub const DIR_ENV: &str = "MMFORGE_DIR";

/// mmforge home directory: `$MMFORGE_DIR`, else `~/.mmforge`.
pub fn forge_dir() -> PathBuf {
    resolve_forge_dir(std::env::var_os(DIR_ENV), dirs::home_dir())
}

/// Config file: `$MMFORGE_CONFIG`, else `config.toml` in [`forge_dir`].
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| forge_dir().join("config.toml"))
}

fn resolve_forge_dir(dir_env: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    match dir_env.filter(|d| !d.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => home.unwrap_or_else(|| PathBuf::from(".")).join(".mmforge"),
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub queues: QueuesConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub ignorelists: IgnorelistsConfig,

    #[serde(default)]
    pub launcher: LauncherConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuesConfig {
    #[serde(default)]
    pub profiles: ProfileQueueConfig,

    #[serde(default)]
    pub proposals: ProposalQueueConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileQueueConfig {
    #[serde(default = "default_profile_queue")]
    pub name: String,

    /// Profiles popped per dispatch pass
    #[serde(default = "default_pull_count")]
    pub pull_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalQueueConfig {
    #[serde(default = "default_proposal_queue")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Key of the in-flight worker counter
    #[serde(default = "default_in_flight_key")]
    pub in_flight_key: String,

    /// Sleep after observing no activity
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest a window may stay open before evaluation is forced
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Sleep at the end of every other iteration
    #[serde(default = "default_main_sleep_ms")]
    pub main_sleep_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Classify proposals without touching the store
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub resolver: ResolverKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IgnorelistsConfig {
    #[serde(default)]
    pub proposed: IgnorelistConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnorelistConfig {
    #[serde(default = "default_proposed_ignorelist")]
    pub name: String,

    /// Only entries added within this many seconds count (0 = all)
    #[serde(default)]
    pub duration_secs: i64,

    /// Ignore entries newer than this many seconds (0 = none)
    #[serde(default)]
    pub offset_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// argv for match functions when the profile names no command
    #[serde(default = "default_command")]
    pub default_command: Vec<String>,

    #[serde(default)]
    pub json_keys: LauncherJsonKeys,

    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Upper bound on a single launch (process lifetime or HTTP request)
    #[serde(default = "default_launch_timeout_secs")]
    pub timeout_secs: u64,
}

/// Dotted paths into profile properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherJsonKeys {
    #[serde(default = "default_host_name_key")]
    pub host_name: String,

    #[serde(default = "default_port_key")]
    pub port: String,

    #[serde(default = "default_command_key")]
    pub command: String,
}

// Default value functions
fn default_store_path() -> PathBuf {
    forge_dir().join("coordination.db")
}

fn default_profile_queue() -> String {
    "profileq".to_string()
}

fn default_pull_count() -> usize {
    100
}

fn default_proposal_queue() -> String {
    "proposalq".to_string()
}

fn default_in_flight_key() -> String {
    "concurrentMMFs".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_wait_ms() -> u64 {
    10_000
}

fn default_main_sleep_ms() -> u64 {
    1000
}

fn default_proposed_ignorelist() -> String {
    "proposed".to_string()
}

fn default_command() -> Vec<String> {
    vec!["mmforge-mmf".to_string()]
}

fn default_port() -> u16 {
    80
}

fn default_launch_timeout_secs() -> u64 {
    30
}

fn default_host_name_key() -> String {
    "hostname".to_string()
}

fn default_port_key() -> String {
    "port".to_string()
}

fn default_command_key() -> String {
    "command".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

impl Default for ProfileQueueConfig {
    fn default() -> Self {
        Self {
            name: default_profile_queue(),
            pull_count: default_pull_count(),
        }
    }
}

impl Default for ProposalQueueConfig {
    fn default() -> Self {
        Self {
            name: default_proposal_queue(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            in_flight_key: default_in_flight_key(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
            main_sleep_ms: default_main_sleep_ms(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn main_sleep(&self) -> Duration {
        Duration::from_millis(self.main_sleep_ms)
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            resolver: ResolverKind::default(),
        }
    }
}

impl Default for IgnorelistConfig {
    fn default() -> Self {
        Self {
            name: default_proposed_ignorelist(),
            duration_secs: 0,
            offset_secs: 0,
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            default_command: default_command(),
            json_keys: LauncherJsonKeys::default(),
            default_port: default_port(),
            timeout_secs: default_launch_timeout_secs(),
        }
    }
}

impl LauncherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LauncherJsonKeys {
    fn default() -> Self {
        Self {
            host_name: default_host_name_key(),
            port: default_port_key(),
            command: default_command_key(),
        }
    }
}

impl ForgeConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(ConfigValidationError::Parse(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        let names = [
            ("queues.profiles.name", &self.queues.profiles.name),
            ("queues.proposals.name", &self.queues.proposals.name),
            ("orchestrator.in_flight_key", &self.orchestrator.in_flight_key),
            ("ignorelists.proposed.name", &self.ignorelists.proposed.name),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::InvalidValue {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        }

        if self.queues.profiles.pull_count == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "queues.profiles.pull_count".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.orchestrator.max_wait_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "orchestrator.max_wait_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.launcher.default_command.is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "launcher.default_command".into(),
                message: "must name a program".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
