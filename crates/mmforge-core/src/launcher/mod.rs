//! Match function launchers.
//!
//! The orchestrator hands each dispatched profile to a [`WorkerLauncher`] and
//! forgets about it. Completion is only observed through the in-flight counter,
//! which the worker decrements itself.

mod command;
#[cfg(feature = "http")]
mod http;
mod in_process;

pub use command::CommandLauncher;
#[cfg(feature = "http")]
pub use http::{HttpLauncher, JobRequest};
pub use in_process::InProcessLauncher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::LauncherConfig;
use crate::error::{Error, Result};
use crate::ids::{ProposalId, ResultId};
use crate::types::Profile;

// ─────────────────────────────────────────────────────────────────────────────
// Worker Job
// ─────────────────────────────────────────────────────────────────────────────

pub const ENV_PROFILE_ID: &str = "MMF_PROFILE_ID";
pub const ENV_PROPOSAL_ID: &str = "MMF_PROPOSAL_ID";
pub const ENV_REQUEST_ID: &str = "MMF_REQUEST_ID";
pub const ENV_ERROR_ID: &str = "MMF_ERROR_ID";
pub const ENV_TIMESTAMP: &str = "MMF_TIMESTAMP";
pub const ENV_JOB_NAME: &str = "MMF_JOB_NAME";

/// One match function run for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerJob {
    /// Epoch seconds at dispatch
    pub timestamp: i64,
    pub result_id: ResultId,
    pub proposal_id: ProposalId,
    pub profile: Profile,
}

impl WorkerJob {
    pub fn new(result_id: ResultId, profile: Profile, timestamp: i64) -> Self {
        Self {
            timestamp,
            proposal_id: result_id.proposal_id(timestamp),
            result_id,
            profile,
        }
    }

    /// `<timestamp>.<matchObjectID>.<profileID>.mmf`
    pub fn job_name(&self) -> String {
        format!(
            "{}.{}.{}.mmf",
            self.timestamp, self.result_id.match_object_id, self.result_id.profile_id
        )
    }

    /// Key of the profile record.
    pub fn profile_key(&self) -> &str {
        &self.result_id.profile_id
    }

    /// Environment handed to out-of-process match functions.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_PROFILE_ID, self.result_id.profile_id.clone()),
            (ENV_PROPOSAL_ID, self.proposal_id.to_string()),
            (ENV_REQUEST_ID, self.result_id.match_object_id.clone()),
            (ENV_ERROR_ID, self.result_id.to_string()),
            (ENV_TIMESTAMP, self.timestamp.to_string()),
            (ENV_JOB_NAME, self.job_name()),
        ]
    }
}

/// Starts a match function for a job without waiting for it to finish.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, job: &WorkerJob) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile Router
// ─────────────────────────────────────────────────────────────────────────────

/// Look up a dotted path (`a.b.0.c`) in a JSON document.
pub fn json_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(doc, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Where a job should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Http { host: String, port: u16 },
    Command(Vec<String>),
}

/// Picks a launcher per job from the profile's properties.
///
/// A non-empty host name selects the HTTP launcher; otherwise the profile's
/// command (or the configured default) is run as a local process.
pub struct ProfileRouter {
    config: LauncherConfig,
    command_env: Vec<(String, String)>,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl ProfileRouter {
    pub fn new(config: LauncherConfig) -> Result<Self> {
        Ok(Self {
            #[cfg(feature = "http")]
            client: http::build_client(config.timeout())?,
            config,
            command_env: Vec::new(),
        })
    }

    /// Environment added to every local match function process.
    pub fn with_command_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.command_env.push((key.into(), value.into()));
        self
    }

    pub fn route(&self, job: &WorkerJob) -> Result<Route> {
        let properties = job
            .profile
            .properties_json()
            .map_err(|e| Error::malformed_profile(job.profile_key(), e.to_string()))?;
        let keys = &self.config.json_keys;

        let host = json_path(&properties, &keys.host_name)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if !host.is_empty() {
            let port = match json_path(&properties, &keys.port) {
                Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            };
            if port.is_none() {
                debug!(job = %job.job_name(), "no port in profile, using default");
            }
            return Ok(Route::Http {
                host: host.to_string(),
                port: port.unwrap_or(self.config.default_port),
            });
        }

        let command = match json_path(&properties, &keys.command) {
            Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
        if command.is_empty() {
            debug!(job = %job.job_name(), "no command in profile, using default");
            return Ok(Route::Command(self.config.default_command.clone()));
        }
        Ok(Route::Command(command))
    }
}

#[async_trait]
impl WorkerLauncher for ProfileRouter {
    async fn launch(&self, job: &WorkerJob) -> Result<()> {
        match self.route(job)? {
            #[cfg(feature = "http")]
            Route::Http { host, port } => {
                HttpLauncher::with_client(self.client.clone(), &host, port)
                    .launch(job)
                    .await
            }
            #[cfg(not(feature = "http"))]
            Route::Http { host, .. } => Err(Error::launch(
                job.job_name(),
                format!("profile routes to {} but the `http` feature is disabled", host),
            )),
            Route::Command(argv) => {
                let launcher = self
                    .command_env
                    .iter()
                    .fold(CommandLauncher::new(argv, self.config.timeout())?, |l, (k, v)| {
                        l.with_env(k, v)
                    });
                launcher.launch(job).await
            }
        }
    }
}
