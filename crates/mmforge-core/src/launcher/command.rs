//! Local process launcher.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{WorkerJob, WorkerLauncher};
use crate::error::{Error, Result};

/// Runs a match function as a child process.
///
/// Job identity is passed through `MMF_*` environment variables. The child is
/// killed if it outlives the timeout, but not when the launcher's runtime shuts
/// down: a worker already started finishes its contract on its own.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    argv: Vec<String>,
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl CommandLauncher {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Result<Self> {
        if argv.first().is_none_or(|program| program.is_empty()) {
            return Err(Error::Other("match function command is empty".into()));
        }
        Ok(Self {
            argv,
            timeout,
            env: Vec::new(),
        })
    }

    /// Extra environment passed to every child, ahead of the job variables.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

#[async_trait]
impl WorkerLauncher for CommandLauncher {
    async fn launch(&self, job: &WorkerJob) -> Result<()> {
        let name = job.job_name();
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| Error::launch(&name, "empty command"))?;

        let mut child = Command::new(program)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .envs(job.env())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch(&name, format!("failed to spawn {}: {}", program, e)))?;

        info!(job = %name, program = %program, pid = ?child.id(), "match function started");

        let timeout = self.timeout;
        tokio::spawn(async move {
            let waited = tokio::time::timeout(timeout, child.wait()).await;
            match waited {
                Ok(Ok(status)) if status.success() => {
                    debug!(job = %name, "match function exited");
                }
                Ok(Ok(status)) => {
                    warn!(job = %name, %status, "match function exited with failure");
                }
                Ok(Err(e)) => {
                    warn!(job = %name, error = %e, "failed to wait for match function");
                }
                Err(_) => {
                    warn!(job = %name, timeout_secs = timeout.as_secs(), "match function timed out, killing");
                    if let Err(e) = child.kill().await {
                        warn!(job = %name, error = %e, "failed to kill match function");
                    }
                }
            }
        });

        Ok(())
    }
}
