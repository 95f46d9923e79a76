//! REST launcher: POSTs the job to a long-running match function service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{WorkerJob, WorkerLauncher};
use crate::error::{Error, Result};

/// Path every match function service exposes.
pub const FUNCTION_PATH: &str = "/api/function";

/// Body of the launch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRequest {
    pub job_name: String,
    pub prof_id: String,
    pub mo_id: String,
    pub prop_id: String,
    pub results_id: String,
    pub timestamp: String,
}

impl From<&WorkerJob> for JobRequest {
    fn from(job: &WorkerJob) -> Self {
        Self {
            job_name: job.job_name(),
            prof_id: job.result_id.profile_id.clone(),
            mo_id: job.result_id.match_object_id.clone(),
            prop_id: job.proposal_id.to_string(),
            results_id: job.result_id.to_string(),
            timestamp: job.timestamp.to_string(),
        }
    }
}

pub(super) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Debug, Clone)]
pub struct HttpLauncher {
    client: reqwest::Client,
    url: String,
}

impl HttpLauncher {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(build_client(timeout)?, host, port))
    }

    pub fn with_client(client: reqwest::Client, host: &str, port: u16) -> Self {
        Self {
            client,
            url: format!("http://{}:{}{}", host, port, FUNCTION_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WorkerLauncher for HttpLauncher {
    async fn launch(&self, job: &WorkerJob) -> Result<()> {
        let name = job.job_name();
        let response = self
            .client
            .post(&self.url)
            .json(&JobRequest::from(job))
            .send()
            .await
            .map_err(|e| Error::launch(&name, format!("POST {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(job = %name, url = %self.url, %status, "match function service refused job");
            return Err(Error::launch(&name, format!("POST {} returned {}", self.url, status)));
        }

        info!(job = %name, url = %self.url, "match function requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ResultId;
    use crate::types::Profile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn job() -> WorkerJob {
        WorkerJob::new(
            ResultId::new("mo1", "ranked").unwrap(),
            Profile {
                id: "ranked".into(),
                ..Default::default()
            },
            42,
        )
    }

    /// Accept one request, answer with `status_line`, return the request body.
    async fn serve_once(listener: TcpListener, status_line: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let body_start = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..body_start]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while buf.len() < body_start + length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8(buf[body_start..body_start + length].to_vec()).unwrap()
    }

    #[test]
    fn test_job_request_shape() {
        let body = serde_json::to_value(JobRequest::from(&job())).unwrap();
        assert_eq!(body["JobName"], "42.mo1.ranked.mmf");
        assert_eq!(body["ProfId"], "ranked");
        assert_eq!(body["MoId"], "mo1");
        assert_eq!(body["PropId"], "proposal.42.mo1.ranked");
        assert_eq!(body["ResultsId"], "mo1.ranked");
        assert_eq!(body["Timestamp"], "42");
    }

    #[tokio::test]
    async fn test_launch_posts_job() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, "204 No Content"));

        let launcher = HttpLauncher::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        launcher.launch(&job()).await.unwrap();

        let body: JobRequest = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body, JobRequest::from(&job()));
    }

    #[tokio::test]
    async fn test_non_success_status_is_launch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, "503 Service Unavailable"));

        let launcher = HttpLauncher::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = launcher.launch(&job()).await.unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert!(err.to_string().contains("503"));
        server.await.unwrap();
    }
}
