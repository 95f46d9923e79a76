//! Worker-side contract for match functions.
//!
//! Every match function run, however it is launched, must:
//! - write a non-empty proposal under its pending proposal key, claim its
//!   players on the proposed ignorelist, and queue the proposal for evaluation;
//! - otherwise write the error straight to the result key;
//! - decrement the in-flight counter when done, success or not.
//!
//! [`run_match_function`] does all of that around a [`MatchFunction`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ForgeConfig;
use crate::error::{Error, Result};
use crate::ids::{ProposalId, ResultId};
use crate::ignorelist::{self, IgnorelistWindow};
use crate::launcher::{ENV_ERROR_ID, ENV_PROPOSAL_ID, ENV_TIMESTAMP, WorkerJob};
use crate::records;
use crate::store::CoordinationStore;
use crate::types::{MatchObject, Profile, Roster};

/// Error written to the result when a match function finds no players.
pub const INSUFFICIENT_PLAYERS: &str = "insufficient players";

/// Store keys a worker writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerKeys {
    pub in_flight_key: String,
    pub proposal_queue: String,
    pub ignorelist: String,
    pub window: IgnorelistWindow,
}

impl WorkerKeys {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            in_flight_key: config.orchestrator.in_flight_key.clone(),
            proposal_queue: config.queues.proposals.name.clone(),
            ignorelist: config.ignorelists.proposed.name.clone(),
            window: IgnorelistWindow::from(&config.ignorelists.proposed),
        }
    }
}

/// Input to a match function.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub job: WorkerJob,
    pub profile: Profile,
    /// Players already claimed by pending proposals
    pub ignored: Vec<String>,
}

/// What a match function proposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchProposal {
    #[serde(default)]
    pub properties: String,
    #[serde(default)]
    pub rosters: Vec<Roster>,
}

/// User matchmaking logic.
#[async_trait]
pub trait MatchFunction: Send + Sync + 'static {
    async fn make_match(&self, request: MatchRequest) -> Result<MatchProposal>;
}

/// How a match function run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Proposal queued for evaluation
    Proposed { players: usize },
    /// Nothing to propose; error written to the result key
    Insufficient,
    /// Match function failed; error written to the result key
    Failed(String),
}

/// Run `mmf` for `job` under the worker contract.
///
/// The in-flight counter is decremented on every path, including store
/// failures and a panicking match function.
pub async fn run_match_function(
    store: Arc<dyn CoordinationStore>,
    keys: &WorkerKeys,
    job: WorkerJob,
    mmf: Arc<dyn MatchFunction>,
) -> Result<WorkerOutcome> {
    let name = job.job_name();
    let outcome = execute(store.as_ref(), keys, job, mmf).await;

    if let Err(e) = store.counter_decrement(&keys.in_flight_key).await {
        error!(job = %name, error = %e, "failed to decrement in-flight counter");
    }

    match &outcome {
        Ok(WorkerOutcome::Proposed { players }) => info!(job = %name, players, "proposal queued"),
        Ok(WorkerOutcome::Insufficient) => info!(job = %name, "no match proposed"),
        Ok(WorkerOutcome::Failed(reason)) => warn!(job = %name, reason = %reason, "match function failed"),
        Err(e) => error!(job = %name, error = %e, "worker contract not completed"),
    }
    outcome
}

async fn execute(
    store: &dyn CoordinationStore,
    keys: &WorkerKeys,
    job: WorkerJob,
    mmf: Arc<dyn MatchFunction>,
) -> Result<WorkerOutcome> {
    let ignored = ignorelist::retrieve(store, &keys.ignorelist, keys.window).await?;
    debug!(job = %job.job_name(), ignored = ignored.len(), "ignorelist loaded");

    let proposal_key = job.proposal_id.to_string();
    let result_key = job.result_id.to_string();
    let pools = job.profile.pools.clone();
    let request = MatchRequest {
        profile: job.profile.clone(),
        job,
        ignored,
    };

    // Own task so a panic surfaces as a JoinError instead of unwinding here.
    let proposal = match tokio::spawn(async move { mmf.make_match(request).await }).await {
        Ok(Ok(proposal)) => proposal,
        Ok(Err(e)) => {
            let reason = e.to_string();
            write_error(store, &result_key, &reason).await?;
            return Ok(WorkerOutcome::Failed(reason));
        }
        Err(join) => {
            let reason = if join.is_panic() {
                "match function panicked".to_string()
            } else {
                format!("match function task failed: {}", join)
            };
            write_error(store, &result_key, &reason).await?;
            return Ok(WorkerOutcome::Failed(reason));
        }
    };

    let mo = MatchObject {
        id: proposal_key.clone(),
        properties: proposal.properties,
        error: String::new(),
        rosters: proposal.rosters,
        pools,
    };
    if !mo.has_players() {
        write_error(store, &result_key, INSUFFICIENT_PLAYERS).await?;
        return Ok(WorkerOutcome::Insufficient);
    }

    let players = mo.player_ids();
    records::put_match_object(store, &proposal_key, &mo).await?;
    ignorelist::add(store, &keys.ignorelist, &players).await?;
    store
        .set_add(&keys.proposal_queue, std::slice::from_ref(&proposal_key))
        .await?;

    Ok(WorkerOutcome::Proposed {
        players: players.len(),
    })
}

async fn write_error(store: &dyn CoordinationStore, result_key: &str, reason: &str) -> Result<()> {
    let mo = MatchObject {
        id: result_key.to_string(),
        error: reason.to_string(),
        ..Default::default()
    };
    records::put_match_object(store, result_key, &mo).await
}

/// Rebuild a job from `MMF_*` variables, as handed to out-of-process workers.
pub async fn job_from_vars<F>(store: &dyn CoordinationStore, var: F) -> Result<WorkerJob>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| var(key).ok_or_else(|| Error::Other(format!("{} is not set", key)));

    let result_id: ResultId = required(ENV_ERROR_ID)?.parse()?;
    let timestamp = required(ENV_TIMESTAMP)?
        .parse::<i64>()
        .map_err(|e| Error::Other(format!("{} is not a timestamp: {}", ENV_TIMESTAMP, e)))?;
    let job = WorkerJob::new(
        result_id.clone(),
        records::fetch_profile(store, &result_id.profile_id).await?,
        timestamp,
    );

    if let Some(raw) = var(ENV_PROPOSAL_ID) {
        let given: ProposalId = raw.parse()?;
        if given != job.proposal_id {
            return Err(Error::invalid_id(
                "proposal",
                raw,
                format!("does not match {}", job.proposal_id),
            ));
        }
    }
    Ok(job)
}

/// [`job_from_vars`] over the process environment.
pub async fn job_from_env(store: &dyn CoordinationStore) -> Result<WorkerJob> {
    job_from_vars(store, |key| std::env::var(key).ok()).await
}

/// Current epoch seconds, the timestamp used for dispatched jobs.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::store::MemoryStore;

    struct Fixed(MatchProposal);

    #[async_trait]
    impl MatchFunction for Fixed {
        async fn make_match(&self, _request: MatchRequest) -> Result<MatchProposal> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl MatchFunction for Failing {
        async fn make_match(&self, _request: MatchRequest) -> Result<MatchProposal> {
            Err(Error::MatchFunction("pool query timed out".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl MatchFunction for Panicking {
        async fn make_match(&self, _request: MatchRequest) -> Result<MatchProposal> {
            panic!("boom");
        }
    }

    /// Proposes every pool player not on the ignorelist.
    struct SkipIgnored(Vec<&'static str>);

    #[async_trait]
    impl MatchFunction for SkipIgnored {
        async fn make_match(&self, request: MatchRequest) -> Result<MatchProposal> {
            let free: Vec<&str> = self
                .0
                .iter()
                .copied()
                .filter(|p| !request.ignored.iter().any(|i| i == p))
                .collect();
            Ok(MatchProposal {
                properties: "{}".into(),
                rosters: vec![Roster::new("everyone", &free)],
            })
        }
    }

    fn keys() -> WorkerKeys {
        WorkerKeys::from_config(&ForgeConfig::default())
    }

    fn job() -> WorkerJob {
        WorkerJob::new(
            ResultId::new("mo1", "ranked").unwrap(),
            Profile {
                id: "ranked".into(),
                properties: "{}".into(),
                ..Default::default()
            },
            1_700_000_000,
        )
    }

    async fn dispatched(store: &dyn CoordinationStore) {
        store.counter_increment("concurrentMMFs").await.unwrap();
    }

    #[tokio::test]
    async fn test_proposal_is_queued_and_players_claimed() {
        let store = Arc::new(MemoryStore::new());
        dispatched(store.as_ref()).await;

        let mmf = Arc::new(Fixed(MatchProposal {
            properties: r#"{"map": "dust"}"#.into(),
            rosters: vec![Roster::new("red", &["a", "b"]), Roster::new("blue", &["c"])],
        }));
        let outcome = run_match_function(store.clone(), &keys(), job(), mmf).await.unwrap();
        assert_eq!(outcome, WorkerOutcome::Proposed { players: 3 });

        let proposal = records::fetch_match_object(store.as_ref(), "proposal.1700000000.mo1.ranked")
            .await
            .unwrap();
        assert_eq!(proposal.player_ids(), vec!["a", "b", "c"]);
        assert_eq!(proposal.properties, r#"{"map": "dust"}"#);
        assert_eq!(
            store.set_members("proposalq").await.unwrap(),
            vec!["proposal.1700000000.mo1.ranked"]
        );
        let mut claimed = store.ignorelist_retrieve("proposed", 0, i64::MAX).await.unwrap();
        claimed.sort();
        assert_eq!(claimed, vec!["a", "b", "c"]);
        assert_eq!(store.counter_get("concurrentMMFs").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_empty_proposal_writes_insufficient_players() {
        let store = Arc::new(MemoryStore::new());
        dispatched(store.as_ref()).await;

        let mmf = Arc::new(Fixed(MatchProposal::default()));
        let outcome = run_match_function(store.clone(), &keys(), job(), mmf).await.unwrap();
        assert_eq!(outcome, WorkerOutcome::Insufficient);

        let result = records::fetch_match_object(store.as_ref(), "mo1.ranked").await.unwrap();
        assert_eq!(result.error, INSUFFICIENT_PLAYERS);
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 0);
        assert_eq!(store.counter_get("concurrentMMFs").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_failure_and_panic_still_decrement() {
        let store = Arc::new(MemoryStore::new());
        dispatched(store.as_ref()).await;
        dispatched(store.as_ref()).await;

        let outcome = run_match_function(store.clone(), &keys(), job(), Arc::new(Failing))
            .await
            .unwrap();
        assert!(matches!(outcome, WorkerOutcome::Failed(ref r) if r.contains("pool query timed out")));

        let outcome = run_match_function(store.clone(), &keys(), job(), Arc::new(Panicking))
            .await
            .unwrap();
        assert_eq!(outcome, WorkerOutcome::Failed("match function panicked".into()));

        let result = records::fetch_match_object(store.as_ref(), "mo1.ranked").await.unwrap();
        assert!(result.is_error());
        assert_eq!(store.counter_get("concurrentMMFs").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_match_function_sees_ignorelist() {
        let store = Arc::new(MemoryStore::new());
        store
            .ignorelist_add("proposed", &["b".to_string()], now_timestamp())
            .await
            .unwrap();

        let mmf = Arc::new(SkipIgnored(vec!["a", "b", "c"]));
        run_match_function(store.clone(), &keys(), job(), mmf).await.unwrap();

        let proposal = records::fetch_match_object(store.as_ref(), "proposal.1700000000.mo1.ranked")
            .await
            .unwrap();
        assert_eq!(proposal.player_ids(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_job_from_vars() {
        let store = MemoryStore::new();
        records::put_profile(&store, "ranked", &job().profile).await.unwrap();

        let mut vars = HashMap::new();
        vars.insert(ENV_ERROR_ID, "mo1.ranked".to_string());
        vars.insert(ENV_TIMESTAMP, "1700000000".to_string());
        vars.insert(ENV_PROPOSAL_ID, "proposal.1700000000.mo1.ranked".to_string());

        let rebuilt = job_from_vars(&store, |k| vars.get(k).cloned()).await.unwrap();
        assert_eq!(rebuilt, job());

        vars.insert(ENV_PROPOSAL_ID, "proposal.1.mo1.ranked".to_string());
        assert!(job_from_vars(&store, |k| vars.get(k).cloned()).await.is_err());

        vars.remove(ENV_TIMESTAMP);
        assert!(job_from_vars(&store, |k| vars.get(k).cloned()).await.is_err());
    }
}
