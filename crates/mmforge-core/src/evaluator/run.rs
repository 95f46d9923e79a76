//! One evaluation run over the pending-proposals set.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::overlap::OverlapIndex;
use super::resolver::{ConflictResolver, FirstWins, Resolution, check_disjoint};
use crate::config::ForgeConfig;
use crate::error::Result;
use crate::ids::ProposalId;
use crate::records;
use crate::store::CoordinationStore;
use crate::types::{FIELD_ERROR, FIELD_ROSTERS, MatchObject, Record};

/// Error written to a rejected proposal's result record.
pub const REJECTION_MESSAGE: &str = "Proposed match rejected due to player conflict";

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorSettings {
    /// Pending-proposals set
    pub proposal_queue: String,
    /// Ignorelist that rejected players are released from
    pub ignorelist: String,
    pub dry_run: bool,
}

impl EvaluatorSettings {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            proposal_queue: config.queues.proposals.name.clone(),
            ignorelist: config.ignorelists.proposed.name.clone(),
            dry_run: config.evaluator.dry_run,
        }
    }
}

/// What a run did (or, in dry-run mode, would have done).
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub dry_run: bool,
    pub resolver: String,
    /// The resolver broke the disjointness contract and first-wins was used instead
    pub fallback: bool,
    /// Proposal ids in scan order
    pub batch: Vec<String>,
    /// Popped ids that could not be parsed or fetched
    pub dropped: Vec<String>,
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
    pub approved_players: Vec<String>,
    /// Players removed from the ignorelist
    pub released_players: Vec<String>,
    /// Proposals already moved to their result key by someone else
    pub stale: Vec<String>,
    /// Proposals whose result could not be written
    pub failed: Vec<String>,
    /// Set when the rejected players could not be released; results are already written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_error: Option<String>,
}

impl EvaluationReport {
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty() && self.dropped.is_empty()
    }
}

/// Drains the pending-proposals set, resolves player conflicts and writes results.
pub struct Evaluator {
    store: Arc<dyn CoordinationStore>,
    settings: EvaluatorSettings,
    resolver: Arc<dyn ConflictResolver>,
}

impl Evaluator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        settings: EvaluatorSettings,
        resolver: Arc<dyn ConflictResolver>,
    ) -> Self {
        Self {
            store,
            settings,
            resolver,
        }
    }

    pub fn from_config(store: Arc<dyn CoordinationStore>, config: &ForgeConfig) -> Self {
        Self::new(
            store,
            EvaluatorSettings::from_config(config),
            config.evaluator.resolver.build(),
        )
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.settings.dry_run = dry_run;
        self
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Run one evaluation.
    ///
    /// The batch is fixed by popping every member of the pending-proposals set
    /// present at the start; proposals added later wait for the next run. A
    /// crash part-way through leaves the unprocessed remainder popped and
    /// unevaluated.
    pub async fn run(&self) -> Result<EvaluationReport> {
        let mut report = EvaluationReport {
            dry_run: self.settings.dry_run,
            resolver: self.resolver.name().to_string(),
            ..Default::default()
        };
        let queue = self.settings.proposal_queue.as_str();

        let count = self.store.set_cardinality(queue).await?;
        if count == 0 {
            info!(queue, "nothing to evaluate");
            return Ok(report);
        }

        let ids = if self.settings.dry_run {
            self.store.set_random_members(queue, count).await?
        } else {
            self.store.set_pop_random(queue, count).await?
        };
        info!(queue, count = ids.len(), dry_run = self.settings.dry_run, "evaluation batch fixed");

        let mut batch = Vec::with_capacity(ids.len());
        for raw in ids {
            let id = match raw.parse::<ProposalId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(proposal = %raw, error = %e, "dropping unparseable proposal id");
                    report.dropped.push(raw);
                    continue;
                }
            };
            match records::fetch_match_object(self.store.as_ref(), &raw).await {
                Ok(mo) => batch.push((id, mo)),
                Err(e) => {
                    warn!(proposal = %raw, error = %e, "dropping proposal that could not be fetched");
                    report.dropped.push(raw);
                }
            }
        }

        self.evaluate_batch(batch, report).await
    }

    /// Resolve and apply a fixed batch, in the given scan order.
    pub(crate) async fn evaluate_batch(
        &self,
        batch: Vec<(ProposalId, MatchObject)>,
        mut report: EvaluationReport,
    ) -> Result<EvaluationReport> {
        let dry_run = self.settings.dry_run;
        report.batch = batch.iter().map(|(id, _)| id.to_string()).collect();

        let players: Vec<Vec<String>> = batch.iter().map(|(_, mo)| mo.player_ids()).collect();
        let index = OverlapIndex::build(&players);
        let (resolution, fallback) = self.resolve(&index);
        report.fallback = fallback;
        debug!(
            safe = index.safe().len(),
            conflicted = index.conflicted().len(),
            approved = resolution.approved.len(),
            "conflicts resolved"
        );

        let mut approved: Vec<usize> = index
            .safe()
            .iter()
            .chain(resolution.approved.iter())
            .copied()
            .collect();
        approved.sort_unstable();

        let mut approved_players = BTreeSet::new();
        for &i in &approved {
            let (id, mo) = &batch[i];
            approved_players.extend(mo.player_ids());
            report.approved.push(id.to_string());
            if !dry_run {
                let outcome = self.approve(id).await;
                record_outcome(&mut report, id, outcome);
            }
        }

        let mut potentially_rejected = BTreeSet::new();
        for &i in &resolution.rejected {
            let (id, mo) = &batch[i];
            potentially_rejected.extend(mo.player_ids());
            report.rejected.push(id.to_string());
            if !dry_run {
                let outcome = self.reject(id).await;
                record_outcome(&mut report, id, outcome);
            }
        }

        let released: Vec<String> = potentially_rejected
            .difference(&approved_players)
            .cloned()
            .collect();
        if released.is_empty() {
            info!("no players to release from the ignorelist");
        } else if !dry_run {
            match self
                .store
                .ignorelist_remove(&self.settings.ignorelist, &released)
                .await
            {
                Ok(removed) => {
                    debug!(ignorelist = %self.settings.ignorelist, removed, "rejected players released");
                }
                Err(e) => {
                    warn!(
                        ignorelist = %self.settings.ignorelist,
                        players = released.len(),
                        error = %e,
                        "failed to release rejected players; they stay ignored until they age out"
                    );
                    report.release_error = Some(e.to_string());
                }
            }
        }

        report.approved_players = approved_players.into_iter().collect();
        report.released_players = released;

        info!(
            approved = report.approved.len(),
            rejected = report.rejected.len(),
            released = report.released_players.len(),
            dropped = report.dropped.len(),
            dry_run,
            "evaluation complete"
        );
        Ok(report)
    }

    fn resolve(&self, index: &OverlapIndex) -> (Resolution, bool) {
        let resolution = self.resolver.resolve(index).normalize(index);
        match check_disjoint(self.resolver.name(), index, &resolution.approved) {
            Ok(()) => (resolution, false),
            Err(e) => {
                error!(error = %e, "falling back to first_wins");
                (FirstWins.resolve(index).normalize(index), true)
            }
        }
    }

    /// Move an approved proposal to its result key unchanged.
    ///
    /// Returns `Ok(false)` if the proposal was already moved.
    pub async fn approve(&self, id: &ProposalId) -> Result<bool> {
        self.promote(id).await
    }

    /// Mark a proposal rejected, clear its rosters, then move it to its result key.
    ///
    /// Returns `Ok(false)` if the proposal was already moved.
    pub async fn reject(&self, id: &ProposalId) -> Result<bool> {
        let key = id.to_string();
        let mut fields = Record::new();
        fields.insert(FIELD_ERROR.to_string(), REJECTION_MESSAGE.to_string());
        fields.insert(FIELD_ROSTERS.to_string(), String::new());
        if !self.store.record_update(&key, &fields).await? {
            warn!(proposal = %key, "proposal already moved; not rejecting");
            return Ok(false);
        }
        self.promote(id).await
    }

    async fn promote(&self, id: &ProposalId) -> Result<bool> {
        let from = id.to_string();
        let to = id.result_id().to_string();
        match self.store.record_rename(&from, &to).await {
            Ok(()) => {
                debug!(proposal = %from, result = %to, "proposal moved to result");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                warn!(proposal = %from, "proposal already moved; skipping rename");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn record_outcome(report: &mut EvaluationReport, id: &ProposalId, outcome: Result<bool>) {
    match outcome {
        Ok(true) => {}
        Ok(false) => report.stale.push(id.to_string()),
        Err(e) => {
            error!(proposal = %id, error = %e, "failed to write result");
            report.failed.push(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::Error;
    use crate::evaluator::resolver::GreedyDisjoint;
    use crate::store::MemoryStore;
    use crate::types::Roster;

    /// Counts every mutating call before delegating.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        mutations: AtomicUsize,
        fail_release: AtomicBool,
    }

    impl CountingStore {
        fn bump(&self) {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CoordinationStore for CountingStore {
        async fn counter_increment(&self, key: &str) -> Result<i64> {
            self.bump();
            self.inner.counter_increment(key).await
        }
        async fn counter_decrement(&self, key: &str) -> Result<i64> {
            self.bump();
            self.inner.counter_decrement(key).await
        }
        async fn counter_get(&self, key: &str) -> Result<Option<i64>> {
            self.inner.counter_get(key).await
        }
        async fn counter_delete(&self, key: &str) -> Result<()> {
            self.bump();
            self.inner.counter_delete(key).await
        }
        async fn set_add(&self, key: &str, members: &[String]) -> Result<usize> {
            self.bump();
            self.inner.set_add(key, members).await
        }
        async fn set_pop_random(&self, key: &str, count: usize) -> Result<Vec<String>> {
            self.bump();
            self.inner.set_pop_random(key, count).await
        }
        async fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>> {
            self.inner.set_random_members(key, count).await
        }
        async fn set_members(&self, key: &str) -> Result<Vec<String>> {
            self.inner.set_members(key).await
        }
        async fn set_cardinality(&self, key: &str) -> Result<usize> {
            self.inner.set_cardinality(key).await
        }
        async fn record_put(&self, key: &str, fields: &Record) -> Result<()> {
            self.bump();
            self.inner.record_put(key, fields).await
        }
        async fn record_get(&self, key: &str) -> Result<Option<Record>> {
            self.inner.record_get(key).await
        }
        async fn record_field_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
            self.bump();
            self.inner.record_field_set(key, field, value).await
        }
        async fn record_update(&self, key: &str, fields: &Record) -> Result<bool> {
            self.bump();
            self.inner.record_update(key, fields).await
        }
        async fn record_rename(&self, old_key: &str, new_key: &str) -> Result<()> {
            self.bump();
            self.inner.record_rename(old_key, new_key).await
        }
        async fn record_delete(&self, key: &str) -> Result<bool> {
            self.bump();
            self.inner.record_delete(key).await
        }
        async fn ignorelist_add(&self, list: &str, ids: &[String], added_at: i64) -> Result<()> {
            self.bump();
            self.inner.ignorelist_add(list, ids, added_at).await
        }
        async fn ignorelist_remove(&self, list: &str, ids: &[String]) -> Result<usize> {
            self.bump();
            if self.fail_release.load(Ordering::SeqCst) {
                return Err(Error::Other("ignorelist unavailable".into()));
            }
            self.inner.ignorelist_remove(list, ids).await
        }
        async fn ignorelist_retrieve(&self, list: &str, from: i64, until: i64) -> Result<Vec<String>> {
            self.inner.ignorelist_retrieve(list, from, until).await
        }
        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
    }

    fn settings(dry_run: bool) -> EvaluatorSettings {
        EvaluatorSettings {
            proposal_queue: "proposalq".into(),
            ignorelist: "proposed".into(),
            dry_run,
        }
    }

    fn proposal(mo: &str, players: &[&str]) -> (ProposalId, MatchObject) {
        let id = ProposalId::new(1_700_000_000, mo, "prof").unwrap();
        let mo = MatchObject {
            id: id.to_string(),
            properties: "{}".into(),
            rosters: vec![Roster::new("team", players)],
            ..Default::default()
        };
        (id, mo)
    }

    /// Write proposals the way a match function does.
    async fn seed(store: &dyn CoordinationStore, proposals: &[(ProposalId, MatchObject)]) {
        for (id, mo) in proposals {
            records::put_match_object(store, &id.to_string(), mo).await.unwrap();
            store
                .ignorelist_add("proposed", &mo.player_ids(), 100)
                .await
                .unwrap();
            store.set_add("proposalq", &[id.to_string()]).await.unwrap();
        }
    }

    async fn ignored(store: &dyn CoordinationStore) -> Vec<String> {
        let mut ids = store.ignorelist_retrieve("proposed", 0, i64::MAX).await.unwrap();
        ids.sort();
        ids
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_disjoint_proposals_all_approved() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![proposal("mo1", &["a", "b"]), proposal("mo2", &["c", "d"])];
        seed(store.as_ref(), &batch).await;

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator.run().await.unwrap();

        assert_eq!(report.approved.len(), 2);
        assert!(report.rejected.is_empty());
        assert!(report.released_players.is_empty());
        assert_eq!(ignored(store.as_ref()).await, strings(&["a", "b", "c", "d"]));
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 0);

        let result = records::fetch_match_object(store.as_ref(), "mo1.prof").await.unwrap();
        assert_eq!(result.player_ids(), strings(&["a", "b"]));
        assert!(!result.is_error());
        assert!(store.record_get("proposal.1700000000.mo1.prof").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pairwise_conflict_releases_only_unclaimed_players() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![proposal("mo1", &["a", "b"]), proposal("mo2", &["b", "c"])];
        seed(store.as_ref(), &batch).await;
        store.set_pop_random("proposalq", 2).await.unwrap();

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator
            .evaluate_batch(batch, EvaluationReport::default())
            .await
            .unwrap();

        assert_eq!(report.approved, strings(&["proposal.1700000000.mo1.prof"]));
        assert_eq!(report.rejected, strings(&["proposal.1700000000.mo2.prof"]));
        assert_eq!(report.released_players, strings(&["c"]));
        assert_eq!(ignored(store.as_ref()).await, strings(&["a", "b"]));

        let approved = records::fetch_match_object(store.as_ref(), "mo1.prof").await.unwrap();
        assert_eq!(approved.player_ids(), strings(&["a", "b"]));
        assert!(approved.error.is_empty());

        let rejected = records::fetch_match_object(store.as_ref(), "mo2.prof").await.unwrap();
        assert_eq!(rejected.error, "Proposed match rejected due to player conflict");
        assert!(rejected.rosters.is_empty());
    }

    #[cfg(feature = "db")]
    #[tokio::test]
    async fn test_pairwise_conflict_on_sqlite_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(
            crate::store::SqliteStore::open_path(&temp.path().join("coordination.db")).unwrap(),
        );
        let batch = vec![
            proposal("mo1", &["a", "b"]),
            proposal("mo2", &["b", "c"]),
            proposal("mo3", &["d"]),
        ];
        seed(store.as_ref(), &batch).await;
        store.set_pop_random("proposalq", 3).await.unwrap();

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator
            .evaluate_batch(batch, EvaluationReport::default())
            .await
            .unwrap();

        assert_eq!(
            report.approved,
            strings(&["proposal.1700000000.mo1.prof", "proposal.1700000000.mo3.prof"])
        );
        assert_eq!(report.rejected, strings(&["proposal.1700000000.mo2.prof"]));
        assert_eq!(report.released_players, strings(&["c"]));
        assert_eq!(ignored(store.as_ref()).await, strings(&["a", "b", "d"]));

        let rejected = records::fetch_match_object(store.as_ref(), "mo2.prof").await.unwrap();
        assert_eq!(rejected.error, REJECTION_MESSAGE);
        assert!(rejected.rosters.is_empty());
        let approved = records::fetch_match_object(store.as_ref(), "mo3.prof").await.unwrap();
        assert_eq!(approved.player_ids(), strings(&["d"]));
        assert!(store.record_get("proposal.1700000000.mo2.prof").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_failure_keeps_committed_results() {
        let store = Arc::new(CountingStore::default());
        let batch = vec![proposal("mo1", &["a", "b"]), proposal("mo2", &["b", "c"])];
        seed(store.as_ref(), &batch).await;
        store.fail_release.store(true, Ordering::SeqCst);

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator
            .evaluate_batch(batch, EvaluationReport::default())
            .await
            .unwrap();

        assert_eq!(report.approved, strings(&["proposal.1700000000.mo1.prof"]));
        assert_eq!(report.rejected, strings(&["proposal.1700000000.mo2.prof"]));
        assert_eq!(report.released_players, strings(&["c"]));
        assert!(report.release_error.as_deref().unwrap().contains("ignorelist unavailable"));
        assert!(report.failed.is_empty());

        // Both results landed even though "c" is still ignored.
        assert!(records::fetch_match_object(store.as_ref(), "mo1.prof").await.is_ok());
        let rejected = records::fetch_match_object(store.as_ref(), "mo2.prof").await.unwrap();
        assert!(rejected.is_error());
        assert_eq!(ignored(store.as_ref()).await, strings(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_reject_missing_proposal_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (id, _) = proposal("ghost", &["a"]);

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        assert!(!evaluator.reject(&id).await.unwrap());
        assert!(store.record_get(&id.to_string()).await.unwrap().is_none());
        assert!(store.record_get("ghost.prof").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_with_random_scan_order_keeps_one_claim() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![proposal("mo1", &["a", "b"]), proposal("mo2", &["b", "c"])];
        seed(store.as_ref(), &batch).await;

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator.run().await.unwrap();

        // Whichever proposal was scanned first wins.
        assert_eq!(report.approved, vec![report.batch[0].clone()]);
        assert_eq!(report.rejected, vec![report.batch[1].clone()]);
        let expected_release = if report.batch[0].contains("mo1") { "c" } else { "a" };
        assert_eq!(report.released_players, strings(&[expected_release]));
        assert!(ignored(store.as_ref()).await.contains(&"b".to_string()));
    }

    #[tokio::test]
    async fn test_triple_conflict_keeps_shared_player_claimed() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![
            proposal("mo1", &["a"]),
            proposal("mo2", &["a"]),
            proposal("mo3", &["a"]),
        ];
        seed(store.as_ref(), &batch).await;

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator.run().await.unwrap();

        assert_eq!(report.approved.len(), 1);
        assert_eq!(report.rejected.len(), 2);
        assert!(report.released_players.is_empty());
        assert_eq!(ignored(store.as_ref()).await, strings(&["a"]));

        let mut errors = 0;
        for mo in ["mo1", "mo2", "mo3"] {
            let result = records::fetch_match_object(store.as_ref(), &format!("{mo}.prof"))
                .await
                .unwrap();
            // Never both a roster and an error, never neither.
            assert_ne!(result.is_error(), result.has_players());
            errors += usize::from(result.is_error());
        }
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn test_dry_run_classifies_without_mutating() {
        let store = Arc::new(CountingStore::default());
        let batch = vec![proposal("mo1", &["a", "b"]), proposal("mo2", &["b", "c"])];
        seed(store.as_ref(), &batch).await;
        let before = store.mutations.load(Ordering::SeqCst);

        let evaluator = Evaluator::new(store.clone(), settings(true), Arc::new(FirstWins));
        let report = evaluator
            .evaluate_batch(batch.clone(), EvaluationReport::default())
            .await
            .unwrap();
        assert_eq!(report.approved, strings(&["proposal.1700000000.mo1.prof"]));
        assert_eq!(report.rejected, strings(&["proposal.1700000000.mo2.prof"]));
        assert_eq!(report.released_players, strings(&["c"]));

        let full = evaluator.run().await.unwrap();
        assert!(full.dry_run);
        assert_eq!(full.approved.len(), 1);
        assert_eq!(full.rejected.len(), 1);

        assert_eq!(store.mutations.load(Ordering::SeqCst), before);
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 2);
        assert_eq!(ignored(store.as_ref()).await, strings(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_repeated_promotion_is_benign() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![proposal("mo1", &["a"]), proposal("mo2", &["a"])];
        seed(store.as_ref(), &batch).await;

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        evaluator.run().await.unwrap();

        for (id, _) in &batch {
            assert!(!evaluator.approve(id).await.unwrap());
            assert!(!evaluator.reject(id).await.unwrap());
            assert!(store.record_get(&id.to_string()).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_unparseable_and_missing_proposals_are_dropped() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![proposal("mo1", &["a"])];
        seed(store.as_ref(), &batch).await;
        store
            .set_add("proposalq", &strings(&["garbage", "proposal.5.gone.prof"]))
            .await
            .unwrap();

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator.run().await.unwrap();

        assert_eq!(report.approved, strings(&["proposal.1700000000.mo1.prof"]));
        let mut dropped = report.dropped.clone();
        dropped.sort();
        assert_eq!(dropped, strings(&["garbage", "proposal.5.gone.prof"]));
        assert_eq!(store.set_cardinality("proposalq").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_is_a_noop() {
        let store = Arc::new(CountingStore::default());
        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(FirstWins));
        let report = evaluator.run().await.unwrap();
        assert!(report.is_empty());
        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
    }

    /// Approves everything it is given.
    struct ApproveAll;

    impl ConflictResolver for ApproveAll {
        fn name(&self) -> &'static str {
            "approve_all"
        }

        fn resolve(&self, index: &OverlapIndex) -> Resolution {
            Resolution {
                approved: index.conflicted().to_vec(),
                rejected: Vec::new(),
            }
        }
    }

    #[tokio::test]
    async fn test_contract_violation_falls_back_to_first_wins() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![proposal("mo1", &["a"]), proposal("mo2", &["a"])];
        seed(store.as_ref(), &batch).await;

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(ApproveAll));
        let report = evaluator
            .evaluate_batch(batch, EvaluationReport::default())
            .await
            .unwrap();

        assert!(report.fallback);
        assert_eq!(report.approved, strings(&["proposal.1700000000.mo1.prof"]));
        assert_eq!(report.rejected, strings(&["proposal.1700000000.mo2.prof"]));
    }

    #[tokio::test]
    async fn test_greedy_resolver_approves_compatible_conflicted_proposals() {
        let store = Arc::new(MemoryStore::new());
        let batch = vec![
            proposal("mo1", &["a", "b"]),
            proposal("mo2", &["b", "c"]),
            proposal("mo3", &["c", "d"]),
        ];
        seed(store.as_ref(), &batch).await;

        let evaluator = Evaluator::new(store.clone(), settings(false), Arc::new(GreedyDisjoint));
        let report = evaluator
            .evaluate_batch(batch, EvaluationReport::default())
            .await
            .unwrap();

        assert_eq!(
            report.approved,
            strings(&["proposal.1700000000.mo1.prof", "proposal.1700000000.mo3.prof"])
        );
        assert_eq!(report.rejected, strings(&["proposal.1700000000.mo2.prof"]));
        assert!(report.released_players.is_empty());
        assert!(!report.fallback);
    }
}
