//! Conflict resolvers.
//!
//! A resolver picks which conflicted proposals to approve. Whatever the policy,
//! no two approved proposals may share a player; [`check_disjoint`] enforces
//! that on every resolver output.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::overlap::OverlapIndex;
use crate::error::{Error, Result};

/// Approved and rejected batch indices, drawn from the conflicted set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub approved: Vec<usize>,
    pub rejected: Vec<usize>,
}

impl Resolution {
    /// Restrict to conflicted indices, drop duplicates, and reject every
    /// conflicted index that was not approved.
    pub fn normalize(self, index: &OverlapIndex) -> Self {
        let conflicted: BTreeSet<usize> = index.conflicted().iter().copied().collect();
        let mut seen = BTreeSet::new();
        let approved: Vec<usize> = self
            .approved
            .into_iter()
            .filter(|i| conflicted.contains(i) && seen.insert(*i))
            .collect();
        let rejected = index
            .conflicted()
            .iter()
            .copied()
            .filter(|i| !seen.contains(i))
            .collect();
        Self { approved, rejected }
    }
}

/// Selection policy over the conflicted subset of a batch.
pub trait ConflictResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(&self, index: &OverlapIndex) -> Resolution;
}

/// Approve the first conflicted proposal, reject the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstWins;

impl ConflictResolver for FirstWins {
    fn name(&self) -> &'static str {
        "first_wins"
    }

    fn resolve(&self, index: &OverlapIndex) -> Resolution {
        match index.conflicted().split_first() {
            Some((first, rest)) => Resolution {
                approved: vec![*first],
                rejected: rest.to_vec(),
            },
            None => Resolution::default(),
        }
    }
}

/// Walk conflicted proposals in discovery order, approving each one that
/// shares no player with a proposal already approved.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyDisjoint;

impl ConflictResolver for GreedyDisjoint {
    fn name(&self) -> &'static str {
        "greedy_disjoint"
    }

    fn resolve(&self, index: &OverlapIndex) -> Resolution {
        let mut resolution = Resolution::default();
        for &i in index.conflicted() {
            if resolution.approved.iter().any(|&a| index.overlaps(a, i)) {
                resolution.rejected.push(i);
            } else {
                resolution.approved.push(i);
            }
        }
        resolution
    }
}

/// Resolver selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    #[default]
    FirstWins,
    GreedyDisjoint,
}

impl ResolverKind {
    pub fn build(self) -> Arc<dyn ConflictResolver> {
        match self {
            Self::FirstWins => Arc::new(FirstWins),
            Self::GreedyDisjoint => Arc::new(GreedyDisjoint),
        }
    }
}

/// Fail if any two approved indices share a player.
pub fn check_disjoint(resolver: &'static str, index: &OverlapIndex, approved: &[usize]) -> Result<()> {
    for (n, &a) in approved.iter().enumerate() {
        for &b in &approved[n + 1..] {
            if index.overlaps(a, b) {
                return Err(Error::ResolverContract {
                    resolver,
                    first: a,
                    second: b,
                });
            }
        }
    }
    Ok(())
}
