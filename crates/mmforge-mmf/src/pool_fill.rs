//! Roster filling from stored player pools.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use mmforge_core::records::pool_key;
use mmforge_core::types::{Player, Roster};
use mmforge_core::worker::{MatchFunction, MatchProposal, MatchRequest};
use mmforge_core::{CoordinationStore, Error, Result};

/// Fills every roster slot of the profile with a free player from its pool.
///
/// A slot draws from the pool named on the slot, else from the profile's first
/// pool. A slot that already carries a player id keeps it. Players on the
/// ignorelist or already placed in this match are skipped. If any slot cannot
/// be filled the proposal is empty.
pub struct PoolFill {
    store: Arc<dyn CoordinationStore>,
}

impl PoolFill {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    async fn members(&self, pool: &str) -> Result<Vec<String>> {
        let mut members = self.store.set_members(&pool_key(pool)).await?;
        members.sort();
        Ok(members)
    }
}

#[async_trait]
impl MatchFunction for PoolFill {
    async fn make_match(&self, request: MatchRequest) -> Result<MatchProposal> {
        let profile = &request.profile;
        let default_pool = profile.pools.first().map(|p| p.name.as_str());
        let mut taken: HashSet<String> = request.ignored.iter().cloned().collect();
        let mut pools: HashMap<String, Vec<String>> = HashMap::new();

        let mut rosters = Vec::with_capacity(profile.rosters.len());
        for roster in &profile.rosters {
            let mut filled = Roster {
                name: roster.name.clone(),
                players: Vec::with_capacity(roster.players.len()),
            };
            for slot in &roster.players {
                if !slot.id.is_empty() {
                    if !taken.insert(slot.id.clone()) {
                        debug!(player = %slot.id, "pre-assigned player is unavailable");
                        return Ok(MatchProposal::default());
                    }
                    filled.players.push(slot.clone());
                    continue;
                }

                let pool = match (slot.pool.as_str(), default_pool) {
                    ("", Some(fallback)) => fallback,
                    ("", None) => {
                        return Err(Error::MatchFunction(format!(
                            "roster '{}' has a slot with no pool and the profile names none",
                            roster.name
                        )));
                    }
                    (named, _) => named,
                };
                if !pools.contains_key(pool) {
                    let members = self.members(pool).await?;
                    pools.insert(pool.to_string(), members);
                }
                let candidate = pools
                    .get(pool)
                    .and_then(|members| members.iter().find(|id| !taken.contains(*id)))
                    .cloned();
                let Some(id) = candidate else {
                    debug!(pool, roster = %roster.name, "pool exhausted");
                    return Ok(MatchProposal::default());
                };
                taken.insert(id.clone());
                filled.players.push(Player {
                    id,
                    pool: pool.to_string(),
                    ..Default::default()
                });
            }
            rosters.push(filled);
        }

        Ok(MatchProposal {
            properties: profile.properties.clone(),
            rosters,
        })
    }
}
