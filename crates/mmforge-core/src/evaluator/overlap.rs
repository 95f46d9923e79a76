//! Overlap index over one evaluation batch.
//!
//! Scans proposals in batch order and records which of them share players.
//! Indices are batch-relative: index `i` is the `i`-th proposal handed to
//! [`OverlapIndex::build`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct OverlapIndex {
    /// Distinct players per proposal
    players: Vec<BTreeSet<String>>,
    /// Conflicting proposal indices, in order of discovery
    conflicted: Vec<usize>,
    /// Proposals sharing no player with any other
    safe: Vec<usize>,
    /// Proposals each proposal shares at least one player with
    neighbours: Vec<BTreeSet<usize>>,
    /// Player -> proposals involved in a conflict over that player
    conflicts_by_player: BTreeMap<String, Vec<usize>>,
}

impl OverlapIndex {
    /// Build the index from each proposal's player ids.
    ///
    /// A player listed twice within the same proposal is not a conflict.
    pub fn build<S: AsRef<str>>(batch: &[Vec<S>]) -> Self {
        let n = batch.len();
        let mut index = Self {
            players: Vec::with_capacity(n),
            conflicted: Vec::new(),
            safe: Vec::new(),
            neighbours: vec![BTreeSet::new(); n],
            conflicts_by_player: BTreeMap::new(),
        };
        let mut is_conflicted = vec![false; n];
        // player -> every proposal holding it so far, the first being its owner
        let mut holders: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, proposal) in batch.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for player in proposal {
                let player = player.as_ref();
                if !seen.insert(player.to_string()) {
                    continue;
                }

                let Some(previous) = holders.get_mut(player) else {
                    holders.insert(player.to_string(), vec![i]);
                    continue;
                };

                let owner = previous[0];
                for &h in previous.iter() {
                    index.neighbours[h].insert(i);
                    index.neighbours[i].insert(h);
                }
                previous.push(i);

                for idx in [owner, i] {
                    if !is_conflicted[idx] {
                        is_conflicted[idx] = true;
                        index.conflicted.push(idx);
                    }
                }

                let list = index
                    .conflicts_by_player
                    .entry(player.to_string())
                    .or_default();
                if list.is_empty() {
                    list.push(owner);
                }
                list.push(i);
            }
            index.players.push(seen);
        }

        index.safe = (0..n).filter(|i| !is_conflicted[*i]).collect();
        index
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Indices involved in at least one conflict, in discovery order.
    pub fn conflicted(&self) -> &[usize] {
        &self.conflicted
    }

    /// Indices with no conflict, ascending.
    pub fn safe(&self) -> &[usize] {
        &self.safe
    }

    pub fn is_conflicted(&self, i: usize) -> bool {
        self.neighbours.get(i).is_some_and(|n| !n.is_empty())
    }

    /// Proposals sharing at least one player with proposal `i`.
    pub fn neighbours(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.neighbours.get(i).into_iter().flatten().copied()
    }

    pub fn overlaps(&self, i: usize, j: usize) -> bool {
        self.neighbours.get(i).is_some_and(|n| n.contains(&j))
    }

    pub fn players(&self, i: usize) -> Option<&BTreeSet<String>> {
        self.players.get(i)
    }

    /// Proposals involved in a conflict over `player`, owner first.
    pub fn conflicts_for(&self, player: &str) -> &[usize] {
        self.conflicts_by_player
            .get(player)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contested_players(&self) -> impl Iterator<Item = &str> {
        self.conflicts_by_player.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(proposals: &[&[&str]]) -> Vec<Vec<String>> {
        proposals
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_disjoint_batch_is_all_safe() {
        let index = OverlapIndex::build(&batch(&[&["a", "b"], &["c", "d"]]));
        assert!(index.conflicted().is_empty());
        assert_eq!(index.safe(), &[0, 1]);
        assert!(!index.overlaps(0, 1));
    }

    #[test]
    fn test_pairwise_conflict_records_owner_first() {
        let index = OverlapIndex::build(&batch(&[&["a", "b"], &["b", "c"]]));
        assert_eq!(index.conflicted(), &[0, 1]);
        assert!(index.safe().is_empty());
        assert_eq!(index.conflicts_for("b"), &[0, 1]);
        assert!(index.conflicts_for("a").is_empty());
        assert!(index.overlaps(0, 1));
        assert!(index.overlaps(1, 0));
    }

    #[test]
    fn test_player_seen_three_times() {
        let index = OverlapIndex::build(&batch(&[&["a"], &["a"], &["a"]]));
        assert_eq!(index.conflicted(), &[0, 1, 2]);
        assert_eq!(index.conflicts_for("a"), &[0, 1, 2]);
        assert!(index.overlaps(1, 2));
        assert_eq!(index.neighbours(2).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_duplicate_player_within_one_proposal_is_not_a_conflict() {
        let index = OverlapIndex::build(&batch(&[&["a", "a"], &["b"]]));
        assert!(index.conflicted().is_empty());
        assert_eq!(index.players(0).unwrap().len(), 1);
    }

    #[test]
    fn test_discovery_order_follows_scan() {
        // 0 and 2 share x, 1 and 3 share y: discovered while scanning 2 then 3.
        let index = OverlapIndex::build(&batch(&[&["x"], &["y"], &["x"], &["y"], &["z"]]));
        assert_eq!(index.conflicted(), &[0, 2, 1, 3]);
        assert_eq!(index.safe(), &[4]);
        assert_eq!(index.contested_players().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_empty_batch() {
        let index = OverlapIndex::build::<String>(&[]);
        assert!(index.is_empty());
        assert!(index.safe().is_empty());
        assert!(index.conflicted().is_empty());
    }
}
