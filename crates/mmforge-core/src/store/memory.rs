//! In-process coordination store.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rand::seq::{IteratorRandom, SliceRandom};
use tracing::debug;

use super::CoordinationStore;
use crate::error::{Error, Result};
use crate::types::Record;

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, i64>,
    sets: HashMap<String, HashSet<String>>,
    records: HashMap<String, Record>,
    /// list -> player -> added_at
    ignorelists: HashMap<String, HashMap<String, i64>>,
}

/// Coordination store held in process memory.
///
/// Thread-safe via internal Mutex. Each trait method holds the lock for its
/// whole body, which makes every operation atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| Error::LockPoisoned)
    }

    fn sample(set: &HashSet<String>, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let mut chosen = set.iter().cloned().choose_multiple(&mut rng, count);
        chosen.shuffle(&mut rng);
        chosen
    }

    fn add_to_counter(&self, key: &str, delta: i64) -> Result<i64> {
        let mut state = self.lock()?;
        let value = state.counters.entry(key.to_string()).or_insert(0);
        *value += delta;
        debug!(key, value = *value, "counter updated");
        Ok(*value)
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn counter_increment(&self, key: &str) -> Result<i64> {
        self.add_to_counter(key, 1)
    }

    async fn counter_decrement(&self, key: &str) -> Result<i64> {
        self.add_to_counter(key, -1)
    }

    async fn counter_get(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.lock()?.counters.get(key).copied())
    }

    async fn counter_delete(&self, key: &str) -> Result<()> {
        self.lock()?.counters.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut state = self.lock()?;
        let set = state.sets.entry(key.to_string()).or_default();
        Ok(members.iter().filter(|m| set.insert((*m).clone())).count())
    }

    async fn set_pop_random(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let mut state = self.lock()?;
        let Some(set) = state.sets.get_mut(key) else {
            return Ok(Vec::new());
        };
        let popped = Self::sample(set, count);
        for member in &popped {
            set.remove(member);
        }
        if set.is_empty() {
            state.sets.remove(key);
        }
        debug!(key, popped = popped.len(), "set members popped");
        Ok(popped)
    }

    async fn set_random_members(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .sets
            .get(key)
            .map(|set| Self::sample(set, count))
            .unwrap_or_default())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        let mut members: Vec<String> = state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    async fn set_cardinality(&self, key: &str) -> Result<usize> {
        Ok(self.lock()?.sets.get(key).map_or(0, HashSet::len))
    }

    async fn record_put(&self, key: &str, fields: &Record) -> Result<()> {
        let mut state = self.lock()?;
        let record = state.records.entry(key.to_string()).or_default();
        record.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn record_get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.lock()?.records.get(key).cloned())
    }

    async fn record_field_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut state = self.lock()?;
        state
            .records
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn record_update(&self, key: &str, fields: &Record) -> Result<bool> {
        let mut state = self.lock()?;
        let Some(record) = state.records.get_mut(key) else {
            return Ok(false);
        };
        for (field, value) in fields {
            record.insert(field.clone(), value.clone());
        }
        Ok(true)
    }

    async fn record_rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let mut state = self.lock()?;
        let record = state
            .records
            .remove(old_key)
            .ok_or_else(|| Error::not_found(old_key))?;
        state.records.insert(new_key.to_string(), record);
        debug!(old_key, new_key, "record renamed");
        Ok(())
    }

    async fn record_delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.records.remove(key).is_some())
    }

    async fn ignorelist_add(&self, list: &str, player_ids: &[String], added_at: i64) -> Result<()> {
        let mut state = self.lock()?;
        let entries = state.ignorelists.entry(list.to_string()).or_default();
        for id in player_ids {
            entries.insert(id.clone(), added_at);
        }
        Ok(())
    }

    async fn ignorelist_remove(&self, list: &str, player_ids: &[String]) -> Result<usize> {
        let mut state = self.lock()?;
        let Some(entries) = state.ignorelists.get_mut(list) else {
            return Ok(0);
        };
        Ok(player_ids
            .iter()
            .filter(|id| entries.remove(id.as_str()).is_some())
            .count())
    }

    async fn ignorelist_retrieve(&self, list: &str, from: i64, until: i64) -> Result<Vec<String>> {
        let state = self.lock()?;
        let Some(entries) = state.ignorelists.get(list) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<(&String, i64)> = entries
            .iter()
            .filter(|(_, ts)| (from..=until).contains(*ts))
            .map(|(id, ts)| (id, *ts))
            .collect();
        hits.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        Ok(hits.into_iter().map(|(id, _)| id.clone()).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_counter_absent_is_distinct_from_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.counter_get("c").await.unwrap(), None);

        assert_eq!(store.counter_increment("c").await.unwrap(), 1);
        assert_eq!(store.counter_decrement("c").await.unwrap(), 0);
        assert_eq!(store.counter_get("c").await.unwrap(), Some(0));

        store.counter_delete("c").await.unwrap();
        assert_eq!(store.counter_get("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_decrement_creates_negative_counter() {
        let store = MemoryStore::new();
        assert_eq!(store.counter_decrement("c").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_set_pop_random_removes_exact_members() {
        let store = MemoryStore::new();
        assert_eq!(store.set_add("q", &ids(&["a", "b", "c", "a"])).await.unwrap(), 3);
        assert_eq!(store.set_cardinality("q").await.unwrap(), 3);

        let popped = store.set_pop_random("q", 2).await.unwrap();
        assert_eq!(popped.len(), 2);
        let rest = store.set_members("q").await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(!popped.contains(&rest[0]));

        let last = store.set_pop_random("q", 10).await.unwrap();
        assert_eq!(last, rest);
        assert_eq!(store.set_cardinality("q").await.unwrap(), 0);
        assert!(store.set_pop_random("q", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_random_members_does_not_remove() {
        let store = MemoryStore::new();
        store.set_add("q", &ids(&["a", "b"])).await.unwrap();
        let peeked = store.set_random_members("q", 5).await.unwrap();
        assert_eq!(peeked.len(), 2);
        assert_eq!(store.set_cardinality("q").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_record_rename() {
        let store = MemoryStore::new();
        let mut fields = Record::new();
        fields.insert("properties".into(), "{}".into());
        store.record_put("old", &fields).await.unwrap();
        store.record_field_set("old", "error", "").await.unwrap();

        store.record_rename("old", "new").await.unwrap();
        assert!(store.record_get("old").await.unwrap().is_none());
        let moved = store.record_get("new").await.unwrap().unwrap();
        assert_eq!(moved.get("properties").unwrap(), "{}");
        assert_eq!(moved.len(), 2);

        let err = store.record_rename("old", "new").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_record_update_skips_missing_record() {
        let store = MemoryStore::new();
        let mut fields = Record::new();
        fields.insert("error".into(), "conflict".into());
        fields.insert("rosters".into(), String::new());

        assert!(!store.record_update("gone", &fields).await.unwrap());
        assert!(store.record_get("gone").await.unwrap().is_none());

        store.record_field_set("mo", "rosters", "[]").await.unwrap();
        store.record_field_set("mo", "properties", "{}").await.unwrap();
        assert!(store.record_update("mo", &fields).await.unwrap());
        let record = store.record_get("mo").await.unwrap().unwrap();
        assert_eq!(record.get("error").unwrap(), "conflict");
        assert_eq!(record.get("rosters").unwrap(), "");
        assert_eq!(record.get("properties").unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_ignorelist_window() {
        let store = MemoryStore::new();
        store.ignorelist_add("proposed", &ids(&["a", "b"]), 100).await.unwrap();
        store.ignorelist_add("proposed", &ids(&["c"]), 200).await.unwrap();

        assert_eq!(
            store.ignorelist_retrieve("proposed", 0, 300).await.unwrap(),
            ids(&["a", "b", "c"])
        );
        assert_eq!(
            store.ignorelist_retrieve("proposed", 150, 300).await.unwrap(),
            ids(&["c"])
        );

        assert_eq!(
            store.ignorelist_remove("proposed", &ids(&["a", "zz"])).await.unwrap(),
            1
        );
        assert_eq!(
            store.ignorelist_retrieve("proposed", 0, 300).await.unwrap(),
            ids(&["b", "c"])
        );
    }
}
