//! Typed access to profile and match object records.
//!
//! Both entity kinds are stored as flat field maps. Scalar fields are stored
//! as-is; `rosters` and `pools` hold JSON arrays. An empty or missing list
//! field decodes as an empty list.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::CoordinationStore;
use crate::types::{
    FIELD_ERROR, FIELD_ID, FIELD_NAME, FIELD_POOLS, FIELD_PROPERTIES, FIELD_ROSTERS, MatchObject,
    Profile, Record,
};

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

fn text(record: &Record, field: &str) -> String {
    record.get(field).cloned().unwrap_or_default()
}

fn list<T: DeserializeOwned>(key: &str, record: &Record, field: &str) -> Result<Vec<T>> {
    match record.get(field).map(|v| v.trim()) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| Error::MalformedRecord {
            key: key.to_string(),
            reason: format!("field '{}': {}", field, e),
        }),
    }
}

fn encode_list<T: Serialize>(items: &[T]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

pub fn encode_profile(profile: &Profile) -> Result<Record> {
    let mut record = Record::new();
    record.insert(FIELD_ID.into(), profile.id.clone());
    record.insert(FIELD_NAME.into(), profile.name.clone());
    record.insert(FIELD_PROPERTIES.into(), profile.properties.clone());
    record.insert(FIELD_ROSTERS.into(), encode_list(&profile.rosters)?);
    record.insert(FIELD_POOLS.into(), encode_list(&profile.pools)?);
    Ok(record)
}

/// Decode a profile record. The id falls back to the record key when the
/// `id` field is absent.
pub fn decode_profile(key: &str, record: &Record) -> Result<Profile> {
    let id = record
        .get(FIELD_ID)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| key.to_string());
    Ok(Profile {
        id,
        name: text(record, FIELD_NAME),
        properties: text(record, FIELD_PROPERTIES),
        rosters: list(key, record, FIELD_ROSTERS)?,
        pools: list(key, record, FIELD_POOLS)?,
    })
}

pub fn encode_match_object(mo: &MatchObject) -> Result<Record> {
    let mut record = Record::new();
    record.insert(FIELD_ID.into(), mo.id.clone());
    record.insert(FIELD_PROPERTIES.into(), mo.properties.clone());
    record.insert(FIELD_ERROR.into(), mo.error.clone());
    record.insert(FIELD_ROSTERS.into(), encode_list(&mo.rosters)?);
    record.insert(FIELD_POOLS.into(), encode_list(&mo.pools)?);
    Ok(record)
}

pub fn decode_match_object(key: &str, record: &Record) -> Result<MatchObject> {
    let id = record
        .get(FIELD_ID)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| key.to_string());
    Ok(MatchObject {
        id,
        properties: text(record, FIELD_PROPERTIES),
        error: text(record, FIELD_ERROR),
        rosters: list(key, record, FIELD_ROSTERS)?,
        pools: list(key, record, FIELD_POOLS)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Store helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Fetch and decode a profile; `Error::NotFound` if the key is absent.
pub async fn fetch_profile(store: &dyn CoordinationStore, key: &str) -> Result<Profile> {
    let record = store
        .record_get(key)
        .await?
        .ok_or_else(|| Error::not_found(key))?;
    decode_profile(key, &record)
}

pub async fn put_profile(store: &dyn CoordinationStore, key: &str, profile: &Profile) -> Result<()> {
    store.record_put(key, &encode_profile(profile)?).await
}

/// Fetch and decode a proposal or result; `Error::NotFound` if the key is absent.
pub async fn fetch_match_object(store: &dyn CoordinationStore, key: &str) -> Result<MatchObject> {
    let record = store
        .record_get(key)
        .await?
        .ok_or_else(|| Error::not_found(key))?;
    decode_match_object(key, &record)
}

pub async fn put_match_object(
    store: &dyn CoordinationStore,
    key: &str,
    mo: &MatchObject,
) -> Result<()> {
    store.record_put(key, &encode_match_object(mo)?).await
}

/// Set holding the player ids available to a named pool.
pub fn pool_key(pool: &str) -> String {
    format!("pool.{}", pool)
}
