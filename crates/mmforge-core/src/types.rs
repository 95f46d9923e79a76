//! Shared types for mmforge-core.
//!
//! These types are stored as field maps in the coordination store and passed to
//! match functions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Record Field Names
// ─────────────────────────────────────────────────────────────────────────────

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_PROPERTIES: &str = "properties";
pub const FIELD_ERROR: &str = "error";
pub const FIELD_ROSTERS: &str = "rosters";
pub const FIELD_POOLS: &str = "pools";

/// A record as held by the coordination store: field name to value.
pub type Record = HashMap<String, String>;

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// Indexed attribute of a player, used by pool filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAttribute {
    pub name: String,
    pub value: i64,
}

/// One matchmaking participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Opaque JSON attribute bag.
    #[serde(default)]
    pub properties: String,
    /// Pool the player was drawn from.
    #[serde(default)]
    pub pool: String,
    #[serde(default)]
    pub attributes: Vec<PlayerAttribute>,
    #[serde(default)]
    pub assignment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Player {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Player slots for one side of a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub name: String,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Roster {
    pub fn new(name: impl Into<String>, player_ids: &[&str]) -> Self {
        Self {
            name: name.into(),
            players: player_ids.iter().map(|id| Player::new(*id)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolFilter {
    pub name: String,
    pub attribute: String,
    #[serde(default)]
    pub minv: Option<i64>,
    #[serde(default)]
    pub maxv: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPool {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<PoolFilter>,
}

/// A named matchmaking request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// JSON document describing the request; must parse as JSON.
    #[serde(default)]
    pub properties: String,
    #[serde(default)]
    pub rosters: Vec<Roster>,
    #[serde(default)]
    pub pools: Vec<PlayerPool>,
}

impl Profile {
    /// Parse the properties document.
    pub fn properties_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.properties)
    }
}

/// A proposal before evaluation, a result afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchObject {
    pub id: String,
    #[serde(default)]
    pub properties: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub rosters: Vec<Roster>,
    #[serde(default)]
    pub pools: Vec<PlayerPool>,
}

impl MatchObject {
    /// All player ids across rosters, in roster order.
    pub fn player_ids(&self) -> Vec<String> {
        self.rosters
            .iter()
            .flat_map(|r| r.players.iter().map(|p| p.id.clone()))
            .collect()
    }

    pub fn has_players(&self) -> bool {
        self.rosters.iter().any(|r| !r.players.is_empty())
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
