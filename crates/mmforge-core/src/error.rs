//! Error types for mmforge-core.

use thiserror::Error;

/// Result type alias using mmforge-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for mmforge operations
#[derive(Error, Debug)]
pub enum Error {
    // Store errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Key not found: {key}")]
    NotFound { key: String },

    // Identity errors
    #[error("Invalid {kind} id '{value}': {reason}")]
    InvalidId {
        kind: &'static str,
        value: String,
        reason: String,
    },

    // Input errors
    #[error("Malformed profile {profile_id}: {reason}")]
    MalformedProfile { profile_id: String, reason: String },

    #[error("Malformed record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    // Worker errors
    #[error("Worker launch failed for {job}: {reason}")]
    Launch { job: String, reason: String },

    #[error("Match function failed: {0}")]
    MatchFunction(String),

    // Evaluation errors
    #[error("Resolver {resolver} approved proposals {first} and {second} which share players")]
    ResolverContract {
        resolver: &'static str,
        first: usize,
        second: usize,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a not-found error for a store key
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an invalid id error
    pub fn invalid_id(
        kind: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidId {
            kind,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed profile error
    pub fn malformed_profile(profile_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedProfile {
            profile_id: profile_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a launch error
    pub fn launch(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Launch {
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error means the key did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
