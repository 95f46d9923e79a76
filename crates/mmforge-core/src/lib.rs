//! mmforge-core - Core library for mmforge
//!
//! This crate provides everything the orchestrator daemon and the operator CLI
//! share:
//!
//! - **ids**: Structured proposal / result identifiers
//! - **types**: Players, rosters, profiles and match objects
//! - **store**: The coordination store trait with in-memory and SQLite backends
//! - **records**: Typed access to profile and match object records
//! - **ignorelist**: Exclusion list windows and maintenance
//! - **evaluator**: Overlap index, conflict resolvers and the evaluation run
//! - **orchestrator**: The dispatch / poll / trigger control loop
//! - **launcher**: Ways of starting match function workers
//! - **worker**: Worker-side contract harness for match functions
//! - **config**: TOML configuration

pub mod config;
pub mod error;
pub mod evaluator;
pub mod ids;
pub mod ignorelist;
pub mod launcher;
pub mod orchestrator;
pub mod records;
pub mod store;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::ForgeConfig;
pub use error::{Error, Result};
pub use ids::{ProposalId, ResultId};
pub use store::CoordinationStore;
