//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// mmforge operator CLI
///
/// Runs evaluations, submits match profiles and inspects the coordination store.
#[derive(Parser, Debug)]
#[command(name = "mmforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to $MMFORGE_CONFIG or ~/.mmforge/config.toml)
    #[arg(short, long, global = true, env = "MMFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one evaluation over the pending proposals
    Evaluate {
        /// Report decisions without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Match profile management
    Profile(ProfileCommand),

    /// Match results
    Result(ResultCommand),

    /// Player ignorelist inspection and maintenance
    Ignorelist(IgnorelistCommand),

    /// Player pools read by the bundled match function
    Pool(PoolCommand),

    /// Show coordination key status
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Store a profile and queue a match request for it
    Submit {
        /// Profile ID
        profile_id: String,

        /// JSON profile document
        #[arg(short, long)]
        file: PathBuf,

        /// Match object ID for the result (generated if omitted)
        #[arg(short, long)]
        match_object_id: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ResultCommand {
    #[command(subcommand)]
    pub action: ResultAction,
}

#[derive(Subcommand, Debug)]
pub enum ResultAction {
    /// Show a result (`<match-object-id>.<profile-id>`)
    Get {
        result_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Ignorelist Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct IgnorelistCommand {
    #[command(subcommand)]
    pub action: IgnorelistAction,
}

#[derive(Subcommand, Debug)]
pub enum IgnorelistAction {
    /// List ignored players
    List {
        /// Window length in seconds (0 = since the beginning)
        #[arg(short, long)]
        duration: Option<i64>,

        /// Window end, in seconds before now
        #[arg(short, long)]
        offset: Option<i64>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove players from the ignorelist
    Release {
        /// Player IDs
        #[arg(required = true)]
        players: Vec<String>,
    },

    /// Move players from one ignorelist to another
    Move {
        /// Source list (defaults to the proposed list)
        #[arg(long)]
        from: Option<String>,

        /// Destination list
        #[arg(long)]
        to: String,

        /// Player IDs
        #[arg(required = true)]
        players: Vec<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Pool Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct PoolCommand {
    #[command(subcommand)]
    pub action: PoolAction,
}

#[derive(Subcommand, Debug)]
pub enum PoolAction {
    /// Add players to a pool
    Add {
        /// Pool name
        pool: String,

        /// Player IDs
        #[arg(required = true)]
        players: Vec<String>,
    },

    /// List the players in a pool
    List {
        /// Pool name
        pool: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}
