//! Evaluation: conflict detection and resolution over pending proposals.
//!
//! - [`overlap`]: which proposals in a batch share players
//! - [`resolver`]: which conflicted proposals to approve
//! - [`Evaluator`]: one evaluation run against the coordination store

pub mod overlap;
pub mod resolver;
mod run;

pub use overlap::OverlapIndex;
pub use resolver::{ConflictResolver, FirstWins, GreedyDisjoint, Resolution, ResolverKind};
pub use run::{EvaluationReport, Evaluator, EvaluatorSettings, REJECTION_MESSAGE};
