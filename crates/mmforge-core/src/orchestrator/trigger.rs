//! Evaluation trigger decision.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Why an evaluation window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    /// Every dispatched worker has decremented the counter
    #[serde(rename = "mmfs_completed")]
    AllWorkersComplete,
    /// The window stayed open longer than the maximum wait
    #[serde(rename = "interval_exceeded")]
    IntervalExceeded,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllWorkersComplete => "mmfs_completed",
            Self::IntervalExceeded => "interval_exceeded",
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Counter absent: nothing happened since the last reset
    NoActivity,
    Fire(TriggerReason),
    /// Workers still running and the window is young
    Hold,
}

/// Decide from the in-flight counter and the age of the current window.
///
/// An absent counter short-circuits before anything else; a counter at or
/// below zero wins over the interval check.
pub fn decide(counter: Option<i64>, elapsed: Duration, max_wait: Duration) -> Decision {
    match counter {
        None => Decision::NoActivity,
        Some(n) if n <= 0 => Decision::Fire(TriggerReason::AllWorkersComplete),
        Some(_) if elapsed >= max_wait => Decision::Fire(TriggerReason::IntervalExceeded),
        Some(_) => Decision::Hold,
    }
}
