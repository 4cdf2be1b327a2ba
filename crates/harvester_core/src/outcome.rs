use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a harvest finished normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    MaxResults,
    Stagnant,
    MaxRounds,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxResults => write!(f, "max-results"),
            StopReason::Stagnant => write!(f, "stagnant"),
            StopReason::MaxRounds => write!(f, "max-rounds"),
        }
    }
}

/// Decision taken when a round closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    Continue,
    Done(StopReason),
}
