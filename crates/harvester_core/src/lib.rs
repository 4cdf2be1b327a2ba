//! Harvester core: pure harvest bookkeeping, key canonicalization and relevance filtering.
mod filter;
mod key;
mod outcome;
mod record;
mod state;

pub use filter::{ContentFilter, FilterConfig, FilterError, PatternFilter};
pub use key::{CandidateKey, KeyShape, KeyShapeError};
pub use outcome::{RoundVerdict, StopReason};
pub use record::PostingRecord;
pub use state::{HarvestLimits, HarvestState, LimitsError};
