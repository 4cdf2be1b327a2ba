use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{CandidateKey, PostingRecord, RoundVerdict, StopReason};

/// Budgets that bound one harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestLimits {
    pub max_results: usize,
    pub max_rounds: u32,
    /// Consecutive rounds without progress before the list counts as exhausted.
    pub stagnation_threshold: u32,
}

impl Default for HarvestLimits {
    fn default() -> Self {
        Self {
            max_results: 25,
            max_rounds: 40,
            stagnation_threshold: 4,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LimitsError {
    #[error("max_rounds must be at least 1")]
    NoRounds,
    #[error("stagnation_threshold must be at least 1")]
    NoStagnationThreshold,
}

impl HarvestLimits {
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.max_rounds == 0 {
            return Err(LimitsError::NoRounds);
        }
        if self.stagnation_threshold == 0 {
            return Err(LimitsError::NoStagnationThreshold);
        }
        Ok(())
    }
}

/// Mutable bookkeeping of one harvest: seen-set, results, round and
/// stagnation counters.
///
/// Invariants upheld here rather than by callers:
/// - every key passed to [`HarvestState::mark_dispatched`] stays in the seen-set;
/// - `results().len() <= limits.max_results`;
/// - no two results share a `source_link`;
/// - `round_index() <= limits.max_rounds`.
#[derive(Debug, Clone)]
pub struct HarvestState {
    limits: HarvestLimits,
    seen: HashSet<CandidateKey>,
    results: Vec<PostingRecord>,
    round_index: u32,
    stagnation: u32,
    seen_at_round_start: usize,
}

impl HarvestState {
    pub fn new(limits: HarvestLimits) -> Self {
        Self {
            limits,
            seen: HashSet::new(),
            results: Vec::new(),
            round_index: 0,
            stagnation: 0,
            seen_at_round_start: 0,
        }
    }

    pub fn limits(&self) -> &HarvestLimits {
        &self.limits
    }

    pub fn round_index(&self) -> u32 {
        self.round_index
    }

    pub fn stagnation_counter(&self) -> u32 {
        self.stagnation
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, key: &CandidateKey) -> bool {
        self.seen.contains(key)
    }

    pub fn results(&self) -> &[PostingRecord] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PostingRecord> {
        self.results
    }

    pub fn cap_reached(&self) -> bool {
        self.results.len() >= self.limits.max_results
    }

    /// Keys from `collected` not yet dispatched, first occurrence only, order kept.
    pub fn unseen(&self, collected: &[CandidateKey]) -> Vec<CandidateKey> {
        let mut batch: HashSet<&CandidateKey> = HashSet::new();
        collected
            .iter()
            .filter(|key| !self.seen.contains(*key) && batch.insert(*key))
            .cloned()
            .collect()
    }

    /// Records that `key` is about to be visited. Returns `false` if it was
    /// already dispatched, in which case the caller must not visit it again.
    pub fn mark_dispatched(&mut self, key: CandidateKey) -> bool {
        self.seen.insert(key)
    }

    /// Appends a matching record. Refuses records past the cap, duplicates,
    /// and records whose key was never dispatched.
    pub fn accept(&mut self, record: PostingRecord) -> bool {
        if self.cap_reached() || !self.seen.contains(&record.source_link) {
            return false;
        }
        if self
            .results
            .iter()
            .any(|existing| existing.source_link == record.source_link)
        {
            return false;
        }
        self.results.push(record);
        true
    }

    /// Closes a round that reached the scroll step. Progress means the
    /// seen-set grew during the round or the post-scroll collection exposed
    /// `fresh_after_scroll` unseen keys.
    pub fn close_round(&mut self, fresh_after_scroll: usize) -> RoundVerdict {
        let grew = self.seen.len() > self.seen_at_round_start;
        self.finish_round(grew || fresh_after_scroll > 0)
    }

    /// Closes a round cut short because the list root could not be loaded.
    /// Only candidates dispatched before the failure count as progress.
    pub fn close_failed_round(&mut self) -> RoundVerdict {
        let grew = self.seen.len() > self.seen_at_round_start;
        self.finish_round(grew)
    }

    fn finish_round(&mut self, progressed: bool) -> RoundVerdict {
        self.round_index = (self.round_index + 1).min(self.limits.max_rounds);
        self.seen_at_round_start = self.seen.len();
        if progressed {
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }

        if self.stagnation >= self.limits.stagnation_threshold {
            RoundVerdict::Done(StopReason::Stagnant)
        } else if self.round_index >= self.limits.max_rounds {
            RoundVerdict::Done(StopReason::MaxRounds)
        } else {
            RoundVerdict::Continue
        }
    }
}
