use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::PostingRecord;

/// Relevance predicate applied to every extracted record.
pub trait ContentFilter: Send + Sync {
    fn accepts(&self, record: &PostingRecord) -> bool;
}

/// Two topic pattern sets. Each entry is a regex fragment; plain words work as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub topic_a: Vec<String>,
    pub topic_b: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("pattern set {0} is empty")]
    EmptySet(&'static str),
    #[error("pattern set {set} does not compile: {message}")]
    InvalidPattern { set: &'static str, message: String },
}

/// Accepts a record only when both topic sets match somewhere in its
/// title, organization or description.
///
/// Matching is case-insensitive and respects word boundaries in any script:
/// a hit must not be glued to another letter, digit or underscore.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    topic_a: Regex,
    topic_b: Regex,
}

impl PatternFilter {
    pub fn from_config(config: &FilterConfig) -> Result<Self, FilterError> {
        Ok(Self {
            topic_a: compile_set("topic_a", &config.topic_a)?,
            topic_b: compile_set("topic_b", &config.topic_b)?,
        })
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.topic_a.is_match(text) && self.topic_b.is_match(text)
    }
}

impl ContentFilter for PatternFilter {
    fn accepts(&self, record: &PostingRecord) -> bool {
        self.matches_text(&record.searchable_text())
    }
}

fn compile_set(set: &'static str, patterns: &[String]) -> Result<Regex, FilterError> {
    let alternation = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    if alternation.is_empty() {
        return Err(FilterError::EmptySet(set));
    }

    // `\b` is ASCII-minded around non-word pattern edges such as "c++";
    // explicit letter/number guards behave the same in every script.
    let source = format!(r"(?:^|[^\p{{L}}\p{{N}}_])(?:{alternation})(?:$|[^\p{{L}}\p{{N}}_])");
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .unicode(true)
        .build()
        .map_err(|err| FilterError::InvalidPattern {
            set,
            message: err.to_string(),
        })
}
