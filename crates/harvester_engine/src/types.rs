use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use harvester_core::{PostingRecord, StopReason};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Structural CSS path of one element (`html > body:nth-child(2) > …`).
/// Only meaningful for the document it was probed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionHandle(String);

impl RegionHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a browsing context reports about one link-bearing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionProbe {
    pub handle: RegionHandle,
    pub scrollable: bool,
    pub link_count: usize,
    pub visible_height: f64,
}

/// URL and serialized DOM of the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("redirect limit exceeded")]
    RedirectLimitExceeded,
    #[error("response too large (max {max_bytes}, actual {actual:?})")]
    TooLarge { max_bytes: u64, actual: Option<u64> },
    #[error("unsupported content type {0}")]
    UnsupportedContentType(String),
    #[error("failed to decode page with {encoding}")]
    Decode { encoding: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("{0} is not supported by this browsing context")]
    Unsupported(&'static str),
    #[error("network error: {0}")]
    Network(String),
}

/// Where a block marker was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockPhase {
    Initial,
    MidRun,
}

impl fmt::Display for BlockPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockPhase::Initial => write!(f, "blocked-initial"),
            BlockPhase::MidRun => write!(f, "blocked-midrun"),
        }
    }
}

/// Why a block check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockCause {
    /// A verification, login or challenge marker was on the page.
    Interstitial,
    /// Neither a block marker nor a candidate link appeared; usually markup drift.
    NothingRecognized,
}

/// Who can fix a fatal fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// The operator must re-authenticate or refresh the session.
    ClientFixable,
    /// Retrying later may succeed.
    Transient,
    /// Markup drift or bad configuration; needs maintenance.
    Structural,
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("no usable session at {path:?}: {reason}")]
    SessionMissing { path: PathBuf, reason: String },
    #[error("authentication required: {0}")]
    AuthRequired(String),
    #[error("{phase}: {marker}")]
    Blocked {
        phase: BlockPhase,
        cause: BlockCause,
        marker: String,
        diagnostics: Option<PathBuf>,
    },
    #[error("harvest exceeded its {budget:?} budget with {count} partial records", count = .partial.len())]
    Timeout {
        budget: Duration,
        partial: Vec<PostingRecord>,
        diagnostics: Option<PathBuf>,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browsing context failure: {0}")]
    Page(#[from] PageError),
}

impl HarvestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            HarvestError::SessionMissing { .. } | HarvestError::AuthRequired(_) => {
                ErrorClass::ClientFixable
            }
            HarvestError::Blocked {
                cause: BlockCause::NothingRecognized,
                ..
            }
            | HarvestError::Config(_)
            | HarvestError::Launch(_) => ErrorClass::Structural,
            HarvestError::Blocked { .. } | HarvestError::Timeout { .. } | HarvestError::Page(_) => {
                ErrorClass::Transient
            }
        }
    }

    /// Stable identifier for the response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::SessionMissing { .. } => "session-missing",
            HarvestError::AuthRequired(_) => "auth-required",
            HarvestError::Blocked { .. } => "blocked",
            HarvestError::Timeout { .. } => "harvest-timeout",
            HarvestError::Config(_) => "config",
            HarvestError::Launch(_) => "launch",
            HarvestError::Page(_) => "page",
        }
    }

    /// HTTP-equivalent status: 401 when re-authentication fixes it, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            HarvestError::SessionMissing { .. } | HarvestError::AuthRequired(_) => 401,
            _ => 500,
        }
    }

    pub fn diagnostics(&self) -> Option<&PathBuf> {
        match self {
            HarvestError::Blocked { diagnostics, .. } | HarvestError::Timeout { diagnostics, .. } => {
                diagnostics.as_ref()
            }
            _ => None,
        }
    }
}

/// Result of a harvest that finished normally.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestReport {
    pub records: Vec<PostingRecord>,
    pub stop_reason: StopReason,
    pub rounds: u32,
    /// Candidates dispatched to detail extraction.
    pub visited: usize,
    pub elapsed: Duration,
}
