use serde::{Deserialize, Serialize};

use crate::CandidateKey;

/// One extracted listing. Fields that could not be read stay empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingRecord {
    pub title: String,
    pub organization: String,
    pub description: String,
    pub source_link: CandidateKey,
    /// ISO `YYYY-MM-DD`, only when the page exposes a machine-readable timestamp.
    #[serde(default)]
    pub posted_date: Option<String>,
    /// Never populated; kept so downstream consumers see a stable shape.
    #[serde(default)]
    pub contact_info: String,
}

impl PostingRecord {
    pub fn empty(source_link: CandidateKey) -> Self {
        Self {
            title: String::new(),
            organization: String::new(),
            description: String::new(),
            source_link,
            posted_date: None,
            contact_info: String::new(),
        }
    }

    /// Text the relevance filter looks at.
    pub fn searchable_text(&self) -> String {
        format!("{}\n{}\n{}", self.title, self.organization, self.description)
    }
}
