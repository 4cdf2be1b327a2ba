use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical URL of one detail page, as produced by [`KeyShape::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateKey(String);

impl CandidateKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CandidateKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyShapeError {
    #[error("key shape must be anchored at the path start (begin with '^'): {0:?}")]
    Unanchored(String),
    #[error("invalid key shape {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// The path shape every detail link must have.
///
/// The pattern is a regex anchored at the start of the URL path. Whatever it
/// matches becomes the canonical path (with one trailing slash); anything the
/// pattern does not cover, plus the query and fragment, is dropped.
#[derive(Debug, Clone)]
pub struct KeyShape {
    path: Regex,
}

impl KeyShape {
    pub fn new(pattern: &str) -> Result<Self, KeyShapeError> {
        if !pattern.starts_with('^') {
            return Err(KeyShapeError::Unanchored(pattern.to_string()));
        }
        let path = Regex::new(pattern).map_err(|err| KeyShapeError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self { path })
    }

    pub fn pattern(&self) -> &str {
        self.path.as_str()
    }

    /// Canonicalizes `raw` (absolute, or relative to `base`) into a key.
    ///
    /// Returns `None` for anything that is not an http(s) URL whose path
    /// matches the shape. Idempotent on its own output.
    pub fn normalize(&self, raw: &str, base: Option<&Url>) -> Option<CandidateKey> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let mut url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(trimmed).ok()?,
            Err(_) => return None,
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }

        let prefix = self.matched_prefix(url.path())?.to_string();
        let canonical_path = format!("{prefix}/");
        // Only fixed points are keys, so normalizing a key returns it unchanged.
        if self.matched_prefix(&canonical_path) != Some(prefix.as_str()) {
            return None;
        }

        url.set_path(&canonical_path);
        url.set_query(None);
        url.set_fragment(None);
        // Credentials never belong in a key; both setters only fail on
        // cannot-be-a-base URLs, which http(s) URLs are not.
        let _ = url.set_username("");
        let _ = url.set_password(None);

        Some(CandidateKey(url.into()))
    }

    /// The matched path prefix without trailing slashes. Paths are tried as
    /// given and then without their trailing slashes, so `$`-anchored shapes
    /// still accept canonical paths.
    fn matched_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let trimmed = path.trim_end_matches('/');
        [path, trimmed].into_iter().find_map(|candidate| {
            let found = self.path.find(candidate)?;
            let prefix = found.as_str().trim_end_matches('/');
            (found.start() == 0 && !prefix.is_empty()).then_some(prefix)
        })
    }

    /// Convenience for already-absolute links.
    pub fn is_candidate(&self, raw: &str) -> bool {
        self.normalize(raw, None).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> KeyShape {
        KeyShape::new(r"^/jobs/view/\d+").unwrap()
    }

    #[test]
    fn strips_trailing_segments_and_query() {
        let key = shape()
            .normalize("https://Example.com/jobs/view/42/apply?ref=feed#top", None)
            .unwrap();
        assert_eq!(key.as_str(), "https://example.com/jobs/view/42/");
    }

    #[test]
    fn relative_links_need_a_base() {
        assert!(shape().normalize("/jobs/view/42", None).is_none());
        let base = Url::parse("https://example.com/jobs/search?q=x").unwrap();
        let key = shape().normalize("/jobs/view/42", Some(&base)).unwrap();
        assert_eq!(key.as_str(), "https://example.com/jobs/view/42/");
    }

    #[test]
    fn unanchored_shape_is_rejected() {
        assert!(matches!(
            KeyShape::new(r"/jobs/view/\d+"),
            Err(KeyShapeError::Unanchored(_))
        ));
    }
}
