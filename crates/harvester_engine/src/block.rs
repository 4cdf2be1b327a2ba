use engine_logging::{engine_debug, engine_warn};
use scraper::Html;

use crate::config::{BlockMarkers, ConfigError, Css};
use crate::poll::poll_until_or_deadline;
use crate::{BlockCause, BrowsingContext, PageSnapshot, PollPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockVerdict {
    Clear,
    /// `marker` names what was seen, or that nothing usable rendered in time.
    Blocked { cause: BlockCause, marker: String },
}

/// Decides whether the session is looking at the catalog or at an
/// interstitial (verification, re-login, challenge).
#[derive(Debug, Clone)]
pub struct BlockDetector {
    block_selectors: Vec<Css>,
    url_fragments: Vec<String>,
    link: Css,
    policy: PollPolicy,
}

impl BlockDetector {
    pub fn new(markers: &BlockMarkers, link: Css, policy: PollPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            block_selectors: Css::parse_all(&markers.selectors)?,
            url_fragments: markers
                .url_fragments
                .iter()
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
            link,
            policy,
        })
    }

    /// Polls the page until a verdict is reachable. A window that closes
    /// with neither a block marker nor a candidate link counts as blocked.
    pub async fn check(&self, ctx: &mut dyn BrowsingContext) -> BlockVerdict {
        let verdict = poll_until_or_deadline(ctx, self.policy, |snapshot| self.classify(snapshot))
            .await
            .unwrap_or_else(|| BlockVerdict::Blocked {
                cause: BlockCause::NothingRecognized,
                marker: format!(
                    "no candidate link rendered within {:?}",
                    self.policy.window
                ),
            });
        match &verdict {
            BlockVerdict::Clear => engine_debug!("block check clear"),
            BlockVerdict::Blocked { marker, .. } => engine_warn!("block check failed: {}", marker),
        }
        verdict
    }

    /// One look at a snapshot. Block markers win over candidate links.
    pub fn classify(&self, snapshot: &PageSnapshot) -> Option<BlockVerdict> {
        let url = snapshot.url.to_lowercase();
        if let Some(fragment) = self.url_fragments.iter().find(|f| url.contains(f.as_str())) {
            return Some(BlockVerdict::Blocked {
                cause: BlockCause::Interstitial,
                marker: format!("url contains {fragment:?}"),
            });
        }

        let document = Html::parse_document(&snapshot.html);
        if let Some(css) = self
            .block_selectors
            .iter()
            .find(|css| document.select(css.selector()).next().is_some())
        {
            return Some(BlockVerdict::Blocked {
                cause: BlockCause::Interstitial,
                marker: format!("page shows {:?}", css.as_str()),
            });
        }
        if document.select(self.link.selector()).next().is_some() {
            return Some(BlockVerdict::Clear);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn detector() -> BlockDetector {
        BlockDetector::new(
            &BlockMarkers::default(),
            Css::parse("a[href*='/jobs/view/']").unwrap(),
            PollPolicy::new(Duration::from_millis(10), Duration::from_millis(1)),
        )
        .unwrap()
    }

    fn snapshot(url: &str, body: &str) -> PageSnapshot {
        PageSnapshot {
            url: url.into(),
            html: format!("<html><body>{body}</body></html>"),
        }
    }

    #[test]
    fn links_without_markers_are_clear() {
        let verdict = detector().classify(&snapshot(
            "https://example.com/jobs/search/",
            r#"<a href="/jobs/view/1/">one</a>"#,
        ));
        assert_eq!(verdict, Some(BlockVerdict::Clear));
    }

    #[test]
    fn marker_wins_over_links() {
        let verdict = detector().classify(&snapshot(
            "https://example.com/jobs/search/",
            r#"<a href="/jobs/view/1/">one</a><iframe src="https://captcha.example/x"></iframe>"#,
        ));
        assert!(matches!(verdict, Some(BlockVerdict::Blocked { .. })));
    }

    #[test]
    fn login_urls_are_blocked_regardless_of_content() {
        let verdict = detector().classify(&snapshot(
            "https://example.com/Login?session_redirect=x",
            r#"<a href="/jobs/view/1/">one</a>"#,
        ));
        assert!(matches!(verdict, Some(BlockVerdict::Blocked { .. })));
    }

    #[test]
    fn empty_pages_are_undecided() {
        assert_eq!(
            detector().classify(&snapshot("https://example.com/jobs/search/", "<p>loading</p>")),
            None
        );
    }
}
