use std::collections::HashSet;

use engine_logging::engine_debug;
use harvester_core::{CandidateKey, KeyShape};
use scraper::Html;
use url::Url;

use crate::config::Css;
use crate::{BrowsingContext, PageError, RegionHandle};

/// Pulls candidate keys out of the list region, in rendered order.
#[derive(Debug, Clone)]
pub struct LinkCollector {
    link: Css,
    shape: KeyShape,
}

impl LinkCollector {
    pub fn new(link: Css, shape: KeyShape) -> Self {
        Self { link, shape }
    }

    pub fn link_selector(&self) -> &Css {
        &self.link
    }

    pub fn shape(&self) -> &KeyShape {
        &self.shape
    }

    /// Collects from `region`, or from the whole document when there is no
    /// region or it vanished since it was located.
    pub async fn collect(
        &self,
        ctx: &mut dyn BrowsingContext,
        region: Option<&RegionHandle>,
    ) -> Result<Vec<CandidateKey>, PageError> {
        let page_url = ctx.current_url().await?;
        let region_html = match region {
            Some(handle) => ctx.region_html(handle).await?,
            None => None,
        };
        let html = match region_html {
            Some(html) => html,
            None => {
                if let Some(handle) = region {
                    engine_debug!("region {} vanished, collecting from whole page", handle);
                }
                ctx.snapshot().await?.html
            }
        };
        let base = Url::parse(&page_url).ok();
        Ok(self.collect_from_html(&html, base.as_ref()))
    }

    /// Canonical keys of every matching link in `html`; links that fail the
    /// key shape are dropped, repeats keep their first position.
    pub fn collect_from_html(&self, html: &str, base: Option<&Url>) -> Vec<CandidateKey> {
        let fragment = Html::parse_fragment(html);
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut rejected = 0usize;
        for anchor in fragment.select(self.link.selector()) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            match self.shape.normalize(href, base) {
                Some(key) => {
                    if seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }
                None => rejected += 1,
            }
        }
        if rejected > 0 {
            engine_debug!("dropped {} links outside the key shape", rejected);
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn collector() -> LinkCollector {
        LinkCollector::new(
            Css::parse("a[href*='/jobs/view/']").unwrap(),
            KeyShape::new(r"^/jobs/view/\d+").unwrap(),
        )
    }

    #[test]
    fn keeps_rendered_order_and_first_occurrence() {
        let html = r#"
            <ul>
              <li><a href="/jobs/view/30/?trk=a">c</a></li>
              <li><a href="/jobs/view/10/">a</a></li>
              <li><a href="https://example.com/jobs/view/30/">c again</a></li>
              <li><a href="/jobs/view/20">b</a></li>
              <li><a href="/jobs/view/collections/">not a posting</a></li>
              <li><a href="/company/acme/">not a candidate</a></li>
            </ul>"#;
        let base = Url::parse("https://example.com/jobs/search/").unwrap();
        let keys: Vec<String> = collector()
            .collect_from_html(html, Some(&base))
            .into_iter()
            .map(CandidateKey::into_string)
            .collect();
        assert_eq!(
            keys,
            vec![
                "https://example.com/jobs/view/30/",
                "https://example.com/jobs/view/10/",
                "https://example.com/jobs/view/20/",
            ]
        );
    }
}
