#![allow(dead_code)]

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use harvester_core::{ContentFilter, FilterConfig, PatternFilter};
use harvester_engine::{
    BrowsingContext, EngineConfig, PageError, PageSnapshot, PollPolicy, RegionHandle, RegionProbe,
};
use tokio::time::sleep;
use url::Url;

pub const ROOT: &str = "https://jobs.test/jobs/search/?keywords=rust";
pub const LIST_REGION: &str = "#results";

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}

pub struct Posting {
    pub id: u32,
    pub title: String,
    pub organization: String,
    pub description: String,
}

pub fn posting(id: u32, title: &str, description: &str) -> Posting {
    Posting {
        id,
        title: title.to_string(),
        organization: format!("Company {id}"),
        description: description.to_string(),
    }
}

/// `count` postings that pass [`rust_remote_filter`].
pub fn matching_postings(count: u32) -> Vec<Posting> {
    (1..=count)
        .map(|id| {
            posting(
                id,
                &format!("Rust developer #{id}"),
                "Build services in Rust. The role is fully remote within the EU.",
            )
        })
        .collect()
}

pub fn detail_url(id: u32) -> String {
    format!("https://jobs.test/jobs/view/{id}/")
}

enum Page {
    Blank,
    Root { blocked: bool },
    Detail(u32),
    Missing(String),
}

/// In-memory catalog behaving like a virtualized result list: scrolling
/// shifts a window of `page_size` rows, every navigation resets the scroll
/// position, and every row renders its link twice with tracking parameters.
pub struct ScriptedCatalog {
    postings: Vec<Posting>,
    page_size: usize,
    row_px: i64,
    offset: i64,
    page: Page,
    root_loads: usize,
    /// Root loads from this one (1-based) on show a verification challenge.
    pub block_from_root_load: Option<usize>,
    /// The first this-many root loads fail.
    pub failing_root_loads: usize,
    /// Root loads (1-based) that fail individually.
    pub failing_root_load_numbers: HashSet<usize>,
    /// Detail pages that never finish loading.
    pub hanging_details: HashSet<u32>,
    /// Added to every navigation.
    pub goto_delay: Duration,
    pub detail_requests: Vec<u32>,
    pub listing_reads: usize,
    pub region_probes: usize,
}

impl ScriptedCatalog {
    pub fn new(postings: Vec<Posting>, page_size: usize) -> Self {
        Self {
            postings,
            page_size,
            row_px: 100,
            offset: 0,
            page: Page::Blank,
            root_loads: 0,
            block_from_root_load: None,
            failing_root_loads: 0,
            failing_root_load_numbers: HashSet::new(),
            hanging_details: HashSet::new(),
            goto_delay: Duration::ZERO,
            detail_requests: Vec::new(),
            listing_reads: 0,
            region_probes: 0,
        }
    }

    pub fn root_loads(&self) -> usize {
        self.root_loads
    }

    fn visible(&self) -> &[Posting] {
        let len = self.postings.len();
        let start = usize::try_from(self.offset / self.row_px)
            .unwrap_or(0)
            .min(len.saturating_sub(self.page_size));
        let end = (start + self.page_size).min(len);
        &self.postings[start..end]
    }

    fn list_html(&self) -> String {
        let rows: String = self
            .visible()
            .iter()
            .map(|p| {
                format!(
                    r#"<li><a href="https://jobs.test/jobs/view/{id}/?refId=abc"><img alt=""></a><a href="/jobs/view/{id}/?trk=title">{title}</a></li>"#,
                    id = p.id,
                    title = p.title
                )
            })
            .collect();
        format!(
            r#"<div id="results" data-results-list style="overflow-y: auto"><ul>{rows}</ul></div>"#
        )
    }

    fn render(&self) -> String {
        match &self.page {
            Page::Blank => "<html><head></head><body></body></html>".to_string(),
            Page::Root { blocked } => {
                let challenge = if *blocked {
                    r#"<div id="captcha-internal">Let's do a quick security check</div>"#
                } else {
                    ""
                };
                format!(
                    r#"<html><head><title>Jobs</title></head><body>
<header><a href="/feed/">Home</a></header>
{challenge}
<aside><a href="https://jobs.test/jobs/view/999/">Promoted</a></aside>
{list}
</body></html>"#,
                    list = self.list_html()
                )
            }
            Page::Detail(id) => {
                let Some(p) = self.postings.iter().find(|p| p.id == *id) else {
                    return String::new();
                };
                format!(
                    r#"<html><head></head><body><main>
<div class="job-details__title"><h1 data-posting-title>{title}</h1></div>
<div data-posting-company>{organization}</div>
<time datetime="2024-05-01T09:00:00Z">3 days ago</time>
<div data-posting-description><p>{description}</p></div>
</main></body></html>"#,
                    title = p.title,
                    organization = p.organization,
                    description = p.description
                )
            }
            Page::Missing(_) => "<html><body><h2>Page not found</h2></body></html>".to_string(),
        }
    }

    fn url(&self) -> String {
        match &self.page {
            Page::Blank => "about:blank".to_string(),
            Page::Root { .. } => ROOT.to_string(),
            Page::Detail(id) => detail_url(*id),
            Page::Missing(url) => url.clone(),
        }
    }
}

fn detail_id(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    match (segments.next(), segments.next(), segments.next()) {
        (Some("jobs"), Some("view"), Some(id)) => id.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl BrowsingContext for ScriptedCatalog {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        if !self.goto_delay.is_zero() {
            sleep(self.goto_delay).await;
        }
        if url == ROOT {
            self.root_loads += 1;
            if self.root_loads <= self.failing_root_loads
                || self.failing_root_load_numbers.contains(&self.root_loads)
            {
                return Err(PageError::Navigation("connection reset".into()));
            }
            self.offset = 0;
            let blocked = self
                .block_from_root_load
                .is_some_and(|first| self.root_loads >= first);
            self.page = Page::Root { blocked };
            return Ok(());
        }
        if let Some(id) = detail_id(url) {
            self.detail_requests.push(id);
            if self.hanging_details.contains(&id) {
                sleep(Duration::from_secs(3600)).await;
            }
            self.offset = 0;
            self.page = if self.postings.iter().any(|p| p.id == id) {
                Page::Detail(id)
            } else {
                Page::Missing(url.to_string())
            };
            return Ok(());
        }
        self.page = Page::Missing(url.to_string());
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, PageError> {
        Ok(self.url())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, PageError> {
        Ok(PageSnapshot {
            url: self.url(),
            html: self.render(),
        })
    }

    async fn probe_regions(
        &mut self,
        _candidates: &str,
        _link_selector: &str,
    ) -> Result<Vec<RegionProbe>, PageError> {
        self.region_probes += 1;
        if !matches!(self.page, Page::Root { .. }) {
            return Ok(Vec::new());
        }
        Ok(vec![RegionProbe {
            handle: RegionHandle::new(LIST_REGION),
            scrollable: true,
            link_count: self.visible().len() * 2,
            visible_height: 600.0,
        }])
    }

    async fn region_html(&mut self, region: &RegionHandle) -> Result<Option<String>, PageError> {
        self.listing_reads += 1;
        if matches!(self.page, Page::Root { .. }) && region.as_str() == LIST_REGION {
            Ok(Some(self.list_html()))
        } else {
            Ok(None)
        }
    }

    async fn scroll_region(
        &mut self,
        _region: &RegionHandle,
        delta_px: i64,
    ) -> Result<(), PageError> {
        if matches!(self.page, Page::Root { .. }) {
            self.offset = (self.offset + delta_px).max(0);
        }
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> Result<bool, PageError> {
        Ok(false)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, PageError> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

/// Short waits, one row revealed per scroll step, no settling pauses.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        list_root_url: ROOT.to_string(),
        harvest_budget: Duration::from_secs(600),
        navigation_timeout: Duration::from_secs(5),
        block_poll: PollPolicy::new(Duration::from_secs(2), Duration::from_millis(100)),
        detail_ready: PollPolicy::new(Duration::from_secs(1), Duration::from_millis(100)),
        expand_settle: Duration::ZERO,
        scroll_delta_px: 100,
        scroll_settle: Duration::ZERO,
        ..EngineConfig::default()
    }
}

/// Topic A is "rust", topic B is "remote" or "hybrid".
pub fn rust_remote_filter() -> Box<dyn ContentFilter> {
    Box::new(
        PatternFilter::from_config(&FilterConfig {
            topic_a: vec!["rust".into()],
            topic_b: vec!["remote".into(), "hybrid".into()],
        })
        .unwrap(),
    )
}
