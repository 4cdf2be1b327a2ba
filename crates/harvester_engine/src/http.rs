use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_trace, engine_warn};
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::decode::decode_body;
use crate::session::{SessionArtifact, SessionCookie, SessionProvider};
use crate::{BrowsingContext, HarvestError, PageError, PageSnapshot, RegionHandle, RegionProbe};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Browsing context over plain HTTP: every `goto` is one GET and the DOM is
/// whatever the server rendered.
///
/// Scrolling does nothing, clicks never find a target, regions are
/// scrollable only through inline `overflow` styles and have no height.
pub struct HttpContext {
    client: reqwest::Client,
    settings: HttpSettings,
    redirects: Arc<AtomicUsize>,
    page: Option<PageSnapshot>,
}

impl HttpContext {
    /// Requests carry `cookies` plus whatever the server sets along the way.
    pub fn new(settings: HttpSettings, cookies: &[SessionCookie]) -> Result<Self, PageError> {
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = redirects.clone();
        let redirect_limit = settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            counter.store(count, Ordering::Relaxed);
            if count >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(policy)
            .cookie_provider(Arc::new(session_jar(cookies)))
            .build()
            .map_err(|err| PageError::Network(err.to_string()))?;

        Ok(Self {
            client,
            settings,
            redirects,
            page: None,
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> PageError {
        if err.is_timeout() {
            return PageError::NavigationTimeout(self.settings.request_timeout);
        }
        if err.is_redirect() {
            return PageError::RedirectLimitExceeded;
        }
        PageError::Network(err.to_string())
    }

    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, PageError> {
        self.redirects.store(0, Ordering::Relaxed);
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .send()
            .await
            .map_err(|err| self.map_reqwest_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::HttpStatus(status.as_u16()));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(PageError::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(content_len),
                });
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(PageError::UnsupportedContentType(ct.to_string()));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| self.map_reqwest_error(err))?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(PageError::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(next_len),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        let html = decode_body(&bytes, content_type.as_deref())?;
        engine_debug!(
            "GET {} -> {} ({} bytes, {} redirects)",
            url,
            final_url,
            bytes.len(),
            self.redirects.load(Ordering::Relaxed)
        );
        Ok(PageSnapshot {
            url: final_url,
            html,
        })
    }

    fn current(&self) -> PageSnapshot {
        self.page.clone().unwrap_or_else(|| PageSnapshot {
            url: "about:blank".to_string(),
            html: String::new(),
        })
    }
}

#[async_trait]
impl BrowsingContext for HttpContext {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        let parsed = Url::parse(url).map_err(|err| PageError::InvalidUrl(err.to_string()))?;
        let page = self.fetch(&parsed).await?;
        self.page = Some(page);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, PageError> {
        Ok(self.current().url)
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, PageError> {
        Ok(self.current())
    }

    async fn probe_regions(
        &mut self,
        candidates: &str,
        link_selector: &str,
    ) -> Result<Vec<RegionProbe>, PageError> {
        let candidates = parse_selector(candidates)?;
        let link = parse_selector(link_selector)?;
        let document = Html::parse_document(&self.current().html);
        Ok(probe_document(&document, &candidates, &link))
    }

    async fn region_html(&mut self, region: &RegionHandle) -> Result<Option<String>, PageError> {
        let selector = parse_selector(region.as_str())?;
        let document = Html::parse_document(&self.current().html);
        Ok(document.select(&selector).next().map(|element| element.html()))
    }

    async fn scroll_region(
        &mut self,
        region: &RegionHandle,
        delta_px: i64,
    ) -> Result<(), PageError> {
        engine_trace!("static page, ignoring scroll of {} by {}px", region, delta_px);
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> Result<bool, PageError> {
        Ok(false)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, PageError> {
        Err(PageError::Unsupported("screenshot"))
    }
}

fn parse_selector(source: &str) -> Result<Selector, PageError> {
    Selector::parse(source)
        .map_err(|err| PageError::Script(format!("selector {source:?} does not parse: {err}")))
}

fn probe_document(document: &Html, candidates: &Selector, link: &Selector) -> Vec<RegionProbe> {
    document
        .select(candidates)
        .filter_map(|element| {
            let link_count = element.select(link).count();
            (link_count > 0).then(|| RegionProbe {
                handle: RegionHandle::new(css_path(element)),
                scrollable: has_scrolling_style(element),
                link_count,
                visible_height: 0.0,
            })
        })
        .collect()
}

/// `html > body:nth-child(2) > div:nth-child(1)`: resolves to exactly this
/// element in the same document.
pub(crate) fn css_path(element: ElementRef) -> String {
    let mut parts = Vec::new();
    let mut current = Some(element);
    while let Some(el) = current {
        let name = el.value().name();
        let parent = el.parent().and_then(ElementRef::wrap);
        if parent.is_some() {
            let index = 1 + el.prev_siblings().filter(|n| n.value().is_element()).count();
            parts.push(format!("{name}:nth-child({index})"));
        } else {
            parts.push(name.to_string());
        }
        current = parent;
    }
    parts.reverse();
    parts.join(" > ")
}

fn has_scrolling_style(element: ElementRef) -> bool {
    let Some(style) = element.value().attr("style") else {
        return false;
    };
    style.split(';').any(|declaration| {
        let Some((property, value)) = declaration.split_once(':') else {
            return false;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        matches!(property.as_str(), "overflow" | "overflow-y")
            && (value.contains("auto") || value.contains("scroll"))
    })
}

fn session_jar(cookies: &[SessionCookie]) -> Jar {
    let jar = Jar::default();
    for cookie in cookies {
        match cookie.origin() {
            Some(origin) => jar.add_cookie_str(&cookie.set_cookie_value(), &origin),
            None => engine_warn!(
                "ignoring cookie {} with unusable domain {:?}",
                cookie.name,
                cookie.domain
            ),
        }
    }
    jar
}

/// Opens [`HttpContext`]s carrying the artifact's cookies.
#[derive(Debug, Clone, Default)]
pub struct HttpSessionProvider {
    settings: HttpSettings,
}

impl HttpSessionProvider {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    type Context = HttpContext;

    async fn launch(&self, artifact: &SessionArtifact) -> Result<HttpContext, HarvestError> {
        Ok(HttpContext::new(self.settings.clone(), artifact.cookies())?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PAGE: &str = r#"<html><head></head><body>
        <nav><a href="/jobs/view/9/">promo</a></nav>
        <div id="list" style="height: 600px; overflow-y: auto">
          <ul><li><a href="/jobs/view/1/">one</a></li><li><a href="/jobs/view/2/">two</a></li></ul>
        </div>
        </body></html>"#;

    #[test]
    fn probes_report_structural_paths_and_inline_scrolling() {
        let document = Html::parse_document(PAGE);
        let probes = probe_document(
            &document,
            &Selector::parse("div, ul").unwrap(),
            &Selector::parse("a[href*='/jobs/view/']").unwrap(),
        );
        let summary: Vec<(&str, bool, usize)> = probes
            .iter()
            .map(|p| (p.handle.as_str(), p.scrollable, p.link_count))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("html > body:nth-child(2) > div:nth-child(2)", true, 2),
                (
                    "html > body:nth-child(2) > div:nth-child(2) > ul:nth-child(1)",
                    false,
                    2
                ),
            ]
        );
    }

    #[test]
    fn structural_paths_resolve_back_to_their_element() {
        let document = Html::parse_document(PAGE);
        let list = Selector::parse("#list").unwrap();
        let element = document.select(&list).next().unwrap();
        let path = Selector::parse(&css_path(element)).unwrap();
        let found = document.select(&path).next().unwrap();
        assert_eq!(found.value().attr("id"), Some("list"));
    }
}
