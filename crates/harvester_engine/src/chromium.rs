use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use url::Url;

use crate::session::{SessionArtifact, SessionCookie, SessionProvider};
use crate::{BrowsingContext, HarvestError, PageError, PageSnapshot, RegionHandle, RegionProbe};

#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Falls back to chromiumoxide's executable detection when unset.
    pub executable: Option<PathBuf>,
    pub launch_timeout: Duration,
}

impl Default for ChromiumSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 900,
            executable: None,
            launch_timeout: Duration::from_secs(20),
        }
    }
}

/// One Chromium tab driven over CDP.
///
/// Call [`ChromiumContext::close`] when done. Dropping the context without
/// closing it schedules the close on the current runtime.
pub struct ChromiumContext {
    browser: Option<Browser>,
    page: Page,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumContext {
    pub async fn launch(
        settings: &ChromiumSettings,
        cookies: &[SessionCookie],
    ) -> Result<Self, HarvestError> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .launch_timeout(settings.launch_timeout);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(HarvestError::Launch)?;

        let (mut browser, mut events) = Browser::launch(config)
            .await
            .map_err(|err| HarvestError::Launch(err.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    engine_trace!("cdp handler: {}", err);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(HarvestError::Launch(err.to_string()));
            }
        };
        let mut ctx = Self {
            browser: Some(browser),
            page,
            handler: Some(handler),
        };
        ctx.install_cookies(cookies).await?;
        engine_info!(
            "chromium ready ({}, {} cookies)",
            if settings.headless { "headless" } else { "headed" },
            cookies.len()
        );
        Ok(ctx)
    }

    async fn install_cookies(&mut self, cookies: &[SessionCookie]) -> Result<(), HarvestError> {
        let params = cookies
            .iter()
            .map(|cookie| {
                CookieParam::builder()
                    .name(cookie.name.clone())
                    .value(cookie.value.clone())
                    .domain(cookie.domain.clone())
                    .path(cookie.path.clone())
                    .secure(cookie.secure)
                    .http_only(cookie.http_only)
                    .build()
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(HarvestError::Launch)?;
        if params.is_empty() {
            return Ok(());
        }
        self.page
            .set_cookies(params)
            .await
            .map_err(|err| HarvestError::Launch(format!("installing cookies: {err}")))?;
        Ok(())
    }

    /// Closes the browser and waits for the process to exit.
    pub async fn close(mut self) -> Result<(), PageError> {
        let result = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                let _ = browser.wait().await;
                closed.map_err(|err| PageError::Network(err.to_string()))
            }
            None => Ok(()),
        };
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        engine_debug!("chromium closed");
        result
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, PageError> {
        self.page
            .evaluate_expression(script)
            .await
            .map_err(|err| PageError::Script(err.to_string()))?
            .into_value()
            .map_err(|err| PageError::Script(err.to_string()))
    }
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let handler = self.handler.take();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = browser.close().await {
                        engine_warn!("closing chromium on drop failed: {}", err);
                    }
                    let _ = browser.wait().await;
                    if let Some(handler) = handler {
                        handler.abort();
                    }
                });
            }
            Err(_) => {
                if let Some(handler) = handler {
                    handler.abort();
                }
            }
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Builds the same `html > tag:nth-child(n)` paths as the static backend.
const CSS_PATH_FN: &str = r#"
const cssPath = (el) => {
  const parts = [];
  while (el && el !== document.documentElement) {
    const parent = el.parentElement;
    if (!parent) break;
    const index = Array.prototype.indexOf.call(parent.children, el) + 1;
    parts.unshift(el.localName + ':nth-child(' + index + ')');
    el = parent;
  }
  parts.unshift('html');
  return parts.join(' > ');
};
"#;

#[async_trait]
impl BrowsingContext for ChromiumContext {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        Url::parse(url).map_err(|err| PageError::InvalidUrl(err.to_string()))?;
        self.page
            .goto(url)
            .await
            .map_err(|err| PageError::Navigation(err.to_string()))?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, PageError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|err| PageError::Script(err.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, PageError> {
        let url = self.current_url().await?;
        let html = self
            .page
            .content()
            .await
            .map_err(|err| PageError::Script(err.to_string()))?;
        Ok(PageSnapshot { url, html })
    }

    async fn probe_regions(
        &mut self,
        candidates: &str,
        link_selector: &str,
    ) -> Result<Vec<RegionProbe>, PageError> {
        let script = format!(
            r#"(() => {{
{CSS_PATH_FN}
  const scrolls = (el) => {{
    if (el.scrollHeight <= el.clientHeight) return false;
    if (el === document.scrollingElement) return true;
    return /(auto|scroll|overlay)/.test(getComputedStyle(el).overflowY);
  }};
  return Array.from(document.querySelectorAll({candidates}))
    .map((el) => {{
      const linkCount = el.querySelectorAll({link}).length;
      if (linkCount === 0) return null;
      return {{
        handle: cssPath(el),
        scrollable: scrolls(el),
        linkCount,
        visibleHeight: el.getBoundingClientRect().height,
      }};
    }})
    .filter(Boolean);
}})()"#,
            candidates = js_string(candidates),
            link = js_string(link_selector),
        );
        self.eval(script).await
    }

    async fn region_html(&mut self, region: &RegionHandle) -> Result<Option<String>, PageError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.outerHTML : null; }})()",
            js_string(region.as_str())
        );
        self.eval(script).await
    }

    async fn scroll_region(
        &mut self,
        region: &RegionHandle,
        delta_px: i64,
    ) -> Result<(), PageError> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelector({selector}) || document.scrollingElement;
  if (!el) return false;
  if (el === document.documentElement || el === document.body) {{
    window.scrollBy(0, {delta});
  }} else {{
    el.scrollTop = el.scrollTop + {delta};
  }}
  return true;
}})()"#,
            selector = js_string(region.as_str()),
            delta = delta_px,
        );
        let scrolled: bool = self.eval(script).await?;
        if !scrolled {
            engine_debug!("nothing to scroll for {}", region);
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<bool, PageError> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelector({});
  if (!el) return false;
  el.scrollIntoView({{ block: 'center' }});
  el.click();
  return true;
}})()"#,
            js_string(selector)
        );
        self.eval(script).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, PageError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|err| PageError::Script(err.to_string()))
    }
}

/// Opens [`ChromiumContext`]s seeded with the artifact's cookies.
#[derive(Debug, Clone, Default)]
pub struct ChromiumSessionProvider {
    settings: ChromiumSettings,
}

impl ChromiumSessionProvider {
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionProvider for ChromiumSessionProvider {
    type Context = ChromiumContext;

    async fn launch(&self, artifact: &SessionArtifact) -> Result<ChromiumContext, HarvestError> {
        ChromiumContext::launch(&self.settings, artifact.cookies()).await
    }
}
