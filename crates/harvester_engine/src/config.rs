use std::path::PathBuf;
use std::time::Duration;

use harvester_core::{FilterError, HarvestLimits, KeyShapeError, LimitsError};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

/// Durations travel as integer milliseconds in config files.
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("list_root_url is not set")]
    MissingListRoot,
    #[error("list_root_url {0:?} is not an absolute http(s) url")]
    InvalidListRoot(String),
    #[error("navigation timeout {navigation:?} must be shorter than the harvest budget {budget:?}")]
    NavigationNotShorterThanBudget { navigation: Duration, budget: Duration },
    #[error("{0} poll interval must be greater than zero")]
    ZeroPollInterval(&'static str),
    #[error("link selector is empty")]
    EmptyLinkSelector,
    #[error("selector {selector:?} does not parse: {message}")]
    Selector { selector: String, message: String },
    #[error(transparent)]
    KeyShape(#[from] KeyShapeError),
    #[error(transparent)]
    Limits(#[from] LimitsError),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// A CSS selector kept together with its source text, so it can be handed
/// to a live browser and evaluated locally against snapshots.
#[derive(Debug, Clone)]
pub struct Css {
    source: String,
    selector: Selector,
}

impl Css {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let selector = Selector::parse(source).map_err(|err| ConfigError::Selector {
            selector: source.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    pub fn parse_all(sources: &[String]) -> Result<Vec<Self>, ConfigError> {
        sources.iter().map(|s| Css::parse(s)).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

/// A bounded polling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(with = "millis")]
    pub window: Duration,
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn new(window: Duration, interval: Duration) -> Self {
        Self { window, interval }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub list_root_url: String,
    pub limits: HarvestLimits,
    #[serde(with = "millis")]
    pub harvest_budget: Duration,
    #[serde(with = "millis")]
    pub navigation_timeout: Duration,
    pub block_poll: PollPolicy,
    pub detail_ready: PollPolicy,
    /// Pause after a "show more" click before the description is read.
    #[serde(with = "millis")]
    pub expand_settle: Duration,
    pub scroll_delta_px: i64,
    /// Pause after scrolling so a virtualized list can render its next rows.
    #[serde(with = "millis")]
    pub scroll_settle: Duration,
    /// Where blocked/timeout captures go; `None` disables capturing.
    pub diagnostics_dir: Option<PathBuf>,
    pub markup: MarkupProfile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            list_root_url: String::new(),
            limits: HarvestLimits::default(),
            harvest_budget: Duration::from_secs(600),
            navigation_timeout: Duration::from_secs(30),
            block_poll: PollPolicy::new(Duration::from_secs(30), Duration::from_millis(400)),
            detail_ready: PollPolicy::new(Duration::from_secs(8), Duration::from_millis(250)),
            expand_settle: Duration::from_millis(300),
            scroll_delta_px: 1200,
            scroll_settle: Duration::from_millis(1200),
            diagnostics_dir: None,
            markup: MarkupProfile::default(),
        }
    }
}

impl EngineConfig {
    /// Checks everything that does not need a selector engine; selectors and
    /// the key shape are checked when the governor compiles them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        let root = self.list_root_url.trim();
        if root.is_empty() {
            return Err(ConfigError::MissingListRoot);
        }
        match Url::parse(root) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidListRoot(root.to_string())),
        }
        if self.navigation_timeout >= self.harvest_budget {
            return Err(ConfigError::NavigationNotShorterThanBudget {
                navigation: self.navigation_timeout,
                budget: self.harvest_budget,
            });
        }
        if self.block_poll.interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval("block"));
        }
        if self.detail_ready.interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval("detail"));
        }
        if self.markup.link_selector.trim().is_empty() {
            return Err(ConfigError::EmptyLinkSelector);
        }
        Ok(())
    }
}

/// Everything that depends on the catalog's markup. Markup drift is absorbed
/// by editing this table, not the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupProfile {
    /// Known containers of the result list, most specific first.
    pub list_hints: Vec<String>,
    pub link_selector: String,
    /// Regex anchored at the URL path start; see `KeyShape`.
    pub key_shape: String,
    pub heuristic: HeuristicWeights,
    pub block: BlockMarkers,
    pub detail: DetailSelectors,
}

impl Default for MarkupProfile {
    fn default() -> Self {
        Self {
            list_hints: strings(&[
                "[data-results-list]",
                ".jobs-search-results-list",
                ".scaffold-layout__list",
                "main [role='list']",
            ]),
            link_selector: "a[href*='/jobs/view/']".to_string(),
            key_shape: r"^/jobs/view/\d+".to_string(),
            heuristic: HeuristicWeights::default(),
            block: BlockMarkers::default(),
            detail: DetailSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    pub link_weight: f64,
    pub height_cap: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            link_weight: 100.0,
            height_cap: 2000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMarkers {
    /// Elements that only appear on interstitial, verification or login pages.
    pub selectors: Vec<String>,
    /// Case-insensitive fragments of the current URL with the same meaning.
    pub url_fragments: Vec<String>,
}

impl Default for BlockMarkers {
    fn default() -> Self {
        Self {
            selectors: strings(&[
                "#captcha-internal",
                "iframe[src*='captcha']",
                "form[action*='checkpoint']",
                "[data-authwall]",
                "input[type='password']",
            ]),
            url_fragments: strings(&["/checkpoint/", "/authwall", "/login", "/challenge"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    /// Any of these present means the detail page has rendered its title.
    pub ready: Vec<String>,
    pub title: Vec<String>,
    pub organization: Vec<String>,
    pub description: Vec<String>,
    pub show_more: Vec<String>,
    pub main_content: Vec<String>,
    pub posted_date: Vec<String>,
    pub min_description_chars: usize,
    pub fallback_chars: usize,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            ready: strings(&["[data-posting-title]", ".top-card-layout__title", "h1"]),
            title: strings(&[
                "[data-posting-title]",
                ".job-details__title h1",
                ".top-card-layout__title",
                "h1",
            ]),
            organization: strings(&[
                "[data-posting-company]",
                ".job-details__company-name a",
                ".topcard__org-name-link",
                ".job-details__company-name",
            ]),
            description: strings(&[
                "[data-posting-description]",
                ".jobs-description__content",
                ".description__text",
                "#job-details",
            ]),
            show_more: strings(&[
                "button.show-more-less-html__button",
                "button.jobs-description__footer-button",
                "button[aria-label*='more']",
            ]),
            main_content: strings(&["main", "[role='main']", "article", "body"]),
            posted_date: strings(&["time[datetime]"]),
            min_description_chars: 50,
            fallback_chars: 4000,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
