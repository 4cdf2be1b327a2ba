use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use engine_logging::{engine_debug, engine_warn};
use harvester_core::{CandidateKey, PostingRecord};
use scraper::Html;

use crate::config::{ConfigError, Css, DetailSelectors};
use crate::poll::{navigate_within, poll_until_or_deadline};
use crate::text::{truncate_chars, visible_text};
use crate::{BrowsingContext, PageError, PollPolicy};

/// Visits one detail page and reads a best-effort record from it.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    ready: Vec<Css>,
    title: Vec<Css>,
    organization: Vec<Css>,
    description: Vec<Css>,
    show_more: Vec<Css>,
    main_content: Vec<Css>,
    posted_date: Vec<Css>,
    min_description_chars: usize,
    fallback_chars: usize,
    navigation_timeout: Duration,
    ready_wait: PollPolicy,
    expand_settle: Duration,
}

impl DetailExtractor {
    pub fn new(
        selectors: &DetailSelectors,
        navigation_timeout: Duration,
        ready_wait: PollPolicy,
        expand_settle: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ready: Css::parse_all(&selectors.ready)?,
            title: Css::parse_all(&selectors.title)?,
            organization: Css::parse_all(&selectors.organization)?,
            description: Css::parse_all(&selectors.description)?,
            show_more: Css::parse_all(&selectors.show_more)?,
            main_content: Css::parse_all(&selectors.main_content)?,
            posted_date: Css::parse_all(&selectors.posted_date)?,
            min_description_chars: selectors.min_description_chars,
            fallback_chars: selectors.fallback_chars,
            navigation_timeout,
            ready_wait,
            expand_settle,
        })
    }

    /// Only the navigation itself can fail; everything after it degrades to
    /// empty fields.
    pub async fn extract(
        &self,
        ctx: &mut dyn BrowsingContext,
        key: &CandidateKey,
    ) -> Result<PostingRecord, PageError> {
        navigate_within(ctx, key.as_str(), self.navigation_timeout).await?;

        let ready = poll_until_or_deadline(ctx, self.ready_wait, |snapshot| {
            let document = Html::parse_document(&snapshot.html);
            self.ready
                .iter()
                .any(|css| document.select(css.selector()).next().is_some())
                .then_some(())
        })
        .await;
        if ready.is_none() {
            engine_debug!("title region never appeared on {}", key);
        }

        if self.expand_description(ctx).await && !self.expand_settle.is_zero() {
            tokio::time::sleep(self.expand_settle).await;
        }

        match ctx.snapshot().await {
            Ok(snapshot) => Ok(self.read_record(&snapshot.html, key)),
            Err(err) => {
                engine_warn!("could not read {}: {}", key, err);
                Ok(PostingRecord::empty(key.clone()))
            }
        }
    }

    async fn expand_description(&self, ctx: &mut dyn BrowsingContext) -> bool {
        for css in &self.show_more {
            match ctx.click(css.as_str()).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => engine_debug!("show-more {:?} failed: {}", css.as_str(), err),
            }
        }
        false
    }

    /// Reads every field independently from a rendered detail page.
    pub fn read_record(&self, html: &str, key: &CandidateKey) -> PostingRecord {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.title);
        let organization = first_text(&document, &self.organization);
        let mut description = first_text(&document, &self.description);
        if description.chars().count() < self.min_description_chars {
            let fallback = first_text(&document, &self.main_content);
            let fallback = truncate_chars(&fallback, self.fallback_chars);
            if fallback.chars().count() > description.chars().count() {
                engine_debug!("description of {} taken from main content", key);
                description = fallback.to_string();
            }
        }
        let posted_date = self
            .posted_date
            .iter()
            .flat_map(|css| document.select(css.selector()))
            .filter_map(|el| el.value().attr("datetime"))
            .find_map(machine_date);

        PostingRecord {
            title,
            organization,
            description,
            posted_date,
            ..PostingRecord::empty(key.clone())
        }
    }
}

/// Text of the first selector that yields a non-empty element.
fn first_text(document: &Html, selectors: &[Css]) -> String {
    selectors
        .iter()
        .flat_map(|css| document.select(css.selector()))
        .map(visible_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Accepts RFC 3339 timestamps, naive date-times and plain ISO dates.
/// Anything fuzzier ("3 days ago") yields `None`.
fn machine_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_dates_only() {
        assert_eq!(machine_date("2024-03-05"), Some("2024-03-05".into()));
        assert_eq!(
            machine_date("2024-03-05T23:10:00+02:00"),
            Some("2024-03-05".into())
        );
        assert_eq!(machine_date("2024-03-05T08:00:00"), Some("2024-03-05".into()));
        assert_eq!(machine_date("3 days ago"), None);
        assert_eq!(machine_date(""), None);
    }
}
