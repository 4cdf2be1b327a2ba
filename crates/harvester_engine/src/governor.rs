use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn, set_harvest_round};
use harvester_core::{
    CandidateKey, ContentFilter, HarvestLimits, HarvestState, KeyShape, RoundVerdict, StopReason,
};
use tokio::time::{sleep, timeout, Instant};

use crate::block::{BlockDetector, BlockVerdict};
use crate::config::{ConfigError, Css, EngineConfig};
use crate::detail::DetailExtractor;
use crate::diagnostics;
use crate::links::LinkCollector;
use crate::locate::ListLocator;
use crate::poll::navigate_within;
use crate::{BlockPhase, BrowsingContext, HarvestError, HarvestReport, RegionHandle};

/// Drives one harvest: INIT, then rounds of LISTING and per-candidate DETAIL
/// visits, until DONE or ABORTED.
///
/// Each round collects the visible candidate links, visits the unseen ones
/// (marking them seen first, so a fault mid-visit never causes a second
/// visit), returns to the list root after every visit, and finally checks
/// for blocks, scrolls the list and updates the stagnation counter.
pub struct HarvestGovernor {
    root_url: String,
    limits: HarvestLimits,
    budget: Duration,
    navigation_timeout: Duration,
    scroll_delta_px: i64,
    scroll_settle: Duration,
    diagnostics_dir: Option<PathBuf>,
    block: BlockDetector,
    locator: ListLocator,
    links: LinkCollector,
    detail: DetailExtractor,
    filter: Box<dyn ContentFilter>,
}

impl HarvestGovernor {
    pub fn new(config: &EngineConfig, filter: Box<dyn ContentFilter>) -> Result<Self, ConfigError> {
        config.validate()?;
        let markup = &config.markup;
        let link = Css::parse(&markup.link_selector)?;
        let shape = KeyShape::new(&markup.key_shape)?;

        Ok(Self {
            root_url: config.list_root_url.trim().to_string(),
            limits: config.limits,
            budget: config.harvest_budget,
            navigation_timeout: config.navigation_timeout,
            scroll_delta_px: config.scroll_delta_px,
            scroll_settle: config.scroll_settle,
            diagnostics_dir: config.diagnostics_dir.clone(),
            block: BlockDetector::new(&markup.block, link.clone(), config.block_poll)?,
            locator: ListLocator::from_profile(markup),
            links: LinkCollector::new(link, shape),
            detail: DetailExtractor::new(
                &markup.detail,
                config.navigation_timeout,
                config.detail_ready,
                config.expand_settle,
            )?,
            filter,
        })
    }

    /// Replaces the default hint-then-heuristic locator chain.
    pub fn with_locator(mut self, locator: ListLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Runs a harvest against `ctx` under the global budget.
    ///
    /// On budget exhaustion the records collected so far travel inside
    /// [`HarvestError::Timeout`]; every other fatal fault discards them.
    pub async fn harvest(
        &self,
        ctx: &mut dyn BrowsingContext,
    ) -> Result<HarvestReport, HarvestError> {
        let started = Instant::now();
        let mut state = HarvestState::new(self.limits);
        set_harvest_round(0);
        engine_info!("INIT: harvesting {} (budget {:?})", self.root_url, self.budget);

        let outcome = timeout(self.budget, self.drive(ctx, &mut state, started)).await;
        match outcome {
            Ok(Ok(stop_reason)) => {
                let report = HarvestReport {
                    stop_reason,
                    rounds: state.round_index(),
                    visited: state.seen_count(),
                    elapsed: started.elapsed(),
                    records: state.into_results(),
                };
                engine_info!(
                    "DONE({}): {} records from {} visits in {} rounds, {:?}",
                    report.stop_reason,
                    report.records.len(),
                    report.visited,
                    report.rounds,
                    report.elapsed
                );
                Ok(report)
            }
            Ok(Err(HarvestError::Timeout { .. })) | Err(_) => Err(self.timed_out(ctx, state).await),
            Ok(Err(err)) => {
                engine_error!("ABORTED: {}", err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        ctx: &mut dyn BrowsingContext,
        state: &mut HarvestState,
        started: Instant,
    ) -> Result<StopReason, HarvestError> {
        let link_selector = self.links.link_selector().as_str();
        let mut at_root = self.return_to_root(ctx).await;
        let mut cleared_once = false;
        if at_root {
            self.ensure_clear(ctx, BlockPhase::Initial).await?;
            cleared_once = true;
        }
        let mut scroll_depth: i64 = 0;

        loop {
            set_harvest_round(state.round_index());
            self.check_budget(started)?;

            if !at_root {
                // The list root did not load: a round without progress.
                if let RoundVerdict::Done(reason) = state.close_failed_round() {
                    return Ok(reason);
                }
                scroll_depth = 0;
                at_root = self.return_to_root(ctx).await;
                if at_root {
                    let phase = if cleared_once {
                        BlockPhase::MidRun
                    } else {
                        BlockPhase::Initial
                    };
                    self.ensure_clear(ctx, phase).await?;
                    cleared_once = true;
                }
                continue;
            }

            let region = self.locator.locate(ctx, link_selector).await;
            let collected = match self.links.collect(ctx, region.as_ref()).await {
                Ok(keys) => keys,
                Err(err) => {
                    engine_warn!("link collection failed: {}", err);
                    Vec::new()
                }
            };
            let fresh = state.unseen(&collected);
            engine_info!(
                "LISTING: {} candidate links, {} unseen, {} records so far",
                collected.len(),
                fresh.len(),
                state.results().len()
            );

            let mut visited_this_round = 0usize;
            for key in fresh {
                if state.cap_reached() {
                    return Ok(StopReason::MaxResults);
                }
                self.check_budget(started)?;

                state.mark_dispatched(key.clone());
                visited_this_round += 1;
                self.visit(ctx, state, &key).await;

                if !self.return_to_root(ctx).await {
                    at_root = false;
                    break;
                }
            }
            if !at_root {
                continue;
            }

            if state.cap_reached() {
                return Ok(StopReason::MaxResults);
            }
            self.ensure_clear(ctx, BlockPhase::MidRun).await?;

            // Returning to the root resets the list's scroll position; scroll
            // back to the previous depth before advancing.
            let distance = if visited_this_round > 0 {
                scroll_depth + self.scroll_delta_px
            } else {
                self.scroll_delta_px
            };
            scroll_depth += self.scroll_delta_px;
            let fresh_after_scroll = self.scroll_and_recount(ctx, state, distance).await;

            match state.close_round(fresh_after_scroll) {
                RoundVerdict::Continue => engine_debug!(
                    "round closed: seen={} stagnation={}",
                    state.seen_count(),
                    state.stagnation_counter()
                ),
                RoundVerdict::Done(reason) => return Ok(reason),
            }
        }
    }

    /// DETAIL: extract, filter, keep. Faults here only skip the candidate.
    async fn visit(
        &self,
        ctx: &mut dyn BrowsingContext,
        state: &mut HarvestState,
        key: &CandidateKey,
    ) {
        engine_debug!("DETAIL {}", key);
        let record = match self.detail.extract(ctx, key).await {
            Ok(record) => record,
            Err(err) => {
                engine_warn!("skipping {}: {}", key, err);
                return;
            }
        };
        if !self.filter.accepts(&record) {
            engine_debug!("{} is not relevant", key);
            return;
        }
        if state.accept(record) {
            engine_info!(
                "accepted {} ({}/{})",
                key,
                state.results().len(),
                self.limits.max_results
            );
        }
    }

    async fn scroll_and_recount(
        &self,
        ctx: &mut dyn BrowsingContext,
        state: &HarvestState,
        distance: i64,
    ) -> usize {
        let link_selector = self.links.link_selector().as_str();
        let region = self.locator.locate(ctx, link_selector).await;
        let target = region
            .clone()
            .unwrap_or_else(|| RegionHandle::new("html"));
        if let Err(err) = ctx.scroll_region(&target, distance).await {
            engine_warn!("scrolling {} failed: {}", target, err);
        }
        if !self.scroll_settle.is_zero() {
            sleep(self.scroll_settle).await;
        }
        match self.links.collect(ctx, region.as_ref()).await {
            Ok(keys) => {
                let fresh = state.unseen(&keys).len();
                engine_debug!("after scrolling {}px: {} unseen links", distance, fresh);
                fresh
            }
            Err(err) => {
                engine_warn!("link collection after scroll failed: {}", err);
                0
            }
        }
    }

    async fn return_to_root(&self, ctx: &mut dyn BrowsingContext) -> bool {
        match navigate_within(ctx, &self.root_url, self.navigation_timeout).await {
            Ok(()) => true,
            Err(err) => {
                engine_warn!("list root unavailable: {}", err);
                false
            }
        }
    }

    async fn ensure_clear(
        &self,
        ctx: &mut dyn BrowsingContext,
        phase: BlockPhase,
    ) -> Result<(), HarvestError> {
        match self.block.check(ctx).await {
            BlockVerdict::Clear => Ok(()),
            BlockVerdict::Blocked { cause, marker } => {
                let diagnostics = self.capture(ctx, &phase.to_string()).await;
                Err(HarvestError::Blocked {
                    phase,
                    cause,
                    marker,
                    diagnostics,
                })
            }
        }
    }

    fn check_budget(&self, started: Instant) -> Result<(), HarvestError> {
        if started.elapsed() >= self.budget {
            return Err(HarvestError::Timeout {
                budget: self.budget,
                partial: Vec::new(),
                diagnostics: None,
            });
        }
        Ok(())
    }

    async fn timed_out(&self, ctx: &mut dyn BrowsingContext, state: HarvestState) -> HarvestError {
        engine_error!("ABORTED: harvest budget of {:?} exhausted", self.budget);
        let diagnostics = self.capture(ctx, "harvest-timeout").await;
        HarvestError::Timeout {
            budget: self.budget,
            partial: state.into_results(),
            diagnostics,
        }
    }

    async fn capture(&self, ctx: &mut dyn BrowsingContext, label: &str) -> Option<PathBuf> {
        let dir = self.diagnostics_dir.as_ref()?;
        diagnostics::capture(ctx, dir, label).await
    }
}
