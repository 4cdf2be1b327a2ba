use async_trait::async_trait;
use engine_logging::{engine_debug, engine_warn};

use crate::config::{HeuristicWeights, MarkupProfile};
use crate::{BrowsingContext, PageError, RegionHandle, RegionProbe};

/// One way of finding the element that hosts the result list.
#[async_trait]
pub trait LocatorStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn locate(
        &self,
        ctx: &mut dyn BrowsingContext,
        link_selector: &str,
    ) -> Result<Option<RegionHandle>, PageError>;
}

/// Known containers, tried in order. A match counts only if it scrolls and
/// holds at least one candidate link.
#[derive(Debug, Clone)]
pub struct HintLocator {
    hints: Vec<String>,
}

impl HintLocator {
    pub fn new(hints: Vec<String>) -> Self {
        Self { hints }
    }
}

#[async_trait]
impl LocatorStrategy for HintLocator {
    fn name(&self) -> &'static str {
        "hints"
    }

    async fn locate(
        &self,
        ctx: &mut dyn BrowsingContext,
        link_selector: &str,
    ) -> Result<Option<RegionHandle>, PageError> {
        for hint in &self.hints {
            let probes = ctx.probe_regions(hint, link_selector).await?;
            if let Some(found) = probes
                .into_iter()
                .find(|probe| probe.scrollable && probe.link_count > 0)
            {
                engine_debug!("list region from hint {:?}: {}", hint, found.handle);
                return Ok(Some(found.handle));
            }
        }
        Ok(None)
    }
}

/// Scores every link-bearing element and keeps the best one.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicLocator {
    weights: HeuristicWeights,
}

impl HeuristicLocator {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, probe: &RegionProbe) -> f64 {
        probe.link_count as f64 * self.weights.link_weight
            + probe.visible_height.max(0.0).min(self.weights.height_cap)
    }

    /// Highest score wins; ties go to the first probe in document order.
    pub fn pick<'a>(&self, probes: &'a [RegionProbe]) -> Option<&'a RegionProbe> {
        let mut best: Option<(&RegionProbe, f64)> = None;
        for probe in probes.iter().filter(|p| p.link_count > 0) {
            let score = self.score(probe);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((probe, score)),
            }
        }
        best.map(|(probe, _)| probe)
    }
}

#[async_trait]
impl LocatorStrategy for HeuristicLocator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn locate(
        &self,
        ctx: &mut dyn BrowsingContext,
        link_selector: &str,
    ) -> Result<Option<RegionHandle>, PageError> {
        let probes = ctx.probe_regions("*", link_selector).await?;
        Ok(self.pick(&probes).map(|probe| {
            engine_debug!(
                "list region by heuristic: {} (links={}, height={:.0})",
                probe.handle,
                probe.link_count,
                probe.visible_height
            );
            probe.handle.clone()
        }))
    }
}

/// Ordered strategy chain; the first strategy that finds a region wins.
pub struct ListLocator {
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl ListLocator {
    pub fn new(strategies: Vec<Box<dyn LocatorStrategy>>) -> Self {
        Self { strategies }
    }

    /// Hints from the profile first, heuristic scan last.
    pub fn from_profile(profile: &MarkupProfile) -> Self {
        Self::new(vec![
            Box::new(HintLocator::new(profile.list_hints.clone())),
            Box::new(HeuristicLocator::new(profile.heuristic)),
        ])
    }

    /// `None` means callers should treat the whole document as the list.
    pub async fn locate(
        &self,
        ctx: &mut dyn BrowsingContext,
        link_selector: &str,
    ) -> Option<RegionHandle> {
        for strategy in &self.strategies {
            match strategy.locate(ctx, link_selector).await {
                Ok(Some(handle)) => return Some(handle),
                Ok(None) => engine_debug!("locator {} found nothing", strategy.name()),
                Err(err) => engine_warn!("locator {} failed: {}", strategy.name(), err),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(path: &str, links: usize, height: f64) -> RegionProbe {
        RegionProbe {
            handle: RegionHandle::new(path),
            scrollable: true,
            link_count: links,
            visible_height: height,
        }
    }

    #[test]
    fn links_dominate_height() {
        let heuristic = HeuristicLocator::new(HeuristicWeights::default());
        let probes = [probe("a", 2, 5000.0), probe("b", 25, 300.0)];
        assert_eq!(heuristic.pick(&probes).unwrap().handle.as_str(), "b");
    }

    #[test]
    fn height_is_capped() {
        let heuristic = HeuristicLocator::new(HeuristicWeights {
            link_weight: 1.0,
            height_cap: 100.0,
        });
        assert_eq!(heuristic.score(&probe("a", 3, 10_000.0)), 103.0);
    }

    #[test]
    fn ties_go_to_the_first_element_in_document_order() {
        let heuristic = HeuristicLocator::new(HeuristicWeights::default());
        let probes = [
            probe("html > body:nth-child(2) > ul:nth-child(1)", 10, 800.0),
            probe("html > body:nth-child(2) > ul:nth-child(2)", 10, 800.0),
            probe("html > body:nth-child(2) > ul:nth-child(3)", 12, 100.0),
        ];
        assert_eq!(
            heuristic.pick(&probes).unwrap().handle.as_str(),
            "html > body:nth-child(2) > ul:nth-child(1)"
        );
    }

    #[test]
    fn linkless_elements_never_win() {
        let heuristic = HeuristicLocator::new(HeuristicWeights::default());
        assert!(heuristic.pick(&[probe("a", 0, 900.0)]).is_none());
    }
}
