use async_trait::async_trait;

use crate::{PageError, PageSnapshot, RegionHandle, RegionProbe};

/// One authenticated tab. The engine borrows it for a harvest and drives it
/// strictly sequentially; implementations never need to handle overlapping calls.
///
/// Every full navigation invalidates all [`RegionHandle`]s handed out before it.
#[async_trait]
pub trait BrowsingContext: Send {
    /// Loads `url` and returns once the document has settled.
    async fn goto(&mut self, url: &str) -> Result<(), PageError>;

    async fn current_url(&mut self) -> Result<String, PageError>;

    async fn snapshot(&mut self) -> Result<PageSnapshot, PageError>;

    /// Describes every element matching `candidates` that contains at least
    /// one `link_selector` match, in document order.
    async fn probe_regions(
        &mut self,
        candidates: &str,
        link_selector: &str,
    ) -> Result<Vec<RegionProbe>, PageError>;

    /// Outer HTML of the region, or `None` if it no longer exists.
    async fn region_html(&mut self, region: &RegionHandle) -> Result<Option<String>, PageError>;

    async fn scroll_region(&mut self, region: &RegionHandle, delta_px: i64)
        -> Result<(), PageError>;

    /// Clicks the first element matching `selector`. `Ok(false)` when absent.
    async fn click(&mut self, selector: &str) -> Result<bool, PageError>;

    /// PNG of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, PageError>;
}
