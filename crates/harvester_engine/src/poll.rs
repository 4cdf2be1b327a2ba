use std::time::Duration;

use engine_logging::engine_debug;
use tokio::time::{sleep, timeout, timeout_at, Instant};

use crate::{BrowsingContext, PageError, PageSnapshot, PollPolicy};

/// Snapshots the page until `classify` yields a value or the window closes.
///
/// The page is inspected at least once, even with a zero window. Snapshot
/// failures count as "not yet".
pub async fn poll_until_or_deadline<T>(
    ctx: &mut dyn BrowsingContext,
    policy: PollPolicy,
    mut classify: impl FnMut(&PageSnapshot) -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + policy.window;
    loop {
        match timeout_at(deadline, ctx.snapshot()).await {
            Ok(Ok(snapshot)) => {
                if let Some(found) = classify(&snapshot) {
                    return Some(found);
                }
            }
            Ok(Err(err)) => engine_debug!("snapshot unavailable while polling: {}", err),
            Err(_) => return None,
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(policy.interval.min(deadline - now)).await;
    }
}

/// Navigates under its own deadline, reporting overruns as
/// [`PageError::NavigationTimeout`].
pub async fn navigate_within(
    ctx: &mut dyn BrowsingContext,
    url: &str,
    limit: Duration,
) -> Result<(), PageError> {
    match timeout(limit, ctx.goto(url)).await {
        Ok(result) => result,
        Err(_) => Err(PageError::NavigationTimeout(limit)),
    }
}
