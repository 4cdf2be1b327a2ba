use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use tokio::time::timeout;

use crate::filename::artifact_filename;
use crate::persist::AtomicFileWriter;
use crate::BrowsingContext;

/// Upper bound for one capture; a wedged page must not hold up error reporting.
const CAPTURE_LIMIT: Duration = Duration::from_secs(10);

/// Saves the current DOM (and a screenshot, where the context supports it)
/// into `dir`. Returns the HTML path when at least that was written.
pub async fn capture(ctx: &mut dyn BrowsingContext, dir: &Path, label: &str) -> Option<PathBuf> {
    match timeout(CAPTURE_LIMIT, capture_inner(ctx, dir, label)).await {
        Ok(path) => path,
        Err(_) => {
            engine_warn!("diagnostic capture {:?} timed out", label);
            None
        }
    }
}

async fn capture_inner(ctx: &mut dyn BrowsingContext, dir: &Path, label: &str) -> Option<PathBuf> {
    let snapshot = match ctx.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            engine_warn!("diagnostic capture {:?} has no page: {}", label, err);
            return None;
        }
    };
    let writer = AtomicFileWriter::new(dir.to_path_buf());

    let html_name = artifact_filename(label, &snapshot.url, "html");
    let html_path = match writer.write(&html_name, &snapshot.html) {
        Ok(path) => path,
        Err(err) => {
            engine_warn!("could not write diagnostic {:?}: {}", html_name, err);
            return None;
        }
    };

    match ctx.screenshot().await {
        Ok(png) => {
            let png_name = artifact_filename(label, &snapshot.url, "png");
            if let Err(err) = writer.write_bytes(&png_name, &png) {
                engine_warn!("could not write diagnostic {:?}: {}", png_name, err);
            }
        }
        Err(err) => engine_info!("no screenshot for {:?}: {}", label, err),
    }

    engine_info!("diagnostics for {:?} saved to {:?}", label, html_path);
    Some(html_path)
}
