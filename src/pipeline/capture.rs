//! Per-slide capture: one session, one slide, one single-page PDF.
//!
//! ```text
//! open session ─▶ resolve file ─▶ navigate (bounded) ─▶ settle assets
//!      ─▶ decode emails ─▶ settle delay ─▶ measure ─▶ print to PDF ─▶ close
//! ```
//!
//! Every failure between opening and closing the session becomes a
//! [`SlideError`] inside the returned [`SlideRenderResult`]; nothing here
//! returns `Err`. The session is closed on every path.

use crate::config::ExportConfig;
use crate::error::SlideError;
use crate::output::{ContentSize, SlideOutcome, SlideRenderResult};
use crate::pipeline::engine::{PaperSize, RenderEngine, RenderSession};
use crate::pipeline::{input, settle};
use std::path::Path;
use tracing::{debug, warn};

/// Render slide `index` (1-based) of the job from `locator`.
pub async fn render_slide(
    engine: &dyn RenderEngine,
    index: usize,
    locator: &Path,
    config: &ExportConfig,
) -> SlideRenderResult {
    let outcome = match engine.open_session().await {
        Err(e) => SlideOutcome::Failed(SlideError::SessionFailed {
            slide: index,
            detail: e.to_string(),
        }),
        Ok(session) => {
            let captured = capture_in_session(session.as_ref(), index, locator, config).await;
            if let Err(e) = session.close().await {
                warn!("Slide {}: closing session failed: {}", index, e);
            }
            match captured {
                Ok((pdf, size)) => SlideOutcome::Rendered { pdf, size },
                Err(e) => SlideOutcome::Failed(e),
            }
        }
    };

    SlideRenderResult {
        index,
        source: locator.to_path_buf(),
        outcome,
    }
}

async fn capture_in_session(
    session: &dyn RenderSession,
    index: usize,
    locator: &Path,
    config: &ExportConfig,
) -> Result<(Vec<u8>, ContentSize), SlideError> {
    let resolved = input::resolve_slide(index, locator)?;

    match tokio::time::timeout(config.navigation_timeout(), session.navigate(&resolved.url)).await
    {
        Err(_) => {
            return Err(SlideError::NavigationTimeout {
                slide: index,
                secs: config.navigation_timeout_secs,
            })
        }
        Ok(Err(e)) => {
            return Err(SlideError::NavigationFailed {
                slide: index,
                detail: e.to_string(),
            })
        }
        Ok(Ok(())) => {}
    }

    let report = settle::settle_content(session, config).await;
    debug!("Slide {}: settled {} assets", index, report.tracked());

    if config.decode_emails {
        let decoded = session
            .decode_obfuscated_emails()
            .await
            .map_err(|e| SlideError::ScriptFailed {
                slide: index,
                detail: format!("email decoding: {e}"),
            })?;
        if decoded > 0 {
            debug!("Slide {}: decoded {} obfuscated addresses", index, decoded);
        }
    }

    tokio::time::sleep(config.render_settle_delay()).await;

    let size = session
        .measure()
        .await
        .map_err(|e| SlideError::ScriptFailed {
            slide: index,
            detail: format!("measuring content: {e}"),
        })?;
    let paper = PaperSize::from_content(size, config.pixels_per_inch);
    debug!(
        "Slide {}: content {}x{} px → {:.2}x{:.2} in",
        index, size.width, size.height, paper.width_in, paper.height_in
    );

    let pdf = session
        .capture_pdf(paper)
        .await
        .map_err(|e| SlideError::CaptureFailed {
            slide: index,
            detail: e.to_string(),
        })?;

    Ok((pdf, size))
}
