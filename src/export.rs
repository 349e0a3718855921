//! Export entry points: slide job in, one numbered PDF out.
//!
//! Slides are rendered strictly one after another on the calling task. Each
//! result is appended to the merger as soon as it exists, so at most one
//! captured slide PDF is held outside the output document at a time.
//!
//! Use [`crate::stream::export_stream`] instead when progress should arrive
//! as a `Stream` of events rather than through a callback.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::output::{ExportOutcome, ExportStats, SlideJob, SlideOutcome, SlideRenderResult};
use crate::pipeline::capture::render_slide;
use crate::pipeline::chrome::ChromeLauncher;
use crate::pipeline::engine::{EngineLauncher, RenderEngine};
use crate::pipeline::input;
use crate::pipeline::merge::Merger;
use crate::progress::ExportProgress;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Export `job` to `destination` with a local headless Chromium.
///
/// `destination` is the path the caller already resolved (and confirmed, if
/// it asked the user). `None` means the user declined; the result is
/// [`ExportOutcome::Cancelled`] and no browser is started.
///
/// Per-slide failures never fail the export: the slide becomes a placeholder
/// page and the error is listed in [`ExportStats::slide_errors`].
pub async fn export_slides(
    job: &SlideJob,
    destination: Option<&Path>,
    config: &ExportConfig,
) -> ExportOutcome {
    export_with_launcher(&ChromeLauncher, job, destination, config).await
}

/// [`export_slides`] with a caller-supplied rendering engine.
pub async fn export_with_launcher(
    launcher: &dyn EngineLauncher,
    job: &SlideJob,
    destination: Option<&Path>,
    config: &ExportConfig,
) -> ExportOutcome {
    let total_start = Instant::now();

    if job.is_empty() {
        return ExportError::EmptyJob.into();
    }
    let Some(destination) = destination else {
        info!("No destination selected, export cancelled");
        return ExportOutcome::Cancelled {
            reason: "no destination selected".into(),
        };
    };

    info!(
        "Exporting {} slides to {}",
        job.len(),
        destination.display()
    );

    // ── Step 1: Start the engine ─────────────────────────────────────────
    let engine = match launcher.launch(config).await {
        Ok(engine) => engine,
        Err(e) => {
            return ExportError::EngineLaunchFailed {
                detail: e.to_string(),
            }
            .into()
        }
    };

    // ── Step 2: Render and merge, then release the engine on every path ──
    let run = run_job(engine.as_ref(), job, config).await;
    if let Err(e) = engine.shutdown().await {
        warn!("Engine shutdown failed: {}", e);
    }

    let (pdf, mut stats) = match run {
        Ok(done) => done,
        Err(JobStop::Cancelled { before }) => {
            info!("Export cancelled before slide {}", before);
            return ExportOutcome::Cancelled {
                reason: format!("cancelled before slide {before} of {}", job.len()),
            };
        }
        Err(JobStop::Failed(e)) => return e.into(),
    };

    // ── Step 3: Write atomically ─────────────────────────────────────────
    if let Err(e) = write_output(destination, &pdf).await {
        return e.into();
    }

    let elapsed = total_start.elapsed();
    stats.output_bytes = pdf.len();
    stats.total_duration_ms = elapsed.as_millis() as u64;

    info!(
        "Export complete: {}/{} slides rendered, {} pages, {}ms total",
        stats.rendered_slides, stats.total_slides, stats.output_pages, stats.total_duration_ms
    );

    ExportOutcome::Completed {
        destination: destination.to_path_buf(),
        elapsed,
        stats,
    }
}

/// Render every slide of `job` on an already running engine.
///
/// Returns one result per slide in job order, stopping early only when the
/// cancellation flag is raised. The caller owns the engine's lifecycle.
pub async fn render_slides(
    engine: &dyn RenderEngine,
    job: &SlideJob,
    config: &ExportConfig,
) -> Vec<SlideRenderResult> {
    let total = job.len();
    let mut results = Vec::with_capacity(total);

    for (index, locator) in job.iter() {
        if config.is_cancelled() {
            info!("Rendering cancelled before slide {}", index);
            break;
        }
        notify_start(config, index, total, locator);
        let result = render_slide(engine, index, locator, config).await;
        match result.error() {
            None => notify_complete(config, index, total, &result),
            Some(e) => notify_error(config, index, total, &e.to_string()),
        }
        results.push(result);
    }

    results
}

/// Synchronous wrapper around [`export_slides`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_slides_sync(
    job: &SlideJob,
    destination: Option<&Path>,
    config: &ExportConfig,
) -> ExportOutcome {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(export_slides(job, destination, config)),
        Err(e) => ExportError::Internal(format!("Failed to create tokio runtime: {}", e)).into(),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

enum JobStop {
    Cancelled { before: usize },
    Failed(ExportError),
}

async fn run_job(
    engine: &dyn RenderEngine,
    job: &SlideJob,
    config: &ExportConfig,
) -> Result<(Vec<u8>, ExportStats), JobStop> {
    let total = job.len();
    let mut merger = Merger::new(total, config);
    let mut stats = ExportStats {
        total_slides: total,
        ..Default::default()
    };
    let mut render_time = Duration::ZERO;
    let mut merge_time = Duration::ZERO;

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(total);
    }

    for (index, locator) in job.iter() {
        if config.is_cancelled() {
            return Err(JobStop::Cancelled { before: index });
        }
        notify_start(config, index, total, locator);

        let started = Instant::now();
        let result = render_slide(engine, index, locator, config).await;
        render_time += started.elapsed();

        let started = Instant::now();
        let report = merger.append(&result).map_err(JobStop::Failed)?;
        merge_time += started.elapsed();

        match report.substituted {
            None => {
                stats.rendered_slides += 1;
                notify_complete(config, index, total, &result);
            }
            Some(error) => {
                warn!("{}", error);
                stats.failed_slides += 1;
                notify_error(config, index, total, &error.to_string());
                stats.slide_errors.push(error);
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(total, stats.rendered_slides);
    }

    stats.output_pages = merger.page_count();
    let started = Instant::now();
    let pdf = merger.finish().map_err(JobStop::Failed)?;
    merge_time += started.elapsed();

    stats.render_duration_ms = render_time.as_millis() as u64;
    stats.merge_duration_ms = merge_time.as_millis() as u64;
    debug!(
        "Rendered in {}ms, merged in {}ms",
        stats.render_duration_ms, stats.merge_duration_ms
    );
    Ok((pdf, stats))
}

fn notify_start(config: &ExportConfig, index: usize, total: usize, locator: &Path) {
    let progress = ExportProgress::new(index, total, &input::slide_label(locator));
    info!("{}", progress.message);
    if let Some(ref cb) = config.progress_callback {
        cb.on_slide_start(&progress);
    }
}

fn notify_complete(config: &ExportConfig, index: usize, total: usize, result: &SlideRenderResult) {
    if let Some(ref cb) = config.progress_callback {
        let pdf_len = match &result.outcome {
            SlideOutcome::Rendered { pdf, .. } => pdf.len(),
            SlideOutcome::Failed(_) => 0,
        };
        cb.on_slide_complete(index, total, pdf_len);
    }
}

fn notify_error(config: &ExportConfig, index: usize, total: usize, message: &str) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_slide_error(index, total, message);
    }
}

/// Atomic write: temp file next to the destination, then rename.
async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let write_failed = |source: std::io::Error| ExportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
