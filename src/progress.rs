//! Progress-callback trait for per-slide export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive events
//! as the exporter walks the deck. Events are purely observational: nothing a
//! callback does changes the order or outcome of the export.
//!
//! # Example
//!
//! ```rust
//! use slide2pdf::{ExportConfig, ExportProgress, ExportProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExportProgressCallback for Printer {
//!     fn on_slide_start(&self, progress: &ExportProgress) {
//!         eprintln!("[{}/{}] {}", progress.current, progress.total, progress.message);
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A transient progress notification, emitted once per slide before it is
/// rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// 1-based index of the slide about to be rendered.
    pub current: usize,
    /// Number of slides in the job.
    pub total: usize,
    /// Human-readable status line.
    pub message: String,
}

impl ExportProgress {
    pub fn new(current: usize, total: usize, label: &str) -> Self {
        Self {
            current,
            total,
            message: format!("Rendering slide {current}/{total}: {label}"),
        }
    }
}

/// Called by the exporter as it processes each slide.
///
/// Slides are processed strictly in order on a single task, so calls never
/// overlap. All methods have default no-op implementations.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once, after the rendering engine is up and before slide 1.
    fn on_export_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called before a slide's session is opened.
    fn on_slide_start(&self, progress: &ExportProgress) {
        let _ = progress;
    }

    /// Called when a slide was captured successfully.
    ///
    /// # Arguments
    /// * `pdf_len` — byte size of the captured single-slide PDF
    fn on_slide_complete(&self, slide: usize, total_slides: usize, pdf_len: usize) {
        let _ = (slide, total_slides, pdf_len);
    }

    /// Called when a slide failed and will be replaced by a placeholder page.
    fn on_slide_error(&self, slide: usize, total_slides: usize, error: &str) {
        let _ = (slide, total_slides, error);
    }

    /// Called once after every slide has been attempted, before the output
    /// document is written.
    fn on_export_complete(&self, total_slides: usize, rendered: usize) {
        let _ = (total_slides, rendered);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
