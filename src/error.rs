//! Error types for the slide2pdf library.
//!
//! Three error types reflect three failure scopes:
//!
//! * [`ExportError`] — **Fatal**: the export cannot produce a document at all
//!   (empty deck, browser failed to launch, output could not be written).
//!   Surfaces as [`crate::output::ExportOutcome::Failed`].
//!
//! * [`SlideError`] — **Non-fatal**: one slide failed (missing file, timeout,
//!   capture glitch) but every other slide is fine. Stored inside
//!   [`crate::output::SlideRenderResult`] and rendered as a placeholder page,
//!   so the output keeps one numbered page-group per input slide.
//!
//! * [`EngineError`] — raised at the rendering-engine boundary
//!   ([`crate::pipeline::engine`]). The orchestrator classifies it into one of
//!   the two types above depending on where it happened.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slide2pdf library.
///
/// Slide-level failures use [`SlideError`] and never unwind past the slide
/// loop.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The slide job contained no slides.
    #[error("No slides to export: the slide list is empty")]
    EmptyJob,

    /// The directory given for slide discovery does not exist or is not a directory.
    #[error("Slide directory not found: '{path}'")]
    InvalidSlideDirectory { path: PathBuf },

    /// The slide directory exists but holds no `.html` files.
    #[error("No HTML slides found in '{path}'")]
    NoSlidesFound { path: PathBuf },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The headless browser could not be started.
    #[error(
        "Failed to launch the rendering engine: {detail}\n\n\
A Chromium-based browser is required. You can:\n\
  • Install Google Chrome or Chromium.\n\
  • Point CHROME_PATH (or --chrome) at an existing executable.\n\
  • Pass --no-sandbox when running as root inside a container.\n"
    )]
    EngineLaunchFailed { detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The merged document could not be assembled or serialized.
    #[error("Failed to assemble the output PDF: {detail}")]
    SerializeFailed { detail: String },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<lopdf::Error> for ExportError {
    fn from(e: lopdf::Error) -> Self {
        ExportError::SerializeFailed {
            detail: e.to_string(),
        }
    }
}

/// A non-fatal error for a single slide.
///
/// The `slide` field is the 1-based position in the slide job.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The slide file did not exist when the slide was reached.
    #[error("Slide {slide}: file not found: {path}")]
    FileNotFound { slide: usize, path: PathBuf },

    /// Navigation did not settle before the timeout.
    #[error("Slide {slide}: page load timed out after {secs}s")]
    NavigationTimeout { slide: usize, secs: u64 },

    /// The browser reported a navigation failure.
    #[error("Slide {slide}: navigation failed: {detail}")]
    NavigationFailed { slide: usize, detail: String },

    /// A fresh browser tab could not be opened for the slide.
    #[error("Slide {slide}: could not open a browser session: {detail}")]
    SessionFailed { slide: usize, detail: String },

    /// An in-page script (measurement, decoding) failed.
    #[error("Slide {slide}: page script failed: {detail}")]
    ScriptFailed { slide: usize, detail: String },

    /// The browser failed to print the slide to PDF.
    #[error("Slide {slide}: PDF capture failed: {detail}")]
    CaptureFailed { slide: usize, detail: String },

    /// The captured PDF could not be merged into the output document.
    #[error("Slide {slide}: could not merge captured PDF: {detail}")]
    MergeFailed { slide: usize, detail: String },
}

impl SlideError {
    /// 1-based slide index this error belongs to.
    pub fn slide(&self) -> usize {
        match self {
            SlideError::FileNotFound { slide, .. }
            | SlideError::NavigationTimeout { slide, .. }
            | SlideError::NavigationFailed { slide, .. }
            | SlideError::SessionFailed { slide, .. }
            | SlideError::ScriptFailed { slide, .. }
            | SlideError::CaptureFailed { slide, .. }
            | SlideError::MergeFailed { slide, .. } => *slide,
        }
    }
}

/// An error raised by a [`crate::pipeline::engine::RenderEngine`] or one of
/// its sessions.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("launch failed: {0}")]
    Launch(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("{0}")]
    Navigation(String),

    #[error("{0}")]
    Script(String),

    #[error("{0}")]
    Capture(String),
}
