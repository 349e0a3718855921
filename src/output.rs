//! Value types flowing through and out of an export.

use crate::error::{ExportError, SlideError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// An ordered list of slide document locators.
///
/// Order defines page order in the exported PDF. Locators are filesystem paths;
/// `file://` URLs are accepted as well. The job is read-only to the exporter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideJob {
    slides: Vec<PathBuf>,
}

impl SlideJob {
    pub fn new<I, P>(slides: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            slides: slides.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slides(&self) -> &[PathBuf] {
        &self.slides
    }

    /// Iterate `(1-based index, locator)` pairs in page order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Path)> {
        self.slides
            .iter()
            .enumerate()
            .map(|(i, p)| (i + 1, p.as_path()))
    }
}

/// Measured content size of a rendered slide in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSize {
    pub width: u32,
    pub height: u32,
}

/// The outcome of rendering one slide.
#[derive(Debug, Clone)]
pub enum SlideOutcome {
    /// The slide was captured as a standalone single-slide PDF.
    Rendered { pdf: Vec<u8>, size: ContentSize },
    /// The slide failed; the merger substitutes a placeholder page.
    Failed(SlideError),
}

/// Result of rendering one slide of a [`SlideJob`].
#[derive(Debug, Clone)]
pub struct SlideRenderResult {
    /// 1-based position in the job.
    pub index: usize,
    /// The locator as given in the job.
    pub source: PathBuf,
    pub outcome: SlideOutcome,
}

impl SlideRenderResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SlideOutcome::Rendered { .. })
    }

    pub fn error(&self) -> Option<&SlideError> {
        match &self.outcome {
            SlideOutcome::Failed(e) => Some(e),
            SlideOutcome::Rendered { .. } => None,
        }
    }
}

/// Statistics for a completed export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportStats {
    pub total_slides: usize,
    /// Slides that appear in the output as captured pages.
    pub rendered_slides: usize,
    /// Slides replaced by placeholder pages.
    pub failed_slides: usize,
    pub output_pages: usize,
    pub output_bytes: usize,
    pub render_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Errors behind each placeholder page, in slide order.
    pub slide_errors: Vec<SlideError>,
}

/// Terminal result of one export invocation.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// The PDF was written to `destination`.
    Completed {
        destination: PathBuf,
        #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
        elapsed: Duration,
        stats: ExportStats,
    },
    /// The user declined the destination or cancelled the job. Nothing was written.
    Cancelled { reason: String },
    /// A job-fatal error. Nothing was written.
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: ExportError,
    },
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportOutcome::Cancelled { .. })
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            ExportOutcome::Completed { destination, .. } => Some(destination),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            ExportOutcome::Completed { elapsed, .. } => Some(*elapsed),
            _ => None,
        }
    }

    pub fn stats(&self) -> Option<&ExportStats> {
        match self {
            ExportOutcome::Completed { stats, .. } => Some(stats),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ExportError> {
        match self {
            ExportOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Convert into a `Result`, treating cancellation as success without a path.
    pub fn into_result(self) -> Result<Option<PathBuf>, ExportError> {
        match self {
            ExportOutcome::Completed { destination, .. } => Ok(Some(destination)),
            ExportOutcome::Cancelled { .. } => Ok(None),
            ExportOutcome::Failed { error } => Err(error),
        }
    }
}

impl From<ExportError> for ExportOutcome {
    fn from(error: ExportError) -> Self {
        ExportOutcome::Failed { error }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn serialize_error<S: serde::Serializer>(e: &ExportError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&e.to_string())
}
