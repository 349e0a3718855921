//! Input resolution: slide discovery and locator → `file://` URL.
//!
//! Locators are checked for existence at the moment the slide is reached, not
//! up front: a deck directory edited mid-export should fail only the slides
//! that actually disappeared.

use crate::error::{ExportError, SlideError};
use crate::output::SlideJob;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// A slide locator resolved to an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlide {
    /// Absolute, canonical path.
    pub path: PathBuf,
    /// `file://` URL handed to the browser.
    pub url: String,
}

/// Check if the locator is written as a `file://` URL.
pub fn is_file_url(locator: &Path) -> bool {
    locator
        .to_str()
        .is_some_and(|s| s.starts_with("file://"))
}

/// Resolve a slide locator to an absolute existing file and its URL.
///
/// A missing file, a directory, or an unparseable `file://` URL all produce
/// [`SlideError::FileNotFound`] for slide `index`.
pub fn resolve_slide(index: usize, locator: &Path) -> Result<ResolvedSlide, SlideError> {
    let not_found = || SlideError::FileNotFound {
        slide: index,
        path: locator.to_path_buf(),
    };

    let candidate = if is_file_url(locator) {
        let raw = locator.to_str().ok_or_else(not_found)?;
        Url::parse(raw)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(not_found)?
    } else {
        locator.to_path_buf()
    };

    let path = std::fs::canonicalize(&candidate).map_err(|_| not_found())?;
    if !path.is_file() {
        return Err(not_found());
    }

    let url = Url::from_file_path(&path).map_err(|_| not_found())?.to_string();

    debug!("Resolved slide {}: {}", index, url);
    Ok(ResolvedSlide { path, url })
}

/// True for `.html` / `.htm` files (case-insensitive extension).
pub fn is_slide_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

/// Build a [`SlideJob`] from every HTML file directly inside `dir`.
///
/// Files are ordered by file name, byte-wise; name slides with zero-padded
/// numbers (`slide01.html`, …, `slide10.html`) to control order.
pub fn discover_slides(dir: &Path) -> Result<SlideJob, ExportError> {
    if !dir.is_dir() {
        return Err(ExportError::InvalidSlideDirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|_| ExportError::InvalidSlideDirectory {
        path: dir.to_path_buf(),
    })?;

    let mut slides: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_slide_file(p))
        .collect();

    if slides.is_empty() {
        return Err(ExportError::NoSlidesFound {
            path: dir.to_path_buf(),
        });
    }

    slides.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Discovered {} slides in {}", slides.len(), dir.display());
    Ok(SlideJob::new(slides))
}

/// Suggested output file name for a deck: `<directory name>.pdf`.
pub fn suggested_output_name(dir: &Path) -> String {
    let stem = std::fs::canonicalize(dir)
        .ok()
        .as_deref()
        .unwrap_or(dir)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "slides".to_string());
    format!("{stem}.pdf")
}

/// Short label for progress messages: the file name, or the locator itself.
pub fn slide_label(locator: &Path) -> String {
    locator
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| locator.display().to_string())
}
