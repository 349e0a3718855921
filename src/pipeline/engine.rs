//! Rendering-engine abstraction.
//!
//! The exporter never touches a browser directly. It receives an
//! [`EngineLauncher`] and works through [`RenderEngine`] (one per job) and
//! [`RenderSession`] (one per slide). [`crate::pipeline::chrome`] provides the
//! Chromium implementation; tests provide in-memory fakes.
//!
//! Every method is an `.await` point and the exporter awaits each one before
//! issuing the next, so slides are handled in a total order.

use crate::config::ExportConfig;
use crate::error::EngineError;
use crate::output::ContentSize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Starts the shared rendering engine for a job.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self, config: &ExportConfig) -> Result<Box<dyn RenderEngine>, EngineError>;
}

/// A running rendering engine, shared by every slide of one job.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Open a fresh, isolated session (tab) for one slide.
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, EngineError>;

    /// Release the engine. Called exactly once per job.
    async fn shutdown(self: Box<Self>) -> Result<(), EngineError>;
}

/// One isolated browsing context, scoped to a single slide.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Navigate to `url` and return once parsing finished and the network went
    /// quiet. The caller bounds this with the navigation timeout.
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// Images and stylesheets that have not finished loading yet.
    async fn pending_assets(&self) -> Result<Vec<PendingAsset>, EngineError>;

    /// Resolve once `asset` loads or errors. May never resolve; the caller
    /// applies the per-asset timeout.
    async fn wait_for_asset(&self, asset: &PendingAsset) -> Result<AssetState, EngineError>;

    /// Rewrite obfuscated email addresses in place, returning how many were
    /// decoded.
    async fn decode_obfuscated_emails(&self) -> Result<usize, EngineError>;

    /// Full scrollable content size of the document.
    async fn measure(&self) -> Result<ContentSize, EngineError>;

    /// Print the document to a single PDF page of the given size.
    async fn capture_pdf(&self, page: PaperSize) -> Result<Vec<u8>, EngineError>;

    /// Release the session. Called exactly once per opened session.
    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}

/// Kind of asset tracked by content settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Stylesheet,
}

/// An asset still loading when settling started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAsset {
    pub kind: AssetKind,
    /// Position among `document.images` or the stylesheet links.
    pub index: usize,
    #[serde(default)]
    pub url: String,
}

/// How an asset wait resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Loaded,
    Errored,
}

/// Paper size handed to the engine for capture, in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width_in: f64,
    pub height_in: f64,
}

impl PaperSize {
    /// Convert a measured content size to paper inches at `pixels_per_inch`.
    ///
    /// Rounded up to 1/100 in so the content never spills onto a second page.
    pub fn from_content(size: ContentSize, pixels_per_inch: f64) -> Self {
        let to_inches = |px: u32| {
            let inches = f64::from(px.max(1)) / pixels_per_inch;
            (inches * 100.0 - 1e-9).ceil() / 100.0
        };
        Self {
            width_in: to_inches(size.width),
            height_in: to_inches(size.height),
        }
    }
}
