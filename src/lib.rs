//! # slide2pdf
//!
//! Export a deck of self-contained HTML slides to a single paginated PDF.
//!
//! Each slide is loaded in a fresh headless-Chromium tab, given time for its
//! images and stylesheets to arrive, has obfuscated email addresses decoded,
//! and is printed to one PDF page sized to its own content. The pages are then
//! stitched together with an "`i / N`" footer on every page. A slide that
//! cannot be rendered does not abort the export: it becomes a placeholder page
//! explaining what went wrong, so page `i` always belongs to slide `i`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! slide list
//!  │
//!  ├─ 1. Input    resolve each locator to an existing file:// URL
//!  ├─ 2. Load     navigate, wait for load + network quiet (bounded)
//!  ├─ 3. Settle   bounded waits on pending images / stylesheets
//!  ├─ 4. Decode   rewrite data-cfemail addresses in the page
//!  ├─ 5. Capture  measure content, print one page at that size
//!  ├─ 6. Merge    import page or placeholder, stamp "i / N"
//!  └─ 7. Output   atomic write of the merged document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slide2pdf::{discover_slides, export_slides, ExportConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let job = discover_slides(Path::new("deck/"))?;
//!     let config = ExportConfig::default();
//!     let outcome = export_slides(&job, Some(Path::new("deck.pdf")), &config).await;
//!     if let Some(stats) = outcome.stats() {
//!         eprintln!("{} of {} slides rendered", stats.rendered_slides, stats.total_slides);
//!     }
//!     outcome.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slide2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! slide2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CancellationFlag, ExportConfig, ExportConfigBuilder};
pub use error::{EngineError, ExportError, SlideError};
pub use export::{export_slides, export_slides_sync, export_with_launcher, render_slides};
pub use output::{
    ContentSize, ExportOutcome, ExportStats, SlideJob, SlideOutcome, SlideRenderResult,
};
pub use pipeline::chrome::ChromeLauncher;
pub use pipeline::engine::{EngineLauncher, RenderEngine, RenderSession};
pub use pipeline::input::{discover_slides, suggested_output_name};
pub use pipeline::obfuscation::decode_cf_email;
pub use progress::{ExportProgress, ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{export_stream, export_stream_with_launcher, ExportEvent, ExportEventStream};
