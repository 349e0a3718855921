//! Configuration types for slide deck export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Timeouts, settle delays, page geometry and footer
//! styling live in one struct so a whole run can be logged and reproduced.

use crate::error::ExportError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a slide deck export.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use slide2pdf::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .navigation_timeout_secs(45)
///     .image_timeout_ms(8_000)
///     .decode_emails(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Upper bound on navigation plus network quiescence per slide. Default: 30 s.
    pub navigation_timeout_secs: u64,

    /// How long the page must go without new resource requests before the
    /// network counts as idle. Default: 500 ms.
    pub network_idle_ms: u64,

    /// Per-image load timeout during content settling. Default: 10 000 ms.
    pub image_timeout_ms: u64,

    /// Per-stylesheet load timeout during content settling. Default: 5 000 ms.
    pub stylesheet_timeout_ms: u64,

    /// Trailing delay after every tracked asset has settled, for script-driven
    /// DOM mutation. Default: 1 000 ms.
    pub asset_settle_delay_ms: u64,

    /// Delay after email decoding, before measuring, for late animations.
    /// Default: 500 ms.
    pub render_settle_delay_ms: u64,

    /// CSS pixels per inch used to turn measured content size into paper size.
    /// Range: 72–600. Default: 96 (the CSS reference pixel).
    pub pixels_per_inch: f64,

    /// Browser viewport used while laying out slides. Default: 1280 × 720.
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Placeholder page size in PDF points. Default: 600 × 800.
    pub placeholder_width: f32,
    pub placeholder_height: f32,

    /// Error messages longer than this are truncated on placeholder pages.
    /// Default: 200 characters.
    pub max_error_message_len: usize,

    /// Footer font size in points. Default: 10.
    pub footer_font_size: f32,

    /// Distance of the footer from the bottom-right page corner in points.
    /// Default: 12.
    pub footer_margin: f32,

    /// Footer grey level (0 = black, 1 = white). Default: 0.6.
    pub footer_gray: f32,

    /// Rewrite `data-cfemail` obfuscated addresses before capture. Default: true.
    pub decode_emails: bool,

    /// Explicit Chrome/Chromium executable. If None, chromiumoxide auto-detects.
    pub chrome_executable: Option<PathBuf>,

    /// Run Chromium with its sandbox enabled. Default: true.
    ///
    /// Containers running as root usually need this off.
    pub sandbox: bool,

    /// Title written to the output document's Info dictionary.
    pub title: Option<String>,

    /// Optional progress callback; see [`crate::progress`].
    pub progress_callback: Option<ProgressCallback>,

    /// Optional cooperative cancellation, checked before each slide.
    pub cancellation: Option<CancellationFlag>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 30,
            network_idle_ms: 500,
            image_timeout_ms: 10_000,
            stylesheet_timeout_ms: 5_000,
            asset_settle_delay_ms: 1_000,
            render_settle_delay_ms: 500,
            pixels_per_inch: 96.0,
            viewport_width: 1280,
            viewport_height: 720,
            placeholder_width: 600.0,
            placeholder_height: 800.0,
            max_error_message_len: 200,
            footer_font_size: 10.0,
            footer_margin: 12.0,
            footer_gray: 0.6,
            decode_emails: true,
            chrome_executable: None,
            sandbox: true,
            title: None,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("network_idle_ms", &self.network_idle_ms)
            .field("image_timeout_ms", &self.image_timeout_ms)
            .field("stylesheet_timeout_ms", &self.stylesheet_timeout_ms)
            .field("asset_settle_delay_ms", &self.asset_settle_delay_ms)
            .field("render_settle_delay_ms", &self.render_settle_delay_ms)
            .field("pixels_per_inch", &self.pixels_per_inch)
            .field("viewport", &(self.viewport_width, self.viewport_height))
            .field(
                "placeholder",
                &(self.placeholder_width, self.placeholder_height),
            )
            .field("max_error_message_len", &self.max_error_message_len)
            .field("footer_font_size", &self.footer_font_size)
            .field("footer_margin", &self.footer_margin)
            .field("footer_gray", &self.footer_gray)
            .field("decode_emails", &self.decode_emails)
            .field("chrome_executable", &self.chrome_executable)
            .field("sandbox", &self.sandbox)
            .field("title", &self.title)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExportProgressCallback>"),
            )
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn stylesheet_timeout(&self) -> Duration {
        Duration::from_millis(self.stylesheet_timeout_ms)
    }

    pub fn asset_settle_delay(&self) -> Duration {
        Duration::from_millis(self.asset_settle_delay_ms)
    }

    pub fn render_settle_delay(&self) -> Duration {
        Duration::from_millis(self.render_settle_delay_ms)
    }

    /// True once the caller has raised the cancellation flag.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationFlag::is_cancelled)
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs.max(1);
        self
    }

    pub fn network_idle_ms(mut self, ms: u64) -> Self {
        self.config.network_idle_ms = ms;
        self
    }

    pub fn image_timeout_ms(mut self, ms: u64) -> Self {
        self.config.image_timeout_ms = ms.max(1);
        self
    }

    pub fn stylesheet_timeout_ms(mut self, ms: u64) -> Self {
        self.config.stylesheet_timeout_ms = ms.max(1);
        self
    }

    pub fn asset_settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.asset_settle_delay_ms = ms;
        self
    }

    pub fn render_settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.render_settle_delay_ms = ms;
        self
    }

    pub fn pixels_per_inch(mut self, ppi: f64) -> Self {
        self.config.pixels_per_inch = ppi;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width.max(1);
        self.config.viewport_height = height.max(1);
        self
    }

    pub fn placeholder_size(mut self, width: f32, height: f32) -> Self {
        self.config.placeholder_width = width;
        self.config.placeholder_height = height;
        self
    }

    pub fn max_error_message_len(mut self, n: usize) -> Self {
        self.config.max_error_message_len = n.max(16);
        self
    }

    pub fn footer_font_size(mut self, pt: f32) -> Self {
        self.config.footer_font_size = pt.clamp(4.0, 72.0);
        self
    }

    pub fn footer_margin(mut self, pt: f32) -> Self {
        self.config.footer_margin = pt.max(0.0);
        self
    }

    pub fn footer_gray(mut self, level: f32) -> Self {
        self.config.footer_gray = level.clamp(0.0, 1.0);
        self
    }

    pub fn decode_emails(mut self, v: bool) -> Self {
        self.config.decode_emails = v;
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn sandbox(mut self, v: bool) -> Self {
        self.config.sandbox = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, flag: CancellationFlag) -> Self {
        self.config.cancellation = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if !(72.0..=600.0).contains(&c.pixels_per_inch) {
            return Err(ExportError::InvalidConfig(format!(
                "pixels per inch must be 72–600, got {}",
                c.pixels_per_inch
            )));
        }
        if c.placeholder_width <= 0.0 || c.placeholder_height <= 0.0 {
            return Err(ExportError::InvalidConfig(format!(
                "placeholder size must be positive, got {}×{}",
                c.placeholder_width, c.placeholder_height
            )));
        }
        Ok(self.config)
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Cooperative cancellation shared between the caller and a running export.
///
/// The export checks the flag before starting each slide; a slide that is
/// already rendering always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
