//! CLI binary for slide2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to `ExportConfig`,
//! resolves the destination (asking before overwriting) and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slide2pdf::{
    discover_slides, export_slides, suggested_output_name, CancellationFlag, ExportConfig,
    ExportOutcome, ExportProgress, ExportProgressCallback, ProgressCallback, SlideJob,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per slide.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the slide currently rendering.
    slide_started: Mutex<Option<Instant>>,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_export_start` reports the slide count.
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Starting browser…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            slide_started: Mutex::new(None),
            failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
        self.bar.reset_eta();
    }

    fn slide_elapsed(&self) -> f64 {
        self.slide_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_slides: usize) {
        self.activate_bar(total_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total_slides} slides…"))
        ));
    }

    fn on_slide_start(&self, progress: &ExportProgress) {
        if let Ok(mut started) = self.slide_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(progress.message.clone());
    }

    fn on_slide_complete(&self, slide: usize, total: usize, pdf_len: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            slide,
            total,
            dim(&format!("{:>6} KB", pdf_len.div_ceil(1024))),
            dim(&format!("{:.1}s", self.slide_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            slide,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.slide_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_export_complete(&self, total_slides: usize, rendered: usize) {
        self.bar.finish_and_clear();
        let failed = total_slides.saturating_sub(rendered);
        if failed == 0 {
            eprintln!(
                "{} {} slides rendered",
                green("✔"),
                bold(&rendered.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides rendered  ({} placeholder pages)",
                yellow("⚠"),
                bold(&rendered.to_string()),
                total_slides,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export every .html slide in a directory (sorted by file name)
  slide2pdf deck/

  # Choose the output file, replace it without asking
  slide2pdf deck/ -o build/deck.pdf --overwrite

  # Explicit slide order
  slide2pdf intro.html agenda.html results.html -o talk.pdf

  # Slow assets: longer page-load and image timeouts
  slide2pdf deck/ --timeout 60 --image-timeout-ms 20000

  # Inside a container running as root
  slide2pdf deck/ --no-sandbox

  # Machine-readable result
  slide2pdf deck/ --json > result.json

ENVIRONMENT VARIABLES:
  CHROME_PATH              Chromium/Chrome executable (default: auto-detect)
  SLIDE2PDF_OUTPUT         Output file
  SLIDE2PDF_TIMEOUT        Page-load timeout in seconds
  SLIDE2PDF_PPI            CSS pixels per inch for page sizing
  RUST_LOG                 Override log filtering (e.g. slide2pdf=debug)

NOTES:
  Slides whose file is missing or fail to load become a placeholder page
  naming the error, so page i of the PDF is always slide i. Every page gets
  an "i / N" footer.
"#;

/// Export a deck of HTML slides to one paginated PDF.
#[derive(Parser, Debug)]
#[command(
    name = "slide2pdf",
    version,
    about = "Export a deck of HTML slides to one paginated PDF",
    long_about = "Render each HTML slide in headless Chromium at its own content size and \
merge the pages into a single PDF with page-number footers. Failed slides become \
placeholder pages instead of aborting the export.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A directory of slides, or slide files in page order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF (default: <directory name>.pdf in the current directory).
    #[arg(short, long, env = "SLIDE2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Replace an existing output file without asking.
    #[arg(short = 'y', long, env = "SLIDE2PDF_OVERWRITE")]
    overwrite: bool,

    /// Document title stored in the PDF metadata.
    #[arg(long, env = "SLIDE2PDF_TITLE")]
    title: Option<String>,

    /// Chromium or Chrome executable.
    #[arg(long = "chrome", env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Disable the Chromium sandbox (needed when running as root in containers).
    #[arg(long, env = "SLIDE2PDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Page-load timeout per slide, in seconds.
    #[arg(long, env = "SLIDE2PDF_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Wait limit per pending image, in milliseconds.
    #[arg(long, env = "SLIDE2PDF_IMAGE_TIMEOUT_MS", default_value_t = 10_000)]
    image_timeout_ms: u64,

    /// Wait limit per pending stylesheet, in milliseconds.
    #[arg(long, env = "SLIDE2PDF_STYLESHEET_TIMEOUT_MS", default_value_t = 5_000)]
    stylesheet_timeout_ms: u64,

    /// Delay after assets settle, for script-driven changes, in milliseconds.
    #[arg(long, env = "SLIDE2PDF_SETTLE_MS", default_value_t = 1_000)]
    settle_ms: u64,

    /// Delay right before capture, in milliseconds.
    #[arg(long, env = "SLIDE2PDF_RENDER_DELAY_MS", default_value_t = 500)]
    render_delay_ms: u64,

    /// CSS pixels per inch used to size pages (72–600).
    #[arg(long, env = "SLIDE2PDF_PPI", default_value_t = 96.0)]
    ppi: f64,

    /// Leave obfuscated email addresses as they are.
    #[arg(long, env = "SLIDE2PDF_NO_EMAIL_DECODING")]
    no_email_decoding: bool,

    /// Print the export outcome as JSON on stdout.
    #[arg(long, env = "SLIDE2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDE2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the progress bar.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Slide job and destination ────────────────────────────────────────
    let (job, suggested) = build_job(&cli.inputs)?;
    let target = cli.output.clone().unwrap_or_else(|| PathBuf::from(suggested));
    let destination = confirm_destination(&target, cli.overwrite)?;

    // ── Build config ─────────────────────────────────────────────────────
    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress_cb: Option<ProgressCallback> = if show_progress && destination.is_some() {
        Some(CliProgressCallback::new() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb, cancel.clone())?;

    // ── Run export ───────────────────────────────────────────────────────
    let outcome = export_slides(&job, destination.as_deref(), &config).await;

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    }

    match outcome {
        ExportOutcome::Completed {
            destination,
            elapsed,
            stats,
        } => {
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{}  {} pages  {}  {:.1}s  →  {}",
                    if stats.failed_slides == 0 {
                        green("✔")
                    } else {
                        yellow("⚠")
                    },
                    stats.output_pages,
                    dim(&format!("{} KB", stats.output_bytes.div_ceil(1024))),
                    elapsed.as_secs_f64(),
                    bold(&destination.display().to_string()),
                );
                for error in &stats.slide_errors {
                    eprintln!("   {} {}", red("✗"), error);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        ExportOutcome::Cancelled { reason } => {
            if !cli.quiet && !cli.json {
                eprintln!("{} Export cancelled: {}", yellow("■"), reason);
            }
            // Interrupted runs report 130 like a shell would; a declined
            // overwrite is the user's choice, not an error.
            Ok(if cancel.is_cancelled() {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            })
        }
        ExportOutcome::Failed { error } => {
            if cli.json {
                return Ok(ExitCode::FAILURE);
            }
            Err(error).context("Export failed")
        }
    }
}

/// Expand the inputs into a slide job and a suggested output file name.
fn build_job(inputs: &[PathBuf]) -> Result<(SlideJob, String)> {
    if let [single] = inputs {
        if single.is_dir() {
            let job = discover_slides(single)
                .with_context(|| format!("Cannot read slides from {}", single.display()))?;
            return Ok((job, suggested_output_name(single)));
        }
    }
    Ok((SlideJob::new(inputs.iter().cloned()), "slides.pdf".to_string()))
}

/// Resolve the destination, asking before replacing an existing file.
///
/// `None` means the user declined.
fn confirm_destination(path: &Path, overwrite: bool) -> Result<Option<PathBuf>> {
    if overwrite || !path.exists() {
        return Ok(Some(path.to_path_buf()));
    }
    if path.is_dir() {
        anyhow::bail!("Output path {} is a directory", path.display());
    }

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        eprintln!(
            "{} {} exists; pass --overwrite to replace it",
            yellow("⚠"),
            path.display()
        );
        return Ok(None);
    }

    eprint!("{} exists. Overwrite? [y/N] ", bold(&path.display().to_string()));
    io::stderr().flush().ok();
    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;

    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        .then(|| path.to_path_buf()))
}

/// Map CLI args to `ExportConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationFlag,
) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .navigation_timeout_secs(cli.timeout)
        .image_timeout_ms(cli.image_timeout_ms)
        .stylesheet_timeout_ms(cli.stylesheet_timeout_ms)
        .asset_settle_delay_ms(cli.settle_ms)
        .render_settle_delay_ms(cli.render_delay_ms)
        .pixels_per_inch(cli.ppi)
        .decode_emails(!cli.no_email_decoding)
        .sandbox(!cli.no_sandbox)
        .cancellation(cancel);

    if let Some(ref path) = cli.chrome {
        builder = builder.chrome_executable(path);
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
