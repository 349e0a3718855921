//! Integration tests for the export orchestrator and merger.
//!
//! A scripted in-memory engine stands in for Chromium: it records how often
//! the engine and its sessions are acquired and released, and "prints" each
//! slide as a one-page PDF built with lopdf at the requested paper size.
//! Slide behaviour is keyed on the file name:
//!
//! | file name       | behaviour                           |
//! |-----------------|-------------------------------------|
//! | `hang.html`     | navigation never completes          |
//! | `garbage.html`  | capture returns bytes that aren't a PDF |
//! | anything else   | renders 800×600 CSS px              |

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use slide2pdf::pipeline::engine::{AssetState, PaperSize, PendingAsset};
use slide2pdf::{
    export_stream_with_launcher, export_with_launcher, render_slides, CancellationFlag,
    ContentSize, EngineError, EngineLauncher, ExportConfig, ExportError, ExportEvent,
    ExportOutcome, ExportProgress, ExportProgressCallback, RenderEngine, RenderSession,
    SlideError, SlideJob,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Scripted engine ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    decoded: AtomicUsize,
}

impl Counters {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct FakeLauncher {
    counters: Arc<Counters>,
    fail_launch: bool,
}

impl FakeLauncher {
    fn new() -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                counters: Arc::clone(&counters),
                fail_launch: false,
            },
            counters,
        )
    }
}

struct FakeEngine {
    counters: Arc<Counters>,
}

struct FakeSession {
    counters: Arc<Counters>,
    url: Mutex<String>,
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self, _config: &ExportConfig) -> Result<Box<dyn RenderEngine>, EngineError> {
        if self.fail_launch {
            return Err(EngineError::Launch("no chromium on PATH".into()));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            counters: Arc::clone(&self.counters),
        }))
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, EngineError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            counters: Arc::clone(&self.counters),
            url: Mutex::new(String::new()),
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<(), EngineError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        *self.url.lock().unwrap() = url.to_string();
        if url.ends_with("/hang.html") {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn pending_assets(&self) -> Result<Vec<PendingAsset>, EngineError> {
        Ok(Vec::new())
    }

    async fn wait_for_asset(&self, _asset: &PendingAsset) -> Result<AssetState, EngineError> {
        Ok(AssetState::Loaded)
    }

    async fn decode_obfuscated_emails(&self) -> Result<usize, EngineError> {
        self.counters.decoded.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn measure(&self) -> Result<ContentSize, EngineError> {
        Ok(ContentSize {
            width: 800,
            height: 600,
        })
    }

    async fn capture_pdf(&self, page: PaperSize) -> Result<Vec<u8>, EngineError> {
        if self.url.lock().unwrap().ends_with("/garbage.html") {
            return Ok(b"%PDF-1.4 truncated".to_vec());
        }
        Ok(one_page_pdf(
            (page.width_in * 72.0) as f32,
            (page.height_in * 72.0) as f32,
        ))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn one_page_pdf(width: f32, height: f32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
        "Contents" => content_id,
        "Resources" => dictionary! {},
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A deck directory with the given slide files created (not the missing ones).
fn deck(present: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in present {
        std::fs::write(
            dir.path().join(name),
            "<html><body><h1>slide</h1></body></html>",
        )
        .unwrap();
    }
    dir
}

fn job(dir: &Path, names: &[&str]) -> SlideJob {
    SlideJob::new(names.iter().map(|n| dir.join(n)))
}

/// No settle delays, so the tests run on the real clock quickly.
fn fast_config() -> ExportConfig {
    ExportConfig::builder()
        .asset_settle_delay_ms(0)
        .render_settle_delay_ms(0)
        .build()
        .unwrap()
}

fn load_output(path: &Path) -> (Document, Vec<ObjectId>) {
    let doc = Document::load(path).unwrap();
    let pages = doc.get_pages().into_values().collect();
    (doc, pages)
}

fn page_texts(doc: &Document, page_id: ObjectId) -> Vec<String> {
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect()
}

fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f32> {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|o| match o {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            other => panic!("not a number: {other:?}"),
        })
        .collect()
}

/// Records callback events as strings, in order.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    cancel_after_first: Option<CancellationFlag>,
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ExportProgressCallback for Recorder {
    fn on_export_start(&self, total_slides: usize) {
        self.push(format!("start {total_slides}"));
    }
    fn on_slide_start(&self, progress: &ExportProgress) {
        self.push(progress.message.clone());
    }
    fn on_slide_complete(&self, slide: usize, _total: usize, _pdf_len: usize) {
        self.push(format!("ok {slide}"));
        if let Some(flag) = &self.cancel_after_first {
            flag.cancel();
        }
    }
    fn on_slide_error(&self, slide: usize, _total: usize, _error: &str) {
        self.push(format!("err {slide}"));
    }
    fn on_export_complete(&self, total_slides: usize, rendered: usize) {
        self.push(format!("done {rendered}/{total_slides}"));
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_slide_becomes_numbered_placeholder() {
    let dir = deck(&["a.html"]);
    let dest = dir.path().join("out.pdf");
    let (launcher, counters) = FakeLauncher::new();

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["a.html", "b.html"]),
        Some(&dest),
        &fast_config(),
    )
    .await;

    let stats = outcome.stats().expect("export should complete").clone();
    assert_eq!(outcome.destination(), Some(dest.as_path()));
    assert_eq!(stats.total_slides, 2);
    assert_eq!(stats.rendered_slides, 1);
    assert_eq!(stats.failed_slides, 1);
    assert_eq!(stats.output_pages, 2);
    assert!(matches!(
        stats.slide_errors.as_slice(),
        [SlideError::FileNotFound { slide: 2, .. }]
    ));

    let (doc, pages) = load_output(&dest);
    assert_eq!(pages.len(), 2);

    // 800×600 CSS px at 96 ppi → 8.34 × 6.25 in → 600.48 × 450 pt (rounded up to 1/100 in).
    let first = media_box(&doc, pages[0]);
    assert!((first[2] - 600.48).abs() < 0.01, "width {}", first[2]);
    assert!((first[3] - 450.0).abs() < 0.01, "height {}", first[3]);
    assert!(page_texts(&doc, pages[0]).contains(&"1 / 2".to_string()));

    assert_eq!(media_box(&doc, pages[1]), vec![0.0, 0.0, 600.0, 800.0]);
    let placeholder = page_texts(&doc, pages[1]);
    assert!(placeholder.contains(&"Slide 2".to_string()));
    assert!(placeholder.iter().any(|t| t.contains("file not found")));
    assert!(placeholder.contains(&"2 / 2".to_string()));

    // One tab per slide, each closed; one browser for the job.
    assert_eq!(Counters::get(&counters.launches), 1);
    assert_eq!(Counters::get(&counters.shutdowns), 1);
    assert_eq!(Counters::get(&counters.opened), 2);
    assert_eq!(Counters::get(&counters.closed), 2);
    assert_eq!(Counters::get(&counters.decoded), 1);
}

#[tokio::test]
async fn progress_events_follow_slide_order() {
    let dir = deck(&["a.html"]);
    let (launcher, _) = FakeLauncher::new();
    let recorder = Arc::new(Recorder::default());
    let config = ExportConfig::builder()
        .asset_settle_delay_ms(0)
        .render_settle_delay_ms(0)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["a.html", "missing.html"]),
        Some(&dir.path().join("deck.pdf")),
        &config,
    )
    .await;
    assert!(outcome.is_success());

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 2",
            "Rendering slide 1/2: a.html",
            "ok 1",
            "Rendering slide 2/2: missing.html",
            "err 2",
            "done 1/2",
        ]
    );
}

#[tokio::test]
async fn empty_job_fails_without_launching() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.pdf");
    let (launcher, counters) = FakeLauncher::new();

    let outcome =
        export_with_launcher(&launcher, &SlideJob::default(), Some(&dest), &fast_config()).await;

    assert!(matches!(outcome.error(), Some(ExportError::EmptyJob)));
    assert_eq!(Counters::get(&counters.launches), 0);
    assert!(!dest.exists());
}

#[tokio::test]
async fn declined_destination_is_cancelled_without_launching() {
    let dir = deck(&["a.html"]);
    let (launcher, counters) = FakeLauncher::new();

    let outcome =
        export_with_launcher(&launcher, &job(dir.path(), &["a.html"]), None, &fast_config()).await;

    assert!(outcome.is_cancelled());
    assert!(!outcome.is_success());
    assert_eq!(Counters::get(&counters.launches), 0);
}

#[tokio::test]
async fn launch_failure_is_fatal() {
    let dir = deck(&["a.html"]);
    let dest = dir.path().join("out.pdf");
    let (mut launcher, counters) = FakeLauncher::new();
    launcher.fail_launch = true;

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["a.html"]),
        Some(&dest),
        &fast_config(),
    )
    .await;

    match outcome.error() {
        Some(ExportError::EngineLaunchFailed { detail }) => assert!(detail.contains("chromium")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(Counters::get(&counters.opened), 0);
    assert!(!dest.exists());
}

#[tokio::test]
async fn write_failure_still_releases_engine_once() {
    let dir = deck(&["a.html"]);
    // A non-empty directory where the PDF should go.
    let dest = dir.path().join("out.pdf");
    std::fs::create_dir(&dest).unwrap();
    std::fs::write(dest.join("occupied"), "x").unwrap();
    let (launcher, counters) = FakeLauncher::new();

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["a.html"]),
        Some(&dest),
        &fast_config(),
    )
    .await;

    assert!(matches!(
        outcome.error(),
        Some(ExportError::OutputWriteFailed { .. })
    ));
    assert_eq!(Counters::get(&counters.shutdowns), 1);
    assert_eq!(
        Counters::get(&counters.opened),
        Counters::get(&counters.closed)
    );
}

#[tokio::test]
async fn cancellation_stops_before_next_slide_and_writes_nothing() {
    let dir = deck(&["a.html", "b.html", "c.html"]);
    let dest = dir.path().join("out.pdf");
    let (launcher, counters) = FakeLauncher::new();
    let flag = CancellationFlag::new();
    let recorder = Arc::new(Recorder {
        cancel_after_first: Some(flag.clone()),
        ..Default::default()
    });
    let config = ExportConfig::builder()
        .asset_settle_delay_ms(0)
        .render_settle_delay_ms(0)
        .progress_callback(recorder)
        .cancellation(flag)
        .build()
        .unwrap();

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["a.html", "b.html", "c.html"]),
        Some(&dest),
        &config,
    )
    .await;

    match &outcome {
        ExportOutcome::Cancelled { reason } => assert!(reason.contains("slide 2")),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!dest.exists());
    assert!(!dest.with_extension("pdf.tmp").exists());
    assert_eq!(Counters::get(&counters.opened), 1);
    assert_eq!(Counters::get(&counters.shutdowns), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_slide_times_out_and_export_continues() {
    let dir = deck(&["hang.html", "b.html"]);
    let dest = dir.path().join("out.pdf");
    let (launcher, counters) = FakeLauncher::new();

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["hang.html", "b.html"]),
        Some(&dest),
        &ExportConfig::default(),
    )
    .await;

    let stats = outcome.stats().expect("export should complete");
    assert!(matches!(
        stats.slide_errors.as_slice(),
        [SlideError::NavigationTimeout { slide: 1, secs: 30 }]
    ));
    assert_eq!(stats.rendered_slides, 1);
    assert_eq!(Counters::get(&counters.closed), 2);

    let (doc, pages) = load_output(&dest);
    assert_eq!(pages.len(), 2);
    assert!(page_texts(&doc, pages[0])
        .iter()
        .any(|t| t.contains("timed out")));
}

#[tokio::test]
async fn unreadable_capture_is_merged_as_placeholder() {
    let dir = deck(&["garbage.html"]);
    let dest = dir.path().join("out.pdf");
    let (launcher, _) = FakeLauncher::new();

    let outcome = export_with_launcher(
        &launcher,
        &job(dir.path(), &["garbage.html"]),
        Some(&dest),
        &fast_config(),
    )
    .await;

    let stats = outcome.stats().expect("export should complete");
    assert_eq!(stats.failed_slides, 1);
    assert!(matches!(
        stats.slide_errors.as_slice(),
        [SlideError::MergeFailed { slide: 1, .. }]
    ));
    let (_, pages) = load_output(&dest);
    assert_eq!(pages.len(), 1);
}

#[tokio::test]
async fn render_slides_returns_one_result_per_slide() {
    let dir = deck(&["a.html", "c.html"]);
    let (launcher, counters) = FakeLauncher::new();
    let config = fast_config();
    let engine = launcher.launch(&config).await.unwrap();

    let results = render_slides(
        engine.as_ref(),
        &job(dir.path(), &["a.html", "b.html", "c.html"]),
        &config,
    )
    .await;
    engine.shutdown().await.unwrap();

    let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    let ok: Vec<bool> = results.iter().map(|r| r.is_success()).collect();
    assert_eq!(ok, vec![true, false, true]);
    assert_eq!(results[1].source, dir.path().join("b.html"));
    assert_eq!(Counters::get(&counters.closed), 3);
}

#[tokio::test]
async fn stream_reports_events_then_outcome() {
    let dir = deck(&["a.html"]);
    let dest: PathBuf = dir.path().join("streamed.pdf");
    let (launcher, _) = FakeLauncher::new();

    let (events, handle) = export_stream_with_launcher(
        Arc::new(launcher),
        job(dir.path(), &["a.html", "b.html"]),
        Some(dest.clone()),
        fast_config(),
    );
    let events: Vec<ExportEvent> = futures::StreamExt::collect(events).await;
    let outcome = handle.await.unwrap();

    assert!(outcome.is_success());
    assert!(dest.exists());
    assert_eq!(events.first(), Some(&ExportEvent::Started { total: 2 }));
    assert!(matches!(
        events.get(2),
        Some(ExportEvent::SlideCompleted { slide: 1, .. })
    ));
    assert!(matches!(
        events.get(4),
        Some(ExportEvent::SlideFailed { slide: 2, .. })
    ));
    assert_eq!(
        events.last(),
        Some(&ExportEvent::Finished {
            total: 2,
            rendered: 1
        })
    );
}
