//! Browser-backed tests against a real headless Chromium.
//!
//! Gated behind `CHROME_E2E` so they do not run in CI unless requested.
//!
//! Run with:
//!   CHROME_E2E=1 cargo test --test chrome -- --nocapture
//!
//! Set `CHROME_PATH` if Chromium is not on the default search path, and
//! `CHROME_NO_SANDBOX=1` when running as root in a container.

use lopdf::{Document, Object};
use slide2pdf::pipeline::engine::PaperSize;
use slide2pdf::{
    export_slides, ChromeLauncher, ContentSize, EngineLauncher, ExportConfig, SlideError,
    SlideJob,
};
use std::path::Path;

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("CHROME_E2E").is_err() {
            println!("SKIP — set CHROME_E2E=1 to run browser tests");
            return;
        }
    };
}

fn config() -> ExportConfig {
    let mut builder = ExportConfig::builder().title("Browser test deck");
    if let Ok(path) = std::env::var("CHROME_PATH") {
        builder = builder.chrome_executable(path);
    }
    if std::env::var("CHROME_NO_SANDBOX").is_ok() {
        builder = builder.sandbox(false);
    }
    builder.build().unwrap()
}

const WIDE_SLIDE: &str = r#"<!doctype html>
<html><head><style>
  html, body { margin: 0; padding: 0; }
  .slide { width: 1600px; height: 900px; background: #123; color: #fff; }
</style></head>
<body><div class="slide">
  <h1>Wide slide</h1>
  <p>Contact: <a href="/cdn-cgi/l/email-protection" class="__cf_email__"
     data-cfemail="1f767179705f6731756f">[email&#160;protected]</a></p>
</div></body></html>"#;

const SMALL_SLIDE: &str = r#"<!doctype html>
<html><head><style>html, body { margin: 0; }</style></head>
<body><p>Small slide</p></body></html>"#;

/// Only a protected-link href, no `data-cfemail` marker. The rewritten
/// `mailto:` link is styled tall, so decoding shows up in the measured height.
const CDN_LINK_SLIDE: &str = r#"<!doctype html>
<html><head><style>
  html, body { margin: 0; padding: 0; }
  a[href="mailto:info@x.jp"] { display: block; width: 10px; height: 2000px; }
</style></head>
<body><a href="/cdn-cgi/l/email-protection#1f767179705f6731756f">Mail us</a></body></html>"#;

fn write_deck(dir: &Path) {
    std::fs::write(dir.join("01-wide.html"), WIDE_SLIDE).unwrap();
    std::fs::write(dir.join("02-small.html"), SMALL_SLIDE).unwrap();
}

fn media_box(doc: &Document, page: lopdf::ObjectId) -> Vec<f32> {
    doc.get_dictionary(page)
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

#[tokio::test]
async fn exports_deck_with_content_sized_pages() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    write_deck(dir.path());
    let dest = dir.path().join("deck.pdf");

    let job = slide2pdf::discover_slides(dir.path()).unwrap();
    let job = SlideJob::new(job.slides().iter().cloned().chain([dir.path().join("03-gone.html")]));
    let outcome = export_slides(&job, Some(&dest), &config()).await;

    let stats = outcome.stats().expect("export should complete");
    println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
    assert_eq!(stats.rendered_slides, 2);
    assert!(matches!(
        stats.slide_errors.as_slice(),
        [SlideError::FileNotFound { slide: 3, .. }]
    ));

    let doc = Document::load(&dest).unwrap();
    let pages: Vec<_> = doc.get_pages().into_values().collect();
    assert_eq!(pages.len(), 3, "one page per slide");

    // 1600×900 CSS px → 16.67 × 9.38 in.
    let wide = media_box(&doc, pages[0]);
    assert!((wide[2] - wide[0] - 16.67 * 72.0).abs() < 1.0, "{wide:?}");
    assert!((wide[3] - wide[1] - 9.38 * 72.0).abs() < 1.0, "{wide:?}");

    // The small slide still fills the viewport width.
    let small = media_box(&doc, pages[1]);
    assert!(small[2] - small[0] >= 1280.0 / 96.0 * 72.0 - 1.0, "{small:?}");

    assert_eq!(media_box(&doc, pages[2]), vec![0.0, 0.0, 600.0, 800.0]);
}

#[tokio::test]
async fn session_decodes_emails_and_measures() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    write_deck(dir.path());
    let config = config();

    let engine = ChromeLauncher.launch(&config).await.unwrap();
    let session = engine.open_session().await.unwrap();

    let url = url::Url::from_file_path(dir.path().join("01-wide.html"))
        .unwrap()
        .to_string();
    session.navigate(&url).await.unwrap();

    assert_eq!(session.decode_obfuscated_emails().await.unwrap(), 1);
    // Marker removed, link rewritten: a second pass finds nothing.
    assert_eq!(session.decode_obfuscated_emails().await.unwrap(), 0);

    let size = session.measure().await.unwrap();
    assert_eq!(
        size,
        ContentSize {
            width: 1600,
            height: 900
        }
    );

    let pdf = session
        .capture_pdf(PaperSize::from_content(size, config.pixels_per_inch))
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    let doc = Document::load_mem(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    session.close().await.unwrap();
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn session_rewrites_protected_email_links() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let slide = dir.path().join("contact.html");
    std::fs::write(&slide, CDN_LINK_SLIDE).unwrap();
    let config = config();

    let engine = ChromeLauncher.launch(&config).await.unwrap();
    let session = engine.open_session().await.unwrap();
    let url = url::Url::from_file_path(&slide).unwrap().to_string();
    session.navigate(&url).await.unwrap();

    assert!(session.measure().await.unwrap().height < 2000);

    assert_eq!(session.decode_obfuscated_emails().await.unwrap(), 1);
    assert_eq!(session.measure().await.unwrap().height, 2000);
    // The href no longer points at the protection endpoint.
    assert_eq!(session.decode_obfuscated_emails().await.unwrap(), 0);

    session.close().await.unwrap();
    engine.shutdown().await.unwrap();
}
