//! Streaming export API: progress as a `Stream` of events.
//!
//! [`export_stream`] spawns the export on the current tokio runtime and
//! returns immediately with an event stream and a join handle. Events arrive
//! in slide order; the stream ends when the export task finishes, and the
//! handle yields the final [`ExportOutcome`].
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use slide2pdf::{export_stream, ExportConfig, ExportEvent, SlideJob};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let job = SlideJob::new(["intro.html", "agenda.html"]);
//! let (mut events, handle) =
//!     export_stream(job, Some("deck.pdf".into()), ExportConfig::default());
//! while let Some(event) = events.next().await {
//!     if let ExportEvent::SlideFailed { slide, error, .. } = event {
//!         eprintln!("slide {slide}: {error}");
//!     }
//! }
//! let outcome = handle.await?;
//! println!("{}", outcome.is_success());
//! # Ok(())
//! # }
//! ```

use crate::config::ExportConfig;
use crate::export::export_with_launcher;
use crate::output::{ExportOutcome, SlideJob};
use crate::pipeline::chrome::ChromeLauncher;
use crate::pipeline::engine::EngineLauncher;
use crate::progress::{ExportProgress, ExportProgressCallback, ProgressCallback};
use serde::Serialize;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// A boxed stream of export events.
pub type ExportEventStream = Pin<Box<dyn Stream<Item = ExportEvent> + Send>>;

/// One progress event of a streamed export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    Started { total: usize },
    SlideStarted { slide: usize, total: usize, message: String },
    SlideCompleted { slide: usize, total: usize, pdf_len: usize },
    SlideFailed { slide: usize, total: usize, error: String },
    Finished { total: usize, rendered: usize },
}

/// Forwards callback events into a channel, and to a caller-supplied
/// callback if the config already carried one.
struct ChannelProgressCallback {
    tx: UnboundedSender<ExportEvent>,
    inner: Option<ProgressCallback>,
}

impl ChannelProgressCallback {
    fn send(&self, event: ExportEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl ExportProgressCallback for ChannelProgressCallback {
    fn on_export_start(&self, total_slides: usize) {
        self.send(ExportEvent::Started {
            total: total_slides,
        });
        if let Some(ref cb) = self.inner {
            cb.on_export_start(total_slides);
        }
    }

    fn on_slide_start(&self, progress: &ExportProgress) {
        self.send(ExportEvent::SlideStarted {
            slide: progress.current,
            total: progress.total,
            message: progress.message.clone(),
        });
        if let Some(ref cb) = self.inner {
            cb.on_slide_start(progress);
        }
    }

    fn on_slide_complete(&self, slide: usize, total_slides: usize, pdf_len: usize) {
        self.send(ExportEvent::SlideCompleted {
            slide,
            total: total_slides,
            pdf_len,
        });
        if let Some(ref cb) = self.inner {
            cb.on_slide_complete(slide, total_slides, pdf_len);
        }
    }

    fn on_slide_error(&self, slide: usize, total_slides: usize, error: &str) {
        self.send(ExportEvent::SlideFailed {
            slide,
            total: total_slides,
            error: error.to_string(),
        });
        if let Some(ref cb) = self.inner {
            cb.on_slide_error(slide, total_slides, error);
        }
    }

    fn on_export_complete(&self, total_slides: usize, rendered: usize) {
        self.send(ExportEvent::Finished {
            total: total_slides,
            rendered,
        });
        if let Some(ref cb) = self.inner {
            cb.on_export_complete(total_slides, rendered);
        }
    }
}

/// Export with a local headless Chromium, streaming progress events.
///
/// Must be called from within a tokio runtime.
pub fn export_stream(
    job: SlideJob,
    destination: Option<PathBuf>,
    config: ExportConfig,
) -> (ExportEventStream, JoinHandle<ExportOutcome>) {
    export_stream_with_launcher(Arc::new(ChromeLauncher), job, destination, config)
}

/// [`export_stream`] with a caller-supplied rendering engine.
pub fn export_stream_with_launcher(
    launcher: Arc<dyn EngineLauncher>,
    job: SlideJob,
    destination: Option<PathBuf>,
    mut config: ExportConfig,
) -> (ExportEventStream, JoinHandle<ExportOutcome>) {
    let (tx, rx) = mpsc::unbounded_channel();
    config.progress_callback = Some(Arc::new(ChannelProgressCallback {
        tx,
        inner: config.progress_callback.take(),
    }));

    // The sender lives in `config`; dropping it at task end closes the stream.
    let handle = tokio::spawn(async move {
        export_with_launcher(launcher.as_ref(), &job, destination.as_deref(), &config).await
    });

    (Box::pin(UnboundedReceiverStream::new(rx)), handle)
}
