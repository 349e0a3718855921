//! Chromium rendering engine over the DevTools protocol (`chromiumoxide`).
//!
//! One headless browser per job; one tab per slide. The CDP handler runs on
//! its own task for the lifetime of the browser and is joined at shutdown.

use crate::config::ExportConfig;
use crate::error::EngineError;
use crate::output::ContentSize;
use crate::pipeline::engine::{
    AssetState, EngineLauncher, PaperSize, PendingAsset, RenderEngine, RenderSession,
};
use crate::pipeline::obfuscation::DECODE_EMAILS_JS;
use crate::pipeline::settle::{wait_for_asset_js, PENDING_ASSETS_JS};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Polling interval while waiting for the network to go quiet.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// How long shutdown waits for the CDP handler before aborting it.
const HANDLER_GRACE: Duration = Duration::from_secs(5);

const MEASURE_JS: &str = r#"(() => {
    const root = document.documentElement;
    const body = document.body;
    return {
        width: Math.max(root.scrollWidth, body ? body.scrollWidth : 0),
        height: Math.max(root.scrollHeight, body ? body.scrollHeight : 0),
    };
})()"#;

const LOAD_STATE_JS: &str = r#"({
    ready: document.readyState,
    resources: performance.getEntriesByType('resource').length,
})"#;

/// Launches a local headless Chromium.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

#[async_trait]
impl EngineLauncher for ChromeLauncher {
    async fn launch(&self, config: &ExportConfig) -> Result<Box<dyn RenderEngine>, EngineError> {
        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                ..Default::default()
            })
            .arg("--allow-file-access-from-files")
            .arg("--hide-scrollbars");
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        let browser_config = builder.build().map_err(EngineError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        info!("Launched headless Chromium");
        Ok(Box::new(ChromeEngine {
            browser,
            handle,
            network_idle: config.network_idle(),
        }))
    }
}

struct ChromeEngine {
    browser: Browser,
    handle: JoinHandle<()>,
    network_idle: Duration,
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, EngineError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| EngineError::Session(e.to_string()))?;
        Ok(Box::new(ChromeSession {
            page,
            network_idle: self.network_idle,
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<(), EngineError> {
        let ChromeEngine {
            mut browser,
            handle,
            ..
        } = *self;

        let closed = browser
            .close()
            .await
            .map_err(|e| EngineError::Session(e.to_string()));
        if let Err(e) = browser.wait().await {
            warn!("Waiting for Chromium to exit failed: {}", e);
        }

        let abort = handle.abort_handle();
        if tokio::time::timeout(HANDLER_GRACE, handle).await.is_err() {
            abort.abort();
        }

        debug!("Chromium shut down");
        closed.map(|_| ())
    }
}

struct ChromeSession {
    page: Page,
    network_idle: Duration,
}

#[derive(Deserialize)]
struct LoadState {
    ready: String,
    resources: u64,
}

impl ChromeSession {
    async fn eval<T: DeserializeOwned>(&self, expression: impl Into<String>) -> Result<T, EngineError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(EngineError::Script)?;
        self.page
            .evaluate_expression(params)
            .await
            .map_err(|e| EngineError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| EngineError::Script(e.to_string()))
    }

    /// Poll until the document is complete and no new resource entries
    /// appeared for one idle window.
    async fn wait_for_network_idle(&self) -> Result<(), EngineError> {
        let mut last_count = None;
        let mut quiet_since = tokio::time::Instant::now();
        loop {
            let state: LoadState = self.eval(LOAD_STATE_JS).await?;
            let now = tokio::time::Instant::now();
            if last_count != Some(state.resources) {
                last_count = Some(state.resources);
                quiet_since = now;
            }
            if state.ready == "complete" && now.duration_since(quiet_since) >= self.network_idle {
                return Ok(());
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        self.wait_for_network_idle().await
    }

    async fn pending_assets(&self) -> Result<Vec<PendingAsset>, EngineError> {
        self.eval(PENDING_ASSETS_JS).await
    }

    async fn wait_for_asset(&self, asset: &PendingAsset) -> Result<AssetState, EngineError> {
        self.eval(wait_for_asset_js(asset)).await
    }

    async fn decode_obfuscated_emails(&self) -> Result<usize, EngineError> {
        self.eval(DECODE_EMAILS_JS).await
    }

    async fn measure(&self) -> Result<ContentSize, EngineError> {
        self.eval(MEASURE_JS).await
    }

    async fn capture_pdf(&self, page: PaperSize) -> Result<Vec<u8>, EngineError> {
        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(page.width_in),
            paper_height: Some(page.height_in),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            page_ranges: Some("1".to_string()),
            prefer_css_page_size: Some(false),
            ..Default::default()
        };
        self.page
            .pdf(params)
            .await
            .map_err(|e| EngineError::Capture(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.page
            .close()
            .await
            .map_err(|e| EngineError::Session(e.to_string()))
    }
}
