//! Content settling: wait for images and stylesheets before capture.
//!
//! `load` fires before lazily inserted images and late `<link>` elements
//! finish, and a PDF captured at that moment shows broken-image boxes and
//! unstyled text. Settling lists the assets still in flight, waits for each
//! with a per-kind timeout, then sleeps a fixed trailing delay for
//! script-driven DOM changes.
//!
//! Settling never fails. A load error, a timeout or a script error just ends
//! the wait for that asset; the slide is captured in whatever state it reached.

use crate::config::ExportConfig;
use crate::pipeline::engine::{AssetKind, AssetState, PendingAsset, RenderSession};
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

/// Tally of how each tracked asset resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleReport {
    pub loaded: usize,
    pub errored: usize,
    pub timed_out: usize,
}

impl SettleReport {
    pub fn tracked(&self) -> usize {
        self.loaded + self.errored + self.timed_out
    }
}

enum AssetWait {
    Done(AssetState),
    TimedOut,
}

fn timeout_for(kind: AssetKind, config: &ExportConfig) -> Duration {
    match kind {
        AssetKind::Image => config.image_timeout(),
        AssetKind::Stylesheet => config.stylesheet_timeout(),
    }
}

/// Wait for pending assets in `session`, then apply the trailing delay.
///
/// All waits run concurrently and are joined, so the worst case is the
/// largest per-asset timeout plus the trailing delay.
pub async fn settle_content(session: &dyn RenderSession, config: &ExportConfig) -> SettleReport {
    let assets = match session.pending_assets().await {
        Ok(assets) => assets,
        Err(e) => {
            warn!("Could not list pending assets, skipping asset wait: {}", e);
            Vec::new()
        }
    };

    let waits = assets.iter().map(|asset| wait_one(session, asset, config));
    let outcomes = join_all(waits).await;

    let mut report = SettleReport::default();
    for outcome in outcomes {
        match outcome {
            AssetWait::Done(AssetState::Loaded) => report.loaded += 1,
            AssetWait::Done(AssetState::Errored) => report.errored += 1,
            AssetWait::TimedOut => report.timed_out += 1,
        }
    }

    if report.tracked() > 0 {
        debug!(
            "Assets settled: {} loaded, {} errored, {} timed out",
            report.loaded, report.errored, report.timed_out
        );
    }

    tokio::time::sleep(config.asset_settle_delay()).await;
    report
}

async fn wait_one(
    session: &dyn RenderSession,
    asset: &PendingAsset,
    config: &ExportConfig,
) -> AssetWait {
    let limit = timeout_for(asset.kind, config);
    match tokio::time::timeout(limit, session.wait_for_asset(asset)).await {
        Ok(Ok(state)) => {
            if state == AssetState::Errored {
                warn!("{:?} #{} failed to load: {}", asset.kind, asset.index, asset.url);
            }
            AssetWait::Done(state)
        }
        Ok(Err(e)) => {
            warn!("{:?} #{} wait failed: {}", asset.kind, asset.index, e);
            AssetWait::Done(AssetState::Errored)
        }
        Err(_) => {
            warn!(
                "{:?} #{} still loading after {}ms: {}",
                asset.kind,
                asset.index,
                limit.as_millis(),
                asset.url
            );
            AssetWait::TimedOut
        }
    }
}

/// In-page listing of assets still loading. Evaluates to a JSON array of
/// [`PendingAsset`].
pub const PENDING_ASSETS_JS: &str = r#"(() => {
    const pending = [];
    Array.from(document.images).forEach((img, index) => {
        if (!(img.complete && img.naturalWidth > 0)) {
            pending.push({ kind: 'image', index, url: img.currentSrc || img.src || '' });
        }
    });
    Array.from(document.querySelectorAll('link[rel="stylesheet"]')).forEach((link, index) => {
        if (!link.sheet) {
            pending.push({ kind: 'stylesheet', index, url: link.href || '' });
        }
    });
    return pending;
})()"#;

/// In-page wait for one asset. Evaluates to `"loaded"` or `"errored"` once the
/// asset settles; the caller applies the timeout.
pub fn wait_for_asset_js(asset: &PendingAsset) -> String {
    let lookup = match asset.kind {
        AssetKind::Image => format!("document.images[{}]", asset.index),
        AssetKind::Stylesheet => format!(
            "document.querySelectorAll('link[rel=\"stylesheet\"]')[{}]",
            asset.index
        ),
    };
    let already = match asset.kind {
        AssetKind::Image => {
            "el.complete ? (el.naturalWidth > 0 ? 'loaded' : 'errored') : null"
        }
        AssetKind::Stylesheet => "el.sheet ? 'loaded' : null",
    };
    format!(
        r#"new Promise((resolve) => {{
    const el = {lookup};
    if (!el) {{ resolve('errored'); return; }}
    const now = {already};
    if (now) {{ resolve(now); return; }}
    el.addEventListener('load', () => resolve('loaded'), {{ once: true }});
    el.addEventListener('error', () => resolve('errored'), {{ once: true }});
}})"#
    )
}
