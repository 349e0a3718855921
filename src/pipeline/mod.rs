//! Pipeline stages for slide-deck export.
//!
//! Each submodule implements one step; the engine traits keep the browser
//! behind a seam so every stage above it runs against in-memory fakes in
//! tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ capture ─────────────────────────────▶ merge
//! (path)    (session: navigate → settle → decode   (import / placeholder,
//!            → measure → print)                    footer, serialize)
//! ```
//!
//! 1. [`input`]   — discover slides, resolve each locator to a `file://` URL
//! 2. [`capture`] — drive one session per slide through [`engine`]
//! 3. [`settle`]  — bounded waits on images and stylesheets
//! 4. [`obfuscation`] — in-page email decoding
//! 5. [`merge`]   — stitch per-slide PDFs into the numbered output
//!
//! [`chrome`] is the production [`engine::EngineLauncher`].

pub mod capture;
pub mod chrome;
pub mod engine;
pub mod input;
pub mod merge;
pub mod obfuscation;
pub mod settle;
