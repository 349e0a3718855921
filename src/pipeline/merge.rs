//! Document merger: single-slide PDFs and placeholders → one numbered PDF.
//!
//! ```text
//! SlideRenderResult ──▶ Merger::append ──▶ import pages  ─┐
//!                                     └─▶ placeholder   ─┴▶ footer "i / N"
//!                       Merger::finish ──▶ page tree + catalog + info ──▶ bytes
//! ```
//!
//! Every appended result contributes at least one page, so a finished merger
//! always holds exactly N numbered page groups.

use crate::config::ExportConfig;
use crate::error::{ExportError, SlideError};
use crate::output::{SlideOutcome, SlideRenderResult};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeSet;
use tracing::debug;

/// Resource name of the Helvetica font used for footers and placeholders.
const FONT_RESOURCE: &[u8] = b"SdHelv";

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Bound on page-tree walks, guards against `Parent` cycles.
const MAX_TREE_DEPTH: usize = 32;

const PRODUCER: &str = concat!("slide2pdf ", env!("CARGO_PKG_VERSION"));

const PLACEHOLDER_HEADLINE: &str = "This slide could not be rendered.";

/// Characters per line of the placeholder's error text.
const WRAP_COLUMNS: usize = 80;

/// What [`Merger::append`] did with one result.
#[derive(Debug, Clone)]
pub struct AppendReport {
    /// Pages added for this slide (at least one).
    pub pages: usize,
    /// The error behind a placeholder page, if one was used.
    pub substituted: Option<SlideError>,
}

struct FooterStyle {
    font_size: f32,
    margin: f32,
    gray: f32,
}

/// Accumulates one page group per slide into a single output document.
pub struct Merger {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page_ids: Vec<ObjectId>,
    groups: usize,
    total: usize,
    footer: FooterStyle,
    placeholder_size: (f32, f32),
    max_message_len: usize,
    title: Option<String>,
}

impl Merger {
    /// Start an empty document for a job of `total` slides.
    pub fn new(total: usize, config: &ExportConfig) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        Self {
            doc,
            pages_id,
            font_id,
            page_ids: Vec::with_capacity(total),
            groups: 0,
            total,
            footer: FooterStyle {
                font_size: config.footer_font_size,
                margin: config.footer_margin,
                gray: config.footer_gray,
            },
            placeholder_size: (config.placeholder_width, config.placeholder_height),
            max_message_len: config.max_error_message_len,
            title: config.title.clone(),
        }
    }

    /// Pages accumulated so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append the page group for one slide.
    ///
    /// Failed slides, and captured PDFs that cannot be loaded, have no pages
    /// or cannot take a footer, become a placeholder page. Errors returned
    /// here are fatal.
    pub fn append(&mut self, result: &SlideRenderResult) -> Result<AppendReport, ExportError> {
        let index = result.index;
        let label = format!("{} / {}", index, self.total);

        let (pages, substituted) = match &result.outcome {
            SlideOutcome::Rendered { pdf, .. } => match self.merge_capture(pdf, &label) {
                Ok(ids) => (ids, None),
                Err(detail) => {
                    let error = SlideError::MergeFailed {
                        slide: index,
                        detail,
                    };
                    (vec![self.add_stamped_placeholder(index, &error, &label)?], Some(error))
                }
            },
            SlideOutcome::Failed(error) => (
                vec![self.add_stamped_placeholder(index, error, &label)?],
                Some(error.clone()),
            ),
        };

        self.groups += 1;
        self.page_ids.extend_from_slice(&pages);
        debug!("Merged slide {} as {} page(s)", index, pages.len());

        Ok(AppendReport {
            pages: pages.len(),
            substituted,
        })
    }

    /// Import a captured PDF and footer every page of it. On error the
    /// imported objects stay unreferenced and are dropped by `finish`.
    fn merge_capture(&mut self, pdf: &[u8], label: &str) -> Result<Vec<ObjectId>, String> {
        let pages = self.import_pages(pdf).map_err(|e| e.to_string())?;
        if pages.is_empty() {
            return Err("captured PDF has no pages".into());
        }
        for &page_id in &pages {
            self.stamp_footer(page_id, label).map_err(|e| e.to_string())?;
        }
        Ok(pages)
    }

    fn add_stamped_placeholder(
        &mut self,
        index: usize,
        error: &SlideError,
        label: &str,
    ) -> Result<ObjectId, ExportError> {
        let page_id = self.add_placeholder(index, error)?;
        self.stamp_footer(page_id, label)?;
        Ok(page_id)
    }

    /// Build the page tree, catalog and info dictionary, then serialize.
    pub fn finish(mut self) -> Result<Vec<u8>, ExportError> {
        if self.groups != self.total {
            return Err(ExportError::Internal(format!(
                "merger holds {} of {} slides",
                self.groups, self.total
            )));
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! { "Producer" => Object::string_literal(PRODUCER) };
        if let Some(title) = &self.title {
            info.set("Title", text_string(title));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);

        self.doc.prune_objects();
        self.doc.compress();

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| ExportError::SerializeFailed {
                detail: e.to_string(),
            })?;
        Ok(bytes)
    }

    // ── Importing captured pages ──────────────────────────────────────────

    fn import_pages(&mut self, pdf: &[u8]) -> Result<Vec<ObjectId>, lopdf::Error> {
        let mut src = Document::load_mem(pdf)?;
        src.renumber_objects_with(self.doc.max_id + 1);

        let page_ids: Vec<ObjectId> = src.get_pages().into_values().collect();
        for &page_id in &page_ids {
            flatten_inherited(&mut src, page_id)?;
        }

        let skipped: BTreeSet<ObjectId> = src
            .objects
            .iter()
            .filter(|(_, obj)| is_tree_node(obj))
            .map(|(&id, _)| id)
            .collect();

        let src_max = src.objects.keys().map(|&(id, _)| id).max().unwrap_or(0);
        self.doc.max_id = self.doc.max_id.max(src_max);

        for (id, obj) in src.objects {
            if !skipped.contains(&id) {
                self.doc.objects.insert(id, obj);
            }
        }

        for &page_id in &page_ids {
            self.doc
                .get_object_mut(page_id)?
                .as_dict_mut()?
                .set("Parent", self.pages_id);
        }

        Ok(page_ids)
    }

    // ── Placeholder pages ─────────────────────────────────────────────────

    fn add_placeholder(&mut self, index: usize, error: &SlideError) -> Result<ObjectId, ExportError> {
        let (width, height) = self.placeholder_size;
        let left = 50.0;
        let mut ops = Vec::new();

        text_line(&mut ops, 24.0, left, height - 100.0, 0.0, &format!("Slide {index}"));
        text_line(&mut ops, 14.0, left, height - 140.0, 0.0, PLACEHOLDER_HEADLINE);

        let message = truncate_message(&error.to_string(), self.max_message_len);
        let mut y = height - 180.0;
        for line in wrap_text(&sanitize_ascii(&message), WRAP_COLUMNS) {
            text_line(&mut ops, 10.0, left, y, 0.35, &line);
            y -= 14.0;
        }

        let content = Content { operations: ops }.encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { FONT_RESOURCE => self.font_id },
            },
        });
        Ok(page_id)
    }

    // ── Footer ────────────────────────────────────────────────────────────

    fn stamp_footer(&mut self, page_id: ObjectId, label: &str) -> Result<(), lopdf::Error> {
        let [_, y0, x1, _] = self.media_box(page_id);
        let FooterStyle {
            font_size,
            margin,
            gray,
        } = self.footer;
        let x = x1 - margin - text_width(label, font_size);
        let y = y0 + margin;

        let mut tail = vec![Operation::new("Q", vec![])];
        text_line(&mut tail, font_size, x, y, gray, label);

        let head_id = self.add_content(vec![Operation::new("q", vec![])])?;
        let tail_id = self.add_content(tail)?;
        self.ensure_font(page_id)?;

        let page = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        let mut contents: Vec<Object> = vec![head_id.into()];
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => contents.push((*id).into()),
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            _ => {}
        }
        contents.push(tail_id.into());
        page.set("Contents", contents);
        Ok(())
    }

    fn add_content(&mut self, operations: Vec<Operation>) -> Result<ObjectId, lopdf::Error> {
        let bytes = Content { operations }.encode()?;
        Ok(self.doc.add_object(Stream::new(dictionary! {}, bytes)))
    }

    /// Register the footer font in the page's resources, hoisting inline
    /// dictionaries into objects so shared resources stay shared.
    fn ensure_font(&mut self, page_id: ObjectId) -> Result<(), lopdf::Error> {
        let resources = self.doc.get_dictionary(page_id)?.get(b"Resources").ok().cloned();
        let resources_id = match resources {
            Some(Object::Reference(id)) => id,
            other => {
                let dict = match other {
                    Some(Object::Dictionary(d)) => d,
                    _ => Dictionary::new(),
                };
                let id = self.doc.add_object(dict);
                self.doc
                    .get_object_mut(page_id)?
                    .as_dict_mut()?
                    .set("Resources", id);
                id
            }
        };

        let fonts = self.doc.get_dictionary(resources_id)?.get(b"Font").ok().cloned();
        let font_dict_id = match fonts {
            Some(Object::Reference(id)) => id,
            other => {
                let dict = match other {
                    Some(Object::Dictionary(d)) => d,
                    _ => Dictionary::new(),
                };
                let id = self.doc.add_object(dict);
                self.doc
                    .get_object_mut(resources_id)?
                    .as_dict_mut()?
                    .set("Font", id);
                id
            }
        };

        self.doc
            .get_object_mut(font_dict_id)?
            .as_dict_mut()?
            .set(FONT_RESOURCE, self.font_id);
        Ok(())
    }

    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let fallback = [0.0, 0.0, self.placeholder_size.0, self.placeholder_size.1];
        let Ok(page) = self.doc.get_dictionary(page_id) else {
            return fallback;
        };
        let Ok(obj) = page.get(b"MediaBox") else {
            return fallback;
        };
        let obj = match obj {
            Object::Reference(id) => match self.doc.get_object(*id) {
                Ok(o) => o,
                Err(_) => return fallback,
            },
            o => o,
        };
        match obj.as_array() {
            Ok(values) if values.len() == 4 => {
                let mut rect = [0.0; 4];
                for (slot, value) in rect.iter_mut().zip(values) {
                    match number(value) {
                        Some(n) => *slot = n,
                        None => return fallback,
                    }
                }
                rect
            }
            _ => fallback,
        }
    }
}

// ── Page-tree helpers ─────────────────────────────────────────────────────

fn is_tree_node(obj: &Object) -> bool {
    obj.as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .is_some_and(|name| name == b"Pages" || name == b"Catalog")
}

/// Copy inherited attributes onto the page so it survives losing its tree.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let mut inherited = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = find_inherited(doc, page, key) {
                inherited.push((key, value));
            }
        }
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

fn find_inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

// ── Text helpers ──────────────────────────────────────────────────────────

fn text_line(ops: &mut Vec<Operation>, size: f32, x: f32, y: f32, gray: f32, text: &str) {
    ops.extend([
        Operation::new("BT", vec![]),
        Operation::new(
            "rg",
            vec![Object::Real(gray), Object::Real(gray), Object::Real(gray)],
        ),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.to_vec()), Object::Real(size)],
        ),
        Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]);
}

/// Width of `text` in Helvetica at `size` points.
fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' ' | '/' | '.' | ',' => 278,
            'i' | 'l' | 'j' => 222,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Limit `message` to `max` characters, marking the cut with `...`.
pub(crate) fn truncate_message(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }
    let kept: String = message.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Replace anything outside printable ASCII with `?`; the standard font
/// cannot show it.
pub(crate) fn sanitize_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c,
            '\n' | '\t' => ' ',
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap at `columns`, splitting words longer than a line.
/// Expects ASCII input (see [`sanitize_ascii`]).
pub(crate) fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let (head, rest) = word.split_at(columns);
            lines.push(head.to_string());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + 1 + word.len() > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
