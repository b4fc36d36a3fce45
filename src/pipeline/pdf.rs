//! Thin PDF primitive layer over `lopdf`.
//!
//! The rest of the pipeline only needs a handful of operations:
//!
//! | Operation | Type |
//! |-----------|------|
//! | open a document, count and measure its pages | [`PdfFile::open`], [`PdfFile::page_box`] |
//! | read a page's text layer | [`PdfFile::page_text`], [`PdfFile::raw_page_text`] |
//! | draw a line of text on top of a page | [`PdfFile::overlay_text`] |
//! | concatenate pages of many documents | [`PdfWriter`] |
//! | produce simple text documents | [`TextDocument`] |
//!
//! ## Coordinate system
//!
//! PDF user space has its origin at the bottom-left corner of the MediaBox,
//! X grows to the right and Y grows upward. Overlays are anchored relative to
//! the MediaBox of the individual page, so documents mixing A4 and Letter (or
//! landscape) pages are stamped correctly.
//!
//! ## Fonts
//!
//! Overlays use the standard Type1 Helvetica with `WinAnsiEncoding`, which
//! every conforming reader provides without embedding. Text is encoded as
//! Latin-1; characters outside it are replaced by `?`. Marker identifiers
//! never reach that replacement because `marker::validate_identifier`
//! refuses them first.

use crate::error::PdfError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// US Letter, used when a page has no MediaBox anywhere in its tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page-tree attributes a page may inherit from its ancestors.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guard against cyclic `/Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 32;

/// Resource name prefix of the overlay font.
const OVERLAY_FONT_KEY: &str = "TcHelv";

/// Object types that describe document structure rather than page content.
const STRUCTURAL_TYPES: [&[u8]; 6] = [b"Catalog", b"Pages", b"Outlines", b"Outline", b"XRef", b"ObjStm"];

// ── Geometry ─────────────────────────────────────────────────────────────

/// A page rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    fn from_array(values: [f32; 4]) -> Self {
        Self {
            x0: values[0].min(values[2]),
            y0: values[1].min(values[3]),
            x1: values[0].max(values[2]),
            y1: values[1].max(values[3]),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Where an overlay line is placed on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Text starts `inset` points from the left edge, baseline `inset` above the bottom.
    BottomLeft { inset: f32 },
    /// Text ends `inset` points from the right edge, baseline `inset` above the bottom.
    BottomRight { inset: f32 },
}

impl Anchor {
    fn origin(&self, page: &PageBox, text_width: f32) -> (f32, f32) {
        match *self {
            Anchor::BottomLeft { inset } => (page.x0 + inset, page.y0 + inset),
            Anchor::BottomRight { inset } => (page.x1 - text_width - inset, page.y0 + inset),
        }
    }
}

/// One line of text to draw on top of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub font_size: f32,
    /// Fill gray level, 0.0 (black) to 1.0 (white), applied to R, G and B.
    pub gray: f32,
    pub anchor: Anchor,
}

// ── Reading and stamping ─────────────────────────────────────────────────

/// An open PDF document.
pub struct PdfFile {
    path: PathBuf,
    doc: Document,
    pages: Vec<ObjectId>,
    overlay_font: Option<ObjectId>,
}

impl PdfFile {
    /// Parse the document at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| PdfError::Load {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!("Opened {} ({} pages)", path.display(), pages.len());
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            pages,
            overlay_font: None,
        })
    }

    /// Path the document was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_id(&self, page: u32) -> Result<ObjectId, PdfError> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .copied()
            .ok_or_else(|| PdfError::PageOutOfRange {
                page,
                total: self.page_count(),
            })
    }

    /// Effective MediaBox of the 1-based `page`.
    pub fn page_box(&self, page: u32) -> Result<PageBox, PdfError> {
        let page_id = self.page_id(page)?;
        let values = inherited(&self.doc, page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| {
                let nums: Vec<f32> = arr.iter().filter_map(|o| number(resolve(&self.doc, o))).collect();
                <[f32; 4]>::try_from(nums).ok()
            })
            .unwrap_or(DEFAULT_MEDIA_BOX);
        Ok(PageBox::from_array(values))
    }

    /// Text layer of the 1-based `page`, as decoded by `lopdf` using the page's fonts.
    pub fn page_text(&self, page: u32) -> Result<String, PdfError> {
        self.page_id(page)?;
        self.doc
            .extract_text(&[page])
            .map_err(|e| PdfError::Structure(format!("text extraction failed on page {page}: {e}")))
    }

    /// Text shown by `Tj`/`TJ`/`'`/`"` operators of the page, bytes read as Latin-1.
    ///
    /// Each content stream is decoded on its own, so one corrupt stream
    /// does not hide the text of the others.
    pub fn raw_page_text(&self, page: u32) -> Result<String, PdfError> {
        let page_id = self.page_id(page)?;
        let mut text = String::new();
        for stream in content_streams(&self.doc, page_id) {
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let Ok(content) = Content::decode(&bytes) else {
                continue;
            };
            for op in &content.operations {
                match op.operator.as_str() {
                    "Tj" | "'" | "\"" | "TJ" => collect_strings(&op.operands, &mut text),
                    "ET" => {
                        if !text.ends_with('\n') {
                            text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(text)
    }

    /// Draw `overlay` on top of the 1-based `page`.
    ///
    /// Existing page content is wrapped in `q … Q` first so graphics state
    /// it leaves behind (transforms, colours) cannot move or recolour the overlay.
    pub fn overlay_text(&mut self, page: u32, overlay: &TextOverlay) -> Result<(), PdfError> {
        let page_id = self.page_id(page)?;
        let page_box = self.page_box(page)?;
        let font_id = self.overlay_font_id();
        let font_key = self.attach_font(page_id, font_id)?;

        let width = text_width(&overlay.text, overlay.font_size);
        let (x, y) = overlay.anchor.origin(&page_box, width);
        let g = overlay.gray;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("rg", vec![g.into(), g.into(), g.into()]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(font_key.into_bytes()), overlay.font_size.into()],
                ),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(encode_latin1(&overlay.text), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        let body = content
            .encode()
            .map_err(|e| PdfError::Structure(format!("cannot encode overlay: {e}")))?;
        self.append_content(page_id, body)
    }

    /// Write the document to `path` through a sibling temp file and a rename.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        save_document(&mut self.doc, path.as_ref())
    }

    fn overlay_font_id(&mut self) -> ObjectId {
        if let Some(id) = self.overlay_font {
            return id;
        }
        let id = self.doc.add_object(helvetica_font());
        self.overlay_font = Some(id);
        id
    }

    /// Register `font_id` in the page's own resource dictionary and return its name.
    fn attach_font(&mut self, page_id: ObjectId, font_id: ObjectId) -> Result<String, PdfError> {
        let mut resources = match inherited(&self.doc, page_id, b"Resources") {
            Some(Object::Dictionary(d)) => d.clone(),
            _ => Dictionary::new(),
        };
        let mut fonts = match resources.get(b"Font").map(|o| resolve(&self.doc, o)) {
            Ok(Object::Dictionary(d)) => d.clone(),
            _ => Dictionary::new(),
        };

        let existing = fonts.iter().find_map(|(k, v)| match v {
            Object::Reference(id) if *id == font_id => Some(String::from_utf8_lossy(k).into_owned()),
            _ => None,
        });
        let key = match existing {
            Some(key) => key,
            None => {
                let mut key = OVERLAY_FONT_KEY.to_string();
                let mut n = 1;
                while fonts.has(key.as_bytes()) {
                    key = format!("{OVERLAY_FONT_KEY}{n}");
                    n += 1;
                }
                fonts.set(key.clone(), Object::Reference(font_id));
                key
            }
        };

        resources.set("Font", Object::Dictionary(fonts));
        self.doc
            .get_dictionary_mut(page_id)
            .map_err(|e| PdfError::Structure(format!("page object missing: {e}")))?
            .set("Resources", Object::Dictionary(resources));
        Ok(key)
    }

    fn append_content(&mut self, page_id: ObjectId, body: Vec<u8>) -> Result<(), PdfError> {
        let existing: Vec<Object> = {
            let page = self
                .doc
                .get_dictionary(page_id)
                .map_err(|e| PdfError::Structure(format!("page object missing: {e}")))?;
            match page.get(b"Contents") {
                Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                    Ok(Object::Array(items)) => items.clone(),
                    _ => vec![Object::Reference(*id)],
                },
                Ok(Object::Array(items)) => items.clone(),
                _ => Vec::new(),
            }
        };

        let mut contents = Vec::with_capacity(existing.len() + 2);
        let mut overlay = Vec::with_capacity(body.len() + 3);
        if !existing.is_empty() {
            let open = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            contents.push(Object::Reference(open));
            contents.extend(existing);
            overlay.extend_from_slice(b"\nQ\n");
        }
        overlay.extend_from_slice(&body);
        let overlay_id = self.doc.add_object(Stream::new(Dictionary::new(), overlay));
        contents.push(Object::Reference(overlay_id));

        self.doc
            .get_dictionary_mut(page_id)
            .map_err(|e| PdfError::Structure(format!("page object missing: {e}")))?
            .set("Contents", Object::Array(contents));
        Ok(())
    }
}

// ── Writing merged documents ─────────────────────────────────────────────

/// Accumulates pages from many documents into one output document.
///
/// Pages keep their document order and documents keep their append order.
pub struct PdfWriter {
    document: Document,
    pages: Vec<ObjectId>,
    next_id: u32,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            pages: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Append every page of `file`; returns the number of pages added.
    pub fn append(&mut self, file: PdfFile) -> u32 {
        let PdfFile { mut doc, pages, .. } = file;

        // Resolve inherited attributes while the original page tree still exists.
        for &page_id in &pages {
            materialise_inherited(&mut doc, page_id);
        }

        doc.renumber_objects_with(self.next_id);
        self.next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for (id, object) in std::mem::take(&mut doc.objects) {
            let kind = object.type_name().unwrap_or(b"");
            if STRUCTURAL_TYPES.iter().any(|t| *t == kind) {
                continue;
            }
            self.document.objects.insert(id, object);
        }

        let added = page_ids.len() as u32;
        self.pages.extend(page_ids);
        added
    }

    /// Build the page tree and write the document; returns the page count.
    pub fn write(mut self, path: impl AsRef<Path>) -> Result<u32, PdfError> {
        if self.pages.is_empty() {
            return Err(PdfError::Structure("no pages to write".into()));
        }

        self.document.max_id = self.next_id.saturating_sub(1);
        let pages_id = self.document.new_object_id();

        for page_id in &self.pages {
            if let Ok(page) = self.document.get_dictionary_mut(*page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        let kids: Vec<Object> = self.pages.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as u32;
        self.document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(count),
            }),
        );
        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.document.trailer.set("Root", Object::Reference(catalog_id));
        self.document.compress();

        save_document(&mut self.document, path.as_ref())?;
        Ok(count)
    }
}

// ── Simple text documents ────────────────────────────────────────────────

/// Builder for plain Helvetica text documents, one `Vec<String>` per page.
#[derive(Debug, Clone)]
pub struct TextDocument {
    width: f32,
    height: f32,
    font_size: f32,
    margin: f32,
    pages: Vec<Vec<String>>,
}

impl TextDocument {
    /// Start a document whose pages are `width` × `height` points.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            font_size: 11.0,
            margin: 56.0,
            pages: Vec::new(),
        }
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = size.max(1.0);
        self
    }

    pub fn margin(mut self, margin: f32) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    /// Append a page with the given lines.
    pub fn page<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pages.push(lines.into_iter().map(Into::into).collect());
        self
    }

    /// Line spacing in points.
    pub fn leading(&self) -> f32 {
        self.font_size * 1.3
    }

    /// Lines that fit between the top and bottom margins.
    pub fn lines_per_page(&self) -> usize {
        let usable = self.height - 2.0 * self.margin;
        ((usable / self.leading()).floor() as usize).max(1)
    }

    /// Widest line (in points) that fits between the side margins.
    pub fn line_width(&self) -> f32 {
        (self.width - 2.0 * self.margin).max(self.font_size)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len().max(1)
    }

    /// Write the document; a document without pages gets one blank page.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<u32, PdfError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(helvetica_font());
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let blank = [Vec::new()];
        let pages: &[Vec<String>] = if self.pages.is_empty() { &blank } else { &self.pages };

        let mut kids = Vec::with_capacity(pages.len());
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), self.font_size.into()]),
                Operation::new("TL", vec![self.leading().into()]),
                Operation::new(
                    "Td",
                    vec![self.margin.into(), (self.height - self.margin - self.font_size).into()],
                ),
            ];
            for line in lines {
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_latin1(line), StringFormat::Literal)],
                ));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let body = Content { operations }
                .encode()
                .map_err(|e| PdfError::Structure(format!("cannot encode page: {e}")))?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), body));
            let media_box: Vec<Object> = vec![0.into(), 0.into(), self.width.into(), self.height.into()];
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => media_box,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as u32;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(count),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        save_document(&mut doc, path.as_ref())?;
        Ok(count)
    }
}

// ── Text metrics ─────────────────────────────────────────────────────────

/// Helvetica advance widths (1/1000 em) for WinAnsi codes 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Rendered width of `text` in Helvetica at `font_size`, in points.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = encode_latin1(text)
        .iter()
        .map(|&b| match b {
            32..=126 => u32::from(HELVETICA_WIDTHS[(b - 32) as usize]),
            _ => 556,
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// Encode `text` for a WinAnsi font; characters outside Latin-1 become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn helvetica_font() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Look up `key` on the page or the nearest ancestor that defines it.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Copy inheritable attributes from ancestors onto the page itself.
fn materialise_inherited(doc: &mut Document, page_id: ObjectId) {
    let mut missing = Vec::new();
    if let Ok(page) = doc.get_dictionary(page_id) {
        for key in INHERITABLE_KEYS {
            if page.has(key) {
                continue;
            }
            let parent_value = page
                .get(b"Parent")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|parent| inherited(doc, parent, key))
                .cloned();
            if let Some(value) = parent_value {
                missing.push((key.to_vec(), value));
            }
        }
    }
    if missing.is_empty() {
        return;
    }
    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        for (key, value) in missing {
            page.set(key, value);
        }
    }
}

fn content_streams(doc: &Document, page_id: ObjectId) -> Vec<&Stream> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let refs: Vec<&Object> = match page.get(b"Contents").map(|o| resolve(doc, o)) {
        Ok(Object::Array(items)) => items.iter().collect(),
        Ok(other) => vec![other],
        Err(_) => Vec::new(),
    };
    refs.into_iter()
        .filter_map(|o| match resolve(doc, o) {
            Object::Stream(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn collect_strings(operands: &[Object], out: &mut String) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => out.extend(bytes.iter().map(|&b| char::from(b))),
            Object::Array(items) => collect_strings(items, out),
            _ => {}
        }
    }
}

fn save_document(doc: &mut Document, path: &Path) -> Result<(), PdfError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".into());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    write_then_rename(doc, &tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        PdfError::Save {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn write_then_rename(doc: &mut Document, tmp: &Path, path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(fs::File::create(tmp)?);
    doc.save_to(&mut out)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    out.flush()?;
    drop(out);
    fs::rename(tmp, path)
}
