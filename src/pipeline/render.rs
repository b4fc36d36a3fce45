//! HTML→PDF rendering.
//!
//! The compiler only sees the [`HtmlRenderer`] trait. Two implementations
//! ship with the crate:
//!
//! * [`ChromeRenderer`] prints through a headless Chrome/Chromium process,
//!   giving full CSS support (tables, backgrounds, the watermark).
//! * [`PlainTextRenderer`] flattens the HTML to text and lays it out as
//!   Helvetica pages with `lopdf`. No browser needed; used by the CLI's
//!   `--renderer plain` and wherever Chrome is unavailable.
//!
//! ## Why a separate process?
//!
//! Rendering HTML faithfully needs a browser engine. Shelling out keeps the
//! crate pure Rust and lets the user pick whatever Chrome build is installed.
//! Page size, margins and background printing are injected as CSS so every
//! Chrome version honours them the same way.

use crate::error::RenderError;
use crate::pipeline::pdf::{text_width, PdfFile, TextDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Environment variable overriding Chrome discovery.
pub const CHROME_ENV: &str = "TRACECERT_CHROME";

/// Executable names searched on `PATH`, in order.
const CHROME_NAMES: [&str; 5] = [
    "chrome",
    "chromium",
    "google-chrome",
    "google-chrome-stable",
    "chromium-browser",
];

/// Points per centimetre.
pub const PT_PER_CM: f32 = 72.0 / 2.54;

// ── Options ──────────────────────────────────────────────────────────────

/// Paper size of rendered documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    /// Width and height in points.
    Custom { width: f32, height: f32 },
}

impl PageSize {
    /// `(width, height)` in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (width, height),
        }
    }

    /// Value for the CSS `@page { size: … }` rule.
    pub fn css(self) -> String {
        match self {
            PageSize::A4 => "A4".to_string(),
            PageSize::Letter => "letter".to_string(),
            PageSize::Legal => "legal".to_string(),
            PageSize::Custom { width, height } => format!("{width}pt {height}pt"),
        }
    }
}

impl std::str::FromStr for PageSize {
    type Err = String;

    /// Accepts `a4`, `letter`, `legal` or `<width>x<height>` in points.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| format!("unknown page size '{s}'"))?;
                let width: f32 = w.trim().parse().map_err(|_| format!("bad width in '{s}'"))?;
                let height: f32 = h.trim().parse().map_err(|_| format!("bad height in '{s}'"))?;
                Ok(PageSize::Custom { width, height })
            }
        }
    }
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(points: f32) -> Self {
        Self {
            top: points,
            right: points,
            bottom: points,
            left: points,
        }
    }
}

impl Default for Margins {
    /// 1 cm on every side.
    fn default() -> Self {
        Self::uniform(PT_PER_CM)
    }
}

/// Options passed to every render call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub page_size: PageSize,
    pub margins: Margins,
    pub print_background: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margins: Margins::default(),
            print_background: true,
        }
    }
}

// ── Trait ────────────────────────────────────────────────────────────────

/// Turns an HTML document into a PDF file.
///
/// Implementations must be `Send + Sync` so a compiler can be shared across
/// threads and moved into `spawn_blocking`.
pub trait HtmlRenderer: Send + Sync {
    /// Render `html` to `output`, returning the path of the written PDF.
    fn render_html_to_pdf(
        &self,
        html: &str,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<PathBuf, RenderError>;

    /// Short name for log lines.
    fn name(&self) -> &str {
        "renderer"
    }
}

// ── Chrome ───────────────────────────────────────────────────────────────

/// Prints HTML through `chrome --headless --print-to-pdf`.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    executable: PathBuf,
}

impl ChromeRenderer {
    /// Use a specific Chrome/Chromium executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Find Chrome via `TRACECERT_CHROME`, `PATH`, then the usual install locations.
    pub fn locate() -> Result<Self, RenderError> {
        find_chrome().map(Self::new).ok_or(RenderError::ChromeNotFound)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl HtmlRenderer for ChromeRenderer {
    fn render_html_to_pdf(
        &self,
        html: &str,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<PathBuf, RenderError> {
        let html_path = output.with_extension("html");
        fs::write(&html_path, inject_print_css(html, options)).map_err(|source| RenderError::Io {
            path: html_path.clone(),
            source,
        })?;

        // A throwaway profile keeps concurrent renders from fighting over a lock.
        let profile = tempfile::TempDir::new().map_err(|source| RenderError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

        debug!("Printing {} with {}", html_path.display(), self.executable.display());
        let result = Command::new(&self.executable)
            .args([
                "--headless",
                "--disable-gpu",
                "--no-sandbox",
                "--no-first-run",
                "--no-pdf-header-footer",
                "--run-all-compositor-stages-before-draw",
            ])
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(file_url(&html_path))
            .output();
        let _ = fs::remove_file(&html_path);

        let out = result.map_err(|source| RenderError::Spawn {
            program: self.executable.clone(),
            source,
        })?;

        let produced = fs::metadata(output).map(|m| m.len() > 0).unwrap_or(false);
        if !out.status.success() || !produced {
            return Err(RenderError::Failed(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        // Chrome can exit 0 after writing a truncated file.
        let pages = PdfFile::open(output)?.page_count();
        info!("Rendered {} ({} pages)", output.display(), pages);
        Ok(output.to_path_buf())
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

fn find_chrome() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CHROME_ENV) {
        let path = PathBuf::from(explicit);
        if path.is_file() {
            return Some(path);
        }
        if let Ok(found) = which::which(&path) {
            return Some(found);
        }
    }

    if let Some(found) = CHROME_NAMES.iter().find_map(|name| which::which(name).ok()) {
        return Some(found);
    }

    platform_chrome_paths().into_iter().find(|p| p.is_file())
}

fn platform_chrome_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
        paths.push(PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"));
    } else if cfg!(windows) {
        paths.push(PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"));
        paths.push(PathBuf::from(
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ));
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            paths.push(PathBuf::from(local).join(r"Google\Chrome\Application\chrome.exe"));
        }
    }
    paths
}

/// Prepend `@page` rules for size and margins, plus exact colour printing
/// when backgrounds are wanted.
pub fn inject_print_css(html: &str, options: &RenderOptions) -> String {
    let m = options.margins;
    let mut css = format!(
        "@page {{ size: {}; margin: {}pt {}pt {}pt {}pt; }}",
        options.page_size.css(),
        m.top,
        m.right,
        m.bottom,
        m.left
    );
    if options.print_background {
        css.push_str(" html, body { -webkit-print-color-adjust: exact; print-color-adjust: exact; }");
    }
    let style = format!("<style>{css}</style>");

    match html.find("</head>") {
        Some(at) => format!("{}{}{}", &html[..at], style, &html[at..]),
        None => format!("{style}{html}"),
    }
}

fn file_url(path: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    let s = absolute.to_string_lossy().replace('\\', "/");
    let s = s.trim_start_matches("//?/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

// ── Plain text ───────────────────────────────────────────────────────────

static DROPPED_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<head\b.*?</head\s*>|<style\b.*?</style\s*>|<script\b.*?</script\s*>|<div[^>]*class="watermark"[^>]*>.*?</div\s*>"#,
    )
    .unwrap()
});
static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|tr|li|table|header|footer|section)\s*>").unwrap()
});
static CELL_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</t[dh]\s*>").unwrap());
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

/// Lays the text content of the HTML out as Helvetica pages.
#[derive(Debug, Clone)]
pub struct PlainTextRenderer {
    font_size: f32,
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self { font_size: 10.0 }
    }
}

impl PlainTextRenderer {
    pub fn new(font_size: f32) -> Self {
        Self { font_size }
    }
}

impl HtmlRenderer for PlainTextRenderer {
    fn render_html_to_pdf(
        &self,
        html: &str,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<PathBuf, RenderError> {
        let (width, height) = options.page_size.dimensions();
        let layout = TextDocument::new(width, height)
            .font_size(self.font_size)
            .margin(options.margins.left.max(options.margins.top));

        let mut lines = Vec::new();
        for line in html_to_lines(html) {
            wrap_line(&line, layout.line_width(), self.font_size, &mut lines);
        }

        let per_page = layout.lines_per_page();
        let mut document = layout;
        if lines.is_empty() {
            document = document.page(Vec::<String>::new());
        }
        for chunk in lines.chunks(per_page) {
            document = document.page(chunk.iter().cloned());
        }

        let pages = document.save(output)?;
        debug!("Laid out {} as {} text page(s)", output.display(), pages);
        Ok(output.to_path_buf())
    }

    fn name(&self) -> &str {
        "plain"
    }
}

/// Flatten HTML into text lines: block ends become line breaks, table
/// cells are separated by two spaces, entities are decoded.
pub fn html_to_lines(html: &str) -> Vec<String> {
    let text = DROPPED_BLOCKS.replace_all(html, "");
    let text = LINE_BREAKS.replace_all(&text, "\n");
    let text = CELL_BREAKS.replace_all(&text, "  ");
    let text = TAGS.replace_all(&text, "");
    let text = decode_entities(&text);

    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = SPACES.replace_all(raw.trim(), " ").into_owned();
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn wrap_line(line: &str, max_width: f32, font_size: f32, out: &mut Vec<String>) {
    if text_width(line, font_size) <= max_width {
        out.push(line.to_string());
        return;
    }
    let mut current = String::new();
    for word in line.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, font_size) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            out.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}
