//! # tracecert
//!
//! Compile traceability reports: a material specification followed by the
//! certificates of every article, grouped by certificate type, with a cover
//! holding the table of contents and page numbers on every page.
//!
//! ## Why stamp markers into the pages?
//!
//! Certificates arrive as arbitrary PDFs from suppliers. Some are scans,
//! some are broken, some are missing. Instead of trusting page counts, every
//! page is stamped with an invisible-looking machine-readable marker naming
//! its section, and the table of contents is rebuilt by reading those
//! markers back from the merged document. What ends up in the file is what
//! the cover describes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Project + articles + certificates
//!  │
//!  ├─ 1. Render   material specification (HTML → PDF)
//!  ├─ 2. Stamp    main report, one divider per type, every certificate
//!  ├─ 3. Merge    body document
//!  ├─ 4. Scan     recover markers → table of contents
//!  ├─ 5. Cover    render + stamp the cover, merge it in front
//!  └─ 6. Label    `Page i/n` on every page but the cover
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracecert::{ChromeRenderer, CompileConfig, Manifest, ReportCompiler};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manifest = Manifest::load("project.json".as_ref())?;
//!     let compiler = ReportCompiler::new(Arc::new(ChromeRenderer::locate()?), CompileConfig::default());
//!     let report = compiler.compile_from_source(&manifest, manifest.project_id(), "report.pdf")?;
//!     for section in &report.sections {
//!         println!("{:<20} {}", section.name, section.range_label());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tracecert` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! tracecert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compile;
pub mod config;
pub mod error;
pub mod html;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compile::{CompileRequest, ReportCompiler};
pub use config::{CompileConfig, CompileConfigBuilder, DEFAULT_WATERMARK};
pub use error::{
    CompileWarning, MergeError, PdfError, RenderError, ReportError, ScanError, Stage, StampError,
};
pub use model::{
    Article, Certificate, CompiledReport, Project, ReportSummary, Segment, SegmentKind,
    SegmentSummary, Stamp, TocSection,
};
pub use pipeline::merge::{merge, MergeOutcome};
pub use pipeline::render::{ChromeRenderer, HtmlRenderer, Margins, PageSize, PlainTextRenderer, RenderOptions};
pub use pipeline::scan::extract;
pub use pipeline::stamp::{stamp_document, stamp_page_numbers, StampOutcome, StampStyle};
pub use pipeline::toc::TableOfContents;
pub use progress::{CompileProgressCallback, FnProgress, NoopProgressCallback, ProgressCallback};
pub use source::{Manifest, ReportSource};
