//! Error types for the tracecert library.
//!
//! Two families of errors reflect two distinct failure modes:
//!
//! * **Fatal**: the report cannot be produced. Every fatal condition that
//!   escapes [`crate::compile::ReportCompiler::compile`] is wrapped into
//!   [`ReportError::Generation`], which carries the pipeline [`Stage`], the
//!   attempted output path and the underlying cause.
//!
//! * **Non-fatal**: a single certificate or divider could not be used, the
//!   markers could not all be recovered, or the workspace could not be
//!   removed. These are stored as [`CompileWarning`] values inside
//!   [`crate::model::CompiledReport`] so callers can inspect what was left
//!   out rather than losing the whole report to one bad scan.
//!
//! The stage-level errors ([`StampError`], [`MergeError`], [`ScanError`],
//! [`RenderError`]) are returned by the individual pipeline components and
//! can be used on their own (the CLI's `stamp`/`merge`/`scan` subcommands do).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ── PDF primitive ────────────────────────────────────────────────────────

/// Failure inside the PDF primitive layer ([`crate::pipeline::pdf`]).
#[derive(Debug, Error)]
pub enum PdfError {
    /// The file could not be parsed as a PDF.
    #[error("cannot read PDF '{path}': {detail}")]
    Load { path: PathBuf, detail: String },

    /// The document parsed, but its object structure is unusable.
    #[error("malformed PDF structure: {0}")]
    Structure(String),

    /// A page index outside `1..=page_count` was requested.
    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    /// Serialising the document failed.
    #[error("cannot write PDF '{path}': {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Stamping ─────────────────────────────────────────────────────────────

/// Failure while stamping a document.
///
/// One type for every stamping failure; [`StampError::is_fatal`] tells the
/// caller whether the input itself is absent (fatal) or whether the document
/// could be skipped (recoverable).
#[derive(Debug, Error)]
pub enum StampError {
    /// The document to stamp does not exist.
    #[error("PDF to stamp not found: '{path}'")]
    NotFound { path: PathBuf },

    /// An identifier cannot be carried by the marker grammar.
    #[error("identifier {value:?} cannot be stamped: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// The document exists but could not be parsed or modified.
    #[error("cannot stamp '{path}': {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// The process may not read or replace the document.
    #[error("permission denied stamping '{path}'")]
    PermissionDenied { path: PathBuf },

    /// Writing the stamped document back failed.
    #[error("failed to write stamped PDF '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StampError {
    /// `true` when the input is missing; everything else is recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StampError::NotFound { .. })
    }

    pub(crate) fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => StampError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => StampError::PermissionDenied { path },
            _ => StampError::WriteFailed { path, source },
        }
    }
}

// ── Merging ──────────────────────────────────────────────────────────────

/// Failure while merging documents.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An input path does not exist; checked before any work starts.
    #[error("merge input not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// No input could be read, so there is nothing to write.
    #[error("none of the {attempted} merge inputs could be read")]
    NothingToMerge { attempted: usize },

    /// Assembling or writing the merged document failed.
    #[error("failed to write merged PDF: {0}")]
    Write(#[source] PdfError),
}

// ── Scanning ─────────────────────────────────────────────────────────────

/// Failure while recovering markers from a document.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The document to scan does not exist.
    #[error("PDF to scan not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The document could not be opened.
    #[error("cannot scan PDF: {0}")]
    Unreadable(#[source] PdfError),
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Failure inside an [`crate::pipeline::render::HtmlRenderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// No Chrome/Chromium executable could be located.
    #[error(
        "Chrome/Chromium is required for HTML→PDF rendering but was not found.\n\
Set TRACECERT_CHROME=/path/to/chrome or install Chrome from https://google.com/chrome"
    )]
    ChromeNotFound,

    /// The browser process could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The renderer ran but produced no usable PDF.
    #[error("HTML→PDF rendering failed: {0}")]
    Failed(String),

    /// Reading or writing an intermediate file failed.
    #[error("renderer I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the PDF failed.
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

// ── Report compilation ───────────────────────────────────────────────────

/// The fixed stages of the report pipeline, in execution order.
///
/// The stage is carried by [`ReportError::Generation`] and drives the
/// progress milestones reported to
/// [`crate::progress::CompileProgressCallback::on_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Workspace,
    MainReport,
    Grouping,
    Certificates,
    BodyMerge,
    Scan,
    Toc,
    Cover,
    FinalMerge,
    Pagination,
    Cleanup,
    Finish,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 12] = [
        Stage::Workspace,
        Stage::MainReport,
        Stage::Grouping,
        Stage::Certificates,
        Stage::BodyMerge,
        Stage::Scan,
        Stage::Toc,
        Stage::Cover,
        Stage::FinalMerge,
        Stage::Pagination,
        Stage::Cleanup,
        Stage::Finish,
    ];

    /// Progress percentage reported when this stage completes, if any.
    pub fn milestone(self) -> Option<u8> {
        match self {
            Stage::Workspace => Some(5),
            Stage::MainReport => Some(20),
            Stage::Grouping => Some(30),
            Stage::Certificates => Some(50),
            Stage::BodyMerge => Some(60),
            Stage::Scan => Some(70),
            Stage::Toc => None,
            Stage::Cover => Some(80),
            Stage::FinalMerge => Some(90),
            Stage::Pagination => None,
            Stage::Cleanup => None,
            Stage::Finish => Some(100),
        }
    }

    /// Short machine-friendly name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Workspace => "workspace",
            Stage::MainReport => "main-report",
            Stage::Grouping => "grouping",
            Stage::Certificates => "certificates",
            Stage::BodyMerge => "body-merge",
            Stage::Scan => "scan",
            Stage::Toc => "toc",
            Stage::Cover => "cover",
            Stage::FinalMerge => "final-merge",
            Stage::Pagination => "pagination",
            Stage::Cleanup => "cleanup",
            Stage::Finish => "finish",
        }
    }

    /// Human-readable status line for progress displays.
    pub fn description(self) -> &'static str {
        match self {
            Stage::Workspace => "Creating workspace",
            Stage::MainReport => "Rendering material specification",
            Stage::Grouping => "Grouping certificates",
            Stage::Certificates => "Stamping certificates",
            Stage::BodyMerge => "Merging documents",
            Stage::Scan => "Extracting page markers",
            Stage::Toc => "Building table of contents",
            Stage::Cover => "Rendering cover",
            Stage::FinalMerge => "Assembling final document",
            Stage::Pagination => "Adding page numbers",
            Stage::Cleanup => "Removing workspace",
            Stage::Finish => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All fatal errors returned by the report compiler.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required segment or file is missing.
    #[error("required input not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// HTML→PDF conversion of a required document failed.
    #[error("failed to render {document}: {source}")]
    RenderFailure {
        document: String,
        #[source]
        source: RenderError,
    },

    /// Stamping a required segment (main report or cover) failed.
    #[error("failed to stamp {document}: {source}")]
    StampFailure {
        document: String,
        #[source]
        source: StampError,
    },

    /// A required segment could not be merged.
    #[error("failed to merge {document}: {detail}")]
    MergeFailure { document: String, detail: String },

    /// The body could not be scanned for markers.
    #[error("failed to scan '{path}': {source}")]
    ScanFailure {
        path: PathBuf,
        #[source]
        source: ScanError,
    },

    /// File-system operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persistence collaborator could not provide the project data.
    #[error("report source error: {0}")]
    Source(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A fatal failure at a specific pipeline stage.
    #[error("report generation failed at stage '{stage}' (output '{output_path}'): {source}")]
    Generation {
        stage: Stage,
        output_path: PathBuf,
        #[source]
        source: Box<ReportError>,
    },
}

impl ReportError {
    /// Wrap `self` with the stage and output path it occurred at.
    ///
    /// Already-wrapped errors are returned unchanged.
    pub fn at_stage(self, stage: Stage, output_path: impl Into<PathBuf>) -> Self {
        match self {
            ReportError::Generation { .. } => self,
            other => ReportError::Generation {
                stage,
                output_path: output_path.into(),
                source: Box::new(other),
            },
        }
    }

    /// The stage a [`ReportError::Generation`] error occurred at.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ReportError::Generation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost cause, unwrapping [`ReportError::Generation`].
    pub fn cause(&self) -> &ReportError {
        match self {
            ReportError::Generation { source, .. } => source.cause(),
            other => other,
        }
    }
}

// ── Non-fatal conditions ─────────────────────────────────────────────────

/// A non-fatal condition encountered while compiling a report.
///
/// Stored in [`crate::model::CompiledReport::warnings`]; the report is
/// still produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CompileWarning {
    /// A certificate's stored file does not exist.
    #[error("certificate for article '{article_number}' not found at '{path}'")]
    MissingCertificate {
        article_number: String,
        path: PathBuf,
    },

    /// A divider or certificate segment could not be stamped and was left out.
    #[error("{segment} dropped: {reason}")]
    SegmentDropped { segment: String, reason: String },

    /// The merger could not read an input and skipped it.
    #[error("merge skipped unreadable input '{path}'")]
    InputSkipped { path: PathBuf },

    /// Fewer markers were recovered than pages were stamped.
    #[error("recovered {recovered} of {expected} page markers; table of contents may be inaccurate")]
    ExtractionIncomplete { expected: u32, recovered: u32 },

    /// The rendered cover is not exactly one page long.
    #[error("cover rendered as {pages} pages; page ranges were shifted accordingly")]
    CoverPageCount { pages: u32 },

    /// The temporary workspace could not be removed.
    #[error("could not remove workspace '{path}': {detail}")]
    CleanupFailed { path: PathBuf, detail: String },
}
