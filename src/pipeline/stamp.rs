//! Overlay markers and page labels onto documents, rewriting them in place.
//!
//! ## Why rewrite in place?
//!
//! Every segment is stamped exactly once, right after it lands in the
//! workspace and before it is merged. Because merging only appends pages,
//! the marker travels with its page into the body document, which is what
//! lets the scanner rebuild section ranges from the body alone.
//!
//! The rewrite goes through a sibling temp file and a rename, so a failed
//! stamp never leaves a half-written document behind.

use crate::error::{PdfError, StampError};
use crate::pipeline::marker::{self, PageLabel};
use crate::pipeline::pdf::{Anchor, PdfFile, TextOverlay};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Visual style shared by markers and page labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampStyle {
    /// Font size in points.
    pub font_size: f32,
    /// Gray level of the fill colour (0.0 black, 1.0 white).
    pub gray: f32,
    /// Distance of the text from the page edges in points.
    pub inset: f32,
}

impl Default for StampStyle {
    fn default() -> Self {
        Self {
            font_size: 6.0,
            gray: 0.7,
            inset: 10.0,
        }
    }
}

/// Result of a successful stamping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampOutcome {
    /// Page count of the document.
    pub pages: u32,
    /// Pages that received an overlay.
    pub stamped: u32,
}

/// Stamp every page of `path` with a marker for `article_id` / `doc_type`.
///
/// Page `i` of `n` receives `##ART:<article_id>##TYP:<doc_type>##SID:i/n##`
/// near its bottom-left corner, sized to that page's own MediaBox.
pub fn stamp_document(
    path: &Path,
    article_id: &str,
    doc_type: &str,
    style: &StampStyle,
) -> Result<StampOutcome, StampError> {
    let mut file = open_for_stamping(path)?;
    marker::validate_identifier(article_id)?;
    marker::validate_identifier(doc_type)?;

    let total = file.page_count();
    for page in 1..=total {
        let overlay = TextOverlay {
            text: marker::encode(article_id, doc_type, page, total),
            font_size: style.font_size,
            gray: style.gray,
            anchor: Anchor::BottomLeft { inset: style.inset },
        };
        file.overlay_text(page, &overlay)
            .map_err(|e| unreadable(path, e))?;
    }

    file.save(path).map_err(|e| save_error(path, e))?;
    debug!(
        "Stamped {} page(s) of {} as {}/{}",
        total,
        path.display(),
        doc_type,
        article_id
    );
    Ok(StampOutcome {
        pages: total,
        stamped: total,
    })
}

/// Label pages of `path` with `Page <i>/<n>`, right-aligned near the bottom edge.
///
/// With `skip_first_page` the first page gets no label, but the numbering of
/// the remaining pages stays absolute: the second page reads `Page 2/n`.
pub fn stamp_page_numbers(
    path: &Path,
    skip_first_page: bool,
    style: &StampStyle,
) -> Result<StampOutcome, StampError> {
    let mut file = open_for_stamping(path)?;
    let total = file.page_count();
    let first = if skip_first_page { 2 } else { 1 };

    for page in first..=total {
        let overlay = TextOverlay {
            text: PageLabel { index: page, total }.to_string(),
            font_size: style.font_size,
            gray: style.gray,
            anchor: Anchor::BottomRight { inset: style.inset },
        };
        file.overlay_text(page, &overlay)
            .map_err(|e| unreadable(path, e))?;
    }

    file.save(path).map_err(|e| save_error(path, e))?;
    let stamped = total.saturating_sub(first - 1);
    debug!("Labelled {} of {} page(s) in {}", stamped, total, path.display());
    Ok(StampOutcome {
        pages: total,
        stamped,
    })
}

fn open_for_stamping(path: &Path) -> Result<PdfFile, StampError> {
    // Try a plain open first so permission problems keep their kind.
    if let Err(e) = fs::File::open(path) {
        let path = path.to_path_buf();
        return Err(match e.kind() {
            ErrorKind::NotFound => StampError::NotFound { path },
            ErrorKind::PermissionDenied => StampError::PermissionDenied { path },
            _ => StampError::Unreadable {
                path,
                detail: e.to_string(),
            },
        });
    }
    PdfFile::open(path).map_err(|e| unreadable(path, e))
}

fn unreadable(path: &Path, error: PdfError) -> StampError {
    StampError::Unreadable {
        path: path.to_path_buf(),
        detail: error.to_string(),
    }
}

fn save_error(path: &Path, error: PdfError) -> StampError {
    match error {
        PdfError::Save { source, .. } => StampError::from_io(PathBuf::from(path), source),
        other => unreadable(path, other),
    }
}
