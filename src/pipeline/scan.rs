//! Recover page markers from a merged document.
//!
//! ## Why two text sources?
//!
//! `lopdf`'s text extraction maps glyphs through each font's encoding, which
//! is what we want for the overlay font. Third-party certificates sometimes
//! carry fonts or content streams that make it fail for a whole page,
//! including our overlay. When that happens, or when the extracted text
//! lacks the marker prefix, each content stream is scanned on its own for
//! string operands instead.

use crate::error::ScanError;
use crate::model::Stamp;
use crate::pipeline::marker::{self, ART_PREFIX};
use crate::pipeline::pdf::PdfFile;
use std::path::Path;
use tracing::{debug, warn};

/// Decode one stamp per marked page of `path`, in page order.
///
/// Pages without a marker, and markers with an empty article id or document
/// type, contribute nothing.
pub fn extract(path: &Path) -> Result<Vec<Stamp>, ScanError> {
    if !path.exists() {
        return Err(ScanError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let file = PdfFile::open(path).map_err(ScanError::Unreadable)?;
    Ok(extract_from(&file))
}

/// Same as [`extract`] for an already open document.
pub fn extract_from(file: &PdfFile) -> Vec<Stamp> {
    let mut stamps = Vec::new();
    for page in 1..=file.page_count() {
        let Some(text) = page_marker_text(file, page) else {
            continue;
        };
        match marker::decode(&text) {
            Some(record) if record.is_complete() => stamps.push(Stamp {
                article_id: record.article_id,
                doc_type: record.doc_type,
                page_number: page,
            }),
            Some(_) => warn!("Discarding malformed marker on page {}", page),
            None => {}
        }
    }
    debug!(
        "Recovered {} marker(s) from {} page(s) of {}",
        stamps.len(),
        file.page_count(),
        file.path().display()
    );
    stamps
}

fn page_marker_text(file: &PdfFile, page: u32) -> Option<String> {
    match file.page_text(page) {
        Ok(text) if text.contains(ART_PREFIX) => return Some(text),
        Ok(_) => {}
        Err(e) => debug!("Text extraction failed on page {}, scanning raw: {}", page, e),
    }
    file.raw_page_text(page)
        .ok()
        .filter(|text| text.contains(ART_PREFIX))
}
