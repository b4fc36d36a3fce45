//! The hidden per-page marker and the visible page label.
//!
//! Every stamped page carries one marker string of the form
//!
//! ```text
//! ##ART:<articleId>##TYP:<docType>##SID:<pageIndex>/<totalPages>##
//! ```
//!
//! The grammar has no escaping. Instead of trying to recover from a `##`
//! inside an identifier at decode time, [`validate_identifier`] rejects such
//! identifiers before anything is stamped. The same check refuses
//! characters the overlay font cannot draw unchanged.

use crate::error::StampError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ART_PREFIX: &str = "##ART:";
pub const TYP_PREFIX: &str = "##TYP:";
pub const SID_PREFIX: &str = "##SID:";
pub const END_MARKER: &str = "##";

/// Section and article id of the material specification.
pub const MAIN_REPORT_SECTION: &str = "Rapport";
pub const MAIN_REPORT_ARTICLE: &str = "Rapport";

/// Section and article id of the cover / table of contents.
pub const COVER_SECTION: &str = "TOC";
pub const COVER_ARTICLE: &str = "Cover";

static SID_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*/\s*(\d+)").unwrap());

/// Position of a page inside the segment it was stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPage {
    /// 1-based page index within the segment.
    pub index: u32,
    /// Page count of the segment.
    pub total: u32,
}

/// A decoded marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub article_id: String,
    pub doc_type: String,
    /// `None` when the `SID` part is missing or unparsable.
    pub segment_page: Option<SegmentPage>,
}

impl MarkerRecord {
    /// `false` when either identifier came out empty; such records are discarded.
    pub fn is_complete(&self) -> bool {
        !self.article_id.is_empty() && !self.doc_type.is_empty()
    }
}

/// Build the marker text for one page.
pub fn encode(article_id: &str, doc_type: &str, page_index: u32, total_pages: u32) -> String {
    format!(
        "{ART_PREFIX}{article_id}{TYP_PREFIX}{doc_type}{SID_PREFIX}{page_index}/{total_pages}{END_MARKER}"
    )
}

/// Decode the first marker found in `page_text`.
///
/// Returns `None` when no `##ART:` occurs. A malformed marker still decodes;
/// check [`MarkerRecord::is_complete`] before using it.
pub fn decode(page_text: &str) -> Option<MarkerRecord> {
    let art_start = page_text.find(ART_PREFIX)? + ART_PREFIX.len();
    let rest = &page_text[art_start..];

    let Some(typ_at) = rest.find(TYP_PREFIX) else {
        return Some(MarkerRecord {
            article_id: String::new(),
            doc_type: String::new(),
            segment_page: None,
        });
    };
    let article_id = rest[..typ_at].to_string();
    let rest = &rest[typ_at + TYP_PREFIX.len()..];

    let Some(sid_at) = rest.find(SID_PREFIX) else {
        return Some(MarkerRecord {
            article_id,
            doc_type: String::new(),
            segment_page: None,
        });
    };
    let doc_type = rest[..sid_at].to_string();
    let sid = &rest[sid_at + SID_PREFIX.len()..];

    let segment_page = SID_VALUE.captures(sid).and_then(|c| {
        let index = c.get(1)?.as_str().parse().ok()?;
        let total = c.get(2)?.as_str().parse().ok()?;
        Some(SegmentPage { index, total })
    });

    Some(MarkerRecord {
        article_id,
        doc_type,
        segment_page,
    })
}

/// Check that `value` can be carried by the marker grammar.
///
/// Rejects empty identifiers, identifiers containing the `##` delimiter,
/// identifiers containing line breaks (text extraction splits on them) and
/// characters the overlay font cannot draw. The overlay uses Helvetica with
/// `WinAnsiEncoding`; only printable ASCII and U+00A0..=U+00FF map to the
/// same code point both ways, so anything else would come back from the
/// scanner as a different identifier.
pub fn validate_identifier(value: &str) -> Result<(), StampError> {
    let reason = if value.is_empty() {
        "identifier is empty".to_string()
    } else if value.contains(END_MARKER) {
        "identifier contains the '##' marker delimiter".to_string()
    } else if value.contains(['\n', '\r']) {
        "identifier contains a line break".to_string()
    } else if let Some(c) = value.chars().find(|c| !is_stampable(*c)) {
        format!("character {c:?} (U+{:04X}) cannot be drawn by the marker font", u32::from(c))
    } else {
        return Ok(());
    };
    Err(StampError::InvalidIdentifier {
        value: value.to_string(),
        reason,
    })
}

/// Characters that survive the overlay font and text extraction unchanged.
pub fn is_stampable(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{a0}'..='\u{ff}')
}

/// The visible `Page <index>/<total>` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLabel {
    pub index: u32,
    pub total: u32,
}

impl fmt::Display for PageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {}/{}", self.index, self.total)
    }
}
