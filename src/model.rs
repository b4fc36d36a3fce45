//! Data types flowing into and out of the report compiler.
//!
//! Input types ([`Project`], [`Article`], [`Certificate`]) mirror what the
//! persistence layer stores; they deserialize from the JSON manifest read by
//! [`crate::source::Manifest`]. Output types ([`Stamp`], [`TocSection`],
//! [`CompiledReport`]) are what the pipeline produces.

use crate::error::CompileWarning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// ── Inputs ───────────────────────────────────────────────────────────────

/// A traceability project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<i64>,
    pub project_name: String,
    pub order_number: String,
    pub customer: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub purchase_order_number: Option<String>,
    #[serde(default = "default_project_type")]
    pub project_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_project_type() -> String {
    "Doc".to_string()
}

/// One line of the project's bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub article_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub parent_article: Option<String>,
    /// Batch/charge number from the inventory log.
    #[serde(default)]
    pub charge_number: Option<String>,
}

/// A PDF certificate attached to an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub article_number: String,
    /// The certificate type, which becomes the report section name.
    pub certificate_type: String,
    /// Absolute, or relative to the project's base directory.
    pub file_path: PathBuf,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

impl Certificate {
    /// Where the certificate lives: absolute paths as-is, relative ones under `base_dir`.
    pub fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        if self.file_path.is_absolute() {
            self.file_path.clone()
        } else {
            base_dir.join(&self.file_path)
        }
    }

    /// Name shown in the report: the original upload name when known.
    pub fn display_name(&self) -> String {
        match &self.original_filename {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

// ── Segments ─────────────────────────────────────────────────────────────

/// Role of a document in the merged report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    MainReport,
    Divider,
    Certificate,
    Cover,
}

impl SegmentKind {
    /// Required segments abort the compile when they fail; others are dropped.
    pub fn is_required(self) -> bool {
        matches!(self, SegmentKind::MainReport | SegmentKind::Cover)
    }
}

/// One stamped document waiting to be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub path: PathBuf,
    pub doc_type: String,
    pub article_id: String,
    pub page_count: u32,
}

impl Segment {
    /// Short description used in log lines and warnings.
    pub fn label(&self) -> String {
        match self.kind {
            SegmentKind::MainReport => "main report".to_string(),
            SegmentKind::Cover => "cover".to_string(),
            SegmentKind::Divider => format!("divider '{}'", self.doc_type),
            SegmentKind::Certificate => {
                format!("certificate '{}' ({})", self.article_id, self.doc_type)
            }
        }
    }
}

// ── Outputs ──────────────────────────────────────────────────────────────

/// A marker recovered from the body document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub article_id: String,
    pub doc_type: String,
    /// 1-based position within the scanned document.
    pub page_number: u32,
}

/// Page range of one section in the final document, cover included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocSection {
    pub name: String,
    pub page_start: u32,
    pub page_end: u32,
}

impl TocSection {
    pub fn page_count(&self) -> u32 {
        self.page_end - self.page_start + 1
    }

    /// `"3"` for a single page, `"3-5"` otherwise.
    pub fn range_label(&self) -> String {
        if self.page_start == self.page_end {
            self.page_start.to_string()
        } else {
            format!("{}-{}", self.page_start, self.page_end)
        }
    }
}

/// How many segments made it into the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub accepted: usize,
    pub dropped: usize,
}

/// Counts over the compile inputs, as shown to the operator after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub article_count: usize,
    pub articles_with_charge: usize,
    pub articles_without_charge: usize,
    pub certificate_count: usize,
    /// Distinct article numbers that have at least one certificate.
    pub articles_with_certificates: usize,
    pub unique_certificate_types: usize,
}

impl ReportSummary {
    pub fn from_inputs(articles: &[Article], certificates: &[Certificate]) -> Self {
        let articles_with_charge = articles
            .iter()
            .filter(|a| a.charge_number.as_deref().is_some_and(|c| !c.is_empty()))
            .count();
        let certified: BTreeSet<&str> = certificates.iter().map(|c| c.article_number.as_str()).collect();
        let types: BTreeSet<&str> = certificates.iter().map(|c| c.certificate_type.as_str()).collect();
        Self {
            article_count: articles.len(),
            articles_with_charge,
            articles_without_charge: articles.len() - articles_with_charge,
            certificate_count: certificates.len(),
            articles_with_certificates: certified.len(),
            unique_certificate_types: types.len(),
        }
    }
}

/// The finished report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledReport {
    pub final_path: PathBuf,
    pub total_pages: u32,
    pub sections: Vec<TocSection>,
    pub segments: SegmentSummary,
    pub summary: ReportSummary,
    pub warnings: Vec<CompileWarning>,
}

impl CompiledReport {
    pub fn section(&self, name: &str) -> Option<&TocSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
