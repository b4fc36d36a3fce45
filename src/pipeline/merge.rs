//! Concatenate an ordered list of documents into one.

use crate::error::MergeError;
use crate::pipeline::pdf::{PdfFile, PdfWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub output_path: PathBuf,
    pub page_count: u32,
    /// Inputs whose pages were copied, in merge order.
    pub merged: Vec<PathBuf>,
    /// Inputs that exist but could not be parsed.
    pub skipped: Vec<PathBuf>,
}

impl MergeOutcome {
    pub fn was_skipped(&self, path: &Path) -> bool {
        self.skipped.iter().any(|p| p == path)
    }
}

/// Merge `inputs` in order into `output`.
///
/// Every input must exist; a missing one aborts before anything is read.
/// Inputs that exist but cannot be parsed are skipped with a warning and
/// reported in [`MergeOutcome::skipped`]. `on_progress` receives the
/// proportion of inputs processed, 0 to 100.
pub fn merge<P, F>(inputs: &[P], output: &Path, mut on_progress: F) -> Result<MergeOutcome, MergeError>
where
    P: AsRef<Path>,
    F: FnMut(u8),
{
    if let Some(missing) = inputs.iter().map(|p| p.as_ref()).find(|p| !p.exists()) {
        return Err(MergeError::InputNotFound {
            path: missing.to_path_buf(),
        });
    }

    let total = inputs.len();
    let mut writer = PdfWriter::new();
    let mut merged = Vec::with_capacity(total);
    let mut skipped = Vec::new();

    on_progress(0);
    for (i, input) in inputs.iter().enumerate() {
        let input = input.as_ref();
        match PdfFile::open(input) {
            Ok(file) => {
                let pages = writer.append(file);
                debug!("Merged {} ({} pages)", input.display(), pages);
                merged.push(input.to_path_buf());
            }
            Err(e) => {
                warn!("Skipping unreadable merge input {}: {}", input.display(), e);
                skipped.push(input.to_path_buf());
            }
        }
        on_progress(((i + 1) * 100 / total) as u8);
    }

    if merged.is_empty() {
        return Err(MergeError::NothingToMerge { attempted: total });
    }

    let page_count = writer.write(output).map_err(MergeError::Write)?;
    Ok(MergeOutcome {
        output_path: output.to_path_buf(),
        page_count,
        merged,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pdf::TextDocument;
    use std::fs;
    use tempfile::TempDir;

    fn doc(dir: &TempDir, name: &str, labels: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut builder = TextDocument::new(595.0, 842.0);
        for label in labels {
            builder = builder.page([*label]);
        }
        builder.save(&path).unwrap();
        path
    }

    #[test]
    fn keeps_input_and_page_order() {
        let dir = TempDir::new().unwrap();
        let d1 = doc(&dir, "d1.pdf", &["d1p1", "d1p2"]);
        let d2 = doc(&dir, "d2.pdf", &["d2p1"]);
        let d3 = doc(&dir, "d3.pdf", &["d3p1", "d3p2", "d3p3"]);
        let out = dir.path().join("out.pdf");

        let outcome = merge(&[&d1, &d2, &d3], &out, |_| {}).unwrap();
        assert_eq!(outcome.page_count, 6);
        assert!(outcome.skipped.is_empty());

        let merged = PdfFile::open(&out).unwrap();
        let expected = ["d1p1", "d1p2", "d2p1", "d3p1", "d3p2", "d3p3"];
        for (i, label) in expected.iter().enumerate() {
            let text = merged.page_text(i as u32 + 1).unwrap();
            assert!(text.contains(label), "page {}: {text}", i + 1);
        }
    }

    #[test]
    fn missing_input_aborts_before_writing() {
        let dir = TempDir::new().unwrap();
        let d1 = doc(&dir, "d1.pdf", &["x"]);
        let out = dir.path().join("out.pdf");

        let err = merge(&[d1, dir.path().join("nope.pdf")], &out, |_| {}).unwrap_err();
        assert!(matches!(err, MergeError::InputNotFound { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn unreadable_input_is_skipped() {
        let dir = TempDir::new().unwrap();
        let good = doc(&dir, "good.pdf", &["ok"]);
        let bad = dir.path().join("bad.pdf");
        fs::write(&bad, b"%PDF-garbage").unwrap();
        let out = dir.path().join("out.pdf");

        let outcome = merge(&[&good, &bad], &out, |_| {}).unwrap();
        assert_eq!(outcome.page_count, 1);
        assert!(outcome.was_skipped(&bad));
        assert_eq!(outcome.merged, vec![good]);
    }

    #[test]
    fn nothing_readable_is_an_error() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.pdf");
        fs::write(&bad, b"nope").unwrap();

        let err = merge(&[&bad], &dir.path().join("out.pdf"), |_| {}).unwrap_err();
        assert!(matches!(err, MergeError::NothingToMerge { attempted: 1 }));
    }

    #[test]
    fn reports_proportional_progress() {
        let dir = TempDir::new().unwrap();
        let inputs: Vec<PathBuf> = (0..4)
            .map(|i| doc(&dir, &format!("d{i}.pdf"), &["p"]))
            .collect();
        let mut seen = Vec::new();

        merge(&inputs, &dir.path().join("out.pdf"), |p| seen.push(p)).unwrap();
        assert_eq!(seen, vec![0, 25, 50, 75, 100]);
    }
}
