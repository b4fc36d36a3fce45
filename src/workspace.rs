//! Scoped temporary directory for one compile run.
//!
//! Every intermediate file (rendered HTML documents, certificate copies,
//! the body document) lives here. [`Workspace::close`] removes the directory
//! and reports failure; if the workspace is dropped instead, on an early
//! return or during unwinding, `tempfile` still removes it.

use crate::error::ReportError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = "tracecert-";

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory, under `root` when given, else the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self, ReportError> {
        let builder_result = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|source| ReportError::Io {
                    path: root.to_path_buf(),
                    source,
                })?;
                tempfile::Builder::new().prefix(PREFIX).tempdir_in(root)
            }
            None => tempfile::Builder::new().prefix(PREFIX).tempdir(),
        };
        let dir = builder_result.map_err(|source| ReportError::Io {
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source,
        })?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now, returning the path and error text on failure.
    pub fn close(self) -> Result<(), (PathBuf, String)> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!("Removed workspace {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Could not remove workspace {}: {}", path.display(), e);
                Err((path, e.to_string()))
            }
        }
    }
}

/// Turn free text into a file-name-safe stem.
pub fn sanitize_file_stem(text: &str) -> String {
    let stem: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(60)
        .collect();
    if stem.is_empty() {
        "segment".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_removes_directory() {
        let ws = Workspace::create(None).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.file("a.txt"), b"x").unwrap();
        assert!(path.exists());
        ws.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let path = {
            let ws = Workspace::create(None).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn created_under_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("work");
        let ws = Workspace::create(Some(&nested)).unwrap();
        assert!(ws.path().starts_with(&nested));
        assert!(ws
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PREFIX));
    }

    #[test]
    fn file_stems() {
        assert_eq!(sanitize_file_stem("Materialintyg 3.1/B"), "Materialintyg_3_1_B");
        assert_eq!(sanitize_file_stem(""), "segment");
        assert_eq!(sanitize_file_stem("Svetslogg"), "Svetslogg");
    }
}
