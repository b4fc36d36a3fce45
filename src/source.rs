//! Where project data comes from.
//!
//! The compiler never talks to a database. Instead a [`ReportSource`] hands
//! it the project, its articles and its certificates. [`Manifest`] is the
//! file-based implementation used by the CLI: one JSON document holding
//! everything needed for a report.
//!
//! ```json
//! {
//!   "project": { "id": 7, "project_name": "Gasturbin", "order_number": "TO-1", "customer": "Volvo" },
//!   "articles": [ { "article_number": "A1", "description": "Flans", "quantity": 2 } ],
//!   "certificates": [
//!     { "article_number": "A1", "certificate_type": "Materialintyg", "file_path": "certs/a1.pdf" }
//!   ]
//! }
//! ```
//!
//! Relative certificate paths are resolved against the manifest's directory
//! unless `base_dir` is given.

use crate::error::ReportError;
use crate::model::{Article, Certificate, Project};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The persistence collaborator.
pub trait ReportSource: Send + Sync {
    fn project(&self, project_id: i64) -> Result<Project, ReportError>;

    fn articles_for_project(&self, project_id: i64) -> Result<Vec<Article>, ReportError>;

    fn certificates_for_project(&self, project_id: i64) -> Result<Vec<Certificate>, ReportError>;

    /// Directory relative certificate paths are resolved against.
    fn base_dir(&self) -> PathBuf;
}

/// A single project described in a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub project: Project,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(skip)]
    location: Option<PathBuf>,
}

impl Manifest {
    pub fn new(project: Project, articles: Vec<Article>, certificates: Vec<Certificate>) -> Self {
        Self {
            project,
            articles,
            certificates,
            base_dir: None,
            location: None,
        }
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ReportError::InputNotFound {
                path: path.to_path_buf(),
            },
            _ => ReportError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let mut manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| ReportError::Source(format!("invalid manifest '{}': {e}", path.display())))?;
        manifest.location = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }

    fn check_id(&self, project_id: i64) -> Result<(), ReportError> {
        match self.project.id {
            Some(id) if id != project_id => Err(ReportError::Source(format!(
                "manifest describes project {id}, not {project_id}"
            ))),
            _ => Ok(()),
        }
    }

    /// The id to ask for; manifests without an id answer to 0.
    pub fn project_id(&self) -> i64 {
        self.project.id.unwrap_or(0)
    }
}

impl ReportSource for Manifest {
    fn project(&self, project_id: i64) -> Result<Project, ReportError> {
        self.check_id(project_id)?;
        Ok(self.project.clone())
    }

    fn articles_for_project(&self, project_id: i64) -> Result<Vec<Article>, ReportError> {
        self.check_id(project_id)?;
        Ok(self.articles.clone())
    }

    fn certificates_for_project(&self, project_id: i64) -> Result<Vec<Certificate>, ReportError> {
        self.check_id(project_id)?;
        Ok(self.certificates.clone())
    }

    fn base_dir(&self) -> PathBuf {
        match (&self.base_dir, &self.location) {
            (Some(dir), Some(location)) if dir.is_relative() => location.join(dir),
            (Some(dir), _) => dir.clone(),
            (None, Some(location)) => location.clone(),
            (None, None) => PathBuf::from("."),
        }
    }
}
