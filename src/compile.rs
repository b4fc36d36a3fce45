//! Report compilation: the fixed pipeline that turns a project and its
//! certificates into one paginated PDF.
//!
//! ## Stages
//!
//! ```text
//! workspace ─▶ main report ─▶ grouping ─▶ certificates ─▶ body merge ─▶ scan
//!     5%           20%           30%           50%            60%        70%
//!
//! ─▶ toc ─▶ cover ─▶ final merge ─▶ pagination ─▶ cleanup ─▶ finish
//!            80%        90%                                   100%
//! ```
//!
//! ## Why stamp before merging?
//!
//! Page ranges are never computed from page counts. Each segment is stamped
//! with its section name first, the body is merged, and the table of
//! contents is rebuilt from the markers found in the merged body. Whatever
//! the merger actually wrote is what the table of contents describes,
//! including segments it had to skip.
//!
//! ## Failure policy
//!
//! The main report and the cover are required: any failure on them aborts
//! the compile. A divider or certificate that cannot be found, copied,
//! stamped or merged is dropped and recorded as a [`CompileWarning`]. Every
//! fatal error is returned as [`ReportError::Generation`] carrying the stage
//! it happened at.

use crate::config::CompileConfig;
use crate::error::{CompileWarning, MergeError, RenderError, ReportError, Stage, StampError};
use crate::html;
use crate::model::{
    Article, Certificate, CompiledReport, Project, ReportSummary, Segment, SegmentKind, SegmentSummary, Stamp,
};
use crate::pipeline::marker::{COVER_ARTICLE, COVER_SECTION, MAIN_REPORT_ARTICLE, MAIN_REPORT_SECTION};
use crate::pipeline::merge::{merge, MergeOutcome};
use crate::pipeline::pdf::PdfFile;
use crate::pipeline::render::HtmlRenderer;
use crate::pipeline::scan;
use crate::pipeline::stamp::{stamp_document, stamp_page_numbers};
use crate::pipeline::toc::{TableOfContents, COVER_PAGES};
use crate::progress::{CompileProgressCallback, NoopProgressCallback};
use crate::source::ReportSource;
use crate::workspace::{sanitize_file_stem, Workspace};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything that changes from one report to the next.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub project: Project,
    pub articles: Vec<Article>,
    pub certificates: Vec<Certificate>,
    /// Where the finished report is written; parent directories are created.
    pub output_path: PathBuf,
    /// Directory relative certificate paths are resolved against.
    pub base_dir: PathBuf,
}

impl CompileRequest {
    pub fn new(project: Project, output_path: impl Into<PathBuf>) -> Self {
        Self {
            project,
            articles: Vec::new(),
            certificates: Vec::new(),
            output_path: output_path.into(),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn articles(mut self, articles: Vec<Article>) -> Self {
        self.articles = articles;
        self
    }

    pub fn certificates(mut self, certificates: Vec<Certificate>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }
}

/// Compiles reports with one renderer and one configuration.
///
/// Holds no per-report state; a single compiler can serve any number of
/// sequential or concurrent compiles.
#[derive(Clone)]
pub struct ReportCompiler {
    renderer: Arc<dyn HtmlRenderer>,
    config: CompileConfig,
}

impl ReportCompiler {
    pub fn new(renderer: Arc<dyn HtmlRenderer>, config: CompileConfig) -> Self {
        Self { renderer, config }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Run the whole pipeline for `request`, blocking the current thread.
    ///
    /// # Errors
    /// Returns [`ReportError::Generation`] for every fatal failure. Non-fatal
    /// problems are listed in [`CompiledReport::warnings`].
    pub fn compile(&self, request: &CompileRequest) -> Result<CompiledReport, ReportError> {
        let noop = NoopProgressCallback;
        let progress: &dyn CompileProgressCallback = match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &noop,
        };
        progress.on_compile_start(request.certificates.len());
        match self.compile_with(request, progress) {
            Ok(report) => {
                progress.on_compile_complete(&report);
                Ok(report)
            }
            Err(e) => {
                warn!("Compile failed: {}", e);
                progress.on_compile_failed(&e);
                Err(e)
            }
        }
    }

    fn compile_with(
        &self,
        request: &CompileRequest,
        progress: &dyn CompileProgressCallback,
    ) -> Result<CompiledReport, ReportError> {
        let started = Instant::now();
        info!(
            "Compiling report for '{}' ({} articles, {} certificates) → {}",
            request.project.project_name,
            request.articles.len(),
            request.certificates.len(),
            request.output_path.display()
        );

        // ── Stage 1: Workspace ───────────────────────────────────────────────
        let workspace = Workspace::create(self.config.workspace_root.as_deref())
            .map_err(|e| e.at_stage(Stage::Workspace, &request.output_path))?;
        progress.on_progress(5, Stage::Workspace);

        let mut run = Run {
            compiler: self,
            request,
            workspace: &workspace,
            progress,
            generated_at: chrono::Local::now().naive_local(),
            warnings: Vec::new(),
            dropped: 0,
        };

        // On error the workspace is dropped here, which removes it.
        let assembled = run.execute()?;
        let Run {
            mut warnings,
            dropped,
            ..
        } = run;

        // ── Stage 11: Cleanup ────────────────────────────────────────────────
        if let Some(warning) = cleanup(workspace) {
            progress.on_warning(&warning);
            warnings.push(warning);
        }

        // ── Stage 12: Finish ─────────────────────────────────────────────────
        let report = CompiledReport {
            final_path: request.output_path.clone(),
            total_pages: assembled.total_pages,
            sections: assembled.toc.into_sections(),
            segments: SegmentSummary {
                accepted: assembled.accepted,
                dropped,
            },
            summary: ReportSummary::from_inputs(&request.articles, &request.certificates),
            warnings,
        };
        info!(
            "Report complete: {} pages, {} sections, {} warning(s), {}ms",
            report.total_pages,
            report.sections.len(),
            report.warnings.len(),
            started.elapsed().as_millis()
        );
        progress.on_progress(100, Stage::Finish);
        Ok(report)
    }

    /// Run [`ReportCompiler::compile`] on tokio's blocking pool.
    ///
    /// A panic inside the pipeline is returned as [`ReportError::Internal`]
    /// wrapped at [`Stage::Finish`]; the workspace has been dropped by then.
    pub async fn compile_async(&self, request: CompileRequest) -> Result<CompiledReport, ReportError> {
        let compiler = self.clone();
        let output_path = request.output_path.clone();
        tokio::task::spawn_blocking(move || compiler.compile(&request))
            .await
            .map_err(|e| {
                ReportError::Internal(format!("Compile task panicked: {}", e)).at_stage(Stage::Finish, output_path)
            })?
    }

    /// Load `project_id` from `source` and compile it to `output_path`.
    ///
    /// Errors raised by the source itself are returned as they are, before
    /// any pipeline stage has started.
    pub fn compile_from_source(
        &self,
        source: &dyn ReportSource,
        project_id: i64,
        output_path: impl Into<PathBuf>,
    ) -> Result<CompiledReport, ReportError> {
        let request = CompileRequest {
            project: source.project(project_id)?,
            articles: source.articles_for_project(project_id)?,
            certificates: source.certificates_for_project(project_id)?,
            output_path: output_path.into(),
            base_dir: source.base_dir(),
        };
        self.compile(&request)
    }
}

/// Output of stages 2–10.
struct Assembled {
    toc: TableOfContents,
    total_pages: u32,
    accepted: usize,
}

/// State of one compile between workspace creation and cleanup.
struct Run<'a> {
    compiler: &'a ReportCompiler,
    request: &'a CompileRequest,
    workspace: &'a Workspace,
    progress: &'a dyn CompileProgressCallback,
    generated_at: NaiveDateTime,
    warnings: Vec<CompileWarning>,
    dropped: usize,
}

impl Run<'_> {
    fn execute(&mut self) -> Result<Assembled, ReportError> {
        let main = self.stage(Stage::MainReport, |run| run.main_report())?;
        let request = self.request;
        let groups = self.stage(Stage::Grouping, move |_| Ok(group_by_type(&request.certificates)))?;
        let mut segments = vec![main];
        let group_segments = self.stage(Stage::Certificates, |run| run.certificate_segments(&groups))?;
        segments.extend(group_segments);

        let (body, segments) = self.stage(Stage::BodyMerge, |run| run.merge_body(segments))?;
        let stamps = self.stage(Stage::Scan, |run| run.scan_body(&body, &segments))?;
        let toc = self.stage(Stage::Toc, |_| Ok(TableOfContents::build(&stamps)))?;
        let (cover, toc) = self.stage(Stage::Cover, |run| run.cover(&stamps, toc))?;
        let merged = self.stage(Stage::FinalMerge, |run| run.final_merge(&cover, &body))?;
        let total_pages = self.stage(Stage::Pagination, |run| run.paginate_and_publish(&merged))?;

        let expected = cover.page_count + segments.iter().map(|s| s.page_count).sum::<u32>();
        if expected != total_pages {
            warn!("Final document has {} pages, expected {}", total_pages, expected);
        }

        Ok(Assembled {
            toc,
            total_pages,
            accepted: segments.len() + 1,
        })
    }

    /// Run one stage, tagging its error and reporting its milestone.
    fn stage<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce(&mut Self) -> Result<T, ReportError>,
    ) -> Result<T, ReportError> {
        info!("[{}] {}", stage.name(), stage.description());
        let value = f(self).map_err(|e| e.at_stage(stage, &self.request.output_path))?;
        if let Some(percent) = stage.milestone() {
            self.progress.on_progress(percent, stage);
        }
        Ok(value)
    }

    fn warn(&mut self, warning: CompileWarning) {
        warn!("{}", warning);
        self.progress.on_warning(&warning);
        self.warnings.push(warning);
    }

    fn drop_segment(&mut self, segment: String, reason: String) {
        self.dropped += 1;
        self.warn(CompileWarning::SegmentDropped { segment, reason });
    }

    fn render(&self, document: &str, html: &str, output: &Path) -> Result<u32, ReportError> {
        let failure = |source: RenderError| ReportError::RenderFailure {
            document: document.to_string(),
            source,
        };
        let path = self
            .compiler
            .renderer
            .render_html_to_pdf(html, output, &self.compiler.config.render)
            .map_err(failure)?;
        let pages = PdfFile::open(&path)
            .map_err(|e| failure(RenderError::Pdf(e)))?
            .page_count();
        debug!("{} rendered {} as {} page(s)", self.compiler.renderer.name(), document, pages);
        Ok(pages)
    }

    fn stamp_required(&self, document: &str, path: &Path, article_id: &str, doc_type: &str) -> Result<u32, ReportError> {
        stamp_document(path, article_id, doc_type, &self.compiler.config.stamp_style)
            .map(|outcome| outcome.pages)
            .map_err(|source| ReportError::StampFailure {
                document: document.to_string(),
                source,
            })
    }

    // ── Stage 2: Main report ─────────────────────────────────────────────

    fn main_report(&mut self) -> Result<Segment, ReportError> {
        let config = &self.compiler.config;
        let html = html::material_specification_html(
            &self.request.project,
            &self.request.articles,
            &self.request.certificates,
            config.include_watermark.then_some(config.watermark_text.as_str()),
            self.generated_at,
        );
        let path = self.workspace.file("00_rapport.pdf");
        self.render("material specification", &html, &path)?;
        let page_count = self.stamp_required("material specification", &path, MAIN_REPORT_ARTICLE, MAIN_REPORT_SECTION)?;

        Ok(Segment {
            kind: SegmentKind::MainReport,
            path,
            doc_type: MAIN_REPORT_SECTION.to_string(),
            article_id: MAIN_REPORT_ARTICLE.to_string(),
            page_count,
        })
    }

    // ── Stage 4: Dividers and certificates ───────────────────────────────

    fn certificate_segments(&mut self, groups: &[CertificateGroup<'_>]) -> Result<Vec<Segment>, ReportError> {
        let mut segments = Vec::new();
        for (gi, group) in groups.iter().enumerate() {
            let stem = format!("{:02}_{}", gi + 1, sanitize_file_stem(&group.doc_type));

            let mut certificates = Vec::with_capacity(group.certificates.len());
            for (ci, cert) in group.certificates.iter().enumerate() {
                let target = self.workspace.file(&format!(
                    "{stem}_{:03}_{}.pdf",
                    ci + 1,
                    sanitize_file_stem(&cert.article_number)
                ));
                if let Some(segment) = self.certificate(cert, target) {
                    certificates.push(segment);
                }
            }

            if certificates.is_empty() {
                self.drop_segment(
                    format!("divider '{}'", group.doc_type),
                    "no usable certificates in this group".into(),
                );
                continue;
            }

            let divider_path = self.workspace.file(&format!("{stem}_000_divider.pdf"));
            let divider_html = html::divider_html(&group.doc_type, certificates.len());
            self.render(&format!("divider '{}'", group.doc_type), &divider_html, &divider_path)?;
            match stamp_document(&divider_path, &group.doc_type, &group.doc_type, &self.compiler.config.stamp_style) {
                Ok(outcome) => segments.push(Segment {
                    kind: SegmentKind::Divider,
                    path: divider_path,
                    doc_type: group.doc_type.clone(),
                    article_id: group.doc_type.clone(),
                    page_count: outcome.pages,
                }),
                Err(e) => self.drop_segment(format!("divider '{}'", group.doc_type), e.to_string()),
            }
            segments.extend(certificates);
        }
        Ok(segments)
    }

    /// Copy one certificate into the workspace and stamp the copy.
    fn certificate(&mut self, cert: &Certificate, target: PathBuf) -> Option<Segment> {
        let source = cert.resolve_path(&self.request.base_dir);
        let label = format!("certificate '{}' ({})", cert.article_number, cert.certificate_type);

        if !source.is_file() {
            self.dropped += 1;
            self.warn(CompileWarning::MissingCertificate {
                article_number: cert.article_number.clone(),
                path: source,
            });
            return None;
        }
        if let Err(e) = fs::copy(&source, &target) {
            self.drop_segment(label, format!("cannot copy '{}': {e}", source.display()));
            return None;
        }

        match stamp_document(&target, &cert.article_number, &cert.certificate_type, &self.compiler.config.stamp_style) {
            Ok(outcome) => {
                debug!("Accepted {} ({} pages)", label, outcome.pages);
                Some(Segment {
                    kind: SegmentKind::Certificate,
                    path: target,
                    doc_type: cert.certificate_type.clone(),
                    article_id: cert.article_number.clone(),
                    page_count: outcome.pages,
                })
            }
            Err(e) => {
                let reason = match &e {
                    StampError::Unreadable { .. } => format!("{} is not a readable PDF", cert.display_name()),
                    _ => e.to_string(),
                };
                self.drop_segment(label, reason);
                None
            }
        }
    }

    // ── Stage 5: Body merge ──────────────────────────────────────────────

    fn merge_body(&mut self, segments: Vec<Segment>) -> Result<(PathBuf, Vec<Segment>), ReportError> {
        let body = self.workspace.file("body.pdf");
        let paths: Vec<&Path> = segments.iter().map(|s| s.path.as_path()).collect();
        let progress = self.progress;
        let outcome = merge(&paths, &body, |p| progress.on_merge_progress(p))
            .map_err(|e| merge_failure("body", e))?;

        let mut accepted = Vec::with_capacity(segments.len());
        for segment in segments {
            if !outcome.was_skipped(&segment.path) {
                accepted.push(segment);
                continue;
            }
            if segment.kind.is_required() {
                return Err(ReportError::MergeFailure {
                    document: segment.label(),
                    detail: format!("'{}' could not be read", segment.path.display()),
                });
            }
            self.dropped += 1;
            self.warn(CompileWarning::InputSkipped { path: segment.path });
        }
        info!("Body has {} pages from {} segments", outcome.page_count, accepted.len());
        Ok((body, accepted))
    }

    // ── Stage 6: Scan ────────────────────────────────────────────────────

    fn scan_body(&mut self, body: &Path, segments: &[Segment]) -> Result<Vec<Stamp>, ReportError> {
        let stamps = scan::extract(body).map_err(|source| ReportError::ScanFailure {
            path: body.to_path_buf(),
            source,
        })?;
        let expected: u32 = segments.iter().map(|s| s.page_count).sum();
        let recovered = stamps.len() as u32;
        if recovered != expected {
            self.warn(CompileWarning::ExtractionIncomplete { expected, recovered });
        }
        Ok(stamps)
    }

    // ── Stage 8: Cover ───────────────────────────────────────────────────

    fn cover(&mut self, stamps: &[Stamp], toc: TableOfContents) -> Result<(Segment, TableOfContents), ReportError> {
        let path = self.workspace.file("cover.pdf");
        let article_count = self.request.articles.len();

        let listed = merged_certificates(&self.request.certificates, stamps);
        let html = html::cover_html(&self.request.project, article_count, toc.sections(), &listed, self.generated_at);
        let mut pages = self.render("cover", &html, &path)?;
        let mut toc = toc;

        if pages != COVER_PAGES {
            // Ranges assume a single cover page; shift them by the real length and render once more.
            debug!("Cover rendered as {} pages, re-rendering with shifted ranges", pages);
            toc = TableOfContents::build_with_offset(stamps, pages);
            let html = html::cover_html(&self.request.project, article_count, toc.sections(), &listed, self.generated_at);
            let offset = pages;
            pages = self.render("cover", &html, &path)?;
            if pages != offset {
                toc = TableOfContents::build_with_offset(stamps, pages);
            }
            self.warn(CompileWarning::CoverPageCount { pages });
        }

        let page_count = self.stamp_required("cover", &path, COVER_ARTICLE, COVER_SECTION)?;
        Ok((
            Segment {
                kind: SegmentKind::Cover,
                path,
                doc_type: COVER_SECTION.to_string(),
                article_id: COVER_ARTICLE.to_string(),
                page_count,
            },
            toc,
        ))
    }

    // ── Stage 9: Final merge ─────────────────────────────────────────────

    fn final_merge(&mut self, cover: &Segment, body: &Path) -> Result<MergeOutcome, ReportError> {
        let output = self.workspace.file("final.pdf");
        let outcome = merge(&[cover.path.as_path(), body], &output, |_| {})
            .map_err(|e| merge_failure("final document", e))?;
        if let Some(skipped) = outcome.skipped.first() {
            return Err(ReportError::MergeFailure {
                document: "final document".into(),
                detail: format!("'{}' could not be read", skipped.display()),
            });
        }
        Ok(outcome)
    }

    // ── Stage 10: Pagination and publishing ──────────────────────────────

    fn paginate_and_publish(&mut self, merged: &MergeOutcome) -> Result<u32, ReportError> {
        let config = &self.compiler.config;
        let mut total = merged.page_count;
        if config.paginate {
            let outcome = stamp_page_numbers(&merged.output_path, config.skip_first_page_number, &config.stamp_style)
                .map_err(|source| ReportError::StampFailure {
                    document: "page numbers".into(),
                    source,
                })?;
            total = outcome.pages;
        }
        publish(&merged.output_path, &self.request.output_path)?;
        Ok(total)
    }
}

/// Certificates of one type, in request order.
struct CertificateGroup<'a> {
    doc_type: String,
    certificates: Vec<&'a Certificate>,
}

/// Group by certificate type; groups appear in the order their type is first seen.
fn group_by_type(certificates: &[Certificate]) -> Vec<CertificateGroup<'_>> {
    let mut groups: Vec<CertificateGroup<'_>> = Vec::new();
    for cert in certificates {
        match groups.iter_mut().find(|g| g.doc_type == cert.certificate_type) {
            Some(group) => group.certificates.push(cert),
            None => groups.push(CertificateGroup {
                doc_type: cert.certificate_type.clone(),
                certificates: vec![cert],
            }),
        }
    }
    debug!("{} certificate group(s)", groups.len());
    groups
}

/// Certificates whose article and type were found in the merged body.
fn merged_certificates(certificates: &[Certificate], stamps: &[Stamp]) -> Vec<Certificate> {
    certificates
        .iter()
        .filter(|c| {
            stamps
                .iter()
                .any(|s| s.article_id == c.article_number && s.doc_type == c.certificate_type)
        })
        .cloned()
        .collect()
}

/// Remove the workspace; a failure becomes a warning and the report stands.
fn cleanup(workspace: Workspace) -> Option<CompileWarning> {
    info!("[{}] {}", Stage::Cleanup.name(), Stage::Cleanup.description());
    workspace
        .close()
        .err()
        .map(|(path, detail)| CompileWarning::CleanupFailed { path, detail })
}

fn merge_failure(document: &str, error: MergeError) -> ReportError {
    match error {
        MergeError::InputNotFound { path } => ReportError::InputNotFound { path },
        other => ReportError::MergeFailure {
            document: document.to_string(),
            detail: other.to_string(),
        },
    }
}

/// Copy `from` to `to` through a sibling temp file so readers never see a partial report.
fn publish(from: &Path, to: &Path) -> Result<(), ReportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ReportError::Io { path, source }
    };
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file_name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".into());
    let tmp = to.with_file_name(format!(".{file_name}.tmp"));
    fs::copy(from, &tmp).map_err(io_err(tmp.as_path()))?;
    fs::rename(&tmp, to).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        ReportError::Io {
            path: to.to_path_buf(),
            source,
        }
    })
}
