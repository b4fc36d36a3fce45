//! Integration tests for the report compiler.
//!
//! Rendering goes through a scripted renderer that decides the page count of
//! each document from its `<title>`, so page ranges are fully predictable
//! without a browser. Certificates are small generated PDFs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracecert::html::{COVER_TITLE, MAIN_REPORT_TITLE};
use tracecert::pipeline::pdf::{PdfFile, TextDocument};
use tracecert::{
    Article, Certificate, CompileConfig, CompileProgressCallback, CompileRequest, CompileWarning,
    HtmlRenderer, Manifest, Project, RenderError, RenderOptions, ReportCompiler, ReportError,
    SegmentSummary, Stage,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Picks the page count from the document's `<title>`; page text is the title and "sheet N".
struct ScriptedRenderer {
    main_pages: usize,
    cover_pages: usize,
    fail_main: bool,
    panic_on_cover: bool,
    /// After rendering the document with this title, occupy its save temp path with a directory.
    block_save: Option<&'static str>,
    cover_renders: AtomicUsize,
    cover_html: Mutex<String>,
}

impl ScriptedRenderer {
    fn new(main_pages: usize, cover_pages: usize) -> Self {
        Self {
            main_pages,
            cover_pages,
            fail_main: false,
            panic_on_cover: false,
            block_save: None,
            cover_renders: AtomicUsize::new(0),
            cover_html: Mutex::new(String::new()),
        }
    }
}

fn title_of(html: &str) -> &str {
    let start = html.find("<title>").map(|i| i + "<title>".len()).unwrap_or(0);
    let end = html[start..].find("</title>").map(|i| start + i).unwrap_or(start);
    &html[start..end]
}

impl HtmlRenderer for ScriptedRenderer {
    fn render_html_to_pdf(&self, html: &str, output: &Path, _options: &RenderOptions) -> Result<PathBuf, RenderError> {
        let title = title_of(html);
        let pages = if title == MAIN_REPORT_TITLE {
            if self.fail_main {
                return Err(RenderError::Failed("scripted failure".into()));
            }
            self.main_pages
        } else if title == COVER_TITLE {
            if self.panic_on_cover {
                panic!("scripted panic");
            }
            self.cover_renders.fetch_add(1, Ordering::SeqCst);
            *self.cover_html.lock().unwrap() = html.to_string();
            self.cover_pages
        } else {
            1
        };
        write_pdf(output, title, pages);
        if self.block_save == Some(title) {
            let name = output.file_name().unwrap().to_string_lossy();
            std::fs::create_dir(output.with_file_name(format!(".{name}.tmp"))).unwrap();
        }
        Ok(output.to_path_buf())
    }
}

fn write_pdf(path: &Path, label: &str, pages: usize) {
    let mut doc = TextDocument::new(595.0, 842.0);
    for i in 1..=pages {
        doc = doc.page(vec![label.to_string(), format!("sheet {i}")]);
    }
    doc.save(path).unwrap();
}

fn project() -> Project {
    Project {
        id: Some(42),
        project_name: "Gasturbin".into(),
        order_number: "TO-12345".into(),
        customer: "Volvo".into(),
        created_by: "anna".into(),
        purchase_order_number: None,
        project_type: "Doc".into(),
        description: None,
    }
}

fn article(number: &str) -> Article {
    Article {
        article_number: number.into(),
        description: "Flans".into(),
        quantity: 1.0,
        level: "1".into(),
        parent_article: None,
        charge_number: None,
    }
}

fn cert(article: &str, kind: &str, file: &str) -> Certificate {
    Certificate {
        article_number: article.into(),
        certificate_type: kind.into(),
        file_path: file.into(),
        original_filename: None,
        page_count: None,
    }
}

fn compiler(renderer: ScriptedRenderer, config: CompileConfig) -> ReportCompiler {
    ReportCompiler::new(Arc::new(renderer), config)
}

/// Two types, one single-page certificate each.
fn two_type_request(dir: &TempDir) -> CompileRequest {
    write_pdf(&dir.path().join("a1.pdf"), "A1", 1);
    write_pdf(&dir.path().join("b1.pdf"), "B1", 1);
    CompileRequest::new(project(), dir.path().join("out/report.pdf"))
        .articles(vec![article("A1"), article("B1")])
        .certificates(vec![cert("A1", "A", "a1.pdf"), cert("B1", "B", "b1.pdf")])
        .base_dir(dir.path())
}

#[derive(Default)]
struct Recorder {
    percents: Mutex<Vec<u8>>,
    merge: Mutex<Vec<u8>>,
    warnings: Mutex<Vec<CompileWarning>>,
    started: Mutex<Option<usize>>,
    completed: AtomicUsize,
    failed: Mutex<Option<Stage>>,
}

impl CompileProgressCallback for Recorder {
    fn on_compile_start(&self, certificate_count: usize) {
        *self.started.lock().unwrap() = Some(certificate_count);
    }
    fn on_progress(&self, percent: u8, _stage: Stage) {
        self.percents.lock().unwrap().push(percent);
    }
    fn on_merge_progress(&self, percent: u8) {
        self.merge.lock().unwrap().push(percent);
    }
    fn on_warning(&self, warning: &CompileWarning) {
        self.warnings.lock().unwrap().push(warning.clone());
    }
    fn on_compile_complete(&self, _report: &tracecert::CompiledReport) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_compile_failed(&self, error: &ReportError) {
        *self.failed.lock().unwrap() = error.stage();
    }
}

/// Overwrites workspace files ending in `suffix` with garbage once progress reaches `at`.
struct Corrupter {
    root: PathBuf,
    at: u8,
    suffix: &'static str,
}

impl CompileProgressCallback for Corrupter {
    fn on_progress(&self, percent: u8, _stage: Stage) {
        if percent != self.at {
            return;
        }
        for workspace in std::fs::read_dir(&self.root).unwrap() {
            for entry in std::fs::read_dir(workspace.unwrap().path()).unwrap() {
                let path = entry.unwrap().path();
                if path.to_string_lossy().ends_with(self.suffix) {
                    std::fs::write(&path, b"no longer a pdf").unwrap();
                }
            }
        }
    }
}

fn corrupting(dir: &TempDir, at: u8, suffix: &'static str) -> CompileConfig {
    let root = dir.path().join("work");
    CompileConfig::builder()
        .workspace_root(&root)
        .progress_callback(Arc::new(Corrupter { root, at, suffix }))
        .build()
        .unwrap()
}

// ── End to end ───────────────────────────────────────────────────────────────

#[test]
fn compiles_two_groups_into_seven_pages() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    let report = compiler(ScriptedRenderer::new(2, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();

    assert_eq!(report.total_pages, 7);
    assert_eq!(report.final_path, request.output_path);
    assert!(!report.has_warnings(), "{:?}", report.warnings);
    assert_eq!(report.segments, SegmentSummary { accepted: 6, dropped: 0 });

    let ranges: Vec<(&str, u32, u32)> = report
        .sections
        .iter()
        .map(|s| (s.name.as_str(), s.page_start, s.page_end))
        .collect();
    assert_eq!(ranges, vec![("Rapport", 2, 3), ("A", 4, 5), ("B", 6, 7)]);

    // Relative to the body, before the cover was put in front.
    let body: Vec<(u32, u32)> = report
        .sections
        .iter()
        .map(|s| (s.page_start - 1, s.page_end - 1))
        .collect();
    assert_eq!(body, vec![(1, 2), (3, 4), (5, 6)]);

    let pdf = PdfFile::open(&request.output_path).unwrap();
    assert_eq!(pdf.page_count(), 7);
    assert!(!pdf.page_text(1).unwrap().contains("Page "));
    for page in 2..=7 {
        let text = pdf.page_text(page).unwrap();
        assert!(text.contains(&format!("Page {page}/7")), "page {page}: {text}");
    }
}

#[test]
fn final_document_pages_carry_their_sections() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    compiler(ScriptedRenderer::new(2, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();

    let stamps = tracecert::extract(&request.output_path).unwrap();
    let types: Vec<&str> = stamps.iter().map(|s| s.doc_type.as_str()).collect();
    assert_eq!(types, vec!["TOC", "Rapport", "Rapport", "A", "A", "B", "B"]);
    assert_eq!(stamps[4].article_id, "A1");
}

#[test]
fn pagination_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    let config = CompileConfig::builder().paginate(false).build().unwrap();
    compiler(ScriptedRenderer::new(2, 1), config).compile(&request).unwrap();

    let pdf = PdfFile::open(&request.output_path).unwrap();
    for page in 1..=pdf.page_count() {
        assert!(!pdf.page_text(page).unwrap().contains("Page "));
    }
}

// ── Tolerated failures ───────────────────────────────────────────────────────

#[test]
fn missing_certificate_is_a_warning() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir.path().join("a1.pdf"), "A1", 1);
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .articles(vec![article("A1"), article("A2")])
        .certificates(vec![
            cert("A1", "A", "a1.pdf"),
            cert("A2", "A", "gone.pdf"),
            cert("B1", "B", "also-gone.pdf"),
        ])
        .base_dir(dir.path());

    let report = compiler(ScriptedRenderer::new(2, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();

    assert_eq!(report.total_pages, 5);
    assert_eq!(report.section("A").map(|s| (s.page_start, s.page_end)), Some((4, 5)));
    assert!(report.section("B").is_none());
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        CompileWarning::MissingCertificate { article_number, .. } if article_number == "A2"
    )));
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, CompileWarning::SegmentDropped { segment, .. } if segment.contains("'B'"))));
}

#[test]
fn unreadable_certificate_is_dropped() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir.path().join("a1.pdf"), "A1", 2);
    std::fs::write(dir.path().join("broken.pdf"), b"this is not a pdf").unwrap();
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .certificates(vec![cert("A1", "A", "a1.pdf"), cert("A2", "A", "broken.pdf")])
        .base_dir(dir.path());

    let report = compiler(ScriptedRenderer::new(1, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();

    assert_eq!(report.total_pages, 5);
    assert_eq!(report.segments.dropped, 1);
    assert_eq!(report.section("A").map(|s| (s.page_start, s.page_end)), Some((3, 5)));
    assert!(matches!(report.warnings.as_slice(), [CompileWarning::SegmentDropped { .. }]));
}

#[test]
fn invalid_certificate_type_is_dropped() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir.path().join("a1.pdf"), "A1", 1);
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .certificates(vec![cert("A1", "bad##type", "a1.pdf")])
        .base_dir(dir.path());

    let report = compiler(ScriptedRenderer::new(1, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();
    assert_eq!(report.total_pages, 2);
    assert_eq!(report.sections.len(), 1);
    assert!(report.has_warnings());
}

#[test]
fn types_the_marker_font_cannot_draw_are_dropped() {
    let dir = TempDir::new().unwrap();
    for name in ["euro.pdf", "omega.pdf", "umlaut.pdf"] {
        write_pdf(&dir.path().join(name), name, 1);
    }
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .certificates(vec![
            cert("A1", "Intyg €", "euro.pdf"),
            cert("A2", "Intyg Ω", "omega.pdf"),
            cert("Ł-3", "Intyg ü", "umlaut.pdf"),
            cert("A4", "Intyg ü", "umlaut.pdf"),
        ])
        .base_dir(dir.path());

    let report = compiler(ScriptedRenderer::new(1, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();

    let names: Vec<&str> = report.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Rapport", "Intyg ü"]);
    assert_eq!(report.section("Intyg ü").map(|s| (s.page_start, s.page_end)), Some((3, 4)));
    assert_eq!(report.total_pages, 4);

    let dropped: Vec<&str> = report
        .warnings
        .iter()
        .filter_map(|w| match w {
            CompileWarning::SegmentDropped { segment, .. } => Some(segment.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(dropped.len(), 5, "{dropped:?}");
    assert!(dropped.iter().any(|s| s.contains("'Ł-3'")));
    assert!(dropped.iter().any(|s| s.contains("'Intyg €'")));
    assert!(dropped.iter().any(|s| s.contains("'Intyg Ω'")));

    let stamps = tracecert::extract(&request.output_path).unwrap();
    assert!(stamps.iter().all(|s| !s.doc_type.contains('?')));
    assert_eq!(stamps.iter().filter(|s| s.article_id == "A4").count(), 1);
}

#[test]
fn unrecoverable_marker_is_reported() {
    let dir = TempDir::new().unwrap();
    // The certificate's own text carries an empty marker ahead of the stamp.
    write_pdf(&dir.path().join("a1.pdf"), "##ART:##TYP:##SID:1/1##", 1);
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .certificates(vec![cert("A1", "A", "a1.pdf")])
        .base_dir(dir.path());

    let report = compiler(ScriptedRenderer::new(1, 1), CompileConfig::default())
        .compile(&request)
        .unwrap();

    assert!(report
        .warnings
        .contains(&CompileWarning::ExtractionIncomplete { expected: 3, recovered: 2 }));
    assert_eq!(report.total_pages, 4);
    assert_eq!(report.section("A").map(|s| (s.page_start, s.page_end)), Some((3, 3)));
}

#[test]
fn certificate_unreadable_at_merge_is_skipped() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    let report = compiler(ScriptedRenderer::new(2, 1), corrupting(&dir, 50, "_001_A1.pdf"))
        .compile(&request)
        .unwrap();

    assert_eq!(report.segments, SegmentSummary { accepted: 5, dropped: 1 });
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        CompileWarning::InputSkipped { path } if path.ends_with("01_A_001_A1.pdf")
    )));
    assert!(!report
        .warnings
        .iter()
        .any(|w| matches!(w, CompileWarning::ExtractionIncomplete { .. })));
    let ranges: Vec<(&str, u32, u32)> = report
        .sections
        .iter()
        .map(|s| (s.name.as_str(), s.page_start, s.page_end))
        .collect();
    assert_eq!(ranges, vec![("Rapport", 2, 3), ("A", 4, 4), ("B", 5, 6)]);
    assert_eq!(report.total_pages, 6);
}

#[test]
fn summary_and_cover_listing() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir.path().join("a1.pdf"), "A1", 1);
    let mut charged = article("A1");
    charged.charge_number = Some("C-7".into());
    let mut listed = cert("A1", "Materialintyg", "a1.pdf");
    listed.original_filename = Some("intyg 3.1.pdf".into());
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .articles(vec![charged, article("A2"), article("A3")])
        .certificates(vec![listed, cert("A2", "Svetslogg", "gone.pdf")])
        .base_dir(dir.path());
    let renderer = Arc::new(ScriptedRenderer::new(1, 1));

    let report = ReportCompiler::new(renderer.clone(), CompileConfig::default())
        .compile(&request)
        .unwrap();

    let summary = report.summary;
    assert_eq!(summary.article_count, 3);
    assert_eq!(summary.articles_with_charge, 1);
    assert_eq!(summary.articles_without_charge, 2);
    assert_eq!(summary.certificate_count, 2);
    assert_eq!(summary.articles_with_certificates, 2);
    assert_eq!(summary.unique_certificate_types, 2);

    let cover = renderer.cover_html.lock().unwrap();
    assert!(cover.contains("<strong>A1</strong>"), "{cover}");
    assert!(cover.contains("Materialintyg: intyg 3.1.pdf"));
    assert!(!cover.contains("gone.pdf"));
}

#[test]
fn long_cover_shifts_ranges() {
    let dir = TempDir::new().unwrap();
    let renderer = ScriptedRenderer::new(2, 2);
    let compiler = ReportCompiler::new(Arc::new(renderer), CompileConfig::default());
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"));

    let report = compiler.compile(&request).unwrap();
    assert_eq!(report.total_pages, 4);
    assert_eq!(report.section("Rapport").map(|s| (s.page_start, s.page_end)), Some((3, 4)));
    assert!(report.warnings.contains(&CompileWarning::CoverPageCount { pages: 2 }));
}

#[test]
fn cover_is_rendered_once_when_it_fits() {
    let dir = TempDir::new().unwrap();
    let renderer = Arc::new(ScriptedRenderer::new(1, 1));
    let compiler = ReportCompiler::new(renderer.clone(), CompileConfig::default());
    compiler
        .compile(&CompileRequest::new(project(), dir.path().join("report.pdf")))
        .unwrap();
    assert_eq!(renderer.cover_renders.load(Ordering::SeqCst), 1);
}

// ── Fatal failures ───────────────────────────────────────────────────────────

#[test]
fn render_failure_is_fatal_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    let mut renderer = ScriptedRenderer::new(1, 1);
    renderer.fail_main = true;
    let config = CompileConfig::builder().workspace_root(&work).build().unwrap();
    let output = dir.path().join("report.pdf");

    let err = compiler(renderer, config)
        .compile(&CompileRequest::new(project(), &output))
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::MainReport));
    assert!(matches!(err.cause(), ReportError::RenderFailure { .. }));
    match &err {
        ReportError::Generation { output_path, .. } => assert_eq!(output_path, &output),
        other => panic!("expected a generation error, got {other:?}"),
    }
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
}

#[test]
fn unreadable_main_report_fails_the_body_merge() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    let err = compiler(ScriptedRenderer::new(2, 1), corrupting(&dir, 50, "00_rapport.pdf"))
        .compile(&request)
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::BodyMerge));
    assert!(matches!(err.cause(), ReportError::MergeFailure { .. }), "{err}");
    assert!(!request.output_path.exists());
}

#[test]
fn unreadable_cover_fails_the_final_merge() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    let err = compiler(ScriptedRenderer::new(2, 1), corrupting(&dir, 80, "cover.pdf"))
        .compile(&request)
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::FinalMerge));
    assert!(matches!(err.cause(), ReportError::MergeFailure { .. }), "{err}");
    assert!(!request.output_path.exists());
}

#[test]
fn stamping_failure_on_required_documents_is_fatal() {
    for (title, stage) in [(COVER_TITLE, Stage::Cover), (MAIN_REPORT_TITLE, Stage::MainReport)] {
        let dir = TempDir::new().unwrap();
        let mut renderer = ScriptedRenderer::new(1, 1);
        renderer.block_save = Some(title);
        let output = dir.path().join("report.pdf");

        let err = compiler(renderer, CompileConfig::default())
            .compile(&CompileRequest::new(project(), &output))
            .unwrap_err();

        assert_eq!(err.stage(), Some(stage), "{title}: {err}");
        assert!(matches!(err.cause(), ReportError::StampFailure { .. }), "{title}: {err}");
        assert!(!output.exists());
    }
}

#[test]
fn failure_reaches_the_callback() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = CompileConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let mut renderer = ScriptedRenderer::new(1, 1);
    renderer.fail_main = true;

    compiler(renderer, config)
        .compile(&CompileRequest::new(project(), dir.path().join("report.pdf")))
        .unwrap_err();

    assert_eq!(*recorder.failed.lock().unwrap(), Some(Stage::MainReport));
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 0);
    assert_eq!(*recorder.percents.lock().unwrap(), vec![5]);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[test]
fn progress_milestones_in_order() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = CompileConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    compiler(ScriptedRenderer::new(2, 1), config)
        .compile(&two_type_request(&dir))
        .unwrap();

    assert_eq!(*recorder.started.lock().unwrap(), Some(2));
    assert_eq!(
        *recorder.percents.lock().unwrap(),
        vec![5, 20, 30, 50, 60, 70, 80, 90, 100]
    );
    let merge = recorder.merge.lock().unwrap();
    assert_eq!(merge.first(), Some(&0));
    assert_eq!(merge.last(), Some(&100));
    assert!(recorder.warnings.lock().unwrap().is_empty());
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 1);
}

#[test]
fn warnings_reach_the_callback() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = CompileConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let request = CompileRequest::new(project(), dir.path().join("report.pdf"))
        .certificates(vec![cert("A1", "A", "gone.pdf")])
        .base_dir(dir.path());

    let report = compiler(ScriptedRenderer::new(1, 1), config).compile(&request).unwrap();
    assert_eq!(*recorder.warnings.lock().unwrap(), report.warnings);
}

// ── Entry points ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn async_compile() {
    let dir = TempDir::new().unwrap();
    let request = two_type_request(&dir);
    let output = request.output_path.clone();
    let compiler = compiler(ScriptedRenderer::new(2, 1), CompileConfig::default());

    let report = compiler.compile_async(request).await.unwrap();
    assert_eq!(report.total_pages, 7);
    assert!(output.exists());
}

#[tokio::test]
async fn panicked_async_compile_names_the_output() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.pdf");
    let mut renderer = ScriptedRenderer::new(1, 1);
    renderer.panic_on_cover = true;

    let err = compiler(renderer, CompileConfig::default())
        .compile_async(CompileRequest::new(project(), &output))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Finish));
    assert!(matches!(err.cause(), ReportError::Internal(msg) if msg.contains("panicked")), "{err}");
    match &err {
        ReportError::Generation { output_path, .. } => assert_eq!(output_path, &output),
        other => panic!("expected a generation error, got {other:?}"),
    }
    assert!(!output.exists());
}

#[test]
fn compile_from_manifest() {
    let dir = TempDir::new().unwrap();
    write_pdf(&dir.path().join("a1.pdf"), "A1", 1);
    let manifest_path = dir.path().join("project.json");
    let manifest = Manifest::new(project(), vec![article("A1")], vec![cert("A1", "A", "a1.pdf")]);
    std::fs::write(&manifest_path, serde_json::to_string(&manifest).unwrap()).unwrap();

    let manifest = Manifest::load(&manifest_path).unwrap();
    let report = compiler(ScriptedRenderer::new(1, 1), CompileConfig::default())
        .compile_from_source(&manifest, 42, dir.path().join("report.pdf"))
        .unwrap();
    assert_eq!(report.total_pages, 4);
    assert_eq!(report.section("A").map(|s| (s.page_start, s.page_end)), Some((3, 4)));

    assert!(matches!(
        compiler(ScriptedRenderer::new(1, 1), CompileConfig::default())
            .compile_from_source(&manifest, 7, dir.path().join("other.pdf")),
        Err(ReportError::Source(_))
    ));
}
