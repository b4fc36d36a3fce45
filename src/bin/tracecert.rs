//! CLI binary for tracecert.
//!
//! A thin shim over the library crate: `compile` maps flags to
//! `CompileConfig` and runs a manifest through the compiler, the other
//! subcommands expose single pipeline steps for inspecting documents.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracecert::{
    extract, merge, stamp_document, stamp_page_numbers, ChromeRenderer, CompileConfig,
    CompileProgressCallback, CompileRequest, CompileWarning, CompiledReport, HtmlRenderer, Manifest,
    PageSize, PlainTextRenderer, ProgressCallback, ReportCompiler, ReportError, ReportSource, Stage, StampStyle,
    TableOfContents,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Percent-based progress bar; warnings are printed above it as they occur.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix("Compiling");
        bar.set_message("Preparing…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl CompileProgressCallback for CliProgressCallback {
    fn on_compile_start(&self, certificate_count: usize) {
        self.bar.println(format!(
            "{} {}",
            bold("◆"),
            bold(&format!("Compiling report with {certificate_count} certificate(s)…"))
        ));
    }

    fn on_progress(&self, percent: u8, stage: Stage) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(stage.description());
    }

    fn on_merge_progress(&self, percent: u8) {
        self.bar.set_message(format!("{} ({percent}%)", Stage::BodyMerge.description()));
    }

    fn on_warning(&self, warning: &CompileWarning) {
        self.bar.println(format!("  {} {}", yellow("⚠"), warning));
    }

    fn on_compile_complete(&self, _report: &CompiledReport) {
        self.bar.finish_and_clear();
    }

    fn on_compile_failed(&self, _error: &ReportError) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compile a report described by a manifest
  tracecert compile project.json -o report.pdf

  # Without Chrome, using the built-in text renderer
  tracecert compile project.json -o report.pdf --renderer plain

  # Stamp a single document and look at what was written
  tracecert stamp cert.pdf --article A-100 --type Materialintyg
  tracecert scan cert.pdf

  # Table of contents of an already compiled body
  tracecert toc body.pdf --offset 1

ENVIRONMENT VARIABLES:
  TRACECERT_CHROME    Path to the Chrome/Chromium executable
  RUST_LOG            Log filter (overrides -v / -q)
"#;

/// Compile traceability reports from certificates.
#[derive(Parser, Debug)]
#[command(
    name = "tracecert",
    version,
    about = "Compile traceability reports from certificates",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TRACECERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TRACECERT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile the report for a JSON manifest.
    Compile(CompileArgs),

    /// Stamp every page of a PDF with a section marker, in place.
    Stamp {
        pdf: PathBuf,
        #[arg(long)]
        article: String,
        #[arg(long = "type")]
        doc_type: String,
    },

    /// Label the pages of a PDF with `Page i/n`, in place.
    Paginate {
        pdf: PathBuf,
        /// Label the first page too.
        #[arg(long)]
        number_first_page: bool,
    },

    /// Merge PDFs in the given order.
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the markers found in a PDF.
    Scan {
        pdf: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Print the table of contents rebuilt from a PDF's markers.
    Toc {
        pdf: PathBuf,
        /// Pages in front of the scanned document (the cover).
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct CompileArgs {
    /// Manifest describing the project, its articles and certificates.
    manifest: PathBuf,

    /// Where to write the report.
    #[arg(short, long, env = "TRACECERT_OUTPUT")]
    output: PathBuf,

    /// Project id to compile; defaults to the manifest's own.
    #[arg(long)]
    project: Option<i64>,

    /// HTML→PDF renderer.
    #[arg(long, env = "TRACECERT_RENDERER", value_enum, default_value = "chrome")]
    renderer: RendererArg,

    /// Chrome/Chromium executable; located automatically when omitted.
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Paper size: a4, letter, legal or <width>x<height> in points.
    #[arg(long, env = "TRACECERT_PAGE_SIZE", default_value = "a4")]
    page_size: PageSize,

    /// Watermark text behind the material specification.
    #[arg(long, env = "TRACECERT_WATERMARK")]
    watermark: Option<String>,

    /// Leave the watermark out.
    #[arg(long)]
    no_watermark: bool,

    /// Do not add `Page i/n` labels.
    #[arg(long)]
    no_page_numbers: bool,

    /// Label the cover page too.
    #[arg(long)]
    number_first_page: bool,

    /// Directory for the temporary workspace.
    #[arg(long, env = "TRACECERT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Print the compiled report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TRACECERT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RendererArg {
    Chrome,
    Plain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is shown.
    let show_progress = match &cli.command {
        Command::Compile(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Compile(args) => run_compile(args, show_progress, cli.quiet).await,
        Command::Stamp {
            pdf,
            article,
            doc_type,
        } => {
            let outcome = stamp_document(&pdf, &article, &doc_type, &StampStyle::default())
                .with_context(|| format!("Failed to stamp {}", pdf.display()))?;
            if !cli.quiet {
                eprintln!("{} stamped {} page(s) of {}", green("✔"), outcome.stamped, pdf.display());
            }
            Ok(())
        }
        Command::Paginate {
            pdf,
            number_first_page,
        } => {
            let outcome = stamp_page_numbers(&pdf, !number_first_page, &StampStyle::default())
                .with_context(|| format!("Failed to paginate {}", pdf.display()))?;
            if !cli.quiet {
                eprintln!("{} labelled {} of {} page(s)", green("✔"), outcome.stamped, outcome.pages);
            }
            Ok(())
        }
        Command::Merge { inputs, output } => {
            let outcome = merge(&inputs, &output, |_| {}).context("Merge failed")?;
            for skipped in &outcome.skipped {
                eprintln!("  {} skipped unreadable {}", yellow("⚠"), skipped.display());
            }
            if !cli.quiet {
                eprintln!(
                    "{} {} page(s) from {} file(s)  →  {}",
                    green("✔"),
                    outcome.page_count,
                    outcome.merged.len(),
                    bold(&output.display().to_string())
                );
            }
            Ok(())
        }
        Command::Scan { pdf, json } => {
            let stamps = extract(&pdf).with_context(|| format!("Failed to scan {}", pdf.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stamps).context("Failed to serialise markers")?);
            } else {
                for s in &stamps {
                    println!("{:>4}  {:<24} {}", s.page_number, s.doc_type, s.article_id);
                }
            }
            Ok(())
        }
        Command::Toc { pdf, offset, json } => {
            let stamps = extract(&pdf).with_context(|| format!("Failed to scan {}", pdf.display()))?;
            let toc = TableOfContents::build_with_offset(&stamps, offset);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(toc.sections()).context("Failed to serialise table of contents")?
                );
            } else {
                for section in toc.sections() {
                    println!("{:<32} {}", section.name, section.range_label());
                }
            }
            Ok(())
        }
    }
}

async fn run_compile(args: CompileArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let started = Instant::now();
    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let project_id = args.project.unwrap_or_else(|| manifest.project_id());

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn CompileProgressCallback>);
    let config = build_config(&args, progress)?;
    let renderer = build_renderer(args.renderer, args.chrome.as_deref())?;
    let compiler = ReportCompiler::new(renderer, config);

    let request = CompileRequest {
        project: manifest.project(project_id)?,
        articles: manifest.articles_for_project(project_id)?,
        certificates: manifest.certificates_for_project(project_id)?,
        output_path: args.output.clone(),
        base_dir: manifest.base_dir(),
    };
    let result = compiler.compile_async(request).await;
    if let (Err(_), Some(cb)) = (&result, &cli_progress) {
        // A panicked compile never reaches the callback.
        cb.bar.finish_and_clear();
    }
    let report = result.context("Report compilation failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialise report")?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }
    if !show_progress {
        for warning in &report.warnings {
            eprintln!("  {} {}", yellow("⚠"), warning);
        }
    }
    for section in &report.sections {
        eprintln!("   {:<32} {}", section.name, dim(&section.range_label()));
    }
    let summary = &report.summary;
    eprintln!(
        "   {}",
        dim(&format!(
            "{} articles ({} without charge), {} certificates on {} articles, {} types",
            summary.article_count,
            summary.articles_without_charge,
            summary.certificate_count,
            summary.articles_with_certificates,
            summary.unique_certificate_types
        ))
    );
    eprintln!(
        "{}  {} pages  {} sections  {}ms  →  {}",
        if report.has_warnings() { yellow("⚠") } else { green("✔") },
        report.total_pages,
        report.sections.len(),
        started.elapsed().as_millis(),
        bold(&report.final_path.display().to_string()),
    );
    Ok(())
}

/// Map CLI args to `CompileConfig`.
fn build_config(args: &CompileArgs, progress: Option<ProgressCallback>) -> Result<CompileConfig> {
    let mut builder = CompileConfig::builder()
        .page_size(args.page_size)
        .include_watermark(!args.no_watermark)
        .paginate(!args.no_page_numbers)
        .skip_first_page_number(!args.number_first_page);
    if let Some(text) = &args.watermark {
        builder = builder.watermark_text(text.clone());
    }
    if let Some(dir) = &args.workspace {
        builder = builder.workspace_root(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn build_renderer(kind: RendererArg, chrome: Option<&Path>) -> Result<Arc<dyn HtmlRenderer>> {
    Ok(match (kind, chrome) {
        (RendererArg::Plain, _) => Arc::new(PlainTextRenderer::default()),
        (RendererArg::Chrome, Some(path)) => Arc::new(ChromeRenderer::new(path)),
        (RendererArg::Chrome, None) => Arc::new(ChromeRenderer::locate().context("Cannot render HTML")?),
    })
}
