//! CLI binary for edgequake-pdf2form.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! `DetectionConfig` / `OverlayConfig` and prints JSON results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2form::{
    detect, detect_flat, detect_hybrid, inspect, overlay_to_file, DetectionConfig,
    DetectionProgressCallback, HybridResponse, OverlayConfig, OverlayRequest, PageSelection,
    ProgressCallback, SharedRecognizer, write_atomic,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Live progress bar plus one log line per recognised page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_detection_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Detecting");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl DetectionProgressCallback for CliProgressCallback {
    fn on_detection_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Detecting fields on {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, field_count: usize) {
        let secs = self.page_elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{field_count:>4} lines")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.page_elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.finish_and_clear();
    }

    fn on_detection_complete(&self, total_pages: usize, field_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} text regions across {} pages",
            green("✔"),
            bold(&field_count.to_string()),
            total_pages
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Nested UI schema (stdout)
  pdf2form schema --models ./models application.pdf

  # Flat components + field map, saved for later overlay
  pdf2form flat --models ./models application.pdf -o fields.json

  # Use embedded form widgets when present, OCR otherwise
  pdf2form hybrid --models ./models application.pdf --field-map fields.json

  # Write filled values back onto the PDF
  pdf2form overlay application.pdf --data filled.json -o filled.pdf

  # Page count and sizes (no OCR)
  pdf2form inspect application.pdf

FILLED VALUES (--data):
  {
    "documentId": "optional",
    "values":   { "field_001_003": "Ada Lovelace", "field_001_007": true },
    "fieldMap": { "field_001_003": { "bbox": [..8 numbers..], "page": 1, "type": "text_field" } }
  }

OCR MODELS (--models DIR):
  det.onnx, latin_rec.onnx, latin_dict.txt

ENVIRONMENT VARIABLES:
  PDF2FORM_MODELS         OCR model directory
  PDFIUM_LIB_PATH         Path to an existing libpdfium (file or directory)
  RUST_LOG                Override log filter (e.g. edgequake_pdf2form=debug)
"#;

/// Detect fillable fields in PDFs and scanned forms.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2form",
    version,
    about = "Detect fillable fields in PDFs and scanned forms, and write filled values back",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2FORM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2FORM_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2FORM_NO_PROGRESS")]
    no_progress: bool,

    /// pdfium shared library (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR the document and emit the nested UI schema.
    Schema(DetectArgs),
    /// OCR the document and emit flat components plus the field map.
    Flat(DetectArgs),
    /// Use embedded form widgets when present, OCR inference otherwise.
    Hybrid(HybridArgs),
    /// Write filled values onto a PDF.
    Overlay(OverlayArgs),
    /// Print page count and page sizes without OCR.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Directory with the ONNX OCR models.
    #[arg(long, env = "PDF2FORM_MODELS")]
    models: Option<PathBuf>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2FORM_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2FORM_PASSWORD")]
    password: Option<String>,

    /// Raster magnification for OCR (0.5–4.0).
    #[arg(long, env = "PDF2FORM_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Vertical gap (raster units) that starts a new schema section.
    #[arg(long, env = "PDF2FORM_SECTION_GAP", default_value_t = 100.0)]
    section_gap: f64,

    /// Document id echoed in hybrid output (random UUID if omitted).
    #[arg(long)]
    document_id: Option<String>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "PDF2FORM_OUTPUT")]
    output: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2FORM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct HybridArgs {
    #[command(flatten)]
    detect: DetectArgs,

    /// Also write a field map for `overlay --data`, at the render scale.
    #[arg(long)]
    field_map: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OverlayArgs {
    /// Local PDF path or HTTP/HTTPS URL.
    input: String,

    /// JSON file with `values` and `fieldMap`.
    #[arg(long)]
    data: PathBuf,

    /// Where to write the filled PDF.
    #[arg(short, long)]
    output: PathBuf,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2FORM_PASSWORD")]
    password: Option<String>,

    /// Factor between field-map coordinates and PDF points.
    #[arg(long, env = "PDF2FORM_COORDINATE_SCALE", default_value_t = 2.0)]
    coordinate_scale: f64,

    /// Starting font size for text values.
    #[arg(long, default_value_t = 10.0)]
    font_size: f32,

    /// Print the overlay report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2FORM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2FORM_PASSWORD")]
    password: Option<String>,

    /// Output JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would fight with the progress bar; it carries the feedback.
    let detecting = matches!(
        cli.command,
        Command::Schema(_) | Command::Flat(_) | Command::Hybrid(_)
    );
    let show_progress = detecting && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Schema(args) => {
            let config = build_detection_config(&cli, args, show_progress)?;
            let output = detect(&args.input, &config)
                .await
                .context("Schema detection failed")?;
            emit_json(&output, args.output.as_deref()).await?;
        }
        Command::Flat(args) => {
            let config = build_detection_config(&cli, args, show_progress)?;
            let output = detect_flat(&args.input, &config)
                .await
                .context("Flat detection failed")?;
            emit_json(&output, args.output.as_deref()).await?;
        }
        Command::Hybrid(args) => {
            let config = build_detection_config(&cli, &args.detect, show_progress)?;
            let response = detect_hybrid(&args.detect.input, &config)
                .await
                .context("Hybrid detection failed")?;
            emit_json(&response, args.detect.output.as_deref()).await?;
            match response {
                HybridResponse::Success(ref out) => {
                    if let Some(path) = args.field_map.as_deref() {
                        let map = out.field_map(config.render_scale as f64);
                        emit_json(&map, Some(path)).await?;
                    }
                }
                HybridResponse::Failure(ref f) => {
                    anyhow::bail!(
                        "Hybrid detection failed for document {}: {}",
                        response.document_id(),
                        f.error.message
                    );
                }
            }
        }
        Command::Overlay(args) => run_overlay(&cli, args).await?,
        Command::Inspect(args) => run_inspect(&cli, args).await?,
    }

    Ok(())
}

async fn run_overlay(cli: &Cli, args: &OverlayArgs) -> Result<()> {
    let payload = tokio::fs::read_to_string(&args.data)
        .await
        .with_context(|| format!("Failed to read filled values from {:?}", args.data))?;
    let request = OverlayRequest::from_json_str(&payload).context("Invalid filled-values file")?;

    let mut builder = OverlayConfig::builder()
        .coordinate_scale(args.coordinate_scale)
        .font_size(args.font_size)
        .download_timeout_secs(args.download_timeout);
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    let report = overlay_to_file(&args.input, &args.output, &request, &config)
        .await
        .context("Overlay failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} filled  {} unchecked  {} skipped  {}  →  {}",
            if report.is_clean() { green("✔") } else { cyan("⚠") },
            report.filled.len(),
            report.unchecked.len(),
            report.skipped.len(),
            if report.failed.is_empty() {
                dim("0 failed")
            } else {
                red(&format!("{} failed", report.failed.len()))
            },
            bold(&args.output.display().to_string()),
        );
        for failure in &report.failed {
            eprintln!("   {} {}", red("✗"), failure);
        }
    }
    Ok(())
}

async fn run_inspect(cli: &Cli, args: &InspectArgs) -> Result<()> {
    let mut builder = DetectionConfig::builder();
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    let info = inspect(&args.input, &config)
        .await
        .context("Failed to inspect document")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialise metadata")?
        );
    } else {
        println!("File:         {}", args.input);
        println!("Kind:         {:?}", info.kind);
        println!("Pages:        {}", info.page_count);
        println!("Form fields:  {}", if info.has_form_fields { "yes" } else { "no" });
        for p in &info.pages {
            println!("  page {:>3}    {:.1} × {:.1}", p.page, p.width, p.height);
        }
    }
    Ok(())
}

/// Map CLI args to `DetectionConfig`.
fn build_detection_config(
    cli: &Cli,
    args: &DetectArgs,
    show_progress: bool,
) -> Result<DetectionConfig> {
    let pages: PageSelection = args.pages.parse().context("Invalid --pages")?;

    let mut builder = DetectionConfig::builder()
        .render_scale(args.render_scale)
        .section_gap(args.section_gap)
        .pages(pages)
        .download_timeout_secs(args.download_timeout);

    if let Some(recognizer) = load_recognizer(args.models.as_deref())? {
        builder = builder.recognizer(recognizer);
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(ref id) = args.document_id {
        builder = builder.document_id(id.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Load the OCR engine once at startup.
fn load_recognizer(models: Option<&Path>) -> Result<Option<SharedRecognizer>> {
    let Some(dir) = models else {
        return Ok(None);
    };

    #[cfg(feature = "onnx")]
    {
        let recognizer = edgequake_pdf2form::OnnxBackend::shared_from_dir(dir)
            .with_context(|| format!("Failed to load OCR models from {}", dir.display()))?;
        Ok(Some(recognizer))
    }

    #[cfg(not(feature = "onnx"))]
    {
        anyhow::bail!(
            "--models {} given, but pdf2form was built without the `onnx` feature",
            dir.display()
        )
    }
}

async fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    match output {
        Some(path) => {
            write_atomic(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}  {}", green("✔"), bold(&path.display().to_string()));
        }
        None => println!("{json}"),
    }
    Ok(())
}
