//! Public entry points.
//!
//! Every operation comes in three flavours: an async function taking a path
//! or URL, a `_from_bytes` variant for documents already in memory, and a
//! `_sync` wrapper that spins up a temporary tokio runtime.
//!
//! pdfium and the OCR engine are blocking, so the document work for each
//! request runs inside one `tokio::task::spawn_blocking` call. Pages are
//! processed in order within it.

use crate::config::{DetectionConfig, OverlayConfig, PageSelection};
use crate::document::{FormDocument, ImageDocument};
use crate::error::{ErrorKind, Pdf2FormError};
use crate::output::{
    field_type_counts, DetectOutput, DocumentInfo, FlatOutput, HybridFailure, HybridOutput,
    HybridResponse, OverlayOutput, OverlayReport, PageInfo, PageMetadata,
};
use crate::pipeline::detect::{self, OcrPass};
use crate::pipeline::input::{self, LoadedInput, SourceKind};
use crate::pipeline::overlay::{self as compositor, OverlayRequest};
use crate::pipeline::{flatten, render, schema};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ── Detection ────────────────────────────────────────────────────────────

/// Detect fields with OCR and build the nested UI schema.
///
/// # Errors
/// Any input, rasterisation or recognition failure is fatal.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2form::{detect, DetectionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let recognizer: edgequake_pdf2form::SharedRecognizer = unimplemented!();
/// let config = DetectionConfig::builder().recognizer(recognizer).build()?;
/// let output = detect("intake-form.pdf", &config).await?;
/// for section in &output.schema.form_schema {
///     println!("{} ({} fields)", section.section, section.fields.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn detect(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<DetectOutput, Pdf2FormError> {
    let loaded = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    detect_loaded(loaded, config).await
}

/// [`detect`] for in-memory bytes.
pub async fn detect_from_bytes(
    bytes: Vec<u8>,
    source_name: impl Into<String>,
    config: &DetectionConfig,
) -> Result<DetectOutput, Pdf2FormError> {
    detect_loaded(LoadedInput::from_bytes(bytes, source_name)?, config).await
}

/// Synchronous wrapper around [`detect`].
pub fn detect_sync(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<DetectOutput, Pdf2FormError> {
    runtime()?.block_on(detect(input_str, config))
}

async fn detect_loaded(
    loaded: LoadedInput,
    config: &DetectionConfig,
) -> Result<DetectOutput, Pdf2FormError> {
    let start = Instant::now();
    let cfg = config.clone();
    let kind = loaded.kind;
    let output = with_document(loaded, config.pdfium_lib_path.clone(), config.password.clone(), move |doc| {
        let pages = select_pages(doc, &cfg.pages)?;
        let pass = ocr_pass(&cfg, kind, &pages);
        let fields = detect::extract_fields(doc, &pass)?;
        let schema = schema::build_schema(&fields, cfg.section_gap);
        let page_metadata = PageMetadata::collect(doc, &pages, fields.len())?;
        Ok(DetectOutput {
            success: true,
            schema,
            field_type_counts: field_type_counts(&fields),
            raw_fields: fields,
            page_metadata,
        })
    })
    .await?;

    info!(
        "Schema detection complete: {} fields in {} sections, {}ms",
        output.raw_fields.len(),
        output.schema.form_schema.len(),
        start.elapsed().as_millis()
    );
    Ok(output)
}

/// Detect fields with OCR and return flat components plus the field map.
///
/// The field map is what [`overlay`] later consumes; keep it with the form.
pub async fn detect_flat(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<FlatOutput, Pdf2FormError> {
    let loaded = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    detect_flat_loaded(loaded, config).await
}

/// [`detect_flat`] for in-memory bytes.
pub async fn detect_flat_from_bytes(
    bytes: Vec<u8>,
    source_name: impl Into<String>,
    config: &DetectionConfig,
) -> Result<FlatOutput, Pdf2FormError> {
    detect_flat_loaded(LoadedInput::from_bytes(bytes, source_name)?, config).await
}

/// Synchronous wrapper around [`detect_flat`].
pub fn detect_flat_sync(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<FlatOutput, Pdf2FormError> {
    runtime()?.block_on(detect_flat(input_str, config))
}

async fn detect_flat_loaded(
    loaded: LoadedInput,
    config: &DetectionConfig,
) -> Result<FlatOutput, Pdf2FormError> {
    let cfg = config.clone();
    let kind = loaded.kind;
    let output = with_document(loaded, config.pdfium_lib_path.clone(), config.password.clone(), move |doc| {
        let pages = select_pages(doc, &cfg.pages)?;
        let pass = ocr_pass(&cfg, kind, &pages);
        let fields = detect::extract_fields(doc, &pass)?;
        let components = flatten::flatten_components(&fields);
        let field_map = flatten::build_field_map(&fields);
        let page_metadata = PageMetadata::collect(doc, &pages, components.len())?;
        Ok(FlatOutput {
            success: true,
            components,
            field_map,
            page_metadata,
        })
    })
    .await?;

    info!("Flat detection complete: {} fillable fields", output.components.len());
    Ok(output)
}

/// Prefer embedded form widgets, fall back to OCR inference.
///
/// Input problems (missing file, unsupported content, wrong password) are
/// returned as `Err`. Failures after the document opened are reported as a
/// [`HybridResponse::Failure`] payload so a transport can return them as a
/// structured body.
pub async fn detect_hybrid(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<HybridResponse, Pdf2FormError> {
    let start = Instant::now();
    let loaded = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    detect_hybrid_loaded(loaded, config, start).await
}

/// [`detect_hybrid`] for in-memory bytes.
pub async fn detect_hybrid_from_bytes(
    bytes: Vec<u8>,
    source_name: impl Into<String>,
    config: &DetectionConfig,
) -> Result<HybridResponse, Pdf2FormError> {
    let start = Instant::now();
    detect_hybrid_loaded(LoadedInput::from_bytes(bytes, source_name)?, config, start).await
}

/// Synchronous wrapper around [`detect_hybrid`].
pub fn detect_hybrid_sync(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<HybridResponse, Pdf2FormError> {
    runtime()?.block_on(detect_hybrid(input_str, config))
}

async fn detect_hybrid_loaded(
    loaded: LoadedInput,
    config: &DetectionConfig,
    start: Instant,
) -> Result<HybridResponse, Pdf2FormError> {
    let document_id = config
        .document_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cfg = config.clone();
    let kind = loaded.kind;

    let result = with_document(loaded, config.pdfium_lib_path.clone(), config.password.clone(), move |doc| {
        let pages = select_pages(doc, &cfg.pages)?;
        let pass = ocr_pass(&cfg, kind, &pages);
        let detection = detect::detect_hybrid(doc, &pass)?;
        Ok((detection, doc.page_count()))
    })
    .await;
    let processing_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((detection, page_count)) => {
            info!(
                "Hybrid detection complete: {} regions (structured: {}), {}ms",
                detection.regions().len(),
                detection.used_structured_fields(),
                processing_time_ms
            );
            Ok(HybridResponse::Success(HybridOutput {
                success: true,
                used_structured_fields: detection.used_structured_fields(),
                field_regions: detection.into_regions(),
                page_count,
                processing_time_ms,
                document_id,
                timestamp: Utc::now(),
            }))
        }
        Err(e) if e.kind() == ErrorKind::Input => Err(e),
        Err(e) => {
            warn!("Hybrid detection failed for {}: {}", document_id, e);
            Ok(HybridResponse::Failure(HybridFailure::from_error(
                &e,
                document_id,
                processing_time_ms,
            )))
        }
    }
}

// ── Overlay ──────────────────────────────────────────────────────────────

/// Write filled values onto a PDF and return the new bytes.
///
/// The source document is never modified.
pub async fn overlay(
    input_str: impl AsRef<str>,
    request: &OverlayRequest,
    config: &OverlayConfig,
) -> Result<OverlayOutput, Pdf2FormError> {
    let loaded = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    overlay_loaded(loaded, request, config).await
}

/// [`overlay`] for in-memory PDF bytes.
pub async fn overlay_from_bytes(
    bytes: Vec<u8>,
    source_name: impl Into<String>,
    request: &OverlayRequest,
    config: &OverlayConfig,
) -> Result<OverlayOutput, Pdf2FormError> {
    overlay_loaded(LoadedInput::from_bytes(bytes, source_name)?, request, config).await
}

/// Synchronous wrapper around [`overlay`].
pub fn overlay_sync(
    input_str: impl AsRef<str>,
    request: &OverlayRequest,
    config: &OverlayConfig,
) -> Result<OverlayOutput, Pdf2FormError> {
    runtime()?.block_on(overlay(input_str, request, config))
}

/// Overlay and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn overlay_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    request: &OverlayRequest,
    config: &OverlayConfig,
) -> Result<OverlayReport, Pdf2FormError> {
    let output = overlay(input_str, request, config).await?;
    write_atomic(output_path.as_ref(), &output.bytes).await?;
    Ok(output.report)
}

async fn overlay_loaded(
    loaded: LoadedInput,
    request: &OverlayRequest,
    config: &OverlayConfig,
) -> Result<OverlayOutput, Pdf2FormError> {
    if loaded.kind != SourceKind::Pdf {
        return Err(Pdf2FormError::UnsupportedContent {
            source_name: loaded.source_name,
            detected: "raster image (overlay needs a PDF)".into(),
        });
    }
    if let Some(ref id) = request.document_id {
        debug!("Overlay for document {}", id);
    }

    let request = request.clone();
    let cfg = config.clone();
    with_document(loaded, config.pdfium_lib_path.clone(), config.password.clone(), move |doc| {
        let report = compositor::overlay(doc, &request.field_map, &request.values, &cfg);
        let bytes = doc.save()?;
        Ok(OverlayOutput { bytes, report })
    })
    .await
}

/// Write `bytes` to `path` via a uniquely named sibling temp file and rename.
///
/// Concurrent writers to the same path never share a temp file; the last
/// rename wins and the destination always holds one complete payload.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2FormError> {
    let target = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || persist_atomic(&target, &bytes))
        .await
        .map_err(|e| Pdf2FormError::Internal(format!("write task panicked: {e}")))?
}

fn persist_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2FormError> {
    use std::io::Write;

    let write_err = |e: std::io::Error| Pdf2FormError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(write_err)?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };

    // Dropping the handle on any early return deletes the temp file.
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf2form-")
        .suffix(".tmp")
        .tempfile_in(&parent)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// ── Inspect ──────────────────────────────────────────────────────────────

/// Page count, page sizes and form presence, without OCR.
///
/// Does not require an OCR engine.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<DocumentInfo, Pdf2FormError> {
    let loaded = input::load_input(input_str.as_ref(), config.download_timeout_secs).await?;
    inspect_loaded(loaded, config).await
}

/// [`inspect`] for in-memory bytes.
pub async fn inspect_from_bytes(
    bytes: Vec<u8>,
    source_name: impl Into<String>,
    config: &DetectionConfig,
) -> Result<DocumentInfo, Pdf2FormError> {
    inspect_loaded(LoadedInput::from_bytes(bytes, source_name)?, config).await
}

/// Synchronous wrapper around [`inspect`].
pub fn inspect_sync(
    input_str: impl AsRef<str>,
    config: &DetectionConfig,
) -> Result<DocumentInfo, Pdf2FormError> {
    runtime()?.block_on(inspect(input_str, config))
}

async fn inspect_loaded(
    loaded: LoadedInput,
    config: &DetectionConfig,
) -> Result<DocumentInfo, Pdf2FormError> {
    let source_name = loaded.source_name.clone();
    let kind = loaded.kind;
    with_document(loaded, config.pdfium_lib_path.clone(), config.password.clone(), move |doc| {
        let page_count = doc.page_count();
        let pages = (1..=page_count)
            .map(|page| {
                let size = doc.page_size(page)?;
                Ok(PageInfo {
                    page,
                    width: size.width,
                    height: size.height,
                })
            })
            .collect::<Result<Vec<_>, Pdf2FormError>>()?;
        let has_form_fields = matches!(doc.form_widgets(), Ok(Some(ref w)) if !w.is_empty());
        Ok(DocumentInfo {
            source_name,
            kind,
            page_count,
            pages,
            has_form_fields,
        })
    })
    .await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn runtime() -> Result<tokio::runtime::Runtime, Pdf2FormError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2FormError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

/// Resolve the page selection against the document; an empty result is an error.
fn select_pages(
    document: &dyn FormDocument,
    selection: &PageSelection,
) -> Result<Vec<usize>, Pdf2FormError> {
    let total = document.page_count();
    let pages = selection.to_pages(total);
    if pages.is_empty() {
        return Err(Pdf2FormError::PageOutOfRange { page: 0, total });
    }
    debug!("Selected {} of {} pages", pages.len(), total);
    Ok(pages)
}

/// Images are already pixels: OCR them at their native size.
fn raster_scale(config: &DetectionConfig, kind: SourceKind) -> f32 {
    match kind {
        SourceKind::Pdf => config.render_scale,
        SourceKind::Image => 1.0,
    }
}

fn ocr_pass<'a>(config: &'a DetectionConfig, kind: SourceKind, pages: &'a [usize]) -> OcrPass<'a> {
    OcrPass {
        recognizer: config.recognizer.as_deref(),
        pages,
        scale: raster_scale(config, kind),
        progress: config.progress_callback.as_deref(),
    }
}

/// Open the document on a blocking thread and run `f` against it.
async fn with_document<T, F>(
    loaded: LoadedInput,
    pdfium_lib_path: Option<PathBuf>,
    password: Option<String>,
    f: F,
) -> Result<T, Pdf2FormError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn FormDocument) -> Result<T, Pdf2FormError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || match loaded.kind {
        SourceKind::Pdf => {
            let pdfium = render::bind_pdfium(pdfium_lib_path.as_deref())?;
            let mut document =
                render::open_pdf(&pdfium, loaded.bytes, password.as_deref(), &loaded.source_name)?;
            f(&mut document)
        }
        SourceKind::Image => {
            let mut document = ImageDocument::decode(&loaded.bytes, loaded.source_name)?;
            f(&mut document)
        }
    })
    .await
    .map_err(|e| Pdf2FormError::Internal(format!("Blocking task panicked: {}", e)))?
}
