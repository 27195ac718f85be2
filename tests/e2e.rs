//! End-to-end tests against a real pdfium library.
//!
//! Gated behind `E2E_ENABLED` so they do not run in CI unless explicitly
//! requested. OCR tests additionally need `PDF2FORM_MODELS` pointing at a
//! directory with the ONNX models, and real forms in `./test_cases/`.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use edgequake_pdf2form::pipeline::render::{bind_pdfium, open_pdf};
use edgequake_pdf2form::{
    detect_hybrid_from_bytes, inspect, inspect_from_bytes, overlay_from_bytes, overlay_to_file,
    DetectionConfig, ErrorKind, FormDocument, HybridResponse, OverlayConfig, OverlayRequest,
    Pdf2FormError, Point,
};
use pdfium_render::prelude::*;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn lib_path() -> Option<PathBuf> {
    std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
    }};
}

macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// A blank A4 PDF with `pages` pages, built with pdfium itself.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let pdfium = bind_pdfium(lib_path().as_deref()).expect("bind pdfium");
    let mut document = pdfium.create_new_pdf().expect("create pdf");
    for _ in 0..pages {
        document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .expect("add page");
    }
    document.save_to_bytes().expect("save pdf")
}

fn object_count(bytes: Vec<u8>, page: u16) -> usize {
    let pdfium = bind_pdfium(lib_path().as_deref()).expect("bind pdfium");
    let document = pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .expect("reload filled pdf");
    let page = document.pages().get(page).expect("page");
    page.objects().len()
}

fn detection_config() -> DetectionConfig {
    let mut builder = DetectionConfig::builder();
    if let Some(path) = lib_path() {
        builder = builder.pdfium_lib_path(path);
    }
    builder.build().unwrap()
}

fn overlay_config() -> OverlayConfig {
    let mut builder = OverlayConfig::builder();
    if let Some(path) = lib_path() {
        builder = builder.pdfium_lib_path(path);
    }
    builder.build().unwrap()
}

const FILLED: &str = r#"{
    "documentId": "e2e",
    "values": {
        "name": "Ada Lovelace",
        "agree": true,
        "newsletter": false,
        "ghost": "nobody"
    },
    "fieldMap": {
        "name":       {"bbox": [100, 200, 500, 200, 500, 240, 100, 240], "page": 1, "type": "text_field"},
        "agree":      {"bbox": [100, 300, 140, 300, 140, 340, 100, 340], "page": 1, "type": "checkbox"},
        "newsletter": {"bbox": [100, 400, 140, 400, 140, 440, 100, 440], "page": 1, "type": "checkbox"}
    }
}"#;

// ── Inspect ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_generated_pdf() {
    e2e_skip_unless_enabled!();

    let info = inspect_from_bytes(blank_pdf(3), "blank.pdf", &detection_config())
        .await
        .expect("inspect should succeed");

    assert_eq!(info.page_count, 3);
    assert!(!info.has_form_fields);
    // A4 in points.
    assert!((info.pages[0].width - 595.0).abs() < 1.0);
    assert!((info.pages[0].height - 842.0).abs() < 1.0);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    e2e_skip_unless_enabled!();

    let err = inspect("/nonexistent/form.pdf", &detection_config())
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2FormError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_corrupt_pdf_is_input_error() {
    e2e_skip_unless_enabled!();

    let err = inspect_from_bytes(b"%PDF-1.7\ngarbage".to_vec(), "broken.pdf", &detection_config())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input, "got {err}");
}

// ── Overlay ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_overlay_writes_text_and_checkmark() {
    e2e_skip_unless_enabled!();

    let request = OverlayRequest::from_json_str(FILLED).unwrap();
    let original = blank_pdf(1);
    let output = overlay_from_bytes(original.clone(), "blank.pdf", &request, &overlay_config())
        .await
        .expect("overlay should succeed");

    assert_eq!(output.report.filled, vec!["name", "agree"]);
    assert_eq!(output.report.unchecked, vec!["newsletter"]);
    assert_eq!(output.report.skipped.len(), 1);
    assert!(output.report.is_clean(), "{:?}", output.report.failed);

    assert_eq!(object_count(original, 0), 0);
    // One text object plus one checkmark path.
    assert_eq!(object_count(output.bytes, 0), 2);
}

#[test]
fn test_polyline_is_a_single_page_object() {
    e2e_skip_unless_enabled!();

    let pdfium = bind_pdfium(lib_path().as_deref()).expect("bind pdfium");
    let mut doc = open_pdf(&pdfium, blank_pdf(1), None, "blank.pdf").unwrap();
    let tick = [
        Point::new(70.0, 60.0),
        Point::new(90.0, 64.0),
        Point::new(130.0, 56.0),
    ];
    doc.draw_polyline(1, &tick, 1.5).unwrap();
    assert!(matches!(
        doc.draw_polyline(2, &tick, 1.5),
        Err(Pdf2FormError::PageOutOfRange { page: 2, total: 1 })
    ));
    let bytes = doc.save().unwrap();
    drop(doc);

    assert_eq!(object_count(bytes, 0), 1);
}

#[tokio::test]
async fn test_overlay_to_file_is_atomic() {
    e2e_skip_unless_enabled!();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("blank.pdf");
    std::fs::write(&input, blank_pdf(1)).unwrap();
    let output = dir.path().join("out").join("filled.pdf");

    let request = OverlayRequest::from_json_str(FILLED).unwrap();
    let report = overlay_to_file(
        input.to_str().unwrap(),
        &output,
        &request,
        &overlay_config(),
    )
    .await
    .expect("overlay_to_file should succeed");

    assert_eq!(report.filled.len(), 2);
    assert!(output.exists());
    let leftovers: Vec<_> = std::fs::read_dir(output.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

// ── Hybrid ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hybrid_without_form_or_engine_reports_failure() {
    e2e_skip_unless_enabled!();

    let response = detect_hybrid_from_bytes(blank_pdf(1), "blank.pdf", &detection_config())
        .await
        .expect("input is valid");

    match response {
        HybridResponse::Failure(f) => {
            assert_eq!(f.error.kind, ErrorKind::Internal);
            assert!(f.error.message.contains("OCR"), "{}", f.error.message);
        }
        HybridResponse::Success(_) => panic!("a blank PDF has no widgets; OCR was required"),
    }
}

#[tokio::test]
async fn test_hybrid_acroform_uses_widgets() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("acroform.pdf"));

    let bytes = std::fs::read(&path).unwrap();
    let response = detect_hybrid_from_bytes(bytes, "acroform.pdf", &detection_config())
        .await
        .expect("hybrid should succeed");

    let HybridResponse::Success(out) = response else {
        panic!("expected success for a document with embedded fields");
    };
    assert!(out.used_structured_fields);
    assert!(!out.field_regions.is_empty());
    for region in &out.field_regions {
        let r = region.rect_normalized;
        assert!(r.x0 >= 0.0 && r.x1 <= 1.0 && r.y0 >= 0.0 && r.y1 <= 1.0, "{:?}", r);
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────────

#[cfg(feature = "onnx")]
#[tokio::test]
async fn test_schema_from_scanned_form() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned_form.pdf"));
    let Some(models) = std::env::var_os("PDF2FORM_MODELS").map(PathBuf::from) else {
        println!("SKIP — set PDF2FORM_MODELS to the OCR model directory");
        return;
    };

    let recognizer = edgequake_pdf2form::OnnxBackend::shared_from_dir(&models).unwrap();
    let mut builder = DetectionConfig::builder().recognizer(recognizer);
    if let Some(lib) = lib_path() {
        builder = builder.pdfium_lib_path(lib);
    }
    let config = builder.build().unwrap();

    let output = edgequake_pdf2form::detect(path.to_str().unwrap(), &config)
        .await
        .expect("detect should succeed");

    assert!(output.success);
    assert!(!output.raw_fields.is_empty());
    assert_eq!(output.field_type_counts.len(), 6);
    println!(
        "{}",
        serde_json::to_string_pretty(&output.schema).unwrap()
    );
}
