//! # edgequake-pdf2form
//!
//! Turn PDFs and scanned forms into fillable UI schemas, then write the
//! filled values back onto the original document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input     resolve local file or URL, sniff PDF vs. image
//!  ├─ 2. Probe     embedded form widgets? use them (hybrid only)
//!  ├─ 3. Render    rasterise pages via pdfium (spawn_blocking)
//!  ├─ 4. OCR       recognise text lines with the injected engine
//!  ├─ 5. Classify  ordered rule tables → field types
//!  └─ 6. Output    nested schema | flat components + field map | regions
//!
//! filled values + field map ──▶ Overlay ──▶ filled PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2form::{detect_flat, DetectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     # #[cfg(feature = "onnx")]
//!     let recognizer = edgequake_pdf2form::OnnxBackend::shared_from_dir("models".as_ref())?;
//!     # #[cfg(not(feature = "onnx"))]
//!     # let recognizer: edgequake_pdf2form::SharedRecognizer = unimplemented!();
//!     let config = DetectionConfig::builder().recognizer(recognizer).build()?;
//!     let output = detect_flat("application.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.field_map)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2form` binary (clap + anyhow + tracing-subscriber) |
//! | `onnx`  | on      | Built-in OCR engine via `pure-onnx-ocr` |
//!
//! Disable both to bring your own [`TextRecognizer`]:
//! ```toml
//! edgequake-pdf2form = { version = "0.1", default-features = false }
//! ```
//!
//! ## Coordinates
//!
//! OCR geometry is in raster pixels at the render scale (2× by default), and
//! the field map stores it unchanged. Overlay divides by the same factor to
//! get back to PDF points. Hybrid regions are reported in page points and as
//! fractions of the page.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod field;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DetectionConfig, DetectionConfigBuilder, OverlayConfig, OverlayConfigBuilder, PageSelection,
};
pub use convert::{
    detect, detect_flat, detect_flat_from_bytes, detect_flat_sync, detect_from_bytes,
    detect_hybrid, detect_hybrid_from_bytes, detect_hybrid_sync, detect_sync, inspect,
    inspect_from_bytes, inspect_sync, overlay, overlay_from_bytes, overlay_sync, overlay_to_file,
    write_atomic,
};
pub use document::{FormDocument, FormWidget, ImageDocument, WidgetKind};
pub use error::{ErrorKind, FieldError, Pdf2FormError, SkipReason};
pub use field::{
    ClassifiedField, FieldMap, FieldMapEntry, FieldRegion, FieldType, FieldValue, FormSchema,
    RegionSource, Section, UiComponent,
};
pub use geometry::{PageSize, Point, Polygon, Rect};
pub use output::{
    DetectOutput, DocumentInfo, FlatOutput, HybridFailure, HybridOutput, HybridResponse,
    OverlayOutput, OverlayReport, PageMetadata,
};
pub use pipeline::detect::Detection;
pub use pipeline::ocr::{LockedRecognizer, OcrBackend, RecognizedLine, SharedRecognizer, TextRecognizer};
#[cfg(feature = "onnx")]
pub use pipeline::ocr::OnnxBackend;
pub use pipeline::overlay::{OverlayRequest, OverlayValue, OverlayValues};
pub use progress::{DetectionProgressCallback, NoopProgressCallback, ProgressCallback};
