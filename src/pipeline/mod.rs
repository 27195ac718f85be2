//! Pipeline stages for form-field detection and overlay.
//!
//! Each submodule implements one step. The document and OCR engine are
//! reached only through the [`crate::document::FormDocument`] and
//! [`ocr::TextRecognizer`] seams, so every stage above them is testable
//! with in-memory fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ detect ──▶ classify ──▶ schema / flatten
//! (sniff)   (pdfium)   (probe+OCR)  (rules)     (outputs)
//!
//! values + field map ──▶ overlay ──▶ filled PDF
//! ```
//!
//! 1. [`input`]: resolve a path or URL and sniff PDF vs. raster image
//! 2. [`render`]: the pdfium-backed document; blocking, so callers run it
//!    inside `spawn_blocking`
//! 3. [`detect`]: embedded-widget probe with OCR fallback, or the plain OCR
//!    pass used by the schema outputs
//! 4. [`classify`]: ordered rule tables mapping a text line to a field type
//! 5. [`schema`] / [`flatten`]: nested UI schema, or flat components plus
//!    the field map
//! 6. [`overlay`]: write filled values back at the mapped coordinates

pub mod classify;
pub mod detect;
pub mod flatten;
pub mod input;
pub mod ocr;
pub mod overlay;
pub mod render;
pub mod schema;
