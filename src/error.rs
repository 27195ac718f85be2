//! Error types for the edgequake-pdf2form library.
//!
//! Two error types reflect two failure modes:
//!
//! * [`Pdf2FormError`] is **fatal**: the request cannot proceed (unreadable
//!   input, wrong password, OCR engine crashed). Returned as `Err` from the
//!   top-level entry points in [`crate::convert`].
//!
//! * [`FieldError`] is **non-fatal**: writing a single value during overlay
//!   failed, the rest of the batch still went through. Stored inside
//!   [`crate::output::OverlayReport`].
//!
//! Fields that are deliberately not written (empty value, unknown id, bad
//! geometry) are not errors at all; see [`SkipReason`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller sent something unusable. Maps to a client error.
    Input,
    /// Rasterisation or recognition failed on a well-formed document.
    Detection,
    /// Everything else.
    Internal,
}

/// All fatal errors returned by the edgequake-pdf2form library.
#[derive(Debug, Error)]
pub enum Pdf2FormError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Sniffed content is neither a PDF nor a supported raster image.
    #[error("Unsupported content in '{source_name}': detected {detected}\nUse a PDF, PNG, JPEG, BMP or TIFF file.")]
    UnsupportedContent {
        source_name: String,
        detected: String,
    },

    /// The filled-values payload could not be interpreted.
    #[error("Invalid value map: {0}")]
    InvalidValueMap(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// Header/trailer/xref is corrupt, or the image could not be decoded.
    #[error("Document '{source_name}' is corrupt: {detail}")]
    CorruptDocument { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Detection errors ──────────────────────────────────────────────────
    /// pdfium returned an error while rendering a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The recognizer failed on a page image.
    #[error("OCR failed on page {page} ({engine}): {detail}")]
    OcrFailed {
        page: usize,
        engine: String,
        detail: String,
    },

    /// Inferred detection was needed but no recognizer was supplied.
    #[error("No OCR engine configured.\nPass --models <DIR> or inject a TextRecognizer via DetectionConfig.")]
    OcrEngineNotConfigured,

    /// A document mutation (text insertion, drawing, save) failed.
    #[error("Document write failed: {0}")]
    DocumentWrite(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to use an existing copy,\n\
or place the platform library next to the executable.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2FormError {
    /// Classify the error for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        use Pdf2FormError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | UnsupportedContent { .. }
            | InvalidValueMap(_)
            | CorruptDocument { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | PageOutOfRange { .. } => ErrorKind::Input,
            RasterisationFailed { .. } | OcrFailed { .. } | DocumentWrite(_) => {
                ErrorKind::Detection
            }
            OcrEngineNotConfigured
            | OutputWriteFailed { .. }
            | InvalidConfig(_)
            | PdfiumBindingFailed(_)
            | Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Why a value in an overlay request was not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// Value was `null` or the empty string.
    EmptyValue,
    /// The id has no entry in the field map.
    UnknownField,
    /// The mapped page does not exist in the document.
    PageOutOfRange { page: i64, page_count: usize },
    /// The stored geometry is not a 4-point polygon.
    InvalidGeometry { len: usize },
}

/// A non-fatal error for a single overlay field.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum FieldError {
    /// Measuring or inserting the text failed.
    #[error("Field {id}: text insertion failed: {detail}")]
    TextFailed { id: String, detail: String },

    /// Drawing the checkmark failed.
    #[error("Field {id}: checkmark drawing failed: {detail}")]
    CheckmarkFailed { id: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_content_display() {
        let e = Pdf2FormError::UnsupportedContent {
            source_name: "upload.bin".into(),
            detected: "application/zip".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("upload.bin"), "got: {msg}");
        assert!(msg.contains("application/zip"), "got: {msg}");
    }

    #[test]
    fn ocr_failed_display() {
        let e = Pdf2FormError::OcrFailed {
            page: 3,
            engine: "pure-onnx-ocr".into(),
            detail: "tensor shape mismatch".into(),
        };
        assert!(e.to_string().contains("page 3"));
        assert!(e.to_string().contains("pure-onnx-ocr"));
    }

    #[test]
    fn input_errors_are_client_errors() {
        let e = Pdf2FormError::InvalidValueMap("values must be an object".into());
        assert_eq!(e.kind(), ErrorKind::Input);
        let e = Pdf2FormError::PasswordRequired {
            source_name: "a.pdf".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Input);
    }

    #[test]
    fn detection_and_internal_kinds() {
        let e = Pdf2FormError::RasterisationFailed {
            page: 1,
            detail: "oom".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Detection);
        assert_eq!(
            Pdf2FormError::OcrEngineNotConfigured.kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn skip_reason_serialises_with_tag() {
        let json = serde_json::to_value(SkipReason::InvalidGeometry { len: 4 }).unwrap();
        assert_eq!(json["reason"], "invalid_geometry");
        assert_eq!(json["len"], 4);
    }
}
