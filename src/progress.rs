//! Progress-callback trait for per-page detection events.
//!
//! Inject an [`Arc<dyn DetectionProgressCallback>`] via
//! [`crate::config::DetectionConfigBuilder::progress_callback`] to receive
//! events as the OCR pass works through the document. The structured-field
//! branch reads every page in one call and only fires the start/complete
//! pair.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2form::{DetectionProgressCallback, DetectionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FieldCounter {
//!     fields: AtomicUsize,
//! }
//!
//! impl DetectionProgressCallback for FieldCounter {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, field_count: usize) {
//!         self.fields.fetch_add(field_count, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} fields", page_num, total_pages, field_count);
//!     }
//! }
//!
//! let counter = Arc::new(FieldCounter { fields: AtomicUsize::new(0) });
//!
//! let config = DetectionConfig::builder()
//!     .progress_callback(counter as Arc<dyn DetectionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the detection pipeline as it processes each page.
///
/// All methods default to no-ops. Pages are processed in order on one
/// blocking thread, but the callback may live on a different thread from
/// the one that registered it, hence `Send + Sync`.
pub trait DetectionProgressCallback: Send + Sync {
    /// Called once before the first page.
    fn on_detection_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is rasterised.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after a page has been recognised and classified.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, field_count: usize) {
        let _ = (page_num, total_pages, field_count);
    }

    /// Called when a page fails; the request aborts right after.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after detection finishes.
    fn on_detection_complete(&self, total_pages: usize, field_count: usize) {
        let _ = (total_pages, field_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DetectionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DetectionConfig`].
pub type ProgressCallback = Arc<dyn DetectionProgressCallback>;
