//! Response types returned by the entry points in [`crate::convert`].
//!
//! Every type serialises to the camelCase JSON shapes consumers of the form
//! service rely on. Field-level types live in [`crate::field`].

use crate::document::FormDocument;
use crate::error::{ErrorKind, FieldError, Pdf2FormError, SkipReason};
use crate::field::{ClassifiedField, FieldMap, FieldRegion, FieldType, FormSchema};
use crate::pipeline::flatten::FlatComponent;
use crate::pipeline::input::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Size of one page in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: usize,
    pub width: f64,
    pub height: f64,
}

/// Per-page geometry plus totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// One entry per processed page, in page order.
    pub pages: Vec<PageInfo>,
    /// Page count of the whole document, selected or not.
    pub total_pages: usize,
    pub total_fields: usize,
}

impl PageMetadata {
    pub fn collect(
        document: &dyn FormDocument,
        pages: &[usize],
        total_fields: usize,
    ) -> Result<Self, Pdf2FormError> {
        let pages = pages
            .iter()
            .map(|&page| {
                let size = document.page_size(page)?;
                Ok(PageInfo {
                    page,
                    width: size.width,
                    height: size.height,
                })
            })
            .collect::<Result<Vec<_>, Pdf2FormError>>()?;
        Ok(Self {
            pages,
            total_pages: document.page_count(),
            total_fields,
        })
    }
}

/// Count of fields per primary classifier type. Every primary type is
/// present, zero or not.
pub fn field_type_counts(fields: &[ClassifiedField]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = FieldType::PRIMARY
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();
    for field in fields {
        *counts.entry(field.field_type.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Result of [`crate::detect`]: nested schema plus the raw classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectOutput {
    pub success: bool,
    pub schema: FormSchema,
    pub raw_fields: Vec<ClassifiedField>,
    pub page_metadata: PageMetadata,
    pub field_type_counts: BTreeMap<String, usize>,
}

/// Result of [`crate::detect_flat`]: flat components plus the field map the
/// caller keeps for overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatOutput {
    pub success: bool,
    pub components: Vec<FlatComponent>,
    pub field_map: FieldMap,
    pub page_metadata: PageMetadata,
}

/// Successful hybrid detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridOutput {
    pub success: bool,
    pub used_structured_fields: bool,
    pub field_regions: Vec<FieldRegion>,
    pub page_count: usize,
    pub processing_time_ms: u64,
    pub document_id: String,
    pub timestamp: DateTime<Utc>,
}

impl HybridOutput {
    /// Field map over every region, ready for overlay at `coordinate_scale`.
    pub fn field_map(&self, coordinate_scale: f64) -> FieldMap {
        self.field_regions
            .iter()
            .map(|r| (r.id.clone(), r.to_map_entry(coordinate_scale)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Failed hybrid detection, reported as data rather than `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridFailure {
    pub success: bool,
    pub document_id: String,
    pub error: ErrorBody,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl HybridFailure {
    pub fn from_error(err: &Pdf2FormError, document_id: String, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            document_id,
            error: ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            },
            processing_time_ms,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HybridResponse {
    Success(HybridOutput),
    Failure(HybridFailure),
}

impl HybridResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, HybridResponse::Success(_))
    }

    pub fn document_id(&self) -> &str {
        match self {
            HybridResponse::Success(o) => &o.document_id,
            HybridResponse::Failure(f) => &f.document_id,
        }
    }
}

/// A value that was deliberately not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedField {
    pub id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// What happened to each value in an overlay request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayReport {
    /// Text written or checkmark drawn.
    pub filled: Vec<String>,
    /// Checkboxes with a falsy value; nothing drawn.
    pub unchecked: Vec<String>,
    pub skipped: Vec<SkippedField>,
    pub failed: Vec<FieldError>,
}

impl OverlayReport {
    /// `true` when no field failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Filled document plus its report.
#[derive(Debug, Clone)]
pub struct OverlayOutput {
    pub bytes: Vec<u8>,
    pub report: OverlayReport,
}

/// Document metadata returned by [`crate::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub source_name: String,
    pub kind: SourceKind,
    pub page_count: usize,
    pub pages: Vec<PageInfo>,
    /// Whether the document carries an embedded form with at least one widget.
    pub has_form_fields: bool,
}
