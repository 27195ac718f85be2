//! Field detection.
//!
//! Two entry points share the OCR pass:
//!
//! * [`extract_fields`]: rasterise → recognise → classify with the layout
//!   cascade. Feeds the nested schema and the flat field map.
//! * [`detect_hybrid`]: prefer embedded form widgets; only when the document
//!   has none does it fall back to OCR, classified with the inference rules.
//!
//! Exactly one branch of the hybrid detector runs. The probe for embedded
//! widgets is fail-open: a missing form, an empty one, or any error while
//! reading it all mean "no structured fields".

use crate::document::{FormDocument, FormWidget, WidgetKind};
use crate::error::Pdf2FormError;
use crate::field::{field_id, ClassifiedField, FieldRegion, FieldType, RawTextBlock, RegionSource};
use crate::geometry::PageSize;
use crate::pipeline::classify;
use crate::pipeline::ocr::{ocr_error, TextRecognizer};
use crate::progress::DetectionProgressCallback;
use tracing::{debug, info};

/// Outcome of hybrid detection; the variant records which branch ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Structured(Vec<FieldRegion>),
    Inferred(Vec<FieldRegion>),
}

impl Detection {
    pub fn used_structured_fields(&self) -> bool {
        matches!(self, Detection::Structured(_))
    }

    pub fn regions(&self) -> &[FieldRegion] {
        match self {
            Detection::Structured(r) | Detection::Inferred(r) => r,
        }
    }

    pub fn into_regions(self) -> Vec<FieldRegion> {
        match self {
            Detection::Structured(r) | Detection::Inferred(r) => r,
        }
    }
}

/// Options shared by both detection entry points.
pub struct OcrPass<'a> {
    pub recognizer: Option<&'a dyn TextRecognizer>,
    /// 1-indexed pages to process, in order.
    pub pages: &'a [usize],
    /// Raster magnification; polygons come back at this scale.
    pub scale: f32,
    pub progress: Option<&'a dyn DetectionProgressCallback>,
}

/// Native widget subtype → field type.
pub const WIDGET_TYPES: &[(WidgetKind, FieldType)] = &[
    (WidgetKind::Text, FieldType::TextField),
    (WidgetKind::PushButton, FieldType::Checkbox),
    (WidgetKind::Checkbox, FieldType::Checkbox),
    (WidgetKind::RadioButton, FieldType::Radio),
    (WidgetKind::ComboBox, FieldType::Dropdown),
    (WidgetKind::ListBox, FieldType::Listbox),
    (WidgetKind::Signature, FieldType::Signature),
];

pub fn widget_field_type(kind: WidgetKind) -> FieldType {
    WIDGET_TYPES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, t)| *t)
        .unwrap_or(FieldType::TextField)
}

/// Run the recognizer over every selected page, in page order.
fn recognize_pages(
    document: &dyn FormDocument,
    pass: &OcrPass<'_>,
) -> Result<Vec<RawTextBlock>, Pdf2FormError> {
    let recognizer = pass.recognizer.ok_or(Pdf2FormError::OcrEngineNotConfigured)?;
    let total = pass.pages.len();
    let mut blocks = Vec::new();

    if let Some(cb) = pass.progress {
        cb.on_detection_start(total);
    }

    for &page in pass.pages {
        if let Some(cb) = pass.progress {
            cb.on_page_start(page, total);
        }

        let lines = document.rasterize(page, pass.scale).and_then(|image| {
            recognizer
                .recognize(&image)
                .map_err(|detail| ocr_error(recognizer, page, detail))
        });
        let lines = match lines {
            Ok(lines) => lines,
            Err(e) => {
                if let Some(cb) = pass.progress {
                    cb.on_page_error(page, total, &e.to_string());
                }
                return Err(e);
            }
        };

        debug!("Page {}: {} text lines", page, lines.len());
        if let Some(cb) = pass.progress {
            cb.on_page_complete(page, total, lines.len());
        }

        blocks.extend(lines.into_iter().map(|line| RawTextBlock {
            text: line.text,
            polygon: line.polygon,
            confidence: line.confidence,
            page,
            source: recognizer.name().to_string(),
        }));
    }

    if let Some(cb) = pass.progress {
        cb.on_detection_complete(total, blocks.len());
    }
    Ok(blocks)
}

/// Assign per-page ids (`field_{page}_{n}`, `n` restarting at 1 on every page).
fn number_blocks(blocks: Vec<RawTextBlock>) -> Vec<(String, RawTextBlock)> {
    let mut current_page = 0;
    let mut n = 0;
    blocks
        .into_iter()
        .map(|block| {
            if block.page != current_page {
                current_page = block.page;
                n = 0;
            }
            n += 1;
            (field_id(block.page, n), block)
        })
        .collect()
}

/// OCR every selected page and classify each line with the layout cascade.
pub fn extract_fields(
    document: &dyn FormDocument,
    pass: &OcrPass<'_>,
) -> Result<Vec<ClassifiedField>, Pdf2FormError> {
    let blocks = recognize_pages(document, pass)?;
    let fields: Vec<ClassifiedField> = number_blocks(blocks)
        .into_iter()
        .map(|(id, block)| {
            let field_type = classify::classify(&block.text, &block.polygon);
            ClassifiedField::new(id, field_type, block)
        })
        .collect();
    info!("Classified {} text lines", fields.len());
    Ok(fields)
}

/// Embedded widgets, or `None` when the document has no usable form.
fn probe_structured(document: &dyn FormDocument) -> Option<Vec<FormWidget>> {
    match document.form_widgets() {
        Ok(Some(widgets)) if !widgets.is_empty() => Some(widgets),
        Ok(Some(_)) => {
            debug!("Form dictionary present but no widgets");
            None
        }
        Ok(None) => None,
        Err(e) => {
            debug!("Structured field probe failed, falling back to OCR: {}", e);
            None
        }
    }
}

fn structured_regions(
    document: &dyn FormDocument,
    widgets: Vec<FormWidget>,
) -> Result<Vec<FieldRegion>, Pdf2FormError> {
    let mut regions = Vec::with_capacity(widgets.len());
    for (i, widget) in widgets.into_iter().enumerate() {
        let size = document.page_size(widget.page)?;
        let name = widget
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("field_{}", i + 1));
        regions.push(FieldRegion {
            id: format!("structured_{:03}_{:03}", widget.page, i + 1),
            page: widget.page,
            field_type: widget_field_type(widget.kind),
            label: name.clone(),
            name,
            value: widget.value,
            rect_normalized: widget.rect.normalize(size),
            rect_absolute: widget.rect,
            source: RegionSource::Structured,
        });
    }
    Ok(regions)
}

fn inferred_regions(
    document: &dyn FormDocument,
    pass: &OcrPass<'_>,
) -> Result<Vec<FieldRegion>, Pdf2FormError> {
    let blocks = recognize_pages(document, pass)?;
    let mut sizes: Vec<(usize, PageSize)> = Vec::new();
    let mut regions = Vec::with_capacity(blocks.len());

    for (id, block) in number_blocks(blocks) {
        let size = match sizes.iter().find(|(p, _)| *p == block.page) {
            Some((_, s)) => *s,
            None => {
                let s = document.page_size(block.page)?;
                sizes.push((block.page, s));
                s
            }
        };
        let absolute = block.polygon.bounds().descale(pass.scale as f64);
        regions.push(FieldRegion {
            id,
            page: block.page,
            field_type: classify::infer(&block.text),
            name: block.text.clone(),
            label: block.text,
            value: None,
            rect_normalized: absolute.normalize(size),
            rect_absolute: absolute,
            source: RegionSource::Inferred,
        });
    }
    Ok(regions)
}

/// Prefer embedded form widgets; fall back to OCR inference.
///
/// `recognizer` may be `None` when the caller knows the document carries a
/// form; it is only required by the fallback branch.
pub fn detect_hybrid(
    document: &dyn FormDocument,
    pass: &OcrPass<'_>,
) -> Result<Detection, Pdf2FormError> {
    if let Some(widgets) = probe_structured(document) {
        info!("Using {} embedded form widgets", widgets.len());
        if let Some(cb) = pass.progress {
            cb.on_detection_start(document.page_count());
        }
        let regions = structured_regions(document, widgets)?;
        if let Some(cb) = pass.progress {
            cb.on_detection_complete(document.page_count(), regions.len());
        }
        return Ok(Detection::Structured(regions));
    }

    info!("No embedded form fields, inferring from OCR");
    Ok(Detection::Inferred(inferred_regions(document, pass)?))
}
