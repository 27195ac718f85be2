//! Overlay compositor: write filled values back onto a document.
//!
//! Values are processed in the caller's order. Each one is either filled,
//! recorded as an unchecked checkbox, skipped with a [`SkipReason`], or
//! recorded as failed; a failing field never aborts the batch.

use crate::config::OverlayConfig;
use crate::document::FormDocument;
use crate::error::{FieldError, Pdf2FormError, SkipReason};
use crate::field::{FieldMap, FieldMapEntry, FieldType};
use crate::geometry::{Point, Polygon, Rect};
use crate::output::{OverlayReport, SkippedField};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// One filled value.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl OverlayValue {
    fn from_json(id: &str, value: Value) -> Result<Self, Pdf2FormError> {
        match value {
            Value::Null => Ok(OverlayValue::Null),
            Value::Bool(b) => Ok(OverlayValue::Bool(b)),
            Value::Number(n) => Ok(OverlayValue::Number(n)),
            Value::String(s) => Ok(OverlayValue::Text(s)),
            Value::Array(_) | Value::Object(_) => Err(Pdf2FormError::InvalidValueMap(format!(
                "value for '{}' must be a boolean, string, number or null",
                id
            ))),
        }
    }

    /// `null` and `""` carry nothing to write. `false` is a real value.
    pub fn is_empty(&self) -> bool {
        match self {
            OverlayValue::Null => true,
            OverlayValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Checkbox interpretation: `true`, the number 1, or one of
    /// `true`/`1`/`yes` in any case.
    pub fn is_truthy(&self) -> bool {
        match self {
            OverlayValue::Null => false,
            OverlayValue::Bool(b) => *b,
            OverlayValue::Number(n) => n.as_f64() == Some(1.0),
            OverlayValue::Text(s) => {
                let s = s.to_lowercase();
                s == "true" || s == "1" || s == "yes"
            }
        }
    }

    /// Text written for non-checkbox fields.
    pub fn display_text(&self) -> String {
        match self {
            OverlayValue::Null => String::new(),
            OverlayValue::Bool(b) => b.to_string(),
            OverlayValue::Number(n) => n.to_string(),
            OverlayValue::Text(s) => s.clone(),
        }
    }
}

/// Filled values keyed by field id, in the order the caller sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayValues(Vec<(String, OverlayValue)>);

impl OverlayValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: impl Into<String>, value: OverlayValue) {
        self.0.push((id.into(), value));
    }

    /// Accepts a JSON object only; nested arrays or objects are rejected.
    pub fn from_json(value: Value) -> Result<Self, Pdf2FormError> {
        let Value::Object(map) = value else {
            return Err(Pdf2FormError::InvalidValueMap(
                "values must be a JSON object".into(),
            ));
        };
        let mut values = Self::new();
        for (id, v) in map {
            let v = OverlayValue::from_json(&id, v)?;
            values.push(id, v);
        }
        Ok(values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OverlayValue)> {
        self.0.iter().map(|(id, v)| (id.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The payload a caller posts back after filling the form.
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub document_id: Option<String>,
    pub values: OverlayValues,
    pub field_map: FieldMap,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOverlayRequest {
    #[serde(default)]
    document_id: Option<String>,
    values: Value,
    #[serde(default)]
    field_map: FieldMap,
}

impl OverlayRequest {
    /// Parse `{documentId?, values, fieldMap}`.
    pub fn from_json_str(json: &str) -> Result<Self, Pdf2FormError> {
        let raw: RawOverlayRequest = serde_json::from_str(json)
            .map_err(|e| Pdf2FormError::InvalidValueMap(e.to_string()))?;
        Ok(Self {
            document_id: raw.document_id,
            values: OverlayValues::from_json(raw.values)?,
            field_map: raw.field_map,
        })
    }
}

/// Resolve where a value goes, or why it cannot be placed.
fn locate<'m>(
    id: &str,
    value: &OverlayValue,
    field_map: &'m FieldMap,
    page_count: usize,
) -> Result<(&'m FieldMapEntry, usize, Polygon), SkipReason> {
    if value.is_empty() {
        return Err(SkipReason::EmptyValue);
    }
    let entry = field_map.get(id).ok_or(SkipReason::UnknownField)?;
    if entry.page < 1 || entry.page as u64 > page_count as u64 {
        return Err(SkipReason::PageOutOfRange {
            page: entry.page,
            page_count,
        });
    }
    let polygon = Polygon::from_slice(&entry.bbox).ok_or(SkipReason::InvalidGeometry {
        len: entry.bbox.len(),
    })?;
    Ok((entry, entry.page as usize, polygon))
}

fn draw_checkmark(
    document: &mut dyn FormDocument,
    page: usize,
    rect: Rect,
    config: &OverlayConfig,
) -> Result<(), Pdf2FormError> {
    let points: [Point; 3] = [rect.at(0.2, 0.5), rect.at(0.4, 0.7), rect.at(0.8, 0.3)];
    document.draw_polyline(page, &points, config.checkmark_width)
}

/// Used when a hand-built config carries a step that cannot shrink the size.
const FALLBACK_FONT_STEP: f32 = 0.5;
const MAX_FIT_STEPS: usize = 256;

/// Largest size from `font_size` down to `min_font_size` at which `text`
/// fits within `fit_ratio` of the rectangle width.
///
/// Always terminates, even for configs that bypassed the builder.
pub fn fit_font_size(
    document: &dyn FormDocument,
    text: &str,
    rect_width: f64,
    config: &OverlayConfig,
) -> Result<f32, Pdf2FormError> {
    let step = match config.font_size_step {
        s if s.is_finite() && s > 0.0 => s,
        _ => FALLBACK_FONT_STEP,
    };
    let limit = rect_width * config.fit_ratio as f64;
    let mut size = config.font_size;
    for _ in 0..MAX_FIT_STEPS {
        if size.is_nan() || size <= config.min_font_size {
            break;
        }
        if document.measure_text(text, size)? as f64 <= limit {
            break;
        }
        let next = size - step;
        if next >= size {
            break;
        }
        size = next;
    }
    Ok(size.max(config.min_font_size))
}

fn write_text(
    document: &mut dyn FormDocument,
    page: usize,
    rect: Rect,
    text: &str,
    config: &OverlayConfig,
) -> Result<f32, Pdf2FormError> {
    let size = fit_font_size(document, text, rect.width(), config)?;
    let origin = Point::new(
        rect.x0 + config.text_inset,
        rect.y0 + (rect.height() + size as f64) / 2.0,
    );
    document.insert_text(page, origin, text, size)?;
    Ok(size)
}

/// Write every value onto `document`.
pub fn overlay(
    document: &mut dyn FormDocument,
    field_map: &FieldMap,
    values: &OverlayValues,
    config: &OverlayConfig,
) -> OverlayReport {
    let page_count = document.page_count();
    let mut report = OverlayReport::default();

    for (id, value) in values.iter() {
        let (entry, page, polygon) = match locate(id, value, field_map, page_count) {
            Ok(found) => found,
            Err(reason) => {
                debug!("Skipping {}: {:?}", id, reason);
                report.skipped.push(SkippedField {
                    id: id.to_string(),
                    reason,
                });
                continue;
            }
        };
        let rect = polygon.overlay_rect(config.coordinate_scale);

        if entry.field_type == FieldType::Checkbox {
            if !value.is_truthy() {
                report.unchecked.push(id.to_string());
                continue;
            }
            match draw_checkmark(document, page, rect, config) {
                Ok(()) => report.filled.push(id.to_string()),
                Err(e) => {
                    warn!("Checkmark for {} failed: {}", id, e);
                    report.failed.push(FieldError::CheckmarkFailed {
                        id: id.to_string(),
                        detail: e.to_string(),
                    });
                }
            }
            continue;
        }

        let text = value.display_text();
        match write_text(document, page, rect, &text, config) {
            Ok(size) => {
                debug!("Wrote {} on page {} at {:.1}pt", id, page, size);
                report.filled.push(id.to_string());
            }
            Err(e) => {
                warn!("Text for {} failed: {}", id, e);
                report.failed.push(FieldError::TextFailed {
                    id: id.to_string(),
                    detail: e.to_string(),
                });
            }
        }
    }

    info!(
        "Overlay: {} filled, {} unchecked, {} skipped, {} failed",
        report.filled.len(),
        report.unchecked.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FormWidget;
    use crate::geometry::PageSize;
    use image::DynamicImage;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Text {
            page: usize,
            origin: Point,
            text: String,
            size: f32,
        },
        Line {
            page: usize,
            points: Vec<Point>,
            width: f32,
        },
    }

    /// Records drawing operations; text width is 5 units per char per pt/10.
    struct Canvas {
        pages: usize,
        ops: Vec<Op>,
        fail_text: Option<&'static str>,
    }

    impl Canvas {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                ops: Vec::new(),
                fail_text: None,
            }
        }
    }

    impl FormDocument for Canvas {
        fn page_count(&self) -> usize {
            self.pages
        }
        fn page_size(&self, _page: usize) -> Result<PageSize, Pdf2FormError> {
            Ok(PageSize {
                width: 612.0,
                height: 792.0,
            })
        }
        fn rasterize(&self, _: usize, _: f32) -> Result<DynamicImage, Pdf2FormError> {
            unreachable!()
        }
        fn form_widgets(&self) -> Result<Option<Vec<FormWidget>>, Pdf2FormError> {
            Ok(None)
        }
        fn measure_text(&self, text: &str, size: f32) -> Result<f32, Pdf2FormError> {
            Ok(text.chars().count() as f32 * 5.0 * size / 10.0)
        }
        fn insert_text(
            &mut self,
            page: usize,
            origin: Point,
            text: &str,
            size: f32,
        ) -> Result<(), Pdf2FormError> {
            if self.fail_text == Some(text) {
                return Err(Pdf2FormError::DocumentWrite("glyph missing".into()));
            }
            self.ops.push(Op::Text {
                page,
                origin,
                text: text.to_string(),
                size,
            });
            Ok(())
        }
        fn draw_polyline(
            &mut self,
            page: usize,
            points: &[Point],
            width: f32,
        ) -> Result<(), Pdf2FormError> {
            self.ops.push(Op::Line {
                page,
                points: points.to_vec(),
                width,
            });
            Ok(())
        }
        fn save(&self) -> Result<Vec<u8>, Pdf2FormError> {
            Ok(Vec::new())
        }
    }

    fn entry(field_type: FieldType, page: i64, bbox: Vec<f64>) -> FieldMapEntry {
        FieldMapEntry {
            bbox,
            page,
            field_type,
        }
    }

    fn square() -> Vec<f64> {
        vec![100.0, 100.0, 300.0, 100.0, 300.0, 140.0, 100.0, 140.0]
    }

    fn values(v: Value) -> OverlayValues {
        OverlayValues::from_json(v).unwrap()
    }

    #[test]
    fn checkbox_draws_three_point_tick() {
        let mut map = FieldMap::new();
        map.insert("cb".into(), entry(FieldType::Checkbox, 1, square()));
        let mut doc = Canvas::new(1);

        let report = overlay(&mut doc, &map, &values(json!({"cb": true})), &OverlayConfig::default());

        assert_eq!(report.filled, vec!["cb"]);
        // Rect is (50,50)-(150,70) after halving.
        let Op::Line { page, points, width } = &doc.ops[0] else {
            panic!("expected a polyline, got {:?}", doc.ops);
        };
        assert_eq!((*page, *width), (1, 1.5));
        let expected = [(70.0, 60.0), (90.0, 64.0), (130.0, 56.0)];
        assert_eq!(points.len(), 3);
        for (p, (x, y)) in points.iter().zip(expected) {
            assert!((p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9, "{:?}", p);
        }
    }

    #[test]
    fn values_built_in_code_apply_in_push_order() {
        let mut map = FieldMap::new();
        map.insert("a_name".into(), entry(FieldType::TextField, 1, square()));
        map.insert("b_agree".into(), entry(FieldType::Checkbox, 1, square()));
        let mut vals = OverlayValues::new();
        vals.push("b_agree", OverlayValue::Bool(true));
        vals.push("a_name", OverlayValue::Text("Ada".into()));
        assert_eq!(vals.len(), 2);
        let mut doc = Canvas::new(1);

        let report = overlay(&mut doc, &map, &vals, &OverlayConfig::default());

        assert_eq!(report.filled, vec!["b_agree", "a_name"]);
        assert!(matches!(doc.ops[0], Op::Line { .. }));
        assert!(matches!(doc.ops[1], Op::Text { .. }));
    }

    #[test]
    fn falsy_checkbox_draws_nothing() {
        let mut map = FieldMap::new();
        for id in ["a", "b", "c"] {
            map.insert(id.into(), entry(FieldType::Checkbox, 1, square()));
        }
        let mut doc = Canvas::new(1);
        let report = overlay(
            &mut doc,
            &map,
            &values(json!({"a": false, "b": "no", "c": 0})),
            &OverlayConfig::default(),
        );
        assert!(doc.ops.is_empty());
        assert_eq!(report.unchecked, vec!["a", "b", "c"]);
    }

    #[test]
    fn truthy_variants() {
        for v in [json!(true), json!("TRUE"), json!("1"), json!("Yes"), json!(1)] {
            let value = OverlayValue::from_json("x", v).unwrap();
            assert!(value.is_truthy(), "{:?}", value);
        }
        assert!(!OverlayValue::Text("y".into()).is_truthy());
    }

    #[test]
    fn text_is_placed_on_baseline() {
        let mut map = FieldMap::new();
        map.insert("name".into(), entry(FieldType::TextField, 1, square()));
        let mut doc = Canvas::new(1);
        overlay(&mut doc, &map, &values(json!({"name": "Ada"})), &OverlayConfig::default());

        assert_eq!(
            doc.ops,
            vec![Op::Text {
                page: 1,
                origin: Point::new(52.0, 65.0),
                text: "Ada".into(),
                size: 10.0,
            }]
        );
    }

    #[test]
    fn long_text_shrinks_to_floor() {
        let mut map = FieldMap::new();
        map.insert("addr".into(), entry(FieldType::TextField, 1, square()));
        let mut doc = Canvas::new(1);
        let long = "x".repeat(200);
        overlay(&mut doc, &map, &values(json!({ "addr": long })), &OverlayConfig::default());

        match &doc.ops[0] {
            Op::Text { size, .. } => assert_eq!(*size, 6.0),
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn font_fit_terminates_for_unbuilt_configs() {
        let doc = Canvas::new(1);
        let wide = "x".repeat(200);
        for step in [0.0, -1.0, f32::NAN, f32::INFINITY, 1e-12] {
            let config = OverlayConfig {
                font_size_step: step,
                ..OverlayConfig::default()
            };
            let size = fit_font_size(&doc, &wide, 10.0, &config).unwrap();
            assert!(size >= config.min_font_size && size <= config.font_size, "step {step}: {size}");
        }
    }

    #[test]
    fn font_fit_stops_at_first_fitting_size() {
        let doc = Canvas::new(1);
        // 20 chars: width = 10 * size; limit = 100 * 0.95 = 95 → 9.5 fits.
        let size = fit_font_size(&doc, &"x".repeat(20), 100.0, &OverlayConfig::default()).unwrap();
        assert_eq!(size, 9.5);
    }

    #[test]
    fn skip_rules() {
        let mut map = FieldMap::new();
        map.insert("far".into(), entry(FieldType::TextField, 3, square()));
        map.insert("zero".into(), entry(FieldType::TextField, 0, square()));
        map.insert("bad".into(), entry(FieldType::TextField, 1, vec![1.0, 2.0, 3.0, 4.0]));
        map.insert("blank".into(), entry(FieldType::TextField, 1, square()));
        let mut doc = Canvas::new(2);

        let report = overlay(
            &mut doc,
            &map,
            &values(json!({
                "blank": "",
                "nil": null,
                "ghost": "boo",
                "far": "x",
                "zero": "x",
                "bad": "x",
            })),
            &OverlayConfig::default(),
        );

        assert!(doc.ops.is_empty());
        let reasons: Vec<_> = report.skipped.iter().map(|s| (s.id.as_str(), s.reason.clone())).collect();
        assert_eq!(
            reasons,
            vec![
                ("blank", SkipReason::EmptyValue),
                ("nil", SkipReason::EmptyValue),
                ("ghost", SkipReason::UnknownField),
                ("far", SkipReason::PageOutOfRange { page: 3, page_count: 2 }),
                ("zero", SkipReason::PageOutOfRange { page: 0, page_count: 2 }),
                ("bad", SkipReason::InvalidGeometry { len: 4 }),
            ]
        );
    }

    #[test]
    fn failing_field_does_not_abort_batch() {
        let mut map = FieldMap::new();
        map.insert("a".into(), entry(FieldType::TextField, 1, square()));
        map.insert("b".into(), entry(FieldType::TextField, 1, square()));
        let mut doc = Canvas::new(1);
        doc.fail_text = Some("boom");

        let report = overlay(
            &mut doc,
            &map,
            &values(json!({"a": "boom", "b": "fine"})),
            &OverlayConfig::default(),
        );

        assert_eq!(report.filled, vec!["b"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn non_checkbox_bool_and_number_render_as_text() {
        let mut map = FieldMap::new();
        map.insert("agree".into(), entry(FieldType::TextField, 1, square()));
        map.insert("age".into(), entry(FieldType::TextField, 1, square()));
        let mut doc = Canvas::new(1);
        overlay(
            &mut doc,
            &map,
            &values(json!({"agree": false, "age": 42})),
            &OverlayConfig::default(),
        );
        let texts: Vec<_> = doc
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["false", "42"]);
    }

    #[test]
    fn values_keep_caller_order() {
        let v = values(json!({"z": "1", "a": "2", "m": "3"}));
        let ids: Vec<_> = v.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = OverlayValues::from_json(json!({"a": [1, 2]})).unwrap_err();
        assert!(matches!(err, Pdf2FormError::InvalidValueMap(_)));
        let err = OverlayValues::from_json(json!(["a"])).unwrap_err();
        assert!(matches!(err, Pdf2FormError::InvalidValueMap(_)));
    }

    #[test]
    fn request_parses_camel_case_payload() {
        let req = OverlayRequest::from_json_str(
            r#"{"documentId":"d1","values":{"cb":true},
                "fieldMap":{"cb":{"bbox":[0,0,2,0,2,2,0,2],"page":1,"type":"checkbox"}}}"#,
        )
        .unwrap();
        assert_eq!(req.document_id.as_deref(), Some("d1"));
        assert_eq!(req.values.len(), 1);
        assert_eq!(req.field_map["cb"].field_type, FieldType::Checkbox);
    }
}
