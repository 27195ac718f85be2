//! Flat component list and field map, derived from the same classified list
//! as the nested schema so ids and geometry agree across both shapes.

use crate::field::{ClassifiedField, FieldMap, FieldMapEntry, FieldType, FieldValue};
use crate::geometry::Polygon;
use serde::{Deserialize, Serialize};

/// Widget kind a flat consumer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Checkbox,
    Input,
}

/// One fillable field for flat rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub label: String,
    pub value: FieldValue,
    pub bbox: Polygon,
    pub page: usize,
}

fn component_kind(field_type: FieldType) -> ComponentKind {
    match field_type {
        FieldType::Checkbox => ComponentKind::Checkbox,
        _ => ComponentKind::Input,
    }
}

/// Fillable fields as flat components, in input order.
pub fn flatten_components(fields: &[ClassifiedField]) -> Vec<FlatComponent> {
    fields
        .iter()
        .filter(|f| f.field_type.is_fillable())
        .map(|f| {
            let kind = component_kind(f.field_type);
            FlatComponent {
                id: f.id.clone(),
                kind,
                label: f.label.clone(),
                value: match kind {
                    ComponentKind::Checkbox => FieldValue::Bool(false),
                    ComponentKind::Input => FieldValue::Text(String::new()),
                },
                bbox: f.bbox,
                page: f.page,
            }
        })
        .collect()
}

/// id → {bbox, page, type} for every fillable field.
pub fn build_field_map(fields: &[ClassifiedField]) -> FieldMap {
    fields
        .iter()
        .filter(|f| f.field_type.is_fillable())
        .map(|f| {
            (
                f.id.clone(),
                FieldMapEntry {
                    bbox: f.bbox.coords().to_vec(),
                    page: f.page as i64,
                    field_type: f.field_type,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{field_id, CellPosition};
    use pretty_assertions::assert_eq;

    fn field(n: usize, field_type: FieldType) -> ClassifiedField {
        ClassifiedField {
            id: field_id(1, n),
            field_type,
            label: format!("label {n}"),
            bbox: Polygon([100.0, 100.0, 300.0, 100.0, 300.0, 140.0, 100.0, 140.0]),
            page: 1,
            confidence: Some(0.8),
            value: FieldValue::default_for(field_type),
            cell: (field_type == FieldType::TableCell).then(CellPosition::default),
        }
    }

    fn sample() -> Vec<ClassifiedField> {
        vec![
            field(1, FieldType::Title),
            field(2, FieldType::Checkbox),
            field(3, FieldType::TextField),
            field(4, FieldType::Label),
            field(5, FieldType::TableCell),
            field(6, FieldType::NonFillable),
        ]
    }

    #[test]
    fn components_keep_only_fillable_types() {
        let components = flatten_components(&sample());
        let summary: Vec<_> = components.iter().map(|c| (c.id.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("field_001_002", ComponentKind::Checkbox),
                ("field_001_003", ComponentKind::Input),
                ("field_001_005", ComponentKind::Input),
            ]
        );
        assert_eq!(components[0].value, FieldValue::Bool(false));
        assert_eq!(components[1].value, FieldValue::Text(String::new()));
    }

    #[test]
    fn field_map_matches_components() {
        let fields = sample();
        let components = flatten_components(&fields);
        let map = build_field_map(&fields);
        assert_eq!(map.len(), components.len());
        for c in &components {
            let entry = &map[&c.id];
            assert_eq!(entry.bbox, c.bbox.coords().to_vec());
            assert_eq!(entry.page, c.page as i64);
        }
        assert_eq!(map["field_001_005"].field_type, FieldType::TableCell);
    }

    #[test]
    fn component_json_shape() {
        let components = flatten_components(&[field(2, FieldType::Checkbox)]);
        let json = serde_json::to_value(&components[0]).unwrap();
        assert_eq!(json["type"], "checkbox");
        assert_eq!(json["value"], false);
        assert_eq!(json["bbox"].as_array().unwrap().len(), 8);
    }
}
