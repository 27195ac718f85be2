//! Field-level data model: what detection produces and what the UI consumes.

use crate::geometry::{Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Semantic type of a detected region.
///
/// The first six variants are produced by the layout classifier; the rest
/// come from embedded form widgets or the inferred-detection rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Checkbox,
    #[default]
    TextField,
    TableCell,
    Title,
    Label,
    NonFillable,
    DateField,
    Signature,
    Dropdown,
    Radio,
    Listbox,
}

impl FieldType {
    /// Types the layout classifier can emit, in report order.
    pub const PRIMARY: [FieldType; 6] = [
        FieldType::Checkbox,
        FieldType::TextField,
        FieldType::TableCell,
        FieldType::Title,
        FieldType::Label,
        FieldType::NonFillable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Checkbox => "checkbox",
            FieldType::TextField => "text_field",
            FieldType::TableCell => "table_cell",
            FieldType::Title => "title",
            FieldType::Label => "label",
            FieldType::NonFillable => "non_fillable",
            FieldType::DateField => "date_field",
            FieldType::Signature => "signature",
            FieldType::Dropdown => "dropdown",
            FieldType::Radio => "radio",
            FieldType::Listbox => "listbox",
        }
    }

    /// Whether the region accepts a user value (and so gets a field-map entry).
    pub fn is_fillable(&self) -> bool {
        !matches!(
            self,
            FieldType::Title | FieldType::Label | FieldType::NonFillable
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of recognised text before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTextBlock {
    pub text: String,
    /// Raster-space polygon.
    pub polygon: Polygon,
    pub confidence: f32,
    /// 1-indexed.
    pub page: usize,
    /// Name of the recognizer that produced the line.
    pub source: String,
}

/// A field's initial value: `false` for checkboxes, `""` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn default_for(field_type: FieldType) -> FieldValue {
        match field_type {
            FieldType::Checkbox => FieldValue::Bool(false),
            _ => FieldValue::Text(String::new()),
        }
    }
}

/// Table coordinates of a cell. Always `null` today: no table-structure
/// detection runs, the slots exist so consumers can rely on the shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPosition {
    pub row: Option<u32>,
    pub col: Option<u32>,
}

/// A recognised line after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedField {
    /// `field_{page:03}_{n:03}`, unique per document run.
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    /// Raster-space polygon.
    pub bbox: Polygon,
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub value: FieldValue,
    #[serde(flatten)]
    pub cell: Option<CellPosition>,
}

impl ClassifiedField {
    pub fn new(id: String, field_type: FieldType, block: RawTextBlock) -> Self {
        let cell = (field_type == FieldType::TableCell).then(CellPosition::default);
        Self {
            id,
            field_type,
            label: block.text,
            bbox: block.polygon,
            page: block.page,
            confidence: Some(block.confidence),
            value: FieldValue::default_for(field_type),
            cell,
        }
    }
}

/// Id assigned to the `n`th (1-based) line on a page.
pub fn field_id(page: usize, n: usize) -> String {
    format!("field_{page:03}_{n:03}")
}

/// Where a [`FieldRegion`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSource {
    /// An embedded form widget.
    Structured,
    /// Recognised text classified by rules.
    Inferred,
}

/// A detected field as reported by hybrid detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRegion {
    pub id: String,
    pub page: usize,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    pub label: String,
    pub value: Option<String>,
    /// Fractions of page width/height.
    pub rect_normalized: Rect,
    /// Page space.
    pub rect_absolute: Rect,
    pub source: RegionSource,
}

impl FieldRegion {
    /// Field-map entry for this region, in the raster space overlay expects.
    ///
    /// `coordinate_scale` must match the overlay config so the round trip
    /// lands back on `rect_absolute`.
    pub fn to_map_entry(&self, coordinate_scale: f64) -> FieldMapEntry {
        let r = self.rect_absolute;
        let raster = Rect::new(
            r.x0 * coordinate_scale,
            r.y0 * coordinate_scale,
            r.x1 * coordinate_scale,
            r.y1 * coordinate_scale,
        );
        FieldMapEntry {
            bbox: Polygon::from_rect(raster).coords().to_vec(),
            page: self.page as i64,
            field_type: self.field_type,
        }
    }
}

/// Field-map entry: everything overlay needs to place a value.
///
/// Deserialised from caller JSON, so every field is lenient: a missing page
/// defaults to 1, a missing type to `text_field`, a missing bbox to empty
/// (and is then skipped as invalid geometry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapEntry {
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

fn first_page() -> i64 {
    1
}

/// id → placement, in raster space at the detection scale.
pub type FieldMap = BTreeMap<String, FieldMapEntry>;

/// A component in the nested UI schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiComponent {
    Checkbox {
        id: String,
        title: String,
        value: bool,
    },
    /// Free-text input. Table cells carry `row`/`col` instead of a placeholder.
    TextField {
        id: String,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        #[serde(flatten)]
        cell: Option<CellPosition>,
    },
    Dropdown {
        id: String,
        title: String,
        options: Vec<String>,
    },
}

impl UiComponent {
    pub fn id(&self) -> &str {
        match self {
            UiComponent::Checkbox { id, .. }
            | UiComponent::TextField { id, .. }
            | UiComponent::Dropdown { id, .. } => id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            UiComponent::Checkbox { title, .. }
            | UiComponent::TextField { title, .. }
            | UiComponent::Dropdown { title, .. } => title,
        }
    }
}

/// A titled group of components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section: String,
    pub page: usize,
    pub fields: Vec<UiComponent>,
}

/// The nested UI schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub form_schema: Vec<Section>,
}
