//! Schema builder: classified fields → sectioned UI schema.
//!
//! A single forward pass over the fields sorted by `(page, top)`:
//!
//! ```text
//! title            → close current section, open one named after the title
//! |Δy| > gap       → close current section, open "Section"
//! no section yet   → open "Main Section"
//! checkbox         → Checkbox component
//! text_field       → TextField with placeholder, trailing ':' stripped
//! table_cell       → TextField with null row/col
//! anything else    → dropped (still advances the gap tracker)
//! ```
//!
//! Afterwards each run of two or more adjacent checkboxes in a section is
//! folded into one dropdown.

use crate::field::{CellPosition, ClassifiedField, FieldType, FormSchema, Section, UiComponent};

/// Default vertical gap, in raster units, that starts a new section.
pub const DEFAULT_SECTION_GAP: f64 = 100.0;

const MAIN_SECTION: &str = "Main Section";
const GAP_SECTION: &str = "Section";

/// Build the nested schema. Pure and deterministic: the same field list
/// always yields the same schema.
pub fn build_schema(fields: &[ClassifiedField], section_gap: f64) -> FormSchema {
    let mut sorted: Vec<&ClassifiedField> = fields.iter().collect();
    // Stable: equal keys keep input order.
    sorted.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.bbox.top().total_cmp(&b.bbox.top()))
    });

    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;
    let mut last_y = 0.0_f64;

    for field in sorted {
        let y = field.bbox.top();
        let is_title = field.field_type == FieldType::Title;
        let gap_break = current.is_some() && (y - last_y).abs() > section_gap;

        if is_title || gap_break {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            let name = if is_title {
                field.label.clone()
            } else {
                GAP_SECTION.to_string()
            };
            current = Some(Section {
                section: name,
                page: field.page,
                fields: Vec::new(),
            });
        }

        let section = current.get_or_insert_with(|| Section {
            section: MAIN_SECTION.to_string(),
            page: field.page,
            fields: Vec::new(),
        });

        if !is_title {
            if let Some(component) = to_component(field) {
                section.fields.push(component);
            }
        }
        last_y = y;
    }

    // Sections closed by a break are kept even when empty; only the last
    // one is dropped if nothing landed in it.
    if let Some(last) = current {
        if !last.fields.is_empty() {
            sections.push(last);
        }
    }

    for section in &mut sections {
        let fields = std::mem::take(&mut section.fields);
        section.fields = fold_checkboxes(fields, &section.section);
    }

    FormSchema {
        form_schema: sections,
    }
}

/// Convert one classified field into its UI component, or `None` for
/// render-only types.
pub fn to_component(field: &ClassifiedField) -> Option<UiComponent> {
    match field.field_type {
        FieldType::Checkbox => Some(UiComponent::Checkbox {
            id: field.id.clone(),
            title: field.label.clone(),
            value: false,
        }),
        FieldType::TextField => {
            let title = field.label.trim_end_matches(':').to_string();
            let placeholder = format!("Enter {}", title.to_lowercase());
            Some(UiComponent::TextField {
                id: field.id.clone(),
                title,
                placeholder: Some(placeholder),
                cell: None,
            })
        }
        FieldType::TableCell => Some(UiComponent::TextField {
            id: field.id.clone(),
            title: field.label.clone(),
            placeholder: None,
            cell: Some(field.cell.unwrap_or_default()),
        }),
        _ => None,
    }
}

/// Collapse every maximal run of ≥ 2 adjacent checkboxes into a dropdown
/// titled after the section. Single checkboxes are left alone.
pub fn fold_checkboxes(components: Vec<UiComponent>, section_title: &str) -> Vec<UiComponent> {
    let mut out = Vec::with_capacity(components.len());
    let mut run: Vec<UiComponent> = Vec::new();

    for component in components {
        if matches!(component, UiComponent::Checkbox { .. }) {
            run.push(component);
        } else {
            flush_run(&mut run, &mut out, section_title);
            out.push(component);
        }
    }
    flush_run(&mut run, &mut out, section_title);
    out
}

fn flush_run(run: &mut Vec<UiComponent>, out: &mut Vec<UiComponent>, section_title: &str) {
    match run.len() {
        0 => {}
        1 => out.append(run),
        _ => {
            let id = format!("dropdown_{}", run[0].id());
            let options = run.iter().map(|c| c.title().to_string()).collect();
            run.clear();
            out.push(UiComponent::Dropdown {
                id,
                title: section_title.to_string(),
                options,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{field_id, FieldValue};
    use crate::geometry::Polygon;
    use pretty_assertions::assert_eq;

    fn field(n: usize, field_type: FieldType, label: &str, y: f64) -> ClassifiedField {
        ClassifiedField {
            id: field_id(1, n),
            field_type,
            label: label.into(),
            bbox: Polygon([10.0, y, 200.0, y, 200.0, y + 20.0, 10.0, y + 20.0]),
            page: 1,
            confidence: Some(0.95),
            value: FieldValue::default_for(field_type),
            cell: (field_type == FieldType::TableCell).then(CellPosition::default),
        }
    }

    fn ids(section: &Section) -> Vec<&str> {
        section.fields.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn empty_input_gives_empty_schema() {
        assert_eq!(build_schema(&[], DEFAULT_SECTION_GAP), FormSchema::default());
    }

    #[test]
    fn first_field_opens_main_section() {
        let schema = build_schema(
            &[field(1, FieldType::TextField, "Name:", 50.0)],
            DEFAULT_SECTION_GAP,
        );
        assert_eq!(schema.form_schema.len(), 1);
        assert_eq!(schema.form_schema[0].section, "Main Section");
        assert_eq!(
            schema.form_schema[0].fields[0],
            UiComponent::TextField {
                id: "field_001_001".into(),
                title: "Name".into(),
                placeholder: Some("Enter name".into()),
                cell: None,
            }
        );
    }

    #[test]
    fn title_names_section_and_is_not_a_component() {
        let schema = build_schema(
            &[
                field(1, FieldType::Title, "PERSONAL DETAILS", 10.0),
                field(2, FieldType::TextField, "Email:", 40.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        assert_eq!(schema.form_schema.len(), 1);
        assert_eq!(schema.form_schema[0].section, "PERSONAL DETAILS");
        assert_eq!(ids(&schema.form_schema[0]), vec!["field_001_002"]);
    }

    #[test]
    fn large_gap_opens_generic_section() {
        let schema = build_schema(
            &[
                field(1, FieldType::TextField, "Email:", 10.0),
                field(2, FieldType::TextField, "Phone:", 300.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        let names: Vec<_> = schema.form_schema.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(names, vec!["Main Section", "Section"]);
    }

    #[test]
    fn gap_exactly_at_threshold_does_not_break() {
        let schema = build_schema(
            &[
                field(1, FieldType::TextField, "Email:", 10.0),
                field(2, FieldType::TextField, "Phone:", 110.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        assert_eq!(schema.form_schema.len(), 1);
    }

    #[test]
    fn dropped_fields_still_advance_last_y() {
        // The label at y=100 keeps the gap to the next field under 100.
        let schema = build_schema(
            &[
                field(1, FieldType::TextField, "Email:", 10.0),
                field(2, FieldType::Label, "note", 100.0),
                field(3, FieldType::TextField, "Phone:", 190.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        assert_eq!(schema.form_schema.len(), 1);
        assert_eq!(ids(&schema.form_schema[0]), vec!["field_001_001", "field_001_003"]);
    }

    #[test]
    fn intermediate_empty_section_is_kept_trailing_one_dropped() {
        let schema = build_schema(
            &[
                field(1, FieldType::Title, "PART A", 10.0),
                field(2, FieldType::Title, "PART B", 20.0),
                field(3, FieldType::Checkbox, "Yes", 30.0),
                field(4, FieldType::Title, "PART C", 40.0),
                field(5, FieldType::NonFillable, "long disclaimer", 50.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        let names: Vec<_> = schema.form_schema.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(names, vec!["PART A", "PART B"]);
        assert!(schema.form_schema[0].fields.is_empty());
    }

    #[test]
    fn sorts_by_page_then_top() {
        let mut late = field(1, FieldType::TextField, "Phone:", 10.0);
        late.page = 2;
        let early = field(2, FieldType::TextField, "Email:", 500.0);
        let schema = build_schema(&[late, early], 10_000.0);
        assert_eq!(
            ids(&schema.form_schema[0]),
            vec!["field_001_002", "field_001_001"]
        );
        assert_eq!(schema.form_schema[0].page, 1);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let schema = build_schema(
            &[
                field(2, FieldType::TextField, "B:", 40.0),
                field(1, FieldType::TextField, "A:", 40.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        assert_eq!(
            ids(&schema.form_schema[0]),
            vec!["field_001_002", "field_001_001"]
        );
    }

    #[test]
    fn checkbox_run_folds_into_dropdown() {
        let schema = build_schema(
            &[
                field(1, FieldType::Title, "GENDER DETAILS", 0.0),
                field(2, FieldType::TextField, "Name:", 10.0),
                field(3, FieldType::Checkbox, "Male", 20.0),
                field(4, FieldType::Checkbox, "Female", 30.0),
                field(5, FieldType::Checkbox, "Other", 40.0),
                field(6, FieldType::TextField, "Email:", 50.0),
            ],
            DEFAULT_SECTION_GAP,
        );
        let fields = &schema.form_schema[0].fields;
        assert_eq!(fields.len(), 3);
        assert_eq!(
            fields[1],
            UiComponent::Dropdown {
                id: "dropdown_field_001_003".into(),
                title: "GENDER DETAILS".into(),
                options: vec!["Male".into(), "Female".into(), "Other".into()],
            }
        );
        assert_eq!(fields[2].id(), "field_001_006");
    }

    #[test]
    fn single_checkbox_is_untouched() {
        let schema = build_schema(
            &[field(1, FieldType::Checkbox, "Yes", 10.0)],
            DEFAULT_SECTION_GAP,
        );
        assert_eq!(
            schema.form_schema[0].fields,
            vec![UiComponent::Checkbox {
                id: "field_001_001".into(),
                title: "Yes".into(),
                value: false,
            }]
        );
    }

    #[test]
    fn trailing_checkbox_run_is_flushed() {
        let folded = fold_checkboxes(
            vec![
                UiComponent::Checkbox {
                    id: "a".into(),
                    title: "New".into(),
                    value: false,
                },
                UiComponent::Checkbox {
                    id: "b".into(),
                    title: "Lost".into(),
                    value: false,
                },
            ],
            "Reason",
        );
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].id(), "dropdown_a");
    }

    #[test]
    fn table_cell_becomes_text_field_with_null_cell() {
        let schema = build_schema(
            &[field(1, FieldType::TableCell, "Date", 10.0)],
            DEFAULT_SECTION_GAP,
        );
        let json = serde_json::to_value(&schema.form_schema[0].fields[0]).unwrap();
        assert_eq!(json["type"], "text_field");
        assert_eq!(json["title"], "Date");
        assert!(json["row"].is_null());
        assert!(json["col"].is_null());
        assert!(json.get("placeholder").is_none());
    }

    #[test]
    fn every_trailing_colon_is_stripped() {
        let component = to_component(&field(1, FieldType::TextField, "Remarks::", 0.0)).unwrap();
        assert_eq!(component.title(), "Remarks");
    }

    #[test]
    fn building_twice_is_identical() {
        let input = vec![
            field(1, FieldType::Title, "APPLICATION FORM", 0.0),
            field(2, FieldType::Checkbox, "New", 20.0),
            field(3, FieldType::Checkbox, "Lost", 30.0),
            field(4, FieldType::TableCell, "Contact", 400.0),
        ];
        let a = serde_json::to_string(&build_schema(&input, DEFAULT_SECTION_GAP)).unwrap();
        let b = serde_json::to_string(&build_schema(&input, DEFAULT_SECTION_GAP)).unwrap();
        assert_eq!(a, b);
    }
}
