/*!
# Form-Level Post-Processing

Folds every view's control list plus the dynamic-section list into the
canonical cross-view model: the conditional-visibility map, the
de-duplicated data-column sequence and the aggregate metadata.

Runs strictly after all per-view parses and the dynamic-section scan;
it is the only writer of `FormDefinition`'s cross-view pieces.
*/

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::{
    ControlDefinition, DataColumn, DynamicSection, FormDefinition, FormMetadata, SectionKind,
    ViewDefinition,
};

/// Inverts the dynamic-section list into driving-field -> dependent
/// control ids
pub fn build_conditional_map(
    dynamic_sections: &[DynamicSection],
) -> BTreeMap<String, BTreeSet<String>> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for section in dynamic_sections {
        if section.driving_field.is_empty() {
            continue;
        }
        let entry = map.entry(section.driving_field.clone()).or_default();
        for control_id in &section.controls {
            entry.insert(control_id.clone());
        }
    }
    map
}

/// Builds the canonical data-column sequence over every view.
///
/// Labels, merged fragments and structural records never become columns.
/// The first occurrence of a (logical name, repeating section) key creates
/// the column; later occurrences only fill option/default metadata the
/// column does not already have.
pub fn build_data_columns(
    views: &[ViewDefinition],
    conditional: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<DataColumn> {
    // reverse lookup: control id -> driving field
    let mut driving_field_of: HashMap<&str, &str> = HashMap::new();
    for (field, control_ids) in conditional {
        for control_id in control_ids {
            driving_field_of.entry(control_id.as_str()).or_insert(field.as_str());
        }
    }

    let mut columns: Vec<DataColumn> = Vec::new();
    let mut index_of: HashMap<(String, String), usize> = HashMap::new();
    let mut synthetic = 0u32;

    for view in views {
        for control in view.active_controls() {
            if control.control_type.is_label() || control.control_type.is_structural() {
                continue;
            }

            let name = logical_name(control, &mut synthetic);
            let owner = if control.is_in_repeating {
                control.repeating_section_name.clone()
            } else {
                String::new()
            };
            let key = (name.clone(), owner.clone());

            let index = match index_of.get(&key) {
                Some(&existing) => existing,
                None => {
                    let display_name = if control.label.is_empty() {
                        name.clone()
                    } else {
                        control.label.clone()
                    };
                    columns.push(DataColumn {
                        name,
                        column_type: control.control_type.clone(),
                        repeating_section: owner,
                        display_name,
                        options: Vec::new(),
                        default_value: String::new(),
                        is_conditional: false,
                        condition_field: String::new(),
                    });
                    let index = columns.len() - 1;
                    index_of.insert(key, index);
                    index
                }
            };

            let column = &mut columns[index];
            if column.options.is_empty() && !control.options.is_empty() {
                column.options = control.options.clone();
            }
            if column.default_value.is_empty() && !control.default_value.is_empty() {
                column.default_value = control.default_value.clone();
            }
            if !column.is_conditional {
                if let Some(field) = driving_field_of.get(control.ctrl_id()) {
                    column.is_conditional = true;
                    column.condition_field = (*field).to_string();
                }
            }
        }
    }

    tracing::debug!("Folded {} views into {} data columns", views.len(), columns.len());
    columns
}

/// Logical name of a control for column folding: explicit name, else
/// label, else last binding segment, else stable id, else synthetic
fn logical_name(control: &ControlDefinition, synthetic: &mut u32) -> String {
    if !control.name.is_empty() {
        return control.name.clone();
    }
    if !control.label.is_empty() {
        return control.label.clone();
    }
    let segment = crate::view::classifier::last_segment(&control.binding);
    if !segment.is_empty() {
        return segment.to_string();
    }
    if !control.ctrl_id().is_empty() {
        return control.ctrl_id().to_string();
    }
    *synthetic += 1;
    format!("Column{}", synthetic)
}

/// Aggregate counts over the finished model
pub fn compute_metadata(form: &FormDefinition) -> FormMetadata {
    let control_count = form
        .views
        .iter()
        .map(|v| v.active_controls().count())
        .sum();

    let section_names: BTreeSet<&str> = form
        .views
        .iter()
        .flat_map(|v| v.sections.iter().map(|s| s.name.as_str()))
        .collect();

    let repeating_section_count = form
        .views
        .iter()
        .flat_map(|v| v.sections.iter())
        .filter(|s| s.kind == SectionKind::Repeating)
        .count();

    FormMetadata {
        control_count,
        section_count: section_names.len(),
        dynamic_section_count: form.dynamic_sections.len(),
        repeating_section_count,
        conditional_field_count: form.conditional_fields.len(),
        view_count: form.views.len(),
        rule_count: form.rules.len(),
    }
}

/// Runs the whole post-processing stage over a form whose views and
/// dynamic sections are already in place
pub fn finalize_form(form: &mut FormDefinition) {
    form.conditional_fields = build_conditional_map(&form.dynamic_sections);
    form.data_columns = build_data_columns(&form.views, &form.conditional_fields);
    form.metadata = compute_metadata(form);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlOption, ControlType};

    fn bound(name: &str, ctrl_id: &str, doc_index: u32) -> ControlDefinition {
        let mut c = ControlDefinition::new(ControlType::Text, doc_index);
        c.name = name.to_string();
        c.binding = format!("my:{}", name);
        if !ctrl_id.is_empty() {
            c.properties.insert("CtrlId".to_string(), ctrl_id.to_string());
        }
        c
    }

    fn view_with(controls: Vec<ControlDefinition>) -> ViewDefinition {
        let mut view = ViewDefinition::new("v", "v.xsl");
        view.controls = controls;
        view
    }

    #[test]
    fn test_same_key_across_views_merges_once() {
        let views = vec![
            view_with(vec![bound("Name", "C1", 0)]),
            view_with(vec![bound("Name", "C9", 0)]),
        ];
        let columns = build_data_columns(&views, &BTreeMap::new());
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "Name");
    }

    #[test]
    fn test_repeating_owner_separates_keys() {
        let mut in_repeating = bound("Name", "C2", 1);
        in_repeating.is_in_repeating = true;
        in_repeating.repeating_section_name = "Items".to_string();

        let views = vec![view_with(vec![bound("Name", "C1", 0), in_repeating])];
        let columns = build_data_columns(&views, &BTreeMap::new());
        assert_eq!(columns.len(), 2);
        assert!(columns.iter().any(|c| c.repeating_section.is_empty()));
        assert!(columns.iter().any(|c| c.repeating_section == "Items"));
    }

    #[test]
    fn test_first_wins_option_merge() {
        let mut first = bound("Color", "C1", 0);
        first.options.push(ControlOption {
            value: "R".to_string(),
            display: "Red".to_string(),
            order: 0,
            is_default: false,
        });
        first.default_value = "R".to_string();

        let mut second = bound("Color", "C2", 1);
        second.options.push(ControlOption {
            value: "X".to_string(),
            display: "Other".to_string(),
            order: 0,
            is_default: false,
        });
        second.default_value = "X".to_string();

        let views = vec![view_with(vec![first, second])];
        let columns = build_data_columns(&views, &BTreeMap::new());
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].options[0].value, "R");
        assert_eq!(columns[0].default_value, "R");
    }

    #[test]
    fn test_later_occurrence_fills_missing_options() {
        let first = bound("Color", "C1", 0);
        let mut second = bound("Color", "C2", 1);
        second.options.push(ControlOption {
            value: "G".to_string(),
            display: "Green".to_string(),
            order: 0,
            is_default: false,
        });

        let views = vec![view_with(vec![first, second])];
        let columns = build_data_columns(&views, &BTreeMap::new());
        assert_eq!(columns[0].options.len(), 1);
    }

    #[test]
    fn test_labels_merged_and_structural_excluded() {
        let mut label = ControlDefinition::new(ControlType::Label, 0);
        label.label = "Caption".to_string();
        let mut merged = bound("Gone", "C3", 1);
        merged.merged_into_parent = true;
        let mut table = ControlDefinition::new(ControlType::RepeatingTable, 2);
        table.name = "Items".to_string();

        let views = vec![view_with(vec![label, merged, table, bound("Kept", "C4", 3)])];
        let columns = build_data_columns(&views, &BTreeMap::new());
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "Kept");
    }

    #[test]
    fn test_conditional_flag_from_inversion() {
        let sections = vec![DynamicSection {
            condition: r#"contains(../my:show, "Yes")"#.to_string(),
            driving_field: "show".to_string(),
            comparison_value: "Yes".to_string(),
            control_id: "CTRL5".to_string(),
            caption: "Extra".to_string(),
            controls: vec!["C1".to_string()],
        }];
        let conditional = build_conditional_map(&sections);
        assert_eq!(conditional["show"].len(), 1);

        let views = vec![view_with(vec![bound("Name", "C1", 0), bound("Age", "C2", 1)])];
        let columns = build_data_columns(&views, &conditional);
        let name_column = columns.iter().find(|c| c.name == "Name").unwrap();
        assert!(name_column.is_conditional);
        assert_eq!(name_column.condition_field, "show");
        assert!(!columns.iter().find(|c| c.name == "Age").unwrap().is_conditional);
    }

    #[test]
    fn test_synthetic_names_for_anonymous_controls() {
        let anonymous = ControlDefinition::new(ControlType::Text, 0);
        let views = vec![view_with(vec![anonymous])];
        let columns = build_data_columns(&views, &BTreeMap::new());
        assert_eq!(columns[0].name, "Column1");
    }

    #[test]
    fn test_metadata_counts() {
        let mut form = FormDefinition::new("F");
        let mut view = view_with(vec![bound("A", "C1", 0), bound("B", "C2", 1)]);
        view.sections.push(crate::model::SectionInfo {
            name: "Items".to_string(),
            kind: SectionKind::Repeating,
            control_id: String::new(),
            start_row: 1,
            end_row: 2,
            controls: vec![],
        });
        form.views.push(view);
        finalize_form(&mut form);

        assert_eq!(form.metadata.control_count, 2);
        assert_eq!(form.metadata.section_count, 1);
        assert_eq!(form.metadata.repeating_section_count, 1);
        assert_eq!(form.metadata.view_count, 1);
        assert_eq!(form.data_columns.len(), 2);
    }
}
