/*!
# Model Export

Read-only projections of the finished form model for external tooling:
pretty JSON of the whole graph and a human-readable text summary for the
CLI. Merged label fragments stay in the serialized views for traceability
but never appear among the data columns.
*/

use std::fmt::Write as FmtWrite;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::FormDefinition;

/// Serializes the whole model as pretty JSON
pub fn to_json(form: &FormDefinition) -> Result<String> {
    serde_json::to_string_pretty(form).context("Failed to serialize form model")
}

/// Writes the JSON projection to a file
pub fn write_json(form: &FormDefinition, path: &Path) -> Result<()> {
    let json = to_json(form)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Wrote JSON model to {}", path.display());
    Ok(())
}

/// Renders the text summary shown by the CLI
pub fn text_summary(form: &FormDefinition) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Form: {}", form.name);
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Views:              {}", form.metadata.view_count);
    let _ = writeln!(out, "Controls:           {}", form.metadata.control_count);
    let _ = writeln!(out, "Sections:           {}", form.metadata.section_count);
    let _ = writeln!(out, "Repeating regions:  {}", form.metadata.repeating_section_count);
    let _ = writeln!(out, "Dynamic sections:   {}", form.metadata.dynamic_section_count);
    let _ = writeln!(out, "Conditional fields: {}", form.metadata.conditional_field_count);
    let _ = writeln!(out, "Rules:              {}", form.metadata.rule_count);
    let _ = writeln!(out, "Data columns:       {}", form.data_columns.len());

    for view in &form.views {
        let _ = writeln!(out);
        let _ = writeln!(out, "View '{}' ({})", view.name, view.transform);
        let _ = writeln!(out, "{}", "-".repeat(50));
        for control in view.active_controls() {
            let _ = writeln!(
                out,
                "  #{:<4} {:<6} {:<16} {:<24} {}",
                control.document_index,
                control.grid_position,
                control.control_type.to_string(),
                control.name,
                control.label
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Data columns");
    let _ = writeln!(out, "{}", "-".repeat(50));
    for column in form.main_columns() {
        let _ = writeln!(out, "  {:<24} {}", column.name, column.column_type);
    }
    for (section, columns) in form.repeating_columns() {
        let _ = writeln!(out, "  [{}]", section);
        for column in columns {
            let _ = writeln!(out, "    {:<22} {}", column.name, column.column_type);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlDefinition, ControlType, DataColumn, ViewDefinition};

    fn sample() -> FormDefinition {
        let mut form = FormDefinition::new("Sample");
        let mut view = ViewDefinition::new("V1", "view1.xsl");

        let mut kept = ControlDefinition::new(ControlType::Text, 0);
        kept.name = "Name".to_string();
        let mut merged = ControlDefinition::new(ControlType::Label, 1);
        merged.merged_into_parent = true;
        view.controls = vec![kept, merged];
        form.views.push(view);

        form.data_columns.push(DataColumn {
            name: "Name".to_string(),
            column_type: ControlType::Text,
            repeating_section: String::new(),
            display_name: "Name".to_string(),
            options: Vec::new(),
            default_value: String::new(),
            is_conditional: false,
            condition_field: String::new(),
        });
        form.metadata = crate::processor::compute_metadata(&form);
        form
    }

    #[test]
    fn test_json_round_trips() {
        let form = sample();
        let json = to_json(&form).unwrap();
        let parsed: FormDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "Sample");
        assert_eq!(parsed.data_columns.len(), 1);
    }

    #[test]
    fn test_summary_skips_merged_fragments() {
        let summary = text_summary(&sample());
        assert!(summary.contains("Form: Sample"));
        assert!(summary.contains("Name"));
        // one active control and the header line only
        assert_eq!(summary.matches("#").count(), 1);
    }
}
