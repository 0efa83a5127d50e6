/*!
# Relational Schema Generation

Mechanical templating over the finished form model: one main table for
the non-repeating columns, one child table per repeating section (keyed
back to the main table), and a flat listing view. Only `DataColumn`s are
consumed; nothing here reaches back into the raw views.
*/

use std::fmt::Write;

use crate::model::{ControlType, DataColumn, FormDefinition};

/// Maps a control type to its T-SQL column type
pub fn sql_type(control_type: &ControlType) -> &'static str {
    match control_type {
        ControlType::Text
        | ControlType::DropDown
        | ControlType::ComboBox
        | ControlType::ListBox
        | ControlType::OptionButton
        | ControlType::PeoplePicker
        | ControlType::Hyperlink => "NVARCHAR(255)",
        ControlType::RichText | ControlType::ActiveX | ControlType::ExpressionBox => {
            "NVARCHAR(MAX)"
        }
        ControlType::DatePicker => "DATETIME",
        ControlType::CheckBox => "BIT",
        ControlType::FileAttachment | ControlType::InkPicture => "VARBINARY(MAX)",
        _ => "NVARCHAR(255)",
    }
}

/// Strips a name down to a safe SQL identifier
pub fn sql_identifier(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "Column".to_string()
    } else if cleaned.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        format!("C{}", cleaned)
    } else {
        cleaned
    }
}

/// Emits the full DDL script for a form
pub fn generate_schema(form: &FormDefinition) -> String {
    let mut script = String::new();
    let table = sql_identifier(&form.name);

    let _ = writeln!(script, "-- Schema generated from form '{}'", form.name);
    let _ = writeln!(script);

    let main: Vec<&DataColumn> = form.main_columns().collect();
    emit_table(&mut script, &table, &main, None);

    for (section, columns) in form.repeating_columns() {
        let child = format!("{}_{}", table, sql_identifier(section));
        emit_table(&mut script, &child, &columns, Some(&table));
    }

    emit_listing_view(&mut script, &table, &main);
    script
}

fn emit_table(script: &mut String, table: &str, columns: &[&DataColumn], parent: Option<&str>) {
    let mut items: Vec<(String, Option<String>)> = Vec::new();
    items.push((
        "[RecordId] INT IDENTITY(1,1) NOT NULL PRIMARY KEY".to_string(),
        None,
    ));
    if let Some(parent) = parent {
        items.push((
            format!(
                "[ParentRecordId] INT NOT NULL REFERENCES [{}] ([RecordId])",
                parent
            ),
            None,
        ));
    }
    for column in columns {
        let mut sql = format!(
            "[{}] {} NULL",
            sql_identifier(&column.name),
            sql_type(&column.column_type)
        );
        if !column.default_value.is_empty() {
            let _ = write!(sql, " DEFAULT N'{}'", column.default_value.replace('\'', "''"));
        }
        let comment = column
            .is_conditional
            .then(|| format!("shown when [{}] matches", column.condition_field));
        items.push((sql, comment));
    }

    let _ = writeln!(script, "CREATE TABLE [{}] (", table);
    for (index, (sql, comment)) in items.iter().enumerate() {
        let comma = if index + 1 < items.len() { "," } else { "" };
        match comment {
            Some(comment) => {
                let _ = writeln!(script, "    {}{} -- {}", sql, comma, comment);
            }
            None => {
                let _ = writeln!(script, "    {}{}", sql, comma);
            }
        }
    }
    let _ = writeln!(script, ");");
    let _ = writeln!(script);
}

fn emit_listing_view(script: &mut String, table: &str, columns: &[&DataColumn]) {
    let _ = writeln!(script, "CREATE VIEW [{}_Listing] AS", table);
    let _ = write!(script, "SELECT [RecordId]");
    for column in columns {
        let _ = write!(script, ",\n    [{}]", sql_identifier(&column.name));
    }
    let _ = writeln!(script, "\nFROM [{}];", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlType, DataColumn, FormDefinition};

    fn column(name: &str, ty: ControlType, section: &str) -> DataColumn {
        DataColumn {
            name: name.to_string(),
            column_type: ty,
            repeating_section: section.to_string(),
            display_name: name.to_string(),
            options: Vec::new(),
            default_value: String::new(),
            is_conditional: false,
            condition_field: String::new(),
        }
    }

    fn sample_form() -> FormDefinition {
        let mut form = FormDefinition::new("Expense Report");
        form.data_columns = vec![
            column("Name", ControlType::Text, ""),
            column("Approved", ControlType::CheckBox, ""),
            column("Desc", ControlType::Text, "Items"),
            column("Amount", ControlType::Text, "Items"),
        ];
        form
    }

    #[test]
    fn test_main_and_child_tables() {
        let script = generate_schema(&sample_form());
        assert!(script.contains("CREATE TABLE [ExpenseReport]"));
        assert!(script.contains("CREATE TABLE [ExpenseReport_Items]"));
        assert!(script.contains("[ParentRecordId] INT NOT NULL REFERENCES [ExpenseReport]"));
        assert!(script.contains("[Approved] BIT NULL"));
        assert!(script.contains("CREATE VIEW [ExpenseReport_Listing]"));
    }

    #[test]
    fn test_defaults_and_conditionals_annotated() {
        let mut form = sample_form();
        form.data_columns[0].default_value = "O'Brien".to_string();
        form.data_columns[1].is_conditional = true;
        form.data_columns[1].condition_field = "show".to_string();

        let script = generate_schema(&form);
        assert!(script.contains("DEFAULT N'O''Brien'"));
        assert!(script.contains("-- shown when [show] matches"));
    }

    #[test]
    fn test_identifier_sanitizing() {
        assert_eq!(sql_identifier("Employee Name"), "EmployeeName");
        assert_eq!(sql_identifier("2ndLine"), "C2ndLine");
        assert_eq!(sql_identifier("!!!"), "Column");
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(sql_type(&ControlType::RichText), "NVARCHAR(MAX)");
        assert_eq!(sql_type(&ControlType::DatePicker), "DATETIME");
        assert_eq!(sql_type(&ControlType::Other("Widget".to_string())), "NVARCHAR(255)");
    }
}
