/*!
# Form Model

Typed model of a reconstructed InfoPath form: views, controls, sections,
repeating groups, dynamic sections and the canonical cross-view data columns.

The model is produced in two stages: per-view parsing fills
[`ViewDefinition`]s, then the form-level post-processor folds them into the
final [`FormDefinition`]. Once a view's parse completes its definition is
never mutated again; the `FormDefinition` is mutated only by the
post-processor and is exposed read-only afterwards.
*/

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Root of the reconstructed form model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    pub name: String,
    pub views: Vec<ViewDefinition>,
    /// Declarative rules extracted from the manifest
    pub rules: Vec<FormRule>,
    /// Canonical, de-duplicated cross-view columns
    pub data_columns: Vec<DataColumn>,
    pub dynamic_sections: Vec<DynamicSection>,
    /// Driving field name -> stable ids of the controls it shows/hides
    pub conditional_fields: BTreeMap<String, BTreeSet<String>>,
    pub metadata: FormMetadata,
    pub generation_metadata: GenerationMetadata,
}

impl FormDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: Vec::new(),
            rules: Vec::new(),
            data_columns: Vec::new(),
            dynamic_sections: Vec::new(),
            conditional_fields: BTreeMap::new(),
            metadata: FormMetadata::default(),
            generation_metadata: GenerationMetadata::now(""),
        }
    }

    /// Finds a view by name
    pub fn get_view(&self, name: &str) -> Option<&ViewDefinition> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Columns belonging to the main (non-repeating) table
    pub fn main_columns(&self) -> impl Iterator<Item = &DataColumn> {
        self.data_columns
            .iter()
            .filter(|c| c.repeating_section.is_empty())
    }

    /// Columns grouped by owning repeating section
    pub fn repeating_columns(&self) -> BTreeMap<&str, Vec<&DataColumn>> {
        let mut groups: BTreeMap<&str, Vec<&DataColumn>> = BTreeMap::new();
        for column in &self.data_columns {
            if !column.repeating_section.is_empty() {
                groups
                    .entry(column.repeating_section.as_str())
                    .or_default()
                    .push(column);
            }
        }
        groups
    }
}

/// One parsed view template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    /// Source .xsl file name from the manifest
    pub transform: String,
    /// Controls in document order
    pub controls: Vec<ControlDefinition>,
    /// Structural regions in discovery order
    pub sections: Vec<SectionInfo>,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, transform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: transform.into(),
            controls: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Controls that survive label merging
    pub fn active_controls(&self) -> impl Iterator<Item = &ControlDefinition> {
        self.controls.iter().filter(|c| !c.merged_into_parent)
    }
}

/// Control type resolved from `xd:xctname`, markup tag or class hints.
///
/// Unrecognized control-kind tokens are carried verbatim in `Other` so the
/// schema generator can still surface them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    Text,
    RichText,
    DatePicker,
    CheckBox,
    OptionButton,
    DropDown,
    ComboBox,
    ListBox,
    FileAttachment,
    InkPicture,
    PeoplePicker,
    ActiveX,
    ExpressionBox,
    Button,
    Hyperlink,
    Label,
    Section,
    RepeatingSection,
    RepeatingTable,
    Other(String),
}

impl ControlType {
    /// True for label records (not data-bearing)
    pub fn is_label(&self) -> bool {
        matches!(self, ControlType::Label)
    }

    /// True for structural records that never become data columns themselves
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ControlType::Section | ControlType::RepeatingSection | ControlType::RepeatingTable
        )
    }
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlType::Text => "Text",
            ControlType::RichText => "RichText",
            ControlType::DatePicker => "DatePicker",
            ControlType::CheckBox => "CheckBox",
            ControlType::OptionButton => "OptionButton",
            ControlType::DropDown => "DropDown",
            ControlType::ComboBox => "ComboBox",
            ControlType::ListBox => "ListBox",
            ControlType::FileAttachment => "FileAttachment",
            ControlType::InkPicture => "InkPicture",
            ControlType::PeoplePicker => "PeoplePicker",
            ControlType::ActiveX => "ActiveX",
            ControlType::ExpressionBox => "ExpressionBox",
            ControlType::Button => "Button",
            ControlType::Hyperlink => "Hyperlink",
            ControlType::Label => "Label",
            ControlType::Section => "Section",
            ControlType::RepeatingSection => "RepeatingSection",
            ControlType::RepeatingTable => "RepeatingTable",
            ControlType::Other(token) => token,
        };
        write!(f, "{}", name)
    }
}

/// One recognized markup unit inside a view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlDefinition {
    /// Logical name (last binding segment when bound, empty otherwise)
    pub name: String,
    pub control_type: ControlType,
    /// Display label: own text for labels, associated label text for controls
    pub label: String,
    /// Data-binding XPath (`xd:binding` or html name attribute)
    pub binding: String,
    /// Strictly increasing per view, assigned in document order
    pub document_index: u32,
    /// Row number + column letter, e.g. `"12B"`
    pub grid_position: String,
    pub is_in_repeating: bool,
    pub repeating_section_name: String,
    pub repeating_section_binding: String,
    /// Innermost enclosing plain section, when not inside a repeating one
    pub parent_section: String,
    pub section_type: String,
    /// Set once this record was absorbed by a multi-fragment label merge;
    /// merged records are excluded from every downstream consumer but kept
    /// for traceability
    pub merged_into_parent: bool,
    /// Set on the surviving head of a multi-fragment label merge
    pub is_multiline_label: bool,
    /// Document index of the control this label describes
    pub associated_control: Option<u32>,
    /// Document index of the label describing this control
    pub associated_label: Option<u32>,
    /// Static choices for dropdown/combo/option controls
    pub options: Vec<ControlOption>,
    /// Default value carried by the markup, when present
    pub default_value: String,
    /// Open property bag for secondary attributes (`CtrlId`, class, ...)
    pub properties: HashMap<String, String>,
}

impl ControlDefinition {
    pub fn new(control_type: ControlType, document_index: u32) -> Self {
        Self {
            name: String::new(),
            control_type,
            label: String::new(),
            binding: String::new(),
            document_index,
            grid_position: String::new(),
            is_in_repeating: false,
            repeating_section_name: String::new(),
            repeating_section_binding: String::new(),
            parent_section: String::new(),
            section_type: String::new(),
            merged_into_parent: false,
            is_multiline_label: false,
            associated_control: None,
            associated_label: None,
            options: Vec::new(),
            default_value: String::new(),
            properties: HashMap::new(),
        }
    }

    /// Stable control id (`xd:CtrlId`), empty when the markup carries none
    pub fn ctrl_id(&self) -> &str {
        self.properties.get("CtrlId").map(String::as_str).unwrap_or("")
    }
}

/// Static option of a choice control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOption {
    pub value: String,
    pub display: String,
    pub order: u32,
    pub is_default: bool,
}

/// Kind of a structural region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    Plain,
    Repeating,
}

/// One structural region of a view, with its row extent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub kind: SectionKind,
    /// Stable id of the section element itself, when present
    pub control_id: String,
    pub start_row: u32,
    pub end_row: u32,
    /// Stable ids of member controls, in discovery order
    pub controls: Vec<String>,
}

/// Canonical cross-view data column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataColumn {
    pub name: String,
    pub column_type: ControlType,
    /// Owning repeating section, empty for the main table
    pub repeating_section: String,
    pub display_name: String,
    pub options: Vec<ControlOption>,
    pub default_value: String,
    pub is_conditional: bool,
    /// Field whose value drives visibility, when conditional
    pub condition_field: String,
}

/// Conditionally-shown region extracted from a guarded template block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicSection {
    /// Raw condition text from the guard
    pub condition: String,
    /// Field referenced by the condition
    pub driving_field: String,
    /// Literal the field is compared against
    pub comparison_value: String,
    pub control_id: String,
    pub caption: String,
    /// Stable ids of the controls inside the guarded region
    pub controls: Vec<String>,
}

/// Declarative rule from the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRule {
    pub name: String,
    pub condition: String,
    /// Action element names in declaration order
    pub actions: Vec<String>,
    pub is_enabled: bool,
}

/// Aggregate counts computed once, after every other model piece is final
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormMetadata {
    pub control_count: usize,
    pub section_count: usize,
    pub dynamic_section_count: usize,
    pub repeating_section_count: usize,
    pub conditional_field_count: usize,
    pub view_count: usize,
    pub rule_count: usize,
}

/// Provenance of one analyzer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub timestamp: String,
    pub generator_version: String,
    pub source_path: String,
}

impl GenerationMetadata {
    pub fn now(source_path: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            source_path: source_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_type_display() {
        assert_eq!(ControlType::Text.to_string(), "Text");
        assert_eq!(ControlType::RepeatingTable.to_string(), "RepeatingTable");
        assert_eq!(
            ControlType::Other("xdCustomWidget".to_string()).to_string(),
            "xdCustomWidget"
        );
    }

    #[test]
    fn test_control_type_predicates() {
        assert!(ControlType::Label.is_label());
        assert!(!ControlType::Text.is_label());
        assert!(ControlType::Section.is_structural());
        assert!(ControlType::RepeatingTable.is_structural());
        assert!(!ControlType::CheckBox.is_structural());
    }

    #[test]
    fn test_ctrl_id_falls_back_to_empty() {
        let mut control = ControlDefinition::new(ControlType::Text, 0);
        assert_eq!(control.ctrl_id(), "");
        control
            .properties
            .insert("CtrlId".to_string(), "CTRL7".to_string());
        assert_eq!(control.ctrl_id(), "CTRL7");
    }

    #[test]
    fn test_repeating_columns_grouping() {
        let mut form = FormDefinition::new("Test");
        form.data_columns = vec![
            DataColumn {
                name: "Name".to_string(),
                column_type: ControlType::Text,
                repeating_section: String::new(),
                display_name: "Name".to_string(),
                options: Vec::new(),
                default_value: String::new(),
                is_conditional: false,
                condition_field: String::new(),
            },
            DataColumn {
                name: "Desc".to_string(),
                column_type: ControlType::Text,
                repeating_section: "Items".to_string(),
                display_name: "Desc".to_string(),
                options: Vec::new(),
                default_value: String::new(),
                is_conditional: false,
                condition_field: String::new(),
            },
        ];

        assert_eq!(form.main_columns().count(), 1);
        let groups = form.repeating_columns();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["Items"].len(), 1);
    }
}
