/*!
# Integration Tests

Drives the analyzer over synthetic extracted packages: end-to-end model
reconstruction, repeating-table grouping, dynamic sections and schema
generation.
*/

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use infopath_analyzer::package::analyze_package;
use infopath_analyzer::schema::generate_schema;
use infopath_analyzer::{parse_view_source, ControlType};

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsf:xDocumentClass name="urn:schemas-microsoft-com:office:infopath:OrderForm"
    xmlns:xsf="http://schemas.microsoft.com/office/infopath/2003/solutionDefinition">
  <xsf:views default="Main">
    <xsf:view name="Main" caption="Order Form">
      <xsf:mainpane transform="view1.xsl"/>
    </xsf:view>
  </xsf:views>
  <xsf:ruleSets>
    <xsf:ruleSet name="ruleSet_1">
      <xsf:rule caption="Notify" condition="my:Total &gt; 100">
        <xsf:assignmentAction targetField="my:Flag" expression="true"/>
      </xsf:rule>
    </xsf:ruleSet>
  </xsf:ruleSets>
</xsf:xDocumentClass>"#;

const MAIN_VIEW: &str = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
    xmlns:xd="http://schemas.microsoft.com/office/infopath/2003" xmlns:my="urn:my">
  <xsl:template match="my:OrderForm">
    <div>
      <table>
        <tr>
          <td><strong>Name</strong></td>
          <td><span class="xdTextBox" xd:xctname="PlainText" xd:binding="my:Name" xd:CtrlId="CTRL1"/></td>
        </tr>
      </table>
      <table class="xdRepeatingTable" xd:CtrlId="CTRL5">
        <tbody xd:xctname="RepeatingTable">
          <xsl:for-each select="my:Items/my:Item">
            <tr>
              <td><span class="xdTextBox" xd:xctname="PlainText" xd:binding="my:Item/my:Desc" xd:CtrlId="CTRL6"/></td>
            </tr>
          </xsl:for-each>
        </tbody>
      </table>
      <xsl:apply-templates select="my:Extra" mode="_2"/>
    </div>
  </xsl:template>
  <xsl:template match="my:Extra" mode="_2">
    <xsl:if test="contains(../my:ShowExtra, &quot;Yes&quot;)">
      <div class="xdSection" xd:xctname="Section" xd:CtrlId="CTRL8" caption="Extra">
        <span class="xdTextBox" xd:xctname="PlainText" xd:binding="my:Extra/my:Note" xd:CtrlId="CTRL9"/>
      </div>
    </xsl:if>
  </xsl:template>
</xsl:stylesheet>"#;

fn write_package(dir: &std::path::Path) {
    fs::write(dir.join("manifest.xsf"), MANIFEST).unwrap();
    fs::write(dir.join("view1.xsl"), MAIN_VIEW).unwrap();
    fs::write(dir.join("myschema.xsd"), "<xsd:schema/>").unwrap();
}

#[test]
fn end_to_end_model_reconstruction() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path());

    let (form, issues) = analyze_package(temp.path()).unwrap();
    assert!(!issues.has_errors());
    assert_eq!(form.name, "OrderForm");
    assert_eq!(form.views.len(), 1);

    // main table columns: Name (plus the conditional Note, outside Items)
    let main_names: Vec<&str> = form.main_columns().map(|c| c.name.as_str()).collect();
    assert!(main_names.contains(&"Name"));
    assert!(!main_names.contains(&"Desc"));

    // one repeating group named from the collection parent segment
    let groups = form.repeating_columns();
    assert_eq!(groups.len(), 1);
    let items: Vec<&str> = groups["Items"].iter().map(|c| c.name.as_str()).collect();
    assert_eq!(items, vec!["Desc"]);

    // manifest rule survived onto the model
    assert_eq!(form.rules.len(), 1);
    assert_eq!(form.rules[0].actions, vec!["assignmentAction"]);
}

#[test]
fn dynamic_section_drives_conditional_columns() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path());

    let (form, _) = analyze_package(temp.path()).unwrap();

    assert_eq!(form.dynamic_sections.len(), 1);
    let section = &form.dynamic_sections[0];
    assert_eq!(section.driving_field, "ShowExtra");
    assert_eq!(section.comparison_value, "Yes");
    assert_eq!(section.caption, "Extra");
    assert!(section.controls.contains(&"CTRL9".to_string()));

    assert!(form.conditional_fields.contains_key("ShowExtra"));

    let note = form.data_columns.iter().find(|c| c.name == "Note").unwrap();
    assert!(note.is_conditional);
    assert_eq!(note.condition_field, "ShowExtra");
}

#[test]
fn labels_reach_their_controls() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path());

    let (form, _) = analyze_package(temp.path()).unwrap();
    let name_column = form.data_columns.iter().find(|c| c.name == "Name").unwrap();
    assert_eq!(name_column.display_name, "Name");

    let view = &form.views[0];
    let label = view
        .controls
        .iter()
        .find(|c| c.control_type == ControlType::Label)
        .unwrap();
    assert!(label.associated_control.is_some());
}

#[test]
fn schema_generation_over_reconstructed_model() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path());

    let (form, _) = analyze_package(temp.path()).unwrap();
    let script = generate_schema(&form);

    assert!(script.contains("CREATE TABLE [OrderForm]"));
    assert!(script.contains("CREATE TABLE [OrderForm_Items]"));
    assert!(script.contains("[ParentRecordId] INT NOT NULL REFERENCES [OrderForm] ([RecordId])"));
    assert!(script.contains("[Desc] NVARCHAR(255) NULL"));
}

#[test]
fn merged_label_fragments_stay_out_of_columns() {
    let view = parse_view_source(
        "v",
        "v.xsl",
        r#"<div>
            <table>
              <tr>
                <td><strong>Shipping</strong></td>
              </tr>
              <tr>
                <td><strong>Address</strong></td>
                <td><span class="xdTextBox" xd:xctname="PlainText" xd:binding="my:Addr" xd:CtrlId="C1"/></td>
              </tr>
            </table>
        </div>"#,
    )
    .unwrap();

    let mut controls = view.controls;
    infopath_analyzer::view::associate_labels(&mut controls);
    infopath_analyzer::view::merge_label_fragments(&mut controls);

    let labels: Vec<_> = controls
        .iter()
        .filter(|c| c.control_type == ControlType::Label)
        .collect();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0].label, "Shipping Address");
    assert!(labels[0].is_multiline_label);
    assert!(labels[1].merged_into_parent);
}

#[test]
fn repeated_analysis_is_deterministic() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path());

    let (first, _) = analyze_package(temp.path()).unwrap();
    let (second, _) = analyze_package(temp.path()).unwrap();

    let first_view = &first.views[0];
    let second_view = &second.views[0];
    assert_eq!(first_view.controls.len(), second_view.controls.len());
    for (a, b) in first_view.controls.iter().zip(second_view.controls.iter()) {
        assert_eq!(a.document_index, b.document_index);
        assert_eq!(a.grid_position, b.grid_position);
        assert_eq!(a.binding, b.binding);
    }
    assert_eq!(
        first.data_columns.iter().map(|c| &c.name).collect::<Vec<_>>(),
        second.data_columns.iter().map(|c| &c.name).collect::<Vec<_>>()
    );
}
