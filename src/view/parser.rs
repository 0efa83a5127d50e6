/*!
# View Parser

Recursive walk over one view's element tree, driving the classifier and
the grid/context tracker to produce the ordered control list and section
list of a [`ViewDefinition`].

All mutable state lives in a fresh [`ParseState`] per call, so parsing
distinct views concurrently shares nothing. Within one view, document
order is authoritative: document indices are assigned strictly
increasing, skipping nothing.
*/

use std::collections::HashMap;

use crate::model::{ControlDefinition, ControlOption, ControlType, ViewDefinition};
use crate::view::classifier::{
    classify, classify_indirection, collection_name, last_segment, path_segments,
    template_indirection, ElementClass, IndirectionKind,
};
use crate::view::context::{is_row_boundary, ParseState};
use crate::view::dom::{parse_view_tree, ViewElement};

/// Parses one view's element tree into its raw control and section lists.
///
/// Label association and fragment merging are separate refinement passes
/// (see [`crate::view::labels`]); this function returns the traversal
/// output only.
pub fn parse_view(name: &str, transform: &str, root: &ViewElement) -> ViewDefinition {
    let mut parser = ViewParser::new(root);
    parser.run(root);

    tracing::debug!(
        "View '{}': {} controls, {} sections",
        name,
        parser.controls.len(),
        parser.state.sections.len()
    );

    let mut view = ViewDefinition::new(name, transform);
    view.controls = parser.controls;
    view.sections = parser.state.sections;
    view
}

/// Convenience entry over raw file content
pub fn parse_view_source(name: &str, transform: &str, content: &str) -> anyhow::Result<ViewDefinition> {
    let tree = parse_view_tree(content)?;
    Ok(parse_view(name, transform, &tree))
}

struct ViewParser<'a> {
    /// Template-mode blocks of this view, resolved up front
    templates: HashMap<&'a str, &'a ViewElement>,
    state: ParseState,
    controls: Vec<ControlDefinition>,
}

impl<'a> ViewParser<'a> {
    fn new(root: &'a ViewElement) -> Self {
        let mut templates = HashMap::new();
        root.for_each_element(&mut |element| {
            if element.local_name() == "template" {
                if let Some(mode) = element.attr("mode") {
                    templates.entry(mode).or_insert(element);
                }
            }
        });
        Self {
            templates,
            state: ParseState::new(),
            controls: Vec::new(),
        }
    }

    fn run(&mut self, root: &'a ViewElement) {
        if root.local_name() == "stylesheet" {
            // Walk entry templates only; mode-templates are reachable
            // solely through apply-templates indirections
            for child in root.child_elements() {
                if child.local_name() == "template" {
                    if child.attr("mode").is_none() {
                        self.walk_children(child);
                    }
                } else {
                    self.visit(child, None);
                }
            }
        } else {
            self.visit(root, None);
        }
    }

    fn walk_children(&mut self, parent: &'a ViewElement) {
        for child in parent.child_elements() {
            self.visit(child, Some(parent));
        }
    }

    fn visit(&mut self, element: &'a ViewElement, parent: Option<&'a ViewElement>) {
        if is_row_boundary(element) {
            self.state.grid.next_row();
        }

        match classify(element) {
            ElementClass::Label => self.emit_label(element),
            ElementClass::BoundControl(control_type) => {
                if self.emit_control(element, parent, control_type) {
                    self.walk_children(element);
                }
            }
            ElementClass::PlainSection => self.enter_plain_section(element),
            ElementClass::RepeatingSection => self.enter_repeating_section(element),
            ElementClass::RepeatingTable => self.enter_repeating_table(element),
            ElementClass::TemplateIndirection { mode, select } => {
                self.resolve_indirection(&mode, &select)
            }
            ElementClass::PassThrough => self.walk_children(element),
        }
    }

    /// Materializes a label record. Labels carry their own text and no
    /// binding; association with a control happens in a later pass.
    fn emit_label(&mut self, element: &'a ViewElement) {
        let ctrl_id = element.attr_or_default("CtrlId").to_string();
        if !self.state.register_ctrl_id(&ctrl_id) {
            tracing::debug!("Suppressing duplicate label {}", ctrl_id);
            return;
        }

        let mut label = ControlDefinition::new(ControlType::Label, self.state.next_document_index());
        label.label = element.direct_label_text();
        label.grid_position = self.state.grid.token();
        self.attribute_context(&mut label);
        self.stash_properties(element, &mut label, &ctrl_id);
        self.state.record_member(&ctrl_id);
        self.controls.push(label);
        self.state.grid.advance_control();
    }

    /// Materializes a bound control. Returns false when the record was
    /// suppressed as a duplicate, in which case the caller must not
    /// descend into the element.
    fn emit_control(
        &mut self,
        element: &'a ViewElement,
        parent: Option<&'a ViewElement>,
        control_type: ControlType,
    ) -> bool {
        let ctrl_id = element.attr_or_default("CtrlId").to_string();
        if !self.state.register_ctrl_id(&ctrl_id) {
            tracing::debug!("Suppressing duplicate control {}", ctrl_id);
            return false;
        }

        let binding = control_binding(element);
        let mut control =
            ControlDefinition::new(control_type.clone(), self.state.next_document_index());
        control.name = last_segment(&binding).to_string();
        control.binding = binding;
        control.grid_position = self.state.grid.token();
        self.attribute_context(&mut control);
        self.stash_properties(element, &mut control, &ctrl_id);
        extract_options(element, parent, &control_type, &mut control);
        self.state.record_member(&ctrl_id);
        self.controls.push(control);
        self.state.grid.advance_control();
        true
    }

    fn enter_plain_section(&mut self, element: &'a ViewElement) {
        let ctrl_id = element.attr_or_default("CtrlId");
        let name = plain_section_name(element);
        let section_type = element
            .attr("xctname")
            .filter(|v| v.eq_ignore_ascii_case("OptionalSection"))
            .unwrap_or("Section")
            .to_string();

        self.state.grid.next_row();
        self.state.push_section(&name, &section_type, ctrl_id);
        self.walk_children(element);
        self.state.pop_context();
    }

    fn enter_repeating_section(&mut self, element: &'a ViewElement) {
        let select = repeating_section_select(element);

        // A non-collection repeating marker inside an already-repeating
        // block continues the current repetition level instead of opening
        // a second one
        if self.state.in_repeating() && path_segments(&select).len() < 2 {
            self.walk_children(element);
            return;
        }

        let ctrl_id = element.attr_or_default("CtrlId");
        let name = if select.is_empty() {
            fallback_section_name(element, "RepeatingSection")
        } else {
            collection_name(&select)
        };

        self.state.grid.next_row();
        self.state.push_repeating(&name, &select, ctrl_id);
        self.walk_children(element);
        self.state.pop_context();
    }

    fn enter_repeating_table(&mut self, element: &'a ViewElement) {
        let ctrl_id = element.attr_or_default("CtrlId").to_string();
        if !self.state.register_ctrl_id(&ctrl_id) {
            tracing::debug!("Suppressing duplicate repeating table {}", ctrl_id);
            return;
        }

        let binding = repeating_table_binding(element);
        let name = if binding.is_empty() {
            fallback_section_name(element, "RepeatingTable")
        } else {
            collection_name(&binding)
        };

        // The table record itself belongs to the enclosing context
        let mut table =
            ControlDefinition::new(ControlType::RepeatingTable, self.state.next_document_index());
        table.name = name.clone();
        table.binding = binding.clone();
        table.grid_position = self.state.grid.token();
        self.attribute_context(&mut table);
        self.stash_properties(element, &mut table, &ctrl_id);
        self.state.record_member(&ctrl_id);
        self.controls.push(table);

        self.state.push_repeating(&name, &binding, &ctrl_id);
        self.state.grid.next_row();
        self.walk_children(element);
        self.state.pop_context();
    }

    /// Resolves an `apply-templates mode=...` reference. The same mode can
    /// be reached through more than one caller; only the first resolution
    /// emits records.
    fn resolve_indirection(&mut self, mode: &str, select: &str) {
        if self.state.mode_visited(mode) {
            return;
        }
        // Guards self-recursive templates as well as sibling re-entry
        self.state.mark_mode_visited(mode);

        let Some(template) = self.templates.get(mode).copied() else {
            tracing::debug!("Unresolved template mode '{}'", mode);
            return;
        };

        match classify_indirection(select, Some(template), self.state.in_repeating()) {
            IndirectionKind::Repeating { name, binding } => {
                // a repeating context must always carry a name
                let name = if name.is_empty() { mode.to_string() } else { name };
                self.state.grid.next_row();
                self.state.push_repeating(&name, &binding, "");
                self.walk_children(template);
                self.state.pop_context();
            }
            IndirectionKind::PassThrough => {
                // Controls of the referenced block inherit whatever
                // context is already open
                self.walk_children(template);
            }
        }
    }

    /// Applies the current context to a new record. Repeating context
    /// takes precedence so a control inside both kinds records only the
    /// repeating attribution.
    fn attribute_context(&self, control: &mut ControlDefinition) {
        if let Some((name, binding)) = self.state.current_repeating() {
            control.is_in_repeating = true;
            control.repeating_section_name = name.to_string();
            control.repeating_section_binding = binding.to_string();
        } else if let Some((name, section_type)) = self.state.current_section() {
            control.parent_section = name.to_string();
            control.section_type = section_type.to_string();
        }
    }

    fn stash_properties(
        &self,
        element: &'a ViewElement,
        control: &mut ControlDefinition,
        ctrl_id: &str,
    ) {
        if !ctrl_id.is_empty() {
            control
                .properties
                .insert("CtrlId".to_string(), ctrl_id.to_string());
        }
        for key in ["class", "title", "style"] {
            if let Some(value) = element.attr(key) {
                control.properties.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Binding path of a bound control: `xd:binding` first, then the html
/// `name` attribute
fn control_binding(element: &ViewElement) -> String {
    element
        .attr("binding")
        .or_else(|| element.attr("name"))
        .unwrap_or("")
        .to_string()
}

fn plain_section_name(element: &ViewElement) -> String {
    let binding = element.attr_or_default("binding");
    if !binding.is_empty() {
        return last_segment(binding).to_string();
    }
    fallback_section_name(element, "Section")
}

fn fallback_section_name(element: &ViewElement, default: &str) -> String {
    if let Some(title) = element.attr("title").filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    let ctrl_id = element.attr_or_default("CtrlId");
    if !ctrl_id.is_empty() {
        return ctrl_id.to_string();
    }
    default.to_string()
}

/// Collection reference of a repeating-section element: a multi-segment
/// select of a direct child indirection first, then the element's own
/// binding, then any child indirection select
fn repeating_section_select(element: &ViewElement) -> String {
    let mut single = String::new();
    for child in element.child_elements() {
        if let Some((_, select)) = template_indirection(child) {
            if path_segments(&select).len() >= 2 {
                return select;
            }
            if single.is_empty() {
                single = select;
            }
        }
    }
    let binding = element.attr_or_default("binding");
    if !binding.is_empty() {
        return binding.to_string();
    }
    single
}

/// Collection reference of a repeating table: the `for-each` select inside
/// its repeating body, else the table's own binding
fn repeating_table_binding(element: &ViewElement) -> String {
    for body in element.child_elements() {
        if body.local_name().eq_ignore_ascii_case("tbody") {
            if let Some(for_each) = body.find_descendant(&|e| e.local_name() == "for-each") {
                let select = for_each.attr_or_default("select");
                if !select.is_empty() {
                    return select.to_string();
                }
            }
        }
    }
    element.attr_or_default("binding").to_string()
}

/// Fills the option list and default of choice controls
fn extract_options(
    element: &ViewElement,
    parent: Option<&ViewElement>,
    control_type: &ControlType,
    control: &mut ControlDefinition,
) {
    match control_type {
        ControlType::DropDown | ControlType::ComboBox | ControlType::ListBox => {
            let mut order = 0;
            for child in element.child_elements() {
                if child.local_name().eq_ignore_ascii_case("option") {
                    let value = child.attr_or_default("value").to_string();
                    let display = {
                        let text = child.direct_label_text();
                        if text.is_empty() {
                            value.clone()
                        } else {
                            text
                        }
                    };
                    let is_default = child.attr("selected").is_some();
                    if is_default && control.default_value.is_empty() {
                        control.default_value = value.clone();
                    }
                    control.options.push(ControlOption {
                        value,
                        display,
                        order,
                        is_default,
                    });
                    order += 1;
                }
            }
        }
        ControlType::OptionButton => {
            // Option set comes from sibling peers sharing the group name
            let group = element.attr_or_default("name");
            if let (Some(parent), false) = (parent, group.is_empty()) {
                let mut order = 0;
                for peer in parent.child_elements() {
                    if peer.local_name().eq_ignore_ascii_case("input")
                        && peer.attr_or_default("name") == group
                    {
                        let value = peer.attr_or_default("value").to_string();
                        let is_default = peer.attr("checked").is_some();
                        if is_default && control.default_value.is_empty() {
                            control.default_value = value.clone();
                        }
                        control.options.push(ControlOption {
                            display: value.clone(),
                            value,
                            order,
                            is_default,
                        });
                        order += 1;
                    }
                }
            }
        }
        ControlType::CheckBox => {
            let on = element.attr_or_default("onValue");
            let off = element.attr_or_default("offValue");
            if !on.is_empty() || !off.is_empty() {
                for (order, value) in [on, off].iter().filter(|v| !v.is_empty()).enumerate() {
                    control.options.push(ControlOption {
                        value: value.to_string(),
                        display: value.to_string(),
                        order: order as u32,
                        is_default: false,
                    });
                }
            } else {
                // checkbox groups behave like radio groups: the option set
                // comes from peers sharing the group name
                let group = element.attr_or_default("name");
                if let (Some(parent), false) = (parent, group.is_empty()) {
                    let mut order = 0;
                    for peer in parent.child_elements() {
                        if peer.local_name().eq_ignore_ascii_case("input")
                            && peer.attr_or_default("name") == group
                        {
                            let value = peer.attr_or_default("value").to_string();
                            control.options.push(ControlOption {
                                display: value.clone(),
                                value,
                                order,
                                is_default: peer.attr("checked").is_some(),
                            });
                            order += 1;
                        }
                    }
                }
            }
            if element.attr("checked").is_some() {
                control.default_value = if on.is_empty() { "true".to_string() } else { on.to_string() };
            }
        }
        _ => {
            if element.local_name().eq_ignore_ascii_case("input") {
                control.default_value = element.attr_or_default("value").to_string();
            }
        }
    }
}
