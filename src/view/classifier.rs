/*!
# Element Classification

Pure decision logic mapping one markup element to its structural role.
First match wins, in the order the rules are written; an element matching
nothing is a pass-through container, never an error.

Template-mode indirection (`xsl:apply-templates mode=...`) is recognized
here but disambiguated separately by [`classify_indirection`], because the
repeating-vs-conditional decision needs the referenced template block and
the enclosing context, not just the invoking element.
*/

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::ControlType;
use crate::view::dom::ViewElement;

/// Contact Selector ActiveX class id (the people picker)
pub const PEOPLE_PICKER_CLSID: &str = "61e40d31-993d-4777-8fa0-19ca59b6d0bb";

/// `xctname` values that mark structure rather than a bound control
const STRUCTURAL_XCTNAMES: &[&str] = &[
    "Section",
    "OptionalSection",
    "RepeatingSection",
    "RepeatingTable",
    "ExpressionBox",
];

const LABEL_TAGS: &[&str] = &["b", "strong", "em", "h1", "h2", "h3", "h4", "h5", "h6"];

static BOLD_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)font-weight\s*:\s*bold").unwrap());

static DATE_BINDING_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)date|when|due").unwrap());

static BOOLEAN_BINDING_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:is|has|can)[A-Z_]|(?i:flag|enabled)").unwrap());

/// Structural role of one view element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementClass {
    Label,
    BoundControl(ControlType),
    PlainSection,
    RepeatingSection,
    RepeatingTable,
    TemplateIndirection { mode: String, select: String },
    PassThrough,
}

/// Classifies one element. Pure: no traversal state is consulted here.
pub fn classify(element: &ViewElement) -> ElementClass {
    if let Some((mode, select)) = template_indirection(element) {
        return ElementClass::TemplateIndirection { mode, select };
    }

    // 1. Recognized control-kind attribute that is not a structural marker
    if let Some(xctname) = element.attr("xctname") {
        if !STRUCTURAL_XCTNAMES.iter().any(|s| s.eq_ignore_ascii_case(xctname)) {
            return ElementClass::BoundControl(map_xctname(xctname));
        }
    }

    // 2. Repeating table
    if element.local_name().eq_ignore_ascii_case("table")
        && (element.class_contains("xdRepeatingTable")
            || has_repeating_body(element)
            || xctname_is(element, "RepeatingTable"))
    {
        return ElementClass::RepeatingTable;
    }

    // 3. Repeating section
    if element.class_contains("xdRepeating")
        || xctname_is(element, "RepeatingSection")
        || has_collection_indirection(element)
    {
        return ElementClass::RepeatingSection;
    }

    // 4. Plain / optional section
    if element.class_contains("xdSection")
        || xctname_is(element, "Section")
        || xctname_is(element, "OptionalSection")
    {
        return ElementClass::PlainSection;
    }

    // 5. Stand-alone emphasis with text and nothing interactive inside
    if is_label_shaped(element)
        && !element.has_interactive_descendant()
        && !element.direct_label_text().is_empty()
    {
        return ElementClass::Label;
    }

    // 6. Plain HTML form elements
    match element.local_name().to_ascii_lowercase().as_str() {
        "input" => {
            return ElementClass::BoundControl(input_type(element.attr_or_default("type")))
        }
        "select" => return ElementClass::BoundControl(ControlType::DropDown),
        "textarea" => return ElementClass::BoundControl(ControlType::RichText),
        // 7. Embedded objects
        "object" => {
            let classid = element.attr_or_default("classid");
            if classid.to_ascii_lowercase().contains(PEOPLE_PICKER_CLSID) {
                return ElementClass::BoundControl(ControlType::PeoplePicker);
            }
            return ElementClass::BoundControl(ControlType::ActiveX);
        }
        _ => {}
    }

    // 8. Bare data binding with no recognized control kind
    if element.attr("binding").is_some() {
        return ElementClass::BoundControl(infer_bound_type(element));
    }

    // 9. Nothing recognized: descend without emitting a record
    ElementClass::PassThrough
}

/// `xsl:apply-templates` with a mode attribute
pub fn template_indirection(element: &ViewElement) -> Option<(String, String)> {
    if element.local_name() != "apply-templates" {
        return None;
    }
    let mode = element.attr("mode")?;
    Some((
        mode.to_string(),
        element.attr_or_default("select").to_string(),
    ))
}

fn xctname_is(element: &ViewElement, value: &str) -> bool {
    element
        .attr("xctname")
        .map(|v| v.eq_ignore_ascii_case(value))
        .unwrap_or(false)
}

fn has_repeating_body(element: &ViewElement) -> bool {
    element
        .child_elements()
        .any(|child| child.local_name().eq_ignore_ascii_case("tbody") && xctname_is(child, "RepeatingTable"))
}

/// Direct child indirection selecting a multi-segment path
fn has_collection_indirection(element: &ViewElement) -> bool {
    element.child_elements().any(|child| {
        template_indirection(child)
            .map(|(_, select)| path_segments(&select).len() >= 2)
            .unwrap_or(false)
    })
}

fn is_label_shaped(element: &ViewElement) -> bool {
    let local = element.local_name().to_ascii_lowercase();
    if LABEL_TAGS.contains(&local.as_str()) {
        return true;
    }
    matches!(local.as_str(), "div" | "span" | "td")
        && element
            .attr("style")
            .map(|s| BOLD_STYLE.is_match(s))
            .unwrap_or(false)
}

/// Fixed `xctname` -> control type table; unrecognized tokens pass through
/// verbatim
pub fn map_xctname(xctname: &str) -> ControlType {
    if xctname.to_ascii_lowercase().contains(PEOPLE_PICKER_CLSID) {
        return ControlType::PeoplePicker;
    }
    match xctname {
        "PlainText" => ControlType::Text,
        "RichText" => ControlType::RichText,
        "DTPicker" => ControlType::DatePicker,
        "CheckBox" => ControlType::CheckBox,
        "OptionButton" => ControlType::OptionButton,
        "dropdown" | "DropDown" => ControlType::DropDown,
        "combobox" | "ComboBox" => ControlType::ComboBox,
        "ListBox" => ControlType::ListBox,
        "FileAttachment" => ControlType::FileAttachment,
        "inkpicture" | "InkPicture" => ControlType::InkPicture,
        "Button" => ControlType::Button,
        "hyperlink" | "Hyperlink" => ControlType::Hyperlink,
        other => ControlType::Other(other.to_string()),
    }
}

fn input_type(type_attr: &str) -> ControlType {
    match type_attr.to_ascii_lowercase().as_str() {
        "checkbox" => ControlType::CheckBox,
        "radio" => ControlType::OptionButton,
        "button" | "submit" | "reset" => ControlType::Button,
        "date" => ControlType::DatePicker,
        _ => ControlType::Text,
    }
}

/// Type inference for elements that carry only a binding: CSS class hints
/// first, then binding-path heuristics, then the tag itself
fn infer_bound_type(element: &ViewElement) -> ControlType {
    if element.class_contains("xdTextBox") {
        return ControlType::Text;
    }
    if element.class_contains("xdRichTextBox") {
        return ControlType::RichText;
    }
    if element.class_contains("xdDTPicker") || element.class_contains("xdDTText") {
        return ControlType::DatePicker;
    }
    if element.class_contains("xdComboBox") {
        return ControlType::ComboBox;
    }
    if element.class_contains("xdListBox") {
        return ControlType::ListBox;
    }
    if element.class_contains("xdBehavior_Boolean") {
        return ControlType::CheckBox;
    }

    let field = last_segment(element.attr_or_default("binding"));
    if DATE_BINDING_HINT.is_match(field) {
        return ControlType::DatePicker;
    }
    if BOOLEAN_BINDING_HINT.is_match(field) {
        return ControlType::CheckBox;
    }

    match element.local_name().to_ascii_lowercase().as_str() {
        "select" => ControlType::DropDown,
        "textarea" => ControlType::RichText,
        _ => ControlType::Text,
    }
}

/// How a template-mode indirection should be traversed
#[derive(Debug, Clone, PartialEq)]
pub enum IndirectionKind {
    /// Iterates a collection: push a repeating context named after it
    Repeating { name: String, binding: String },
    /// Conditional inclusion or plain reuse: controls inherit the
    /// currently-open context
    PassThrough,
}

/// Disambiguates repetition from conditional/plain reuse.
///
/// Pure function of the select-path shape, the referenced template block
/// and whether a repeating context is already open, so it is testable
/// without any tree traversal.
pub fn classify_indirection(
    select: &str,
    template: Option<&ViewElement>,
    in_repeating: bool,
) -> IndirectionKind {
    // An explicit looping construct in the block settles it
    if let Some(block) = template {
        if block.has_descendant(&|e| e.local_name() == "for-each") {
            return IndirectionKind::Repeating {
                name: collection_name(select),
                binding: select.to_string(),
            };
        }
    }

    let segments = path_segments(select);
    if segments.len() >= 2 {
        let parent = segments[segments.len() - 2];
        let child = segments[segments.len() - 1];
        if is_collection_pair(parent, child) {
            return IndirectionKind::Repeating {
                name: parent.to_string(),
                binding: select.to_string(),
            };
        }
    } else if in_repeating {
        // A nested, non-collection reference inside an already-repeating
        // block is not a second repetition level
        return IndirectionKind::PassThrough;
    }

    IndirectionKind::PassThrough
}

/// Plural-parent/singular-child and collection-suffix matching.
/// English naming only; anything else falls through as non-repeating.
pub fn is_collection_pair(parent: &str, child: &str) -> bool {
    let parent = parent.to_ascii_lowercase();
    let child = child.to_ascii_lowercase();
    if parent == child {
        return true;
    }
    if parent == format!("{}s", child) || parent == format!("{}es", child) {
        return true;
    }
    if let Some(stem) = child.strip_suffix('y') {
        if parent == format!("{}ies", stem) {
            return true;
        }
    }
    for suffix in ["list", "collection", "array"] {
        if let Some(stripped) = parent.strip_suffix(suffix) {
            if !stripped.is_empty() && stripped == child {
                return true;
            }
        }
    }
    false
}

/// Display name of the collection a select path iterates: the parent
/// segment when there is one, the sole segment otherwise
pub fn collection_name(select: &str) -> String {
    let segments = path_segments(select);
    match segments.len() {
        0 => String::new(),
        1 => segments[0].to_string(),
        n => segments[n - 2].to_string(),
    }
}

/// Path segments with namespace prefixes and `.`/`..` steps stripped
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(|seg| seg.rsplit(':').next().unwrap_or(seg).trim())
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect()
}

/// Last path segment without its namespace prefix
pub fn last_segment(path: &str) -> &str {
    path_segments(path).last().copied().unwrap_or("")
}
