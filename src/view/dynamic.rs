/*!
# Dynamic Section Extraction

Independent single pass over a view's raw tree, separate from the main
traversal: finds template-mode blocks whose entire content is gated by an
immediate conditional guard and records which controls they show or hide.

Blocks with a looping construct, or whose guard is not the first content,
are ignored here; repetition belongs to the main traversal's
classification.
*/

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::DynamicSection;
use crate::view::classifier::last_segment;
use crate::view::dom::ViewElement;

/// First field reference in a condition: a step with a namespace prefix,
/// optionally preceded by parent steps
static FIELD_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\.\./)*((?:[A-Za-z_][\w-]*:)?[A-Za-z_][\w-]*(?:/(?:[A-Za-z_][\w-]*:)?[A-Za-z_][\w-]*)*)")
        .unwrap()
});

static QUOTED_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).unwrap());

/// XPath callables that must not be mistaken for field references
const CONDITION_FUNCTIONS: &[&str] = &[
    "contains", "not", "string", "number", "boolean", "count", "sum",
    "substring", "normalize-space", "starts-with", "true", "false",
];

/// Scans one view tree for conditionally-guarded template blocks
pub fn extract_dynamic_sections(root: &ViewElement) -> Vec<DynamicSection> {
    let mut sections = Vec::new();
    let mut seen_modes: HashSet<&str> = HashSet::new();

    let mut references: Vec<&str> = Vec::new();
    root.for_each_element(&mut |element| {
        if let Some(mode) = element.attr("mode") {
            if element.local_name() == "apply-templates" {
                references.push(mode);
            }
        }
    });

    for mode in references {
        if !seen_modes.insert(mode) {
            continue;
        }
        let Some(template) = find_template(root, mode) else {
            continue;
        };
        if let Some(section) = qualify_block(template) {
            sections.push(section);
        }
    }

    if !sections.is_empty() {
        tracing::debug!("Extracted {} dynamic sections", sections.len());
    }
    sections
}

fn find_template<'a>(root: &'a ViewElement, mode: &str) -> Option<&'a ViewElement> {
    root.find_descendant(&|e| e.local_name() == "template" && e.attr("mode") == Some(mode))
        .or_else(|| {
            (root.local_name() == "template" && root.attr("mode") == Some(mode)).then_some(root)
        })
}

/// A block qualifies when its first content is a conditional guard and it
/// contains no looping construct
fn qualify_block(template: &ViewElement) -> Option<DynamicSection> {
    if template.has_descendant(&|e| e.local_name() == "for-each") {
        return None;
    }

    let guard = template.first_child_element()?;
    let condition = match guard.local_name() {
        "if" => guard.attr("test")?.to_string(),
        "choose" => guard
            .find_descendant(&|e| e.local_name() == "when")
            .and_then(|when| when.attr("test"))?
            .to_string(),
        _ => return None,
    };

    let driving_field = extract_driving_field(&condition);
    let comparison_value = extract_comparison_literal(&condition);

    // The guarded region is identified by an inner element carrying both a
    // stable id and a caption-like attribute; missing markup degrades to
    // the guard itself with empty identity
    let region = guard.find_descendant(&|e| {
        e.attr("CtrlId").is_some() && (e.attr("caption").is_some() || e.attr("title").is_some())
    });

    let (control_id, caption, scope) = match region {
        Some(element) => (
            element.attr_or_default("CtrlId").to_string(),
            element
                .attr("caption")
                .or_else(|| element.attr("title"))
                .unwrap_or("")
                .to_string(),
            element,
        ),
        None => (String::new(), String::new(), guard),
    };

    let mut controls = Vec::new();
    scope.for_each_element(&mut |element| {
        if !std::ptr::eq(element, scope) {
            if let Some(id) = element.attr("CtrlId") {
                if !id.is_empty() {
                    controls.push(id.to_string());
                }
            }
        }
    });

    Some(DynamicSection {
        condition,
        driving_field,
        comparison_value,
        control_id,
        caption,
        controls,
    })
}

/// First field-reference token inside the condition text
pub fn extract_driving_field(condition: &str) -> String {
    // literals must not be mistaken for references
    let stripped = QUOTED_LITERAL.replace_all(condition, "\"\"");
    for capture in FIELD_REFERENCE.captures_iter(&stripped) {
        let whole = capture.get(0).unwrap();
        let path = &capture[1];
        let head = path.split('/').next().unwrap_or(path);
        if !head.contains(':') && !whole.as_str().starts_with("../") {
            let callable = stripped[whole.end()..].trim_start().starts_with('(');
            if callable || CONDITION_FUNCTIONS.contains(&head) {
                continue;
            }
        }
        return last_segment(path).to_string();
    }
    String::new()
}

/// First quoted literal inside a `contains(...)` or equality comparison
pub fn extract_comparison_literal(condition: &str) -> String {
    QUOTED_LITERAL
        .captures(condition)
        .map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
        .unwrap_or_default()
}
