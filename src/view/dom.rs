/*!
# View Template DOM

Owned element tree over a single view template (.xsl), built from a
quick-xml event stream. The traversal layers operate on this tree rather
than on raw events because classification needs lookahead into children,
siblings and separately-defined template blocks.

Building is lenient: a malformed tail terminates tree building with a
warning and whatever was already built survives. Qualified names
(`xsl:apply-templates`, `xd:binding`) are kept verbatim.
*/

use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One node of a parsed view tree
#[derive(Debug, Clone)]
pub enum ViewNode {
    Element(ViewElement),
    Text(String),
}

/// One element of a parsed view tree
#[derive(Debug, Clone, Default)]
pub struct ViewElement {
    /// Qualified tag name as written, e.g. `xsl:apply-templates`
    pub name: String,
    /// Attributes in document order, qualified names kept
    pub attributes: Vec<(String, String)>,
    pub children: Vec<ViewNode>,
}

/// Tags whose text is still part of an enclosing label
const INLINE_EMPHASIS_TAGS: &[&str] = &["b", "strong", "em", "i", "u", "font"];

/// Tags that make an element interactive rather than a label
const INTERACTIVE_TAGS: &[&str] = &["input", "select", "textarea", "button", "object"];

impl ViewElement {
    /// Tag name without its namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Attribute lookup by qualified name, falling back to the local part
    /// (`attr("binding")` matches `xd:binding`)
    pub fn attr(&self, name: &str) -> Option<&str> {
        if let Some((_, value)) = self.attributes.iter().find(|(k, _)| k == name) {
            return Some(value.as_str());
        }
        self.attributes
            .iter()
            .find(|(k, _)| k.rsplit(':').next() == Some(name))
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value or the empty string; missing markup never fails
    pub fn attr_or_default(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    /// True when the `class` attribute contains the given token
    pub fn class_contains(&self, token: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c.eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &ViewElement> {
        self.children.iter().filter_map(|node| match node {
            ViewNode::Element(e) => Some(e),
            ViewNode::Text(_) => None,
        })
    }

    /// First child element, skipping interleaved text
    pub fn first_child_element(&self) -> Option<&ViewElement> {
        self.child_elements().next()
    }

    /// Direct text plus text inside inline-emphasis children, whitespace
    /// collapsed. Nested interactive markup contributes nothing.
    pub fn direct_label_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        self.collect_label_text(&mut parts);
        let joined = parts.join(" ");
        joined.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_label_text(&self, parts: &mut Vec<String>) {
        for child in &self.children {
            match child {
                ViewNode::Text(text) => {
                    if !text.trim().is_empty() {
                        parts.push(text.trim().to_string());
                    }
                }
                ViewNode::Element(element) => {
                    if INLINE_EMPHASIS_TAGS
                        .iter()
                        .any(|t| element.local_name().eq_ignore_ascii_case(t))
                    {
                        element.collect_label_text(parts);
                    }
                }
            }
        }
    }

    /// All descendant text, whitespace collapsed (captions, conditions)
    pub fn text_content(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        self.collect_all_text(&mut parts);
        parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_all_text(&self, parts: &mut Vec<String>) {
        for child in &self.children {
            match child {
                ViewNode::Text(text) => {
                    if !text.trim().is_empty() {
                        parts.push(text.trim().to_string());
                    }
                }
                ViewNode::Element(element) => element.collect_all_text(parts),
            }
        }
    }

    /// True when any descendant is an interactive control
    pub fn has_interactive_descendant(&self) -> bool {
        self.child_elements().any(|child| {
            INTERACTIVE_TAGS
                .iter()
                .any(|t| child.local_name().eq_ignore_ascii_case(t))
                || child.attr("xctname").is_some()
                || child.attr("binding").is_some()
                || child.has_interactive_descendant()
        })
    }

    /// Depth-first visit over this element and all element descendants
    pub fn for_each_element<'a>(&'a self, visit: &mut impl FnMut(&'a ViewElement)) {
        visit(self);
        for child in self.child_elements() {
            child.for_each_element(visit);
        }
    }

    /// First descendant (depth-first, self excluded) matching the predicate
    pub fn find_descendant(&self, pred: &impl Fn(&ViewElement) -> bool) -> Option<&ViewElement> {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(pred) {
                return Some(found);
            }
        }
        None
    }

    /// True when any descendant matches the predicate
    pub fn has_descendant(&self, pred: &impl Fn(&ViewElement) -> bool) -> bool {
        self.find_descendant(pred).is_some()
    }
}

/// Parses one view template into an element tree.
///
/// Stops at the first XML error with a warning, keeping everything parsed
/// up to that point; only a document without any root element is an error.
pub fn parse_view_tree(content: &str) -> Result<ViewElement> {
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<ViewElement> = Vec::new();
    let mut root: Option<ViewElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                stack.push(element_from_start(e));
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e);
                attach(&mut stack, &mut root, ViewNode::Element(element));
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.trim().is_empty() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(ViewNode::Text(text));
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).to_string();
                if !text.trim().is_empty() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(ViewNode::Text(text));
                    }
                }
            }
            Ok(Event::End(_)) => {
                if let Some(done) = stack.pop() {
                    attach(&mut stack, &mut root, ViewNode::Element(done));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("View XML error at byte {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    // Unbalanced tail: fold whatever is still open back into its parents
    while let Some(done) = stack.pop() {
        attach(&mut stack, &mut root, ViewNode::Element(done));
    }

    root.ok_or_else(|| anyhow!("view template has no root element"))
}

fn element_from_start(e: &quick_xml::events::BytesStart) -> ViewElement {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attributes.push((key, value));
    }
    ViewElement {
        name,
        attributes,
        children: Vec::new(),
    }
}

fn attach(stack: &mut [ViewElement], root: &mut Option<ViewElement>, node: ViewNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if let ViewNode::Element(element) = node {
        // First completed top-level element becomes the document root
        if root.is_none() {
            *root = Some(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tree() {
        let tree = parse_view_tree(
            r#"<div class="outer"><span xd:binding="my:Name" xd:CtrlId="CTRL1">x</span></div>"#,
        )
        .unwrap();

        assert_eq!(tree.name, "div");
        assert!(tree.class_contains("outer"));
        let span = tree.first_child_element().unwrap();
        assert_eq!(span.local_name(), "span");
        assert_eq!(span.attr("binding"), Some("my:Name"));
        assert_eq!(span.attr("xd:CtrlId"), Some("CTRL1"));
    }

    #[test]
    fn test_attr_unescapes_entities() {
        let tree =
            parse_view_tree(r#"<xsl:if test="contains(../my:field, &quot;Yes&quot;)"/>"#).unwrap();
        assert_eq!(tree.attr("test"), Some(r#"contains(../my:field, "Yes")"#));
    }

    #[test]
    fn test_direct_label_text_ignores_interactive() {
        let tree = parse_view_tree(
            r#"<div>Employee <strong>name</strong><input type="text" value="x"/></div>"#,
        )
        .unwrap();
        assert_eq!(tree.direct_label_text(), "Employee name");
    }

    #[test]
    fn test_has_interactive_descendant() {
        let with = parse_view_tree(r#"<div><p><input type="text"/></p></div>"#).unwrap();
        assert!(with.has_interactive_descendant());

        let without = parse_view_tree(r#"<div><b>Title</b></div>"#).unwrap();
        assert!(!without.has_interactive_descendant());
    }

    #[test]
    fn test_malformed_tail_keeps_prefix() {
        let tree = parse_view_tree(r#"<div><span>ok</span><broken"#).unwrap();
        assert_eq!(tree.name, "div");
        assert_eq!(tree.child_elements().count(), 1);
    }

    #[test]
    fn test_qualified_names_kept() {
        let tree =
            parse_view_tree(r#"<xsl:template match="my:g" mode="_1"><div/></xsl:template>"#)
                .unwrap();
        assert_eq!(tree.name, "xsl:template");
        assert_eq!(tree.local_name(), "template");
        assert_eq!(tree.attr("mode"), Some("_1"));
    }
}
