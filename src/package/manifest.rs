/*!
# Manifest Parsing

Single-pass scan of a form package's `manifest.xsf`: the form name, the
declared views with their transform files, and the declarative rules.

The manifest is trusted input produced by the original authoring tool;
missing attributes resolve to empty strings rather than failures.
*/

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::model::FormRule;

/// One view declaration from the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewEntry {
    pub name: String,
    pub caption: String,
    /// The .xsl file rendering this view
    pub transform: String,
}

/// Everything the analyzer needs from manifest.xsf
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestInfo {
    pub form_name: String,
    pub default_view: String,
    /// Views in declaration order
    pub views: Vec<ViewEntry>,
    pub rules: Vec<FormRule>,
}

/// Parses manifest.xsf content
pub fn parse_manifest(content: &str) -> Result<ManifestInfo> {
    let mut reader = Reader::from_str(content);

    let mut info = ManifestInfo::default();
    let mut current_view: Option<ViewEntry> = None;
    let mut current_rule: Option<FormRule> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .context("malformed manifest XML")?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(&event, Event::Empty(_));
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "xDocumentClass" => {
                        info.form_name = attr_value(e, "name");
                    }
                    "views" => {
                        info.default_view = attr_value(e, "default");
                    }
                    "view" => {
                        let view = ViewEntry {
                            name: attr_value(e, "name"),
                            caption: attr_value(e, "caption"),
                            transform: attr_value(e, "transform"),
                        };
                        if is_empty {
                            info.views.push(view);
                        } else {
                            current_view = Some(view);
                        }
                    }
                    "mainpane" => {
                        // the transform usually sits on the main pane
                        if let Some(ref mut view) = current_view {
                            if view.transform.is_empty() {
                                view.transform = attr_value(e, "transform");
                            }
                        }
                    }
                    "rule" => {
                        let rule = FormRule {
                            name: attr_value(e, "caption"),
                            condition: attr_value(e, "condition"),
                            actions: Vec::new(),
                            is_enabled: attr_value(e, "isEnabled") != "no",
                        };
                        if is_empty {
                            info.rules.push(rule);
                        } else {
                            current_rule = Some(rule);
                        }
                    }
                    other => {
                        if let Some(ref mut rule) = current_rule {
                            if other.ends_with("Action") {
                                rule.actions.push(other.to_string());
                            }
                        }
                    }
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()).as_str() {
                "view" => {
                    if let Some(view) = current_view.take() {
                        info.views.push(view);
                    }
                }
                "rule" => {
                    if let Some(rule) = current_rule.take() {
                        info.rules.push(rule);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!(
        "Manifest '{}': {} views, {} rules",
        info.form_name,
        info.views.len(),
        info.rules.len()
    );
    Ok(info)
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    name.rsplit(':').next().unwrap_or(&name).to_string()
}

fn attr_value(e: &quick_xml::events::BytesStart, name: &str) -> String {
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == name || key.rsplit(':').next() == Some(name) {
            return attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    String::new()
}
