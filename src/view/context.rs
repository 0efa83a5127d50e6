/*!
# Grid and Context Tracking

Per-parse mutable state for one view walk: the 2-D grid cursor used for
label association, the tagged stack of structural contexts, duplicate-id
suppression and the template-mode reentrancy guard.

Every field lives inside [`ParseState`], constructed fresh for each view
parse. Nothing here is shared between parses, which is what makes parsing
distinct views in parallel safe.
*/

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{SectionInfo, SectionKind};
use crate::view::dom::ViewElement;

/// Minimum colspan treated as a full-width cell (row boundary)
const ROW_BREAK_COLSPAN: u32 = 3;

static HEAVY_TOP_BORDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)border-top[^;:]*:[^;]*?(\d+(?:\.\d+)?)\s*(?:pt|px)").unwrap()
});

/// Row/column cursor over the approximate 2-D layout of a view.
///
/// Columns advance by one per materialized control; a row boundary resets
/// the column to 1. Nested structures keep the same coordinate space so
/// controls across a nesting boundary stay comparable.
#[derive(Debug, Clone)]
pub struct GridTracker {
    row: u32,
    column: u32,
}

impl GridTracker {
    pub fn new() -> Self {
        Self { row: 1, column: 1 }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Current position as a grid token, e.g. `"12B"`
    pub fn token(&self) -> String {
        format!("{}{}", self.row, column_letters(self.column))
    }

    /// Advances the column after placing one control
    pub fn advance_control(&mut self) {
        self.column += 1;
    }

    pub fn next_row(&mut self) {
        self.row += 1;
        self.column = 1;
    }
}

impl Default for GridTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a 1-based column number as letters (1 -> A, 27 -> AA)
pub fn column_letters(column: u32) -> String {
    let mut n = column.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_else(|_| "A".to_string())
}

/// Decodes a grid token into (row, column); `"12B"` -> (12, 2)
pub fn decode_grid_token(token: &str) -> Option<(u32, u32)> {
    let split = token.find(|c: char| c.is_ascii_alphabetic())?;
    let row: u32 = token[..split].parse().ok()?;
    let mut column: u32 = 0;
    for c in token[split..].chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some((row, column))
}

/// True when the element signals the start of a new layout row
pub fn is_row_boundary(element: &ViewElement) -> bool {
    let local = element.local_name();
    if local.eq_ignore_ascii_case("tr") || local.eq_ignore_ascii_case("hr") {
        return true;
    }
    if let Some(colspan) = element.attr("colspan") {
        if colspan.trim().parse::<u32>().map(|n| n >= ROW_BREAK_COLSPAN).unwrap_or(false) {
            return true;
        }
    }
    if let Some(style) = element.attr("style") {
        if let Some(caps) = HEAVY_TOP_BORDER.captures(style) {
            if let Ok(width) = caps[1].parse::<f32>() {
                return width >= 2.0;
            }
        }
    }
    false
}

/// One open structural context during the walk.
///
/// Transient: frames exist only while the recursion is inside the region;
/// the persisted counterpart is the `SectionInfo` each frame keeps open.
#[derive(Debug, Clone)]
pub enum ContextFrame {
    Section {
        name: String,
        section_type: String,
        section_index: usize,
    },
    Repeating {
        name: String,
        binding: String,
        section_index: usize,
    },
}

impl ContextFrame {
    fn section_index(&self) -> usize {
        match self {
            ContextFrame::Section { section_index, .. }
            | ContextFrame::Repeating { section_index, .. } => *section_index,
        }
    }
}

/// All mutable state of one view parse
#[derive(Debug)]
pub struct ParseState {
    pub grid: GridTracker,
    context_stack: Vec<ContextFrame>,
    seen_ctrl_ids: HashSet<String>,
    visited_modes: HashSet<String>,
    next_document_index: u32,
    /// Closed and still-open structural regions, in discovery order
    pub sections: Vec<SectionInfo>,
}

impl ParseState {
    pub fn new() -> Self {
        Self {
            grid: GridTracker::new(),
            context_stack: Vec::new(),
            seen_ctrl_ids: HashSet::new(),
            visited_modes: HashSet::new(),
            next_document_index: 0,
            sections: Vec::new(),
        }
    }

    /// Next document index, strictly increasing, skipping nothing
    pub fn next_document_index(&mut self) -> u32 {
        let index = self.next_document_index;
        self.next_document_index += 1;
        index
    }

    /// Registers a stable control id; false means it was already seen and
    /// the record must be suppressed. Empty ids are never suppressed.
    pub fn register_ctrl_id(&mut self, ctrl_id: &str) -> bool {
        if ctrl_id.is_empty() {
            return true;
        }
        self.seen_ctrl_ids.insert(ctrl_id.to_string())
    }

    pub fn mode_visited(&self, mode: &str) -> bool {
        self.visited_modes.contains(mode)
    }

    pub fn mark_mode_visited(&mut self, mode: &str) {
        self.visited_modes.insert(mode.to_string());
    }

    /// Opens a plain-section context and its `SectionInfo`
    pub fn push_section(&mut self, name: &str, section_type: &str, ctrl_id: &str) {
        let section_index = self.open_section_info(name, SectionKind::Plain, ctrl_id);
        self.context_stack.push(ContextFrame::Section {
            name: name.to_string(),
            section_type: section_type.to_string(),
            section_index,
        });
    }

    /// Opens a repeating context (section or table) and its `SectionInfo`
    pub fn push_repeating(&mut self, name: &str, binding: &str, ctrl_id: &str) {
        let section_index = self.open_section_info(name, SectionKind::Repeating, ctrl_id);
        self.context_stack.push(ContextFrame::Repeating {
            name: name.to_string(),
            binding: binding.to_string(),
            section_index,
        });
    }

    fn open_section_info(&mut self, name: &str, kind: SectionKind, ctrl_id: &str) -> usize {
        let row = self.grid.row();
        self.sections.push(SectionInfo {
            name: name.to_string(),
            kind,
            control_id: ctrl_id.to_string(),
            start_row: row,
            end_row: row,
            controls: Vec::new(),
        });
        self.sections.len() - 1
    }

    /// Pops the innermost context, closing its `SectionInfo` at the current row
    pub fn pop_context(&mut self) {
        if let Some(frame) = self.context_stack.pop() {
            let row = self.grid.row();
            if let Some(info) = self.sections.get_mut(frame.section_index()) {
                info.end_row = row;
            }
        }
    }

    /// Innermost open repeating context, if any
    pub fn current_repeating(&self) -> Option<(&str, &str)> {
        self.context_stack.iter().rev().find_map(|frame| match frame {
            ContextFrame::Repeating { name, binding, .. } => {
                Some((name.as_str(), binding.as_str()))
            }
            _ => None,
        })
    }

    /// Innermost open plain-section context, if any
    pub fn current_section(&self) -> Option<(&str, &str)> {
        self.context_stack.iter().rev().find_map(|frame| match frame {
            ContextFrame::Section {
                name, section_type, ..
            } => Some((name.as_str(), section_type.as_str())),
            _ => None,
        })
    }

    pub fn in_repeating(&self) -> bool {
        self.current_repeating().is_some()
    }

    /// Records a materialized control on the innermost open region
    pub fn record_member(&mut self, ctrl_id: &str) {
        if ctrl_id.is_empty() {
            return;
        }
        if let Some(frame) = self.context_stack.last() {
            if let Some(info) = self.sections.get_mut(frame.section_index()) {
                info.controls.push(ctrl_id.to_string());
            }
        }
    }
}

impl Default for ParseState {
    fn default() -> Self {
        Self::new()
    }
}
