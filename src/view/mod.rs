/*!
# View Parsing

Everything that turns one view template into a `ViewDefinition`: the
owned DOM, the grid/context tracker, the element classifier, the core
recursive traversal, the label refinement passes and the independent
dynamic-section scan.
*/

pub mod classifier;
pub mod context;
pub mod dom;
pub mod dynamic;
pub mod labels;
pub mod parser;

pub use classifier::{classify, classify_indirection, ElementClass, IndirectionKind};
pub use context::{decode_grid_token, GridTracker, ParseState};
pub use dom::{parse_view_tree, ViewElement, ViewNode};
pub use dynamic::extract_dynamic_sections;
pub use labels::{associate_labels, merge_label_fragments};
pub use parser::{parse_view, parse_view_source};
