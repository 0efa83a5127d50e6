/*!
# InfoPath Form Analyzer

Reconstructs a structured, queryable model of a legacy InfoPath form
(views, controls, sections, repeating groups, data columns) from the
XSLT/HTML-flavored view templates of an extracted form package.

## Core

The heart of the crate is the structural view parser: a recursive-descent
walk over each view's markup tree that classifies elements (labels, bound
controls, sections, repeating sections, repeating tables, template-mode
indirections) into an ordered, de-duplicated control model, followed by
post-processing passes that fold the per-view output into a canonical
cross-view data-column model.

Parsing is best-effort and non-throwing: unrecognized elements pass
through, missing attributes become empty strings, and a failure in one
phase leaves that phase's contribution empty without aborting the run.

## Usage

```no_run
use infopath_analyzer::package::analyze_package;

let (form, issues) = analyze_package("./extracted/ExpenseReport")?;
for column in form.main_columns() {
    println!("{} ({})", column.name, column.column_type);
}
# anyhow::Ok(())
```

Downstream consumers read the finished [`model::FormDefinition`] graph
only: the schema generator emits T-SQL DDL over the data columns, and the
export module projects the model as JSON or a text summary.
*/

pub mod cli_common;
pub mod core;
pub mod export;
pub mod functions;
pub mod model;
pub mod package;
pub mod processor;
pub mod schema;
pub mod view;

// Re-export the types most callers need
pub use crate::core::{IssueCollector, IssueLevel, ParseIssue, ParsePhase};
pub use model::{
    ControlDefinition, ControlOption, ControlType, DataColumn, DynamicSection, FormDefinition,
    FormMetadata, FormRule, SectionInfo, SectionKind, ViewDefinition,
};
pub use package::{analyze_package, FormPackage, PackageError};
pub use view::{parse_view, parse_view_source, parse_view_tree};
