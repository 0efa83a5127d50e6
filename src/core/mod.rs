/*!
# Issue Collection

Best-effort parsing never aborts the overall run: a failure inside one
phase leaves that phase's contribution empty and is recorded here instead
of propagating. The collector travels with the analysis and ends up on
the CLI/report surface.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of one recorded issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLevel::Error => write!(f, "ERROR"),
            IssueLevel::Warning => write!(f, "WARNING"),
            IssueLevel::Info => write!(f, "INFO"),
        }
    }
}

/// Analysis phase an issue was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParsePhase {
    Manifest,
    ViewParse,
    LabelAssociation,
    LabelMerge,
    DynamicSections,
    PostProcess,
}

impl fmt::Display for ParsePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParsePhase::Manifest => "manifest",
            ParsePhase::ViewParse => "view-parse",
            ParsePhase::LabelAssociation => "label-association",
            ParsePhase::LabelMerge => "label-merge",
            ParsePhase::DynamicSections => "dynamic-sections",
            ParsePhase::PostProcess => "post-process",
        };
        write!(f, "{}", name)
    }
}

/// One recorded issue with its origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseIssue {
    pub message: String,
    pub phase: ParsePhase,
    /// View the issue belongs to, empty for form-level phases
    pub view: String,
    pub level: IssueLevel,
}

impl ParseIssue {
    pub fn new(message: impl Into<String>, phase: ParsePhase, level: IssueLevel) -> Self {
        Self {
            message: message.into(),
            phase,
            view: String::new(),
            level,
        }
    }

    pub fn in_view(mut self, view: impl Into<String>) -> Self {
        self.view = view.into();
        self
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.phase)?;
        if !self.view.is_empty() {
            write!(f, " ({})", self.view)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Collected issues of one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueCollector {
    pub issues: Vec<ParseIssue>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ParseIssue) {
        self.issues.push(issue);
    }

    pub fn warn(&mut self, message: impl Into<String>, phase: ParsePhase) {
        self.add(ParseIssue::new(message, phase, IssueLevel::Warning));
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.level == IssueLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.level == IssueLevel::Warning)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn merge(&mut self, other: IssueCollector) {
        self.issues.extend(other.issues);
    }
}

impl fmt::Display for IssueCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}
