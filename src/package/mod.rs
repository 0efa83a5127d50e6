/*!
# Form Package Layer

Consumes an already-extracted InfoPath form package: a directory holding
`manifest.xsf`, the view transforms (`*.xsl`) and the schema files
(`*.xsd`). Container extraction itself happens upstream; the directory is
the input boundary.

[`analyze_package`] is the form-level driver: it parses every view with
fresh per-view state (views are independent, so they run in parallel),
runs the refinement passes and the dynamic-section scan, then hands the
combined output to the form-level post-processor.
*/

pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8};
use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::{IssueCollector, IssueLevel, ParseIssue, ParsePhase};
use crate::model::{DynamicSection, FormDefinition, GenerationMetadata, ViewDefinition};
use crate::processor::finalize_form;
use crate::view::dom::parse_view_tree;
use crate::view::dynamic::extract_dynamic_sections;
use crate::view::labels::{associate_labels, merge_label_fragments};
use crate::view::parser::parse_view;

pub use manifest::{parse_manifest, ManifestInfo, ViewEntry};

/// Typed failures of the package layer
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("no manifest (.xsf) found in {0}")]
    ManifestMissing(PathBuf),
    #[error("package {0} declares no views and contains no .xsl files")]
    NoViews(PathBuf),
}

/// An extracted form package on disk
#[derive(Debug, Clone)]
pub struct FormPackage {
    pub root: PathBuf,
    pub manifest: ManifestInfo,
    /// (view name, transform path) in manifest order
    pub view_files: Vec<(String, PathBuf)>,
    pub schema_files: Vec<PathBuf>,
}

impl FormPackage {
    /// Loads package structure from an extracted directory
    pub fn load_from_directory<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        tracing::info!("Loading form package from: {}", root.display());

        let manifest_path = find_manifest(&root)?;
        let manifest_content = read_text_file(&manifest_path)?;
        let manifest = parse_manifest(&manifest_content)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

        let mut view_files = Vec::new();
        for view in &manifest.views {
            if view.transform.is_empty() {
                continue;
            }
            let path = root.join(&view.transform);
            if path.exists() {
                view_files.push((view.name.clone(), path));
            } else {
                tracing::warn!("Declared view transform missing: {}", path.display());
            }
        }

        // Undeclared transforms still render something; fall back to a scan
        if view_files.is_empty() {
            let mut transforms = files_with_extension(&root, "xsl")?;
            transforms.sort();
            for path in transforms {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                view_files.push((name, path));
            }
        }

        if view_files.is_empty() {
            return Err(PackageError::NoViews(root).into());
        }

        let mut schema_files = files_with_extension(&root, "xsd")?;
        schema_files.sort();

        tracing::info!(
            "Package '{}': {} views, {} schema files",
            manifest.form_name,
            view_files.len(),
            schema_files.len()
        );

        Ok(FormPackage {
            root,
            manifest,
            view_files,
            schema_files,
        })
    }

    /// Finds extracted package directories under a root by their manifests
    pub fn find_packages<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
        let mut packages = Vec::new();
        for entry in WalkDir::new(root.as_ref())
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("xsf") {
                if let Some(parent) = path.parent() {
                    packages.push(parent.to_path_buf());
                }
            }
        }
        packages.sort();
        packages.dedup();
        packages
    }
}

/// Parses one package directory into the finished form model.
///
/// Best-effort: per-view and per-phase failures degrade to empty
/// contributions recorded in the returned collector; only a missing or
/// unreadable package is an error.
pub fn analyze_package<P: AsRef<Path>>(path: P) -> Result<(FormDefinition, IssueCollector)> {
    let package = FormPackage::load_from_directory(path)?;
    Ok(analyze(&package))
}

/// Runs the analysis over an already-loaded package
pub fn analyze(package: &FormPackage) -> (FormDefinition, IssueCollector) {
    let mut issues = IssueCollector::new();

    // Views share no mutable state, so they parse in parallel; collect()
    // keeps manifest order
    let results: Vec<(ViewDefinition, Vec<DynamicSection>, IssueCollector)> = package
        .view_files
        .par_iter()
        .map(|(name, path)| parse_one_view(name, path))
        .collect();

    let mut form = FormDefinition::new(friendly_form_name(&package.manifest.form_name));
    for (view, dynamic_sections, view_issues) in results {
        form.views.push(view);
        form.dynamic_sections.extend(dynamic_sections);
        issues.merge(view_issues);
    }
    form.rules = package.manifest.rules.clone();

    finalize_form(&mut form);
    form.generation_metadata = GenerationMetadata::now(package.root.display().to_string());

    tracing::info!(
        "Form '{}': {} controls, {} data columns, {} dynamic sections",
        form.name,
        form.metadata.control_count,
        form.data_columns.len(),
        form.dynamic_sections.len()
    );
    (form, issues)
}

/// Parses a single view file with fresh state, isolating each phase
fn parse_one_view(name: &str, path: &Path) -> (ViewDefinition, Vec<DynamicSection>, IssueCollector) {
    let mut issues = IssueCollector::new();
    let transform = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    let content = match read_text_file(path) {
        Ok(content) => content,
        Err(e) => {
            issues.add(
                ParseIssue::new(e.to_string(), ParsePhase::ViewParse, IssueLevel::Error)
                    .in_view(name),
            );
            return (ViewDefinition::new(name, transform), Vec::new(), issues);
        }
    };

    let tree = match parse_view_tree(&content) {
        Ok(tree) => tree,
        Err(e) => {
            issues.add(
                ParseIssue::new(e.to_string(), ParsePhase::ViewParse, IssueLevel::Warning)
                    .in_view(name),
            );
            return (ViewDefinition::new(name, transform), Vec::new(), issues);
        }
    };

    let mut view = parse_view(name, &transform, &tree);
    associate_labels(&mut view.controls);
    merge_label_fragments(&mut view.controls);
    let dynamic_sections = extract_dynamic_sections(&tree);

    (view, dynamic_sections, issues)
}

/// Reads a package file, sniffing the BOM: legacy packages mix UTF-8 and
/// UTF-16 transforms
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(decode_bytes(&bytes))
}

fn decode_bytes(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        let (text, _, _) = UTF_16LE.decode(bytes);
        text.into_owned()
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        let (text, _, _) = UTF_16BE.decode(bytes);
        text.into_owned()
    } else {
        let (text, _, _) = UTF_8.decode(bytes);
        text.into_owned()
    }
}

fn find_manifest(root: &Path) -> Result<PathBuf> {
    let preferred = root.join("manifest.xsf");
    if preferred.exists() {
        return Ok(preferred);
    }
    let mut candidates = files_with_extension(root, "xsf")?;
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| PackageError::ManifestMissing(root.to_path_buf()).into())
}

fn files_with_extension(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("Failed to list {}", root.display()))?
    {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|s| s.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(files)
}

/// Last segment of the urn-style document class name
fn friendly_form_name(form_name: &str) -> String {
    form_name
        .rsplit(':')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Form")
        .to_string()
}
