/*!
# InfoPath Analyzer CLI

Command-line interface over the form-package analyzer: parse an extracted
package into the structured model, print a summary, export JSON, or emit
the relational schema.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use infopath_analyzer::cli_common;
use infopath_analyzer::export;
use infopath_analyzer::package::{analyze_package, FormPackage};
use infopath_analyzer::schema::generate_schema;

#[derive(Parser)]
#[command(
    name = "infopath-analyzer",
    version = env!("CARGO_PKG_VERSION"),
    author = "InfoPath Analyzer Team",
    about = "Reconstructs a structured, queryable model from legacy InfoPath form packages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an extracted form package and print a summary
    Analyze {
        /// Path to the extracted package directory
        #[arg(short, long)]
        path: PathBuf,

        /// Write the JSON model to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show package-level facts without a full parse
    Info {
        /// Path to the extracted package directory
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Emit the relational schema (T-SQL DDL) for a package
    Schema {
        /// Path to the extracted package directory
        #[arg(short, long)]
        path: PathBuf,

        /// Write the DDL to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List extracted packages found under a directory
    Find {
        /// Root directory to scan
        #[arg(short, long)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli_common::init_logging(cli.verbose)?;

    match cli.command {
        Commands::Analyze { path, output } => analyze_command(path, output),
        Commands::Info { path } => info_command(path),
        Commands::Schema { path, output } => schema_command(path, output),
        Commands::Find { path } => find_command(path),
    }
}

fn analyze_command(path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    cli_common::validate_path(&path, "Package directory")?;

    let (form, issues) = analyze_package(&path)
        .with_context(|| format!("Failed to analyze {}", path.display()))?;

    println!("{}", export::text_summary(&form));

    if !issues.is_empty() {
        cli_common::print_warning(&format!("{} issue(s) during analysis:", issues.issues.len()));
        print!("{}", issues);
    }

    if let Some(output) = output {
        export::write_json(&form, &output)?;
        cli_common::print_success(&format!("JSON model written to {}", output.display()));
    }

    Ok(())
}

fn info_command(path: PathBuf) -> Result<()> {
    cli_common::validate_path(&path, "Package directory")?;

    let package = FormPackage::load_from_directory(&path)?;
    cli_common::print_info(&format!("Form:    {}", package.manifest.form_name));
    cli_common::print_info(&format!("Default view: {}", package.manifest.default_view));
    cli_common::print_info(&format!("Views:   {}", package.view_files.len()));
    for (name, file) in &package.view_files {
        println!("    {} -> {}", name, file.display());
    }
    cli_common::print_info(&format!("Schemas: {}", package.schema_files.len()));
    cli_common::print_info(&format!("Rules:   {}", package.manifest.rules.len()));
    Ok(())
}

fn schema_command(path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    cli_common::validate_path(&path, "Package directory")?;

    let (form, _issues) = analyze_package(&path)?;
    let script = generate_schema(&form);

    match output {
        Some(output) => {
            std::fs::write(&output, script)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            cli_common::print_success(&format!("Schema written to {}", output.display()));
        }
        None => print!("{}", script),
    }
    Ok(())
}

fn find_command(path: PathBuf) -> Result<()> {
    cli_common::validate_path(&path, "Root directory")?;

    let packages = FormPackage::find_packages(&path);
    if packages.is_empty() {
        cli_common::print_warning("No form packages found");
    } else {
        for package in &packages {
            println!("{}", package.display());
        }
        cli_common::print_success(&format!("{} package(s) found", packages.len()));
    }
    Ok(())
}
