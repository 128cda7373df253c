use crate::config::{GenerationConfig, OutputFormat};
use crate::engine::ReflectionEngine;
use crate::openapi_builder::OpenApiDocument;
use crate::serializer::{render, write_outputs};
use crate::validator::Validator;
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;

/// Generate an OpenAPI 3.0.3 document from annotated Go/Gin source code
#[derive(Parser, Debug)]
#[command(name = "openapi-from-go")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Go package directories scanned for routes and handlers
    #[arg(value_name = "PACKAGE_PATH")]
    pub package_paths: Vec<PathBuf>,

    /// Configuration file (.json, .yaml or .yml)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Package directory searched for business entities (repeatable)
    #[arg(short = 'e', long = "entity-package", value_name = "DIR")]
    pub entity_packages: Vec<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Also scan sub-directories of every package path
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Fail when a schema reference does not resolve
    #[arg(short = 's', long = "strict")]
    pub strict: bool,

    /// Lint the generated document before writing it
    #[arg(long = "lint")]
    pub lint: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Loads the configuration file, if any, and applies the command-line overrides on top.
pub fn resolve_config(args: &CliArgs) -> Result<GenerationConfig> {
    let mut config = match &args.config {
        Some(path) => GenerationConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => GenerationConfig::default(),
    };

    if !args.package_paths.is_empty() {
        config.package_paths = args.package_paths.clone();
    }
    if !args.entity_packages.is_empty() {
        config.entity_package_paths = args.entity_packages.clone();
    }
    if let Some(format) = args.output_format {
        config.output_format = format;
    }
    if args.output_path.is_some() {
        config.output_path = args.output_path.clone();
    }
    config.recursive |= args.recursive;
    config.strict_validation |= args.strict;
    config.verbose_logging |= args.verbose;

    config.validate()?;
    Ok(config)
}

/// Run the main workflow
pub fn run(args: &CliArgs, config: GenerationConfig) -> Result<()> {
    // Step 1: Report the effective configuration
    debug!("Effective configuration: {:?}", config);
    for path in &config.package_paths {
        if !path.is_dir() {
            warn!("Package path is not a directory: {}", path.display());
        }
    }
    info!("Package paths: {:?}", config.package_paths);
    info!("Output format: {:?}", config.output_format);
    match &config.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    // Step 2: Generate the document
    info!("Generating OpenAPI document...");
    let format = config.output_format;
    let output_path = config.output_path.clone();
    let strict = config.strict_validation;
    let document = ReflectionEngine::new(config).generate_spec()?;

    // Step 3: Lint
    if args.lint {
        info!("Linting generated document...");
        let warnings = Validator::new(strict)
            .validate(&document)
            .context("Generated document failed linting")?;
        for finding in &warnings {
            warn!("{}", finding);
        }
    }

    // Step 4: Serialize and write to file or stdout
    info!("Serializing to {:?} format...", format);
    if let Some(output) = &output_path {
        for path in write_outputs(&document, format, output)? {
            info!("Successfully wrote OpenAPI document to {}", path.display());
        }
    } else {
        for rendered in render(&document, format)? {
            println!("{}", rendered.content);
        }
    }

    // Step 5: Display summary
    log_summary(&document);
    Ok(())
}

fn log_summary(document: &OpenApiDocument) {
    let operations: usize = document
        .paths
        .values()
        .map(|item| item.operations().count())
        .sum();
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Paths: {}", document.paths.len());
    info!("  - Operations: {}", operations);
    info!("  - Schemas: {}", document.components.schemas.len());
    info!(
        "  - Security schemes: {}",
        document.components.security_schemes.len()
    );
}
