//! Rendering documents to YAML or JSON and writing them out.

use crate::config::OutputFormat;
use crate::openapi_builder::OpenApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// A document rendered in one concrete format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// `yaml` or `json`
    pub extension: &'static str,
    pub content: String,
}

pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Pretty-printed JSON.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Renders `doc` in every format `format` asks for, YAML first.
pub fn render(doc: &OpenApiDocument, format: OutputFormat) -> Result<Vec<Rendered>> {
    let mut rendered = Vec::new();
    if matches!(format, OutputFormat::Yaml | OutputFormat::Both) {
        rendered.push(Rendered {
            extension: "yaml",
            content: serialize_yaml(doc)?,
        });
    }
    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        rendered.push(Rendered {
            extension: "json",
            content: serialize_json(doc)?,
        });
    }
    Ok(rendered)
}

/// Where one rendering goes: `output` itself for a single format, `output` with the format's
/// extension when both are written.
pub fn output_path(output: &Path, format: OutputFormat, extension: &str) -> PathBuf {
    match format {
        OutputFormat::Both => output.with_extension(extension),
        OutputFormat::Yaml | OutputFormat::Json => output.to_path_buf(),
    }
}

/// Writes every rendering of `doc` next to `output` and returns the written paths.
pub fn write_outputs(
    doc: &OpenApiDocument,
    format: OutputFormat,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for rendered in render(doc, format)? {
        let path = output_path(output, format, rendered.extension);
        write_to_file(&rendered.content, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Writes `content` to `path`, creating parent directories and replacing an existing file.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
