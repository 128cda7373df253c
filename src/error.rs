use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load the Go grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),

    #[error("parsing {} produced no syntax tree", .file.display())]
    Parse { file: PathBuf },

    #[error("no parseable Go files in {}", .dir.display())]
    NoGoFiles { dir: PathBuf },

    #[error("none of the configured package paths could be loaded")]
    NoPackages,

    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// A field type expression that does not denote a type; the field is skipped.
    #[error("unsupported type expression: {0}")]
    UnsupportedTypeExpr(String),

    #[error("unresolved reference {reference} at {location}")]
    UnresolvedRef { reference: String, location: String },

    #[error("validation failed with {count} findings:\n{report}")]
    Validation { count: usize, report: String },

    #[error("failed to discover routes: {0}")]
    RouteDiscovery(#[source] Box<Error>),

    #[error("failed to generate schemas: {0}")]
    SchemaGeneration(#[source] Box<Error>),

    #[error("specification validation failed: {0}")]
    SpecValidation(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Config {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
