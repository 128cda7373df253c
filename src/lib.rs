//! OpenAPI generation for Go/Gin services by static analysis of their source code.
//!
//! Routes are declared in handler doc comments (`@Router`, `@Param`, `@Success`...), handler
//! bodies are inspected for bound request types and serialized responses, and Go type
//! declarations become component schemas. The result is an OpenAPI 3.0.3 document.
//!
//! # Architecture
//!
//! 1. [`scanner`] and [`parser`] find `.go` files and parse them with `tree-sitter-go`; [`ast`]
//!    gives typed views over the resulting trees
//! 2. [`route_discovery`] reads [`directive`]s into routes and classifies business entities
//! 3. [`handler_analyzer`] infers request and response types from handler bodies
//! 4. [`type_inspector`] resolves Go types, and [`schema_generator`] turns them into schemas
//! 5. [`openapi_builder`] assembles the document, checked by [`validator`]
//! 6. [`engine`] runs the phases in order; [`serializer`] writes YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_go::config::GenerationConfig;
//! use openapi_from_go::engine::ReflectionEngine;
//! use openapi_from_go::serializer::serialize_yaml;
//! use std::path::PathBuf;
//!
//! let config = GenerationConfig {
//!     package_paths: vec![PathBuf::from("./internal/api")],
//!     strict_validation: true,
//!     ..Default::default()
//! };
//! let document = ReflectionEngine::new(config).generate_spec().unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod ast;
pub mod cli;
pub mod config;
pub mod directive;
pub mod documentation;
pub mod engine;
pub mod error;
pub mod handler_analyzer;
pub mod openapi_builder;
pub mod parser;
pub mod route_discovery;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod tag;
pub mod type_inspector;
pub mod validator;
