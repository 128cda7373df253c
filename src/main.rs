//! Command-line tool for generating OpenAPI documentation from Go/Gin services.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-go [OPTIONS] [PACKAGE_PATH]...
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! openapi-from-go ./internal/api -o openapi.yaml
//! ```
//!
//! Generate YAML and JSON from a configuration file:
//! ```bash
//! openapi-from-go -c openapi-gen.yaml -f both -o docs/openapi
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-from-go ./internal/api -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_go::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();
    let config = cli::resolve_config(&args)?;

    let log_level = if config.verbose_logging {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();

    info!("OpenAPI generator for Go starting...");

    cli::run(&args, config)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
