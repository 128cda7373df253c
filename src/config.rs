//! Generation settings, loadable from a JSON or YAML file.
//!
//! Every field has a default, so a configuration file only needs the keys it changes:
//!
//! ```
//! use openapi_from_go::config::GenerationConfig;
//!
//! let config: GenerationConfig = serde_yaml::from_str("package_paths: [./internal/api]").unwrap();
//! assert_eq!(config.api_info.title, "API");
//! assert!(config.security_schemes.contains_key("sessionAuth"));
//! ```

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Packages searched for business entities when no override is configured.
pub const DEFAULT_ENTITY_PACKAGES: &[&str] =
    &["./internal/models", "./internal/api", "./internal/services"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Source roots scanned for routes and handlers
    pub package_paths: Vec<PathBuf>,
    /// Business-entity packages; empty means [`DEFAULT_ENTITY_PACKAGES`]
    pub entity_package_paths: Vec<PathBuf>,
    /// Scan sub-directories of every package path as well
    pub recursive: bool,
    pub output_format: OutputFormat,
    pub output_path: Option<PathBuf>,
    pub strict_validation: bool,
    pub verbose_logging: bool,
    pub api_info: ApiInfo,
    pub security_schemes: BTreeMap<String, SecuritySchemeConfig>,
    pub server_config: ServerConfig,
    pub route_discovery: RouteDiscoveryConfig,
    pub schema_generation: SchemaGenerationConfig,
    pub documentation: DocumentationConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let mut security_schemes = BTreeMap::new();
        security_schemes.insert(
            "sessionAuth".to_string(),
            SecuritySchemeConfig {
                scheme_type: "apiKey".to_string(),
                description: Some("Session-based authentication using HTTP cookies".to_string()),
                location: Some("cookie".to_string()),
                name: Some("session_id".to_string()),
                ..Default::default()
            },
        );

        Self {
            package_paths: Vec::new(),
            entity_package_paths: Vec::new(),
            recursive: false,
            output_format: OutputFormat::Yaml,
            output_path: None,
            strict_validation: false,
            verbose_logging: false,
            api_info: ApiInfo::default(),
            security_schemes,
            server_config: ServerConfig::default(),
            route_discovery: RouteDiscoveryConfig::default(),
            schema_generation: SchemaGenerationConfig::default(),
            documentation: DocumentationConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// Loads a configuration file; the format follows the extension (`.json`, `.yaml`, `.yml`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read and [`Error::Config`] when it cannot be
    /// decoded or has an unknown extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| Error::config(path, e)),
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| Error::config(path, e))
            }
            _ => Err(Error::config(path, "expected a .json, .yaml or .yml file")),
        }
    }

    /// Checks the settings a generation run cannot do without.
    pub fn validate(&self) -> Result<()> {
        if self.package_paths.is_empty() {
            return Err(Error::config(
                "<generation config>",
                "at least one package path is required",
            ));
        }
        Ok(())
    }

    pub fn entity_paths(&self) -> Vec<PathBuf> {
        if self.entity_package_paths.is_empty() {
            DEFAULT_ENTITY_PACKAGES.iter().map(PathBuf::from).collect()
        } else {
            self.entity_package_paths.clone()
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
    /// YAML and JSON side by side
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub contact: Option<ContactInfo>,
    pub license: Option<LicenseInfo>,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            contact: None,
            license: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LicenseInfo {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecuritySchemeConfig {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
    pub description: Option<String>,
    /// apiKey only: `query`, `header` or `cookie`
    #[serde(rename = "in")]
    pub location: Option<String>,
    /// apiKey only: the parameter name
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Name of the environment variable holding the runtime base URL
    pub base_url: String,
    pub enable_environment_detection: bool,
    /// Accepted for compatibility; servers are never emitted from this list.
    pub fallback_urls: Vec<ServerUrl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerUrl {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouteDiscoveryConfig {
    /// Regular expressions over the raw route path; empty admits every route
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaGenerationConfig {
    pub use_json_tags: bool,
    pub ignore_unexported_fields: bool,
    /// Additional string-enum component schemas, by name
    pub extra_enums: IndexMap<String, Vec<String>>,
}

impl Default for SchemaGenerationConfig {
    fn default() -> Self {
        Self {
            use_json_tags: true,
            ignore_unexported_fields: true,
            extra_enums: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentationConfig {
    /// Derive summaries and descriptions for routes that lack them
    pub default_summaries: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.output_format, OutputFormat::Yaml);
        assert!(config.schema_generation.use_json_tags);
        let session = &config.security_schemes["sessionAuth"];
        assert_eq!(session.scheme_type, "apiKey");
        assert_eq!(session.location.as_deref(), Some("cookie"));
        assert_eq!(session.name.as_deref(), Some("session_id"));
    }

    #[test]
    fn test_load_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.json");
        fs::write(
            &path,
            r#"{
                "package_paths": ["./internal/api"],
                "output_format": "both",
                "strict_validation": true,
                "api_info": {"title": "Studio API", "version": "2.0.0"},
                "security_schemes": {
                    "bearerAuth": {"type": "http", "scheme": "bearer", "bearer_format": "JWT"}
                },
                "schema_generation": {"extra_enums": {"Color": ["red", "green"]}}
            }"#,
        )
        .unwrap();

        let config = GenerationConfig::from_file(&path).unwrap();
        assert_eq!(config.package_paths, vec![PathBuf::from("./internal/api")]);
        assert_eq!(config.output_format, OutputFormat::Both);
        assert!(config.strict_validation);
        assert_eq!(config.api_info.title, "Studio API");
        assert_eq!(config.security_schemes.len(), 1);
        assert_eq!(
            config.security_schemes["bearerAuth"].bearer_format.as_deref(),
            Some("JWT")
        );
        assert!(config.schema_generation.use_json_tags);
        assert_eq!(config.schema_generation.extra_enums["Color"], vec!["red", "green"]);
    }

    #[test]
    fn test_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.yml");
        fs::write(
            &path,
            "package_paths:\n  - ./api\nserver_config:\n  base_url: API_URL\n  enable_environment_detection: true\n",
        )
        .unwrap();

        let config = GenerationConfig::from_file(&path).unwrap();
        assert_eq!(config.server_config.base_url, "API_URL");
        assert!(config.server_config.enable_environment_detection);
    }

    #[test]
    fn test_unknown_extension_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.toml");
        fs::write(&path, "package_paths = []").unwrap();

        let err = GenerationConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_requires_package_path() {
        assert!(GenerationConfig::default().validate().is_err());

        let config = GenerationConfig {
            package_paths: vec![PathBuf::from("./api")],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_entity_paths_fallback() {
        let config = GenerationConfig::default();
        assert_eq!(config.entity_paths().len(), 3);

        let config = GenerationConfig {
            entity_package_paths: vec![PathBuf::from("./models")],
            ..Default::default()
        };
        assert_eq!(config.entity_paths(), vec![PathBuf::from("./models")]);
    }
}
