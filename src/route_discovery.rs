//! Discovery of annotated routes and business-entity structs.
//!
//! Routes come exclusively from `@Router`-annotated function doc comments (see
//! [`crate::directive`]); a function without directives is never a route. Business entities are
//! the exported structs of the entity packages that look like API data models.

use crate::ast::{self, FuncDecl, StructType, TypeSpec};
use crate::config::RouteDiscoveryConfig;
use crate::directive::{Directive, ParamDirective};
use crate::documentation;
use crate::error::{Error, Result};
use crate::handler_analyzer::HandlerInfo;
use crate::openapi_builder::Parameter;
use crate::parser::GoPackage;
use crate::schema_generator::Schema;
use crate::tag::{JsonTag, StructTag};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static COLON_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":(\w+)").unwrap());
static BRACE_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// Infrastructure types that are never business entities or component schemas.
pub const EXCLUDED_TYPES: &[&str] = &[
    "AuthHandler",
    "ProxyManager",
    "DNSValidator",
    "DatabaseConnectionMetrics",
    "EfficientWorkerPool",
    "HealthCheckHandler",
    "StatusResponseWriter",
    "WebSocketHandler",
    "WorkerCoordinationService",
    "HTTPValidator",
    "ContentFetcher",
    "MemoryPoolManager",
    "CPUOptimizationConfig",
    "CampaignOrchestratorAPIHandler",
    "APIHandler",
    "ReflectionEngine",
];

/// Known domain nouns, matched exactly.
const ENTITY_NAMES: &[&str] = &[
    "Campaign",
    "User",
    "Persona",
    "Proxy",
    "GeneratedDomain",
    "DNSValidationResult",
    "HTTPKeywordResult",
    "LoginRequest",
    "LoginResponse",
    "CreateCampaignRequest",
    "UpdateCampaignRequest",
    "ProxyPool",
    "KeywordSet",
    "DomainGenerationParams",
    "HTTPPersona",
    "DNSPersona",
    "KeywordExtractionResult",
    "ValidationResult",
    "ProxyConfiguration",
    "CampaignMetrics",
    "PersonaConfiguration",
    "DomainValidator",
];

const ENTITY_SUFFIXES: &[&str] = &[
    "Request",
    "Response",
    "Result",
    "Config",
    "Configuration",
    "Params",
    "Parameters",
    "Metrics",
    "Stats",
    "Status",
    "Info",
    "Data",
    "Model",
    "Entity",
    "Record",
    "Item",
    "Set",
    "Pool",
];

pub fn is_excluded_type(name: &str) -> bool {
    EXCLUDED_TYPES.contains(&name)
}

/// HTTP methods a `@Router` directive may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown HTTP method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "OPTIONS" => Ok(HttpMethod::Options),
            "HEAD" => Ok(HttpMethod::Head),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Where a parameter value is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// One HTTP endpoint found in source.
#[derive(Debug, Clone)]
pub struct DiscoveredRoute {
    pub method: HttpMethod,
    /// Raw path, colon- or brace-parameterized
    pub path: String,
    pub handler_name: String,
    pub function_name: String,
    pub operation_id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Explicit `@Param` entries first, then path parameters they did not cover
    pub parameters: Vec<Parameter>,
    pub request_schema: Option<Schema>,
    pub response_schema: Option<Schema>,
    pub deprecated: bool,
    /// Doc-comment lines that are not directives
    pub documentation: Vec<String>,
    /// Set by handler analysis
    pub handler_info: Option<HandlerInfo>,
}

/// An exported struct classified as an API data model.
#[derive(Debug, Clone)]
pub struct BusinessEntity<'a> {
    pub name: String,
    pub package: String,
    pub declaration: TypeSpec<'a>,
    pub is_exported: bool,
    /// Field name to JSON property name, for fields that carry one
    pub json_tags: BTreeMap<String, String>,
    pub file_path: PathBuf,
}

impl<'a> BusinessEntity<'a> {
    pub fn struct_type(&self) -> Option<StructType<'a>> {
        self.declaration.struct_type()
    }
}

/// Include/exclude regular expressions over raw route paths.
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl RouteFilter {
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for the first pattern that does not compile.
    pub fn new(config: &RouteDiscoveryConfig) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
                })
                .collect()
        };
        Ok(Self {
            include: compile(&config.include_patterns)?,
            exclude: compile(&config.exclude_patterns)?,
        })
    }

    /// An empty include list admits everything; any exclude match rejects.
    pub fn admits(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(path));
        included && !self.exclude.iter().any(|re| re.is_match(path))
    }
}

pub struct RouteDiscoverer {
    filter: RouteFilter,
}

impl RouteDiscoverer {
    pub fn new(filter: RouteFilter) -> Self {
        Self { filter }
    }

    /// Collects the annotated routes of every function in `packages`, in source order.
    pub fn discover_routes(&self, packages: &[GoPackage]) -> Vec<DiscoveredRoute> {
        let mut routes = Vec::new();
        for package in packages {
            debug!("Scanning package {} for routes", package.name);
            for func in package.syntax_trees().flat_map(|file| file.func_decls()) {
                let Some(route) = extract_route(func) else {
                    continue;
                };
                if self.filter.admits(&route.path) {
                    debug!("Found route {} {} -> {}", route.method, route.path, route.handler_name);
                    routes.push(route);
                } else {
                    debug!("Filtered out route {} {}", route.method, route.path);
                }
            }
        }
        info!("Discovered {} routes", routes.len());
        routes
    }
}

/// Builds a route from a function's directives; `None` unless both path and method are known.
pub fn extract_route(func: FuncDecl<'_>) -> Option<DiscoveredRoute> {
    let doc = func.doc()?;

    let mut summary = None;
    let mut description = None;
    let mut tags = Vec::new();
    let mut router = None;
    let mut explicit: Vec<ParamDirective> = Vec::new();
    let mut response_schema = None;
    let mut deprecated = false;

    for directive in doc.lines().iter().filter_map(|line| Directive::parse(line)) {
        match directive {
            Directive::Summary(text) => summary = Some(text),
            Directive::Description(text) => description = Some(text),
            Directive::Tags(list) => tags = list,
            Directive::Router { path, method } => router = Some((path, method)),
            Directive::Param(param) => explicit.push(param),
            Directive::Success(name) => response_schema = Some(Schema::reference(&name)),
            Directive::Deprecated => deprecated = true,
            Directive::Unknown(text) => debug!("Ignoring directive on {}: {}", func.name(), text),
        }
    }

    let (path, method) = router?;
    if path.is_empty() {
        return None;
    }

    let mut parameters: Vec<Parameter> = explicit.into_iter().map(explicit_parameter).collect();
    for param in extract_path_parameters(&path) {
        if !parameters.iter().any(|p| p.name == param.name) {
            parameters.push(param);
        }
    }

    let name = func.name().to_string();
    Some(DiscoveredRoute {
        method,
        operation_id: generate_operation_id(&name, method),
        path,
        handler_name: name.clone(),
        function_name: name,
        summary,
        description,
        tags,
        parameters,
        request_schema: None,
        response_schema,
        deprecated,
        documentation: documentation::doc_lines(&doc),
        handler_info: None,
    })
}

fn explicit_parameter(param: ParamDirective) -> Parameter {
    Parameter {
        name: param.name,
        location: param.location,
        required: param.required,
        description: param.description.filter(|d| !d.is_empty()),
        schema: Schema::of_type(param.param_type.as_str()),
    }
}

/// Path parameters named in `path`, `:name` style first, then `{name}` style, without
/// duplicates. Names containing `Id` or `ID` are typed as UUIDs.
pub fn extract_path_parameters(path: &str) -> Vec<Parameter> {
    let mut params: Vec<Parameter> = Vec::new();
    let names = COLON_PARAM
        .captures_iter(path)
        .chain(BRACE_PARAM.captures_iter(path))
        .map(|captures| captures[1].to_string());

    for name in names {
        if params.iter().any(|p| p.name == name) {
            continue;
        }
        let title = documentation::title_case(&name);
        let (description, schema) = if name.contains("Id") || name.contains("ID") {
            (format!("{} UUID", title), Schema::of_type("string").with_format("uuid"))
        } else {
            (format!("{} parameter", title), Schema::of_type("string"))
        };
        params.push(Parameter {
            name,
            location: ParameterLocation::Path,
            required: true,
            description: Some(description),
            schema,
        });
    }
    params
}

/// Derives an operation id from the handler name.
///
/// `Me` is `getCurrentUser`; otherwise a `Gin` suffix (kept when the name mentions `Config`),
/// then `Handler` and `Endpoint` suffixes are removed and the first letter is lower-cased.
pub fn generate_operation_id(handler_name: &str, method: HttpMethod) -> String {
    let mut name = handler_name.rsplit('.').next().unwrap_or(handler_name);
    if name == "Me" {
        return "getCurrentUser".to_string();
    }
    if !name.contains("Config") {
        name = name.strip_suffix("Gin").unwrap_or(name);
    }
    name = name.strip_suffix("Handler").unwrap_or(name);
    name = name.strip_suffix("Endpoint").unwrap_or(name);

    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => format!("{}Operation", method.as_str().to_lowercase()),
    }
}

/// Collects the business entities declared in `packages`, in source order.
pub fn discover_business_entities(packages: &[GoPackage]) -> Vec<BusinessEntity<'_>> {
    let mut entities = Vec::new();
    for package in packages {
        for file in &package.files {
            for spec in file.syntax().type_specs() {
                let Some(st) = spec.struct_type() else {
                    continue;
                };
                let name = spec.name();
                if is_excluded_type(name) || !is_business_entity(name, st) {
                    continue;
                }
                entities.push(BusinessEntity {
                    name: name.to_string(),
                    package: package.name.clone(),
                    declaration: spec,
                    is_exported: spec.is_exported(),
                    json_tags: json_tags(st),
                    file_path: file.path.clone(),
                });
            }
        }
    }

    info!("Discovered {} business entities", entities.len());
    for entity in &entities {
        debug!("  - {} (from {})", entity.name, entity.package);
    }
    entities
}

/// Exact name, then suffix, then an id- or timestamp-like field. Unexported names never match.
pub fn is_business_entity(name: &str, st: StructType<'_>) -> bool {
    if !ast::is_exported(name) {
        return false;
    }
    if ENTITY_NAMES.contains(&name) {
        return true;
    }
    if ENTITY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return true;
    }

    st.fields()
        .into_iter()
        .flat_map(|field| field.names())
        .any(|name| {
            let lower = name.to_lowercase();
            lower.contains("id")
                || lower.contains("time")
                || lower.contains("date")
                || name == "CreatedAt"
                || name == "UpdatedAt"
        })
}

fn json_tags(st: StructType<'_>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for field in st.fields() {
        let Some(raw) = field.tag() else {
            continue;
        };
        let Some(json) = StructTag::parse(&raw).get("json").map(JsonTag::parse) else {
            continue;
        };
        if json.skip {
            continue;
        }
        if let Some(json_name) = json.name {
            for name in field.names() {
                tags.insert(name.to_string(), json_name.clone());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use pretty_assertions::assert_eq;

    fn package(source: &str) -> GoPackage {
        GoPackage {
            name: "api".to_string(),
            dir: PathBuf::from("api"),
            files: vec![ParsedFile::from_source(
                PathBuf::from("api/handlers.go"),
                source.to_string(),
            )
            .unwrap()],
        }
    }

    fn routes(source: &str) -> Vec<DiscoveredRoute> {
        RouteDiscoverer::new(RouteFilter::default()).discover_routes(&[package(source)])
    }

    const HANDLERS: &str = r#"package api

// GetItem returns one item.
// @Summary Get item
// @Tags items, catalog
// @Param itemId path string true "Item ID"
// @Param verbose query bool false
// @Success 200 {object} models.Item "ok"
// @Router /items/:itemId [get]
func (h *Handler) GetItemGin(c *gin.Context) {}

// ListItems has no router directive.
// @Summary List items
func ListItems(c *gin.Context) {}

func Plain() {}

// @Router /users/me [GET]
func Me(c *gin.Context) {}

// @deprecated
// @Router /widgets/{widgetId}/parts/:partId [DELETE]
func DeletePartHandler(c *gin.Context) {}
"#;

    #[test]
    fn test_only_router_annotated_functions_are_routes() {
        let found = routes(HANDLERS);
        let names: Vec<&str> = found.iter().map(|r| r.function_name.as_str()).collect();
        assert_eq!(names, vec!["GetItemGin", "Me", "DeletePartHandler"]);
    }

    #[test]
    fn test_route_fields_from_directives() {
        let found = routes(HANDLERS);
        let route = &found[0];
        assert_eq!(route.method, HttpMethod::Get);
        assert_eq!(route.path, "/items/:itemId");
        assert_eq!(route.operation_id, "getItem");
        assert_eq!(route.summary.as_deref(), Some("Get item"));
        assert_eq!(route.tags, vec!["items", "catalog"]);
        assert_eq!(route.documentation, vec!["GetItem returns one item."]);
        assert_eq!(route.response_schema, Some(Schema::reference("Item")));
        assert!(!route.deprecated);
    }

    #[test]
    fn test_explicit_path_param_wins_over_extracted() {
        let found = routes(HANDLERS);
        let params = &found[0].parameters;
        assert_eq!(params.len(), 2);

        let item_id = params.iter().find(|p| p.name == "itemId").unwrap();
        assert_eq!(item_id.description.as_deref(), Some("Item ID"));
        assert_eq!(item_id.schema.format, None);

        let verbose = &params[1];
        assert_eq!(verbose.location, ParameterLocation::Query);
        assert!(!verbose.required);
        assert_eq!(verbose.schema, Schema::of_type("boolean"));
    }

    #[test]
    fn test_mixed_path_styles_and_deprecation() {
        let found = routes(HANDLERS);
        let route = &found[2];
        assert!(route.deprecated);
        assert_eq!(route.operation_id, "deletePart");
        let names: Vec<&str> = route.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["partId", "widgetId"]);
    }

    #[test]
    fn test_extract_path_parameters_uuid_upgrade() {
        let params = extract_path_parameters("/widgets/:widgetId/tags/:name");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].schema.format.as_deref(), Some("uuid"));
        assert_eq!(params[0].description.as_deref(), Some("WidgetId UUID"));
        assert_eq!(params[1].schema.format, None);
        assert_eq!(params[1].description.as_deref(), Some("Name parameter"));
        assert!(params.iter().all(|p| p.required && p.location == ParameterLocation::Path));

        // lower-case "id" is not upgraded
        let params = extract_path_parameters("/items/{itemid}");
        assert_eq!(params[0].schema.format, None);
        // duplicated across styles
        assert_eq!(extract_path_parameters("/a/:x/{x}").len(), 1);
    }

    #[test]
    fn test_generate_operation_id() {
        assert_eq!(generate_operation_id("Me", HttpMethod::Post), "getCurrentUser");
        assert_eq!(generate_operation_id("GetWidgetGin", HttpMethod::Get), "getWidget");
        assert_eq!(generate_operation_id("GetGinConfigGin", HttpMethod::Get), "getGinConfigGin");
        assert_eq!(generate_operation_id("ListUsersHandler", HttpMethod::Get), "listUsers");
        assert_eq!(generate_operation_id("api.SyncEndpoint", HttpMethod::Put), "sync");
        assert_eq!(generate_operation_id("Handler", HttpMethod::Patch), "patchOperation");
    }

    #[test]
    fn test_route_filter() {
        let filter = RouteFilter::new(&RouteDiscoveryConfig {
            include_patterns: vec!["^/api/".to_string()],
            exclude_patterns: vec!["/internal".to_string()],
        })
        .unwrap();
        assert!(filter.admits("/api/items"));
        assert!(!filter.admits("/health"));
        assert!(!filter.admits("/api/internal/stats"));

        let err = RouteFilter::new(&RouteDiscoveryConfig {
            include_patterns: vec!["(".to_string()],
            exclude_patterns: Vec::new(),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_filter_applies_during_discovery() {
        let filter = RouteFilter::new(&RouteDiscoveryConfig {
            include_patterns: Vec::new(),
            exclude_patterns: vec!["^/users".to_string()],
        })
        .unwrap();
        let found = RouteDiscoverer::new(filter).discover_routes(&[package(HANDLERS)]);
        assert_eq!(found.len(), 2);
    }

    const MODELS: &str = r#"package models

type AuthHandler struct {
    ID        string
    CreatedAt time.Time
}

type Campaign struct {
    Name string `json:"name"`
}

type LoginRequest struct{}

type WidgetStatus struct{}

type Gadget struct {
    GadgetID string `json:"gadget_id,omitempty"`
    Secret   string `json:"-"`
}

type Event struct {
    Timestamp int64
}

type Blob struct {
    Bytes []byte
}

type hidden struct {
    ID string
}

type Color string
"#;

    #[test]
    fn test_business_entity_classification() {
        let packages = [package(MODELS)];
        let entities = discover_business_entities(&packages);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Campaign", "LoginRequest", "WidgetStatus", "Gadget", "Event"]);

        let gadget = &entities[3];
        assert_eq!(gadget.package, "api");
        assert!(gadget.is_exported);
        assert_eq!(gadget.json_tags.get("GadgetID").map(String::as_str), Some("gadget_id"));
        assert!(!gadget.json_tags.contains_key("Secret"));
        assert_eq!(gadget.struct_type().unwrap().fields().len(), 2);
        assert_eq!(gadget.file_path, PathBuf::from("api/handlers.go"));
    }

    #[test]
    fn test_excluded_type_is_never_an_entity() {
        let packages = [package(MODELS)];
        let entities = discover_business_entities(&packages);
        assert!(entities.iter().all(|e| e.name != "AuthHandler"));
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!("patch".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert_eq!("GET".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert!("ANY".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
