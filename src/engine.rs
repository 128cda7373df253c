//! End-to-end generation: source directories in, OpenAPI document out.
//!
//! Phases run strictly in order and each fatal failure is wrapped in the error variant naming its
//! phase:
//!
//! 1. business entities are discovered in the entity packages; packages that fail to load are
//!    skipped, so this phase never fails
//! 2. routes are discovered in the route packages
//! 3. every route's handler is analyzed to fill in request/response schemas and query parameters
//! 4. one operation per route is synthesized with the baseline responses and security
//! 5. component schemas are generated
//! 6. configured security schemes are added
//! 7. in strict mode every `$ref` must resolve

use crate::config::{GenerationConfig, ServerConfig};
use crate::documentation;
use crate::error::{Error, Result};
use crate::handler_analyzer::HandlerAnalyzer;
use crate::openapi_builder::{
    Info, OpenApiBuilder, OpenApiDocument, Operation, Parameter, RequestBody, Response,
    SecurityRequirement, SecurityScheme, Server,
};
use crate::parser::{load_packages, GoPackage};
use crate::route_discovery::{
    discover_business_entities, DiscoveredRoute, HttpMethod, ParameterLocation, RouteDiscoverer,
    RouteFilter,
};
use crate::schema_generator::{Schema, SchemaGenerator, ERROR_RESPONSE_SCHEMA};
use crate::validator;
use log::{debug, info, warn};
use std::env;

/// Security scheme every non-authentication operation requires.
pub const SESSION_AUTH: &str = "sessionAuth";

/// Path fragments marking authentication endpoints, which carry no security requirement.
const AUTH_PATH_MARKERS: &[&str] = &["/auth/", "/login", "/logout"];

pub struct ReflectionEngine {
    config: GenerationConfig,
}

impl ReflectionEngine {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Runs every phase and returns the finished document.
    ///
    /// # Errors
    ///
    /// - [`Error::RouteDiscovery`] for an invalid route pattern or when no route package loads
    /// - [`Error::SchemaGeneration`] for an invalid schema configuration
    /// - [`Error::SpecValidation`] when strict validation finds an unresolved reference
    pub fn generate_spec(&self) -> Result<OpenApiDocument> {
        info!("Starting OpenAPI generation");

        info!("Discovering business entities...");
        let entity_packages = self.load_entity_packages();
        let entities = discover_business_entities(&entity_packages);
        info!("Found {} business entities", entities.len());

        info!("Discovering routes...");
        let route_packages = self
            .load_route_packages()
            .map_err(|e| Error::RouteDiscovery(Box::new(e)))?;
        let mut routes = RouteFilter::new(&self.config.route_discovery)
            .map(|filter| RouteDiscoverer::new(filter).discover_routes(&route_packages))
            .map_err(|e| Error::RouteDiscovery(Box::new(e)))?;
        info!("Found {} routes", routes.len());

        let mut schema_generator = SchemaGenerator::new(
            &route_packages,
            &entity_packages,
            self.config.schema_generation.clone(),
        );
        schema_generator.set_business_entities(entities);

        info!("Analyzing handlers...");
        let analyzer = HandlerAnalyzer::new(&route_packages);
        for route in &mut routes {
            self.enrich_route(route, &analyzer, &schema_generator);
        }

        info!("Generating OpenAPI operations...");
        let mut builder =
            OpenApiBuilder::new(Info::from(&self.config.api_info)).with_servers(servers(
                &self.config.server_config,
                |name| env::var(name).ok(),
            ));
        for route in &routes {
            debug!(
                "Route {} {} has {} parameters",
                route.method,
                route.path,
                route.parameters.len()
            );
            builder.add_operation(&route.path, route.method, synthesize_operation(route));
        }

        info!("Generating schemas...");
        let schemas = schema_generator
            .generate_schemas()
            .map_err(|e| Error::SchemaGeneration(Box::new(e)))?;

        for (name, scheme) in &self.config.security_schemes {
            builder.add_security_scheme(name, SecurityScheme::from(scheme));
        }

        let document = builder.build(schemas);

        if self.config.strict_validation {
            info!("Validating specification...");
            validator::resolve_refs(&document).map_err(|e| Error::SpecValidation(Box::new(e)))?;
        }

        info!(
            "Generated specification with {} paths and {} schemas",
            document.paths.len(),
            document.components.schemas.len()
        );
        Ok(document)
    }

    /// Entity packages are optional: when none loads, only the route packages feed schemas.
    fn load_entity_packages(&self) -> Vec<GoPackage> {
        let packages = load_packages(&self.config.entity_paths(), self.config.recursive);
        if packages.is_empty() {
            if self.config.entity_package_paths.is_empty() {
                debug!("No default entity package found");
            } else {
                warn!(
                    "None of the configured entity packages could be loaded, \
                     continuing without business entities"
                );
            }
        }
        packages
    }

    fn load_route_packages(&self) -> Result<Vec<GoPackage>> {
        let packages = load_packages(&self.config.package_paths, self.config.recursive);
        if packages.is_empty() {
            return Err(Error::NoPackages);
        }
        Ok(packages)
    }

    /// Folds handler evidence into a route; directive-declared values are never replaced.
    fn enrich_route(
        &self,
        route: &mut DiscoveredRoute,
        analyzer: &HandlerAnalyzer<'_>,
        schemas: &SchemaGenerator<'_>,
    ) {
        let info = analyzer.analyze_handler(route);
        if info.function.is_none() {
            warn!(
                "No Gin handler {} found for {} {}",
                route.function_name, route.method, route.path
            );
        }

        if route.request_schema.is_none() && route.method != HttpMethod::Get {
            route.request_schema = info
                .request_type
                .as_deref()
                .and_then(|name| schemas.resolve_reference(name));
        }
        if route.response_schema.is_none() {
            route.response_schema = info
                .response_type
                .as_deref()
                .and_then(|name| schemas.resolve_reference(name));
        }

        for name in &info.query_params {
            if route.parameters.iter().any(|p| &p.name == name) {
                continue;
            }
            route.parameters.push(Parameter {
                name: name.clone(),
                location: ParameterLocation::Query,
                required: false,
                description: None,
                schema: Schema::of_type("string"),
            });
        }
        route.handler_info = Some(info);

        if self.config.documentation.default_summaries {
            documentation::apply_defaults(route);
        }
    }
}

/// Whether `path` is an authentication endpoint.
pub fn is_auth_endpoint(path: &str) -> bool {
    AUTH_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

/// The one server advertised when environment detection is on and the variable is set.
fn servers<F>(config: &ServerConfig, lookup: F) -> Vec<Server>
where
    F: Fn(&str) -> Option<String>,
{
    if !config.enable_environment_detection {
        return Vec::new();
    }
    match lookup(&config.base_url).filter(|url| !url.is_empty()) {
        Some(url) => vec![Server {
            url,
            description: Some(format!(
                "Runtime environment server (from {})",
                config.base_url
            )),
        }],
        None => Vec::new(),
    }
}

/// `{message, data}` body used when nothing more specific is known.
fn generic_success_schema() -> Schema {
    let mut schema = Schema::object();
    schema.properties.insert(
        "message".to_string(),
        Schema::of_type("string").with_description("Success message"),
    );
    schema.properties.insert(
        "data".to_string(),
        Schema::default().with_description("Response data"),
    );
    schema
}

/// Builds the operation for one route, including the baseline responses.
pub fn synthesize_operation(route: &DiscoveredRoute) -> Operation {
    let request_body = match (&route.request_schema, route.method) {
        (Some(schema), method) if method != HttpMethod::Get => Some(RequestBody::json(schema.clone())),
        _ => None,
    };

    let security = if is_auth_endpoint(&route.path) {
        None
    } else {
        let requirement = SecurityRequirement::from([(SESSION_AUTH.to_string(), Vec::new())]);
        Some(vec![requirement])
    };

    let mut operation = Operation {
        tags: route.tags.clone(),
        summary: route.summary.clone(),
        description: route.description.clone(),
        operation_id: Some(route.operation_id.clone()),
        parameters: route.parameters.clone(),
        request_body,
        security,
        deprecated: route.deprecated,
        ..Default::default()
    };

    let success = route
        .response_schema
        .clone()
        .unwrap_or_else(generic_success_schema);
    let mut respond = |status: &str, description: &str, schema: Schema| {
        operation
            .responses
            .insert(status.to_string(), Response::json(description, schema));
    };
    respond("200", "Operation successful", success);
    respond("400", "Bad Request", Schema::reference(ERROR_RESPONSE_SCHEMA));
    respond("500", "Internal Server Error", Schema::reference(ERROR_RESPONSE_SCHEMA));
    if operation.requires_security() {
        operation.responses.insert(
            "401".to_string(),
            Response::json("Unauthorized", Schema::reference(ERROR_RESPONSE_SCHEMA)),
        );
    }
    operation
}
