//! Checks over a built document: `$ref` resolution and an optional lint pass.

use crate::error::{Error, Result};
use crate::openapi_builder::{OpenApiDocument, Operation, PathItem};
use crate::route_discovery::ParameterLocation;
use crate::schema_generator::{Schema, SCHEMA_REF_PREFIX};
use log::{debug, info};
use std::fmt;

/// Checks that every `$ref` in `document` names an existing component schema.
///
/// # Errors
///
/// Returns [`Error::UnresolvedRef`] for the first reference that does not resolve, with the
/// dotted location it was found at.
pub fn resolve_refs(document: &OpenApiDocument) -> Result<()> {
    let mut checked = 0;
    let mut check = |schema: &Schema, location: String| -> Result<()> {
        walk_schema(schema, location, &mut |schema, location| {
            let Some(reference) = &schema.reference else {
                return Ok(());
            };
            checked += 1;
            let resolves = reference
                .strip_prefix(SCHEMA_REF_PREFIX)
                .is_some_and(|name| document.components.schemas.contains_key(name));
            if resolves {
                Ok(())
            } else {
                Err(Error::UnresolvedRef {
                    reference: reference.clone(),
                    location: location.to_string(),
                })
            }
        })
    };

    for (name, schema) in &document.components.schemas {
        check(schema, format!("components.schemas.{}", name))?;
    }
    for (path, item) in &document.paths {
        for (location, operation) in operation_locations(path, item) {
            for (i, param) in operation.parameters.iter().enumerate() {
                check(&param.schema, format!("{}.parameters[{}]", location, i))?;
            }
            if let Some(body) = &operation.request_body {
                for media in body.content.values() {
                    check(&media.schema, format!("{}.requestBody", location))?;
                }
            }
            for (status, response) in &operation.responses {
                for media in response.content.iter().flat_map(|content| content.values()) {
                    check(&media.schema, format!("{}.responses.{}", location, status))?;
                }
            }
        }
    }

    debug!("Resolved {} schema references", checked);
    Ok(())
}

/// Visits `schema` and every schema nested in it, depth first.
fn walk_schema<F>(schema: &Schema, location: String, visit: &mut F) -> Result<()>
where
    F: FnMut(&Schema, &str) -> Result<()>,
{
    visit(schema, &location)?;
    for (name, property) in &schema.properties {
        walk_schema(property, format!("{}.properties.{}", location, name), visit)?;
    }
    if let Some(items) = &schema.items {
        walk_schema(items, format!("{}.items", location), visit)?;
    }
    if let Some(values) = &schema.additional_properties {
        walk_schema(values, format!("{}.additionalProperties", location), visit)?;
    }
    Ok(())
}

fn operation_locations<'a>(
    path: &'a str,
    item: &'a PathItem,
) -> impl Iterator<Item = (String, &'a Operation)> + 'a {
    item.operations().map(move |(method, operation)| {
        (
            format!("paths.{}.{}", path, method.as_str().to_lowercase()),
            operation,
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One lint result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    /// Dotted location in the document
    pub field: String,
    pub message: String,
    pub code: &'static str,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.code)
    }
}

/// Lints a document for completeness problems. In strict mode warnings fail validation too.
pub struct Validator {
    strict: bool,
}

impl Validator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Resolves references, then lints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedRef`] when a reference does not resolve, and
    /// [`Error::Validation`] when the lint found errors, or warnings in strict mode. On success
    /// the remaining warnings are returned.
    pub fn validate(&self, document: &OpenApiDocument) -> Result<Vec<Finding>> {
        resolve_refs(document)?;

        let findings = self.lint(document);
        let (errors, warnings): (Vec<Finding>, Vec<Finding>) = findings
            .into_iter()
            .partition(|f| f.severity == Severity::Error);
        info!(
            "Lint found {} errors and {} warnings",
            errors.len(),
            warnings.len()
        );

        if !errors.is_empty() {
            return Err(report(&errors));
        }
        if self.strict && !warnings.is_empty() {
            return Err(report(&warnings));
        }
        Ok(warnings)
    }

    /// Every finding, errors and warnings interleaved in document order.
    pub fn lint(&self, document: &OpenApiDocument) -> Vec<Finding> {
        let mut lint = Lint::default();

        let info = &document.info;
        if info.title.is_empty() {
            lint.error("info.title", "Title is required", "MISSING_TITLE");
        }
        if info.version.is_empty() {
            lint.error("info.version", "Version is required", "MISSING_VERSION");
        }
        if info.description.as_deref().unwrap_or_default().is_empty() {
            lint.warning(
                "info.description",
                "Description is recommended",
                "MISSING_DESCRIPTION",
            );
        }

        if document.paths.is_empty() {
            lint.warning("paths", "No paths defined", "EMPTY_PATHS");
        }
        for (path, item) in &document.paths {
            lint.path(path, item);
        }

        for (name, schema) in &document.components.schemas {
            if schema.schema_type.is_none() && !schema.is_reference() {
                lint.warning(
                    &format!("components.schemas.{}.type", name),
                    "Schema type is recommended",
                    "MISSING_SCHEMA_TYPE",
                );
            }
        }

        lint.findings
    }
}

fn report(findings: &[Finding]) -> Error {
    Error::Validation {
        count: findings.len(),
        report: findings
            .iter()
            .map(Finding::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[derive(Default)]
struct Lint {
    findings: Vec<Finding>,
}

impl Lint {
    fn push(&mut self, severity: Severity, field: &str, message: String, code: &'static str) {
        self.findings.push(Finding {
            severity,
            field: field.to_string(),
            message,
            code,
        });
    }

    fn error(&mut self, field: &str, message: &str, code: &'static str) {
        self.push(Severity::Error, field, message.to_string(), code);
    }

    fn warning(&mut self, field: &str, message: &str, code: &'static str) {
        self.push(Severity::Warning, field, message.to_string(), code);
    }

    fn path(&mut self, path: &str, item: &PathItem) {
        if item.operations().next().is_none() {
            self.warning(
                &format!("paths.{}", path),
                "Path has no operations",
                "NO_OPERATIONS",
            );
            return;
        }

        let declared = brace_parameters(path);
        for (location, operation) in operation_locations(path, item) {
            for name in &declared {
                let defined = operation
                    .parameters
                    .iter()
                    .any(|p| p.location == ParameterLocation::Path && &p.name == name);
                if !defined {
                    self.push(
                        Severity::Error,
                        &format!("paths.{}.parameters", path),
                        format!("Path parameter '{}' is not defined", name),
                        "MISSING_PATH_PARAMETER",
                    );
                }
            }
            self.operation(&location, operation);
        }
    }

    fn operation(&mut self, location: &str, operation: &Operation) {
        if operation.operation_id.as_deref().unwrap_or_default().is_empty() {
            self.warning(
                &format!("{}.operationId", location),
                "OperationID is recommended",
                "MISSING_OPERATION_ID",
            );
        }
        if operation.summary.as_deref().unwrap_or_default().is_empty() {
            self.warning(
                &format!("{}.summary", location),
                "Summary is recommended",
                "MISSING_SUMMARY",
            );
        }

        let responses = format!("{}.responses", location);
        if operation.responses.is_empty() {
            self.error(&responses, "At least one response is required", "MISSING_RESPONSES");
        } else {
            for (status, response) in &operation.responses {
                if response.description.is_empty() {
                    self.warning(
                        &format!("{}.{}.description", responses, status),
                        "Response description is recommended",
                        "MISSING_RESPONSE_DESCRIPTION",
                    );
                }
            }
            if !operation.responses.keys().any(|status| status.starts_with('2')) {
                self.warning(&responses, "No success response (2xx) defined", "NO_SUCCESS_RESPONSE");
            }
        }

        for (i, param) in operation.parameters.iter().enumerate() {
            let field = format!("{}.parameters[{}]", location, i);
            if param.name.is_empty() {
                self.error(
                    &format!("{}.name", field),
                    "Parameter name is required",
                    "MISSING_PARAMETER_NAME",
                );
            }
            if param.schema == Schema::default() {
                self.error(
                    &format!("{}.schema", field),
                    "Parameter schema is required",
                    "MISSING_PARAMETER_SCHEMA",
                );
            }
        }

        if let Some(body) = &operation.request_body {
            if body.content.is_empty() {
                self.error(
                    &format!("{}.requestBody.content", location),
                    "Request body content is required",
                    "MISSING_REQUEST_BODY_CONTENT",
                );
            }
        }

        for (i, requirement) in operation.security.iter().flatten().enumerate() {
            if requirement.is_empty() {
                self.warning(
                    &format!("{}.security[{}]", location, i),
                    "Empty security requirement",
                    "EMPTY_SECURITY_REQUIREMENT",
                );
            }
        }
    }
}

/// Names of the whole-segment `{name}` parameters of a path.
fn brace_parameters(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|part| part.strip_prefix('{').and_then(|p| p.strip_suffix('}')))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiInfo;
    use crate::openapi_builder::{Info, OpenApiBuilder, Parameter, RequestBody, Response};
    use crate::route_discovery::HttpMethod;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn operation(response: Schema) -> Operation {
        let mut responses = BTreeMap::new();
        responses.insert("200".to_string(), Response::json("ok", response));
        Operation {
            operation_id: Some("getWidget".to_string()),
            summary: Some("Get widget".to_string()),
            parameters: vec![Parameter {
                name: "id".to_string(),
                location: ParameterLocation::Path,
                required: true,
                description: None,
                schema: Schema::of_type("string"),
            }],
            responses,
            ..Default::default()
        }
    }

    fn document(op: Operation, schemas: BTreeMap<String, Schema>) -> OpenApiDocument {
        let mut info = Info::from(&ApiInfo::default());
        info.description = Some("Widgets".to_string());
        let mut builder = OpenApiBuilder::new(info);
        builder.add_operation("/widgets/:id", HttpMethod::Get, op);
        builder.build(schemas)
    }

    fn widget_schemas() -> BTreeMap<String, Schema> {
        let mut schemas = BTreeMap::new();
        schemas.insert("Widget".to_string(), Schema::object());
        schemas
    }

    #[test]
    fn test_resolve_refs_accepts_known_components() {
        let doc = document(operation(Schema::reference("Widget")), widget_schemas());
        assert!(resolve_refs(&doc).is_ok());
    }

    #[test]
    fn test_resolve_refs_reports_location() {
        let nested = Schema::array(Schema::reference("Gadget"));
        let doc = document(operation(nested), widget_schemas());
        match resolve_refs(&doc).unwrap_err() {
            Error::UnresolvedRef {
                reference,
                location,
            } => {
                assert_eq!(reference, "#/components/schemas/Gadget");
                assert_eq!(location, "paths./widgets/{id}.get.responses.200.items");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_refs_checks_component_properties() {
        let mut schemas = widget_schemas();
        let mut owner = Schema::object();
        owner
            .properties
            .insert("parts".to_string(), Schema::map(Schema::reference("Part")));
        schemas.insert("Owner".to_string(), owner);
        let doc = document(operation(Schema::reference("Widget")), schemas);

        let err = resolve_refs(&doc).unwrap_err();
        assert!(err
            .to_string()
            .contains("components.schemas.Owner.properties.parts.additionalProperties"));
    }

    #[test]
    fn test_clean_document_passes_strict_lint() {
        let doc = document(operation(Schema::reference("Widget")), widget_schemas());
        assert_eq!(Validator::new(true).validate(&doc).unwrap(), Vec::new());
    }

    #[test]
    fn test_missing_path_parameter_is_error() {
        let mut op = operation(Schema::reference("Widget"));
        op.parameters.clear();
        let doc = document(op, widget_schemas());

        let findings = Validator::new(false).lint(&doc);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "MISSING_PATH_PARAMETER");
        assert_eq!(
            findings[0].to_string(),
            "paths./widgets/{id}.parameters: Path parameter 'id' is not defined (MISSING_PATH_PARAMETER)"
        );

        let err = Validator::new(false).validate(&doc).unwrap_err();
        assert!(matches!(err, Error::Validation { count: 1, .. }));
    }

    #[test]
    fn test_warnings_fail_only_in_strict_mode() {
        let mut op = operation(Schema::reference("Widget"));
        op.summary = None;
        op.operation_id = None;
        let doc = document(op, widget_schemas());

        let warnings = Validator::new(false).validate(&doc).unwrap();
        let codes: Vec<&str> = warnings.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec!["MISSING_OPERATION_ID", "MISSING_SUMMARY"]);

        let err = Validator::new(true).validate(&doc).unwrap_err();
        assert!(matches!(err, Error::Validation { count: 2, .. }));
    }

    #[test]
    fn test_operation_level_findings() {
        let mut op = operation(Schema::reference("Widget"));
        op.responses = BTreeMap::from([(
            "400".to_string(),
            Response {
                description: String::new(),
                content: None,
            },
        )]);
        op.request_body = Some(RequestBody {
            content: BTreeMap::new(),
            ..RequestBody::json(Schema::object())
        });
        op.security = Some(vec![BTreeMap::new()]);
        let mut schemas = widget_schemas();
        schemas.insert("Loose".to_string(), Schema::default());
        let doc = document(op, schemas);

        let codes: Vec<(Severity, &str)> = Validator::new(false)
            .lint(&doc)
            .iter()
            .map(|f| (f.severity, f.code))
            .collect();
        assert_eq!(
            codes,
            vec![
                (Severity::Warning, "MISSING_RESPONSE_DESCRIPTION"),
                (Severity::Warning, "NO_SUCCESS_RESPONSE"),
                (Severity::Error, "MISSING_REQUEST_BODY_CONTENT"),
                (Severity::Warning, "EMPTY_SECURITY_REQUIREMENT"),
                (Severity::Warning, "MISSING_SCHEMA_TYPE"),
            ]
        );
    }

    #[test]
    fn test_info_and_empty_paths() {
        let doc = OpenApiBuilder::new(Info {
            title: String::new(),
            version: String::new(),
            description: None,
            contact: None,
            license: None,
        })
        .build(BTreeMap::new());

        let codes: Vec<&str> = Validator::new(false)
            .lint(&doc)
            .iter()
            .map(|f| f.code)
            .collect();
        assert_eq!(
            codes,
            vec!["MISSING_TITLE", "MISSING_VERSION", "MISSING_DESCRIPTION", "EMPTY_PATHS"]
        );
    }

    #[test]
    fn test_brace_parameters() {
        assert_eq!(brace_parameters("/a/{x}/b/{y}"), vec!["x", "y"]);
        assert!(brace_parameters("/a/:x").is_empty());
    }
}
