use crate::config::SchemaGenerationConfig;
use crate::directive::{strip_package_prefix, STANDARD_SUCCESS_RESPONSE};
use crate::error::{Error, Result};
use crate::parser::GoPackage;
use crate::route_discovery::{is_excluded_type, BusinessEntity};
use crate::type_inspector::{FieldInfo, TypeInfo, TypeInspector, TypeKind};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Prefix of every local schema reference.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

pub const UUID_SCHEMA: &str = "UUID";
pub const ERROR_RESPONSE_SCHEMA: &str = "ErrorResponse";
pub const SUCCESS_RESPONSE_SCHEMA: &str = "SuccessResponse";

const UUID_PATTERN: &str = "^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";
const UUID_EXAMPLE: &str = "550e8400-e29b-41d4-a716-446655440000";

/// OpenAPI Schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Object properties, in declaration order
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for map types
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    /// `$ref` to the component schema `name`.
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
            ..Default::default()
        }
    }

    pub fn object() -> Self {
        Self::of_type("object")
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array")
        }
    }

    pub fn map(values: Schema) -> Self {
        Self {
            additional_properties: Some(Box::new(values)),
            ..Self::object()
        }
    }

    pub fn string_enum(values: &[String]) -> Self {
        Self {
            enum_values: values.to_vec(),
            ..Self::of_type("string")
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn with_property(mut self, name: &str, schema: Schema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Component name of a local `$ref`.
    pub fn referenced_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(SCHEMA_REF_PREFIX))
    }

    fn is_string(&self) -> bool {
        self.schema_type.as_deref() == Some("string")
    }
}

/// Schema of a Go predeclared type.
pub fn primitive_schema(name: &str) -> Option<Schema> {
    let unsigned = |format: &str| Schema {
        minimum: Some(0.0),
        ..Schema::of_type("integer").with_format(format)
    };
    let schema = match name {
        "string" => Schema::of_type("string"),
        "int" | "int8" | "int16" | "int32" | "rune" => Schema::of_type("integer").with_format("int32"),
        "int64" => Schema::of_type("integer").with_format("int64"),
        "uint" | "uint8" | "uint16" | "uint32" => unsigned("int32"),
        "uint64" => unsigned("int64"),
        "float32" => Schema::of_type("number").with_format("float"),
        "float64" => Schema::of_type("number").with_format("double"),
        "bool" => Schema::of_type("boolean"),
        "byte" => Schema::of_type("string").with_format("byte"),
        _ => return None,
    };
    Some(schema)
}

/// Schema of a well-known type from another package, `None` for anything else.
fn external_schema(qualified: &str) -> Option<Schema> {
    let nullable = |schema: Schema| Schema {
        nullable: true,
        ..schema
    };
    let schema = match qualified {
        "time.Time" => Schema::of_type("string").with_format("date-time"),
        "uuid.UUID" => Schema::of_type("string").with_format("uuid"),
        "json.RawMessage" => Schema::object(),
        "sql.NullString" => nullable(Schema::of_type("string")),
        "sql.NullInt64" => nullable(Schema::of_type("integer").with_format("int64")),
        "sql.NullInt32" | "sql.NullInt16" => nullable(Schema::of_type("integer").with_format("int32")),
        "sql.NullFloat64" => nullable(Schema::of_type("number").with_format("double")),
        "sql.NullBool" => nullable(Schema::of_type("boolean")),
        "sql.NullTime" => nullable(Schema::of_type("string").with_format("date-time")),
        _ => return None,
    };
    Some(schema)
}

fn common_schemas() -> Vec<(&'static str, Schema)> {
    let uuid = Schema {
        pattern: Some(UUID_PATTERN.to_string()),
        example: Some(serde_json::Value::String(UUID_EXAMPLE.to_string())),
        ..Schema::of_type("string")
            .with_format("uuid")
            .with_description("Unique identifier (UUID v4)")
    };
    let error = Schema {
        required: vec!["error".to_string()],
        ..Schema::object()
            .with_property("error", Schema::of_type("string").with_description("Error message"))
            .with_property("code", Schema::of_type("string").with_description("Error code"))
    };
    let success = Schema::object()
        .with_property("message", Schema::of_type("string").with_description("Success message"))
        .with_property("data", Schema::default().with_description("Response data"));

    vec![
        (UUID_SCHEMA, uuid),
        (ERROR_RESPONSE_SCHEMA, error),
        (SUCCESS_RESPONSE_SCHEMA, success.clone()),
        (STANDARD_SUCCESS_RESPONSE, success),
    ]
}

/// Replaces the schema with a string enum, keeping only its description.
fn apply_enum(schema: &mut Schema, values: &[String]) {
    let description = schema.description.take();
    *schema = Schema {
        description,
        ..Schema::string_enum(values)
    };
}

/// Format hints for string properties, from the property and field names.
fn enhance_by_name(schema: &mut Schema, property_name: &str, field_name: &str) {
    if !schema.is_string() {
        return;
    }
    let property = property_name.to_lowercase();
    let field = field_name.to_lowercase();

    if property.contains("id") || field.contains("id") {
        *schema = Schema::reference(UUID_SCHEMA);
        return;
    }
    if property.contains("email") {
        schema.format = Some("email".to_string());
    }
    if property.contains("url") || property.contains("uri") {
        schema.format = Some("uri".to_string());
    }
    if property.contains("date") || property.contains("time") || field.ends_with("at") {
        schema.format = Some("date-time".to_string());
    }
    if property.contains("password") || property.contains("secret") {
        schema.format = Some("password".to_string());
    }
}

/// Builds the component schemas of a generation run.
///
/// Three sources feed one schema map: fixed common schemas, business entities, and the exported
/// type declarations of the route packages. A later source replaces an earlier schema of the same
/// name.
pub struct SchemaGenerator<'a> {
    config: SchemaGenerationConfig,
    inspector: TypeInspector<'a>,
    /// Exported, non-excluded declarations of the route packages, in source order
    registry: Vec<String>,
    entities: Vec<BusinessEntity<'a>>,
    known: HashSet<String>,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(
        route_packages: &'a [GoPackage],
        entity_packages: &'a [GoPackage],
        config: SchemaGenerationConfig,
    ) -> Self {
        let inspector = TypeInspector::new(route_packages.iter().chain(entity_packages));

        let mut registry: Vec<String> = Vec::new();
        let specs = route_packages
            .iter()
            .flat_map(GoPackage::syntax_trees)
            .flat_map(|file| file.type_specs());
        for spec in specs {
            let name = spec.name();
            if is_excluded_type(name) {
                debug!("Skipping registration of excluded type {}", name);
                continue;
            }
            if spec.is_exported() && !registry.iter().any(|known| known == name) {
                registry.push(name.to_string());
            }
        }
        debug!("Registered {} declared types", registry.len());

        let mut generator = Self {
            config,
            inspector,
            registry,
            entities: Vec::new(),
            known: HashSet::new(),
        };
        generator.refresh_known_names();
        generator
    }

    pub fn set_business_entities(&mut self, entities: Vec<BusinessEntity<'a>>) {
        self.entities = entities;
        self.refresh_known_names();
    }

    fn refresh_known_names(&mut self) {
        let common = common_schemas().into_iter().map(|(name, _)| name.to_string());
        let enums = self.config.extra_enums.keys().cloned();
        let entities = self
            .entities
            .iter()
            .filter(|e| e.is_exported && !is_excluded_type(&e.name))
            .map(|e| e.name.clone());
        self.known = common
            .chain(enums)
            .chain(entities)
            .chain(self.registry.iter().cloned())
            .collect();
    }

    /// Whether a component schema of this name will be emitted.
    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// `$ref` for a type name found by handler analysis, when that type becomes a component.
    pub fn resolve_reference(&self, type_name: &str) -> Option<Schema> {
        let name = strip_package_prefix(type_name.trim_start_matches(['*', '&']));
        self.is_known(name).then(|| Schema::reference(name))
    }

    /// Generates every component schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a configured extra enum has no values.
    pub fn generate_schemas(&mut self) -> Result<BTreeMap<String, Schema>> {
        let mut schemas = BTreeMap::new();

        for (name, schema) in common_schemas() {
            insert_schema(&mut schemas, name, schema);
        }
        for (name, values) in &self.config.extra_enums {
            if values.is_empty() {
                return Err(Error::config(
                    "<generation config>",
                    format!("extra enum `{}` has no values", name),
                ));
            }
            let schema = Schema::string_enum(values)
                .with_description(&format!("Enumeration for {}", name));
            insert_schema(&mut schemas, name, schema);
        }

        let entity_specs: Vec<_> = self
            .entities
            .iter()
            .filter(|e| e.is_exported && !is_excluded_type(&e.name))
            .map(|e| e.declaration)
            .collect();
        for spec in entity_specs {
            let info = self.inspector.inspect_spec(spec);
            let schema = self.struct_schema(info.fields(), true);
            insert_schema(&mut schemas, spec.name(), schema);
        }

        for name in self.registry.clone() {
            let info = self.inspector.inspect_type(&name);
            let schema = self.shape_schema(&info);
            insert_schema(&mut schemas, &name, schema);
        }

        info!("Generated {} component schemas", schemas.len());
        Ok(schemas)
    }

    /// Schema for a type where it is used: known component names become references.
    fn type_schema(&self, info: &TypeInfo) -> Schema {
        if let TypeKind::Enum { values, .. } = &info.kind {
            return Schema::string_enum(values);
        }
        if info.package.is_empty() && self.is_known(&info.name) {
            return Schema::reference(&info.name);
        }
        // named structs are only described through their own component
        if matches!(info.kind, TypeKind::Struct(_)) && !info.name.is_empty() {
            return Schema::object();
        }
        self.shape_schema(info)
    }

    /// Schema for the structure of a type, never a reference to the type itself.
    fn shape_schema(&self, info: &TypeInfo) -> Schema {
        match &info.kind {
            TypeKind::Basic(base) => primitive_schema(base).unwrap_or_else(Schema::object),
            TypeKind::Enum { values, .. } => Schema::string_enum(values),
            TypeKind::Struct(fields) => self.struct_schema(fields, false),
            TypeKind::Pointer(elem) => self.type_schema(elem),
            TypeKind::Array(elem) | TypeKind::Slice(elem) => Schema::array(self.type_schema(elem)),
            TypeKind::Map { value, .. } => Schema::map(self.type_schema(value)),
            TypeKind::Unknown if !info.package.is_empty() => self.qualified_schema(info),
            TypeKind::Unknown | TypeKind::Interface | TypeKind::Func | TypeKind::Chan => {
                Schema::object()
            }
        }
    }

    /// `pkg.Name` types: well-known library types, then components by bare name, else string.
    fn qualified_schema(&self, info: &TypeInfo) -> Schema {
        if let Some(schema) = external_schema(&info.name) {
            return schema;
        }
        let bare = info.name.rsplit('.').next().unwrap_or(&info.name);
        if self.is_known(bare) {
            Schema::reference(bare)
        } else {
            Schema::of_type("string")
        }
    }

    /// Object schema from struct fields. `enhance` adds name-based string formats.
    fn struct_schema(&self, fields: &[FieldInfo], enhance: bool) -> Schema {
        let mut schema = Schema::object();
        for field in fields {
            if self.config.ignore_unexported_fields && !field.is_exported {
                continue;
            }
            // json:"-"
            let Some(json_name) = &field.json_name else {
                continue;
            };
            let property_name = if self.config.use_json_tags {
                json_name.clone()
            } else {
                field.name.clone()
            };

            let mut property = self.type_schema(&field.ty);
            if let Some(description) = &field.description {
                if !property.is_reference() {
                    property.description = Some(description.clone());
                }
            }

            let enum_values = if field.ty.is_enum() {
                field.ty.enum_values()
            } else {
                field.enum_values.as_slice()
            };
            if !enum_values.is_empty() {
                apply_enum(&mut property, enum_values);
            } else if enhance {
                enhance_by_name(&mut property, &property_name, &field.name);
            }

            if field.is_required {
                schema.required.push(property_name.clone());
            }
            schema.properties.insert(property_name, property);
        }
        schema
    }
}

fn insert_schema(schemas: &mut BTreeMap<String, Schema>, name: &str, schema: Schema) {
    if schemas.insert(name.to_string(), schema).is_some() {
        debug!("Schema {} replaced by a later definition", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use crate::route_discovery::discover_business_entities;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn package(name: &str, source: &str) -> GoPackage {
        GoPackage {
            name: name.to_string(),
            dir: PathBuf::from(name),
            files: vec![ParsedFile::from_source(
                PathBuf::from(format!("{}/types.go", name)),
                source.to_string(),
            )
            .unwrap()],
        }
    }

    const MODELS: &str = r#"package models

type CampaignStatus string

const (
    CampaignStatusDraft   CampaignStatus = "draft"
    CampaignStatusRunning CampaignStatus = "running"
)

type Campaign struct {
    // ID of the campaign.
    ID          string         `json:"id" validate:"required"`
    Name        string         `json:"name" binding:"required"`
    OwnerEmail  string         `json:"owner_email"`
    CallbackURL string         `json:"callback_url"`
    Status      CampaignStatus `json:"status"`
    Mode        string         `json:"mode" validate:"oneof=fast slow"`
    StartedAt   time.Time      `json:"started_at"`
    FinishedAt  string         `json:"finished_at"`
    Password    string         `json:"password"`
    Budget      uint32         `json:"budget"`
    Meta        json.RawMessage `json:"meta"`
    Note        sql.NullString `json:"note"`
    Internal    string         `json:"-"`
    secret      string
}
"#;

    const API: &str = r#"package api

type Count int

type Labels []string

type Scores map[string]float64

type CreateCampaignRequest struct {
    Name    string            `json:"name" validate:"required"`
    Count   Count             `json:"count"`
    Labels  Labels            `json:"labels"`
    Owner   *models.Campaign  `json:"owner"`
    Extra   interface{}       `json:"extra"`
    Handler *AuthHandler      `json:"handler"`
    Nested  struct {
        Flag bool `json:"flag"`
    } `json:"nested"`
}

type AuthHandler struct {
    ID string
}

type internalState struct{}
"#;

    fn fixtures() -> (GoPackage, GoPackage) {
        (package("api", API), package("models", MODELS))
    }

    fn generator<'a>(api: &'a GoPackage, models: &'a GoPackage) -> SchemaGenerator<'a> {
        let mut generator = SchemaGenerator::new(
            std::slice::from_ref(api),
            std::slice::from_ref(models),
            SchemaGenerationConfig::default(),
        );
        generator.set_business_entities(discover_business_entities(std::slice::from_ref(models)));
        generator
    }

    #[test]
    fn test_common_schemas() {
        let (api, models) = fixtures();
        let schemas = generator(&api, &models).generate_schemas().unwrap();
        let uuid = &schemas[UUID_SCHEMA];
        assert_eq!(uuid.format.as_deref(), Some("uuid"));
        assert_eq!(uuid.pattern.as_deref(), Some(UUID_PATTERN));
        assert_eq!(uuid.example, Some(serde_json::json!(UUID_EXAMPLE)));

        let error = &schemas[ERROR_RESPONSE_SCHEMA];
        assert_eq!(error.required, vec!["error"]);
        assert_eq!(
            error.properties.keys().collect::<Vec<_>>(),
            vec!["error", "code"]
        );
        assert_eq!(schemas[SUCCESS_RESPONSE_SCHEMA], schemas[STANDARD_SUCCESS_RESPONSE]);
    }

    #[test]
    fn test_entity_schema() {
        let (api, models) = fixtures();
        let schemas = generator(&api, &models).generate_schemas().unwrap();
        let campaign = &schemas["Campaign"];
        let props = &campaign.properties;

        assert_eq!(
            props.keys().collect::<Vec<_>>(),
            vec![
                "id", "name", "owner_email", "callback_url", "status", "mode", "started_at",
                "finished_at", "password", "budget", "meta", "note"
            ]
        );
        assert_eq!(campaign.required, vec!["id", "name"]);

        assert_eq!(props["id"], Schema::reference(UUID_SCHEMA));
        assert_eq!(props["owner_email"].format.as_deref(), Some("email"));
        assert_eq!(props["callback_url"].format.as_deref(), Some("uri"));
        assert_eq!(props["status"].enum_values, vec!["draft", "running"]);
        assert_eq!(props["mode"].enum_values, vec!["fast", "slow"]);
        assert_eq!(props["mode"].format, None);
        assert_eq!(props["started_at"].format.as_deref(), Some("date-time"));
        assert_eq!(props["finished_at"].format.as_deref(), Some("date-time"));
        assert_eq!(props["password"].format.as_deref(), Some("password"));
        assert_eq!(props["budget"].minimum, Some(0.0));
        assert_eq!(props["meta"], Schema::object());
        assert!(props["note"].nullable);
    }

    #[test]
    fn test_registry_schemas() {
        let (api, models) = fixtures();
        let schemas = generator(&api, &models).generate_schemas().unwrap();

        assert_eq!(schemas["Count"], Schema::of_type("integer").with_format("int32"));
        assert_eq!(schemas["Labels"], Schema::array(Schema::of_type("string")));
        assert_eq!(
            schemas["Scores"],
            Schema::map(Schema::of_type("number").with_format("double"))
        );
        assert!(!schemas.contains_key("AuthHandler"));
        assert!(!schemas.contains_key("internalState"));

        let request = &schemas["CreateCampaignRequest"];
        let props = &request.properties;
        assert_eq!(request.required, vec!["name"]);
        assert_eq!(props["name"], Schema::of_type("string"));
        assert_eq!(props["count"], Schema::reference("Count"));
        assert_eq!(props["labels"], Schema::reference("Labels"));
        assert_eq!(props["owner"], Schema::reference("Campaign"));
        assert_eq!(props["extra"], Schema::object());
        assert_eq!(props["handler"], Schema::object());
        assert_eq!(
            props["nested"].properties["flag"],
            Schema::of_type("boolean")
        );
    }

    #[test]
    fn test_registry_replaces_entity_of_same_name() {
        let models = package("models", MODELS);
        let mut generator = SchemaGenerator::new(
            std::slice::from_ref(&models),
            &[],
            SchemaGenerationConfig::default(),
        );
        generator.set_business_entities(discover_business_entities(std::slice::from_ref(&models)));
        let schemas = generator.generate_schemas().unwrap();

        // the plain declaration wins, so no name-based enhancement
        let id = &schemas["Campaign"].properties["id"];
        assert_eq!(id.schema_type.as_deref(), Some("string"));
        assert_eq!(id.description.as_deref(), Some("ID of the campaign."));
    }

    #[test]
    fn test_resolve_reference() {
        let (api, models) = fixtures();
        let generator = generator(&api, &models);
        assert_eq!(
            generator.resolve_reference("models.Campaign"),
            Some(Schema::reference("Campaign"))
        );
        assert_eq!(
            generator.resolve_reference("*CreateCampaignRequest"),
            Some(Schema::reference("CreateCampaignRequest"))
        );
        assert_eq!(generator.resolve_reference("gin.H"), None);
        assert_eq!(generator.resolve_reference("AuthHandler"), None);
    }

    #[test]
    fn test_extra_enums() {
        let mut config = SchemaGenerationConfig::default();
        config
            .extra_enums
            .insert("ColorEnum".to_string(), vec!["red".to_string(), "blue".to_string()]);
        let mut generator = SchemaGenerator::new(&[], &[], config.clone());
        let schemas = generator.generate_schemas().unwrap();
        let color = &schemas["ColorEnum"];
        assert_eq!(color.enum_values, vec!["red", "blue"]);
        assert_eq!(color.description.as_deref(), Some("Enumeration for ColorEnum"));
        assert!(generator.is_known("ColorEnum"));

        config.extra_enums.insert("Empty".to_string(), Vec::new());
        let err = SchemaGenerator::new(&[], &[], config)
            .generate_schemas()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_field_names_without_json_tags() {
        let models = package("models", MODELS);
        let config = SchemaGenerationConfig {
            use_json_tags: false,
            ignore_unexported_fields: false,
            ..Default::default()
        };
        let mut generator = SchemaGenerator::new(&[], std::slice::from_ref(&models), config);
        generator.set_business_entities(discover_business_entities(std::slice::from_ref(&models)));
        let schemas = generator.generate_schemas().unwrap();
        let props = &schemas["Campaign"].properties;
        assert!(props.contains_key("OwnerEmail"));
        assert!(props.contains_key("secret"));
        assert!(!props.contains_key("Internal"));
    }

    #[test]
    fn test_serialized_shape() {
        let schema = Schema {
            nullable: true,
            ..Schema::array(Schema::reference("Widget"))
        };
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "array",
                "items": {"$ref": "#/components/schemas/Widget"},
                "nullable": true
            })
        );
        assert_eq!(Schema::reference("Widget").referenced_name(), Some("Widget"));
    }
}
