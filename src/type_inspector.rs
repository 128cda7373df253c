//! Resolution of Go type names into normalized [`TypeInfo`] trees.
//!
//! The [`TypeInspector`] indexes the type declarations and string constants of every loaded
//! package once, then resolves names lazily. Results are memoized per inspector, and a
//! "currently resolving" set turns self- or mutually-referential structs into an `Unknown` stub
//! at the point of recursion instead of looping.

use crate::ast::{self, Field, GoNode, StructType, TypeSpec};
use crate::error::{Error, Result};
use crate::parser::GoPackage;
use crate::tag::{self, JsonTag, StructTag};
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Go's predeclared basic types.
pub const BASIC_TYPES: &[&str] = &[
    "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32",
    "uint64", "float32", "float64", "bool", "byte", "rune",
];

pub fn is_basic_type(name: &str) -> bool {
    BASIC_TYPES.contains(&name)
}

/// Normalized description of a Go type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub name: String,
    /// Package qualifier for types named through a selector (`time` in `time.Time`)
    pub package: String,
    pub kind: TypeKind,
    pub is_exported: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Unknown,
    /// A predeclared type, or a named type whose underlying type is the given predeclared one
    Basic(String),
    Struct(Vec<FieldInfo>),
    Interface,
    Array(Rc<TypeInfo>),
    Slice(Rc<TypeInfo>),
    Map {
        key: Rc<TypeInfo>,
        value: Rc<TypeInfo>,
    },
    Pointer(Rc<TypeInfo>),
    Func,
    Chan,
    /// A string type with package-level constants; `values` is never empty
    Enum { base: String, values: Vec<String> },
}

impl TypeInfo {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Self {
            is_exported: ast::is_exported(&name),
            name,
            package: String::new(),
            kind,
        }
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Unknown)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_slice(&self) -> bool {
        matches!(self.kind, TypeKind::Slice(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, TypeKind::Map { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    /// Element of a slice, array or pointer.
    pub fn element_type(&self) -> Option<&Rc<TypeInfo>> {
        match &self.kind {
            TypeKind::Array(elem) | TypeKind::Slice(elem) | TypeKind::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn enum_values(&self) -> &[String] {
        match &self.kind {
            TypeKind::Enum { values, .. } => values,
            _ => &[],
        }
    }

    pub fn fields(&self) -> &[FieldInfo] {
        match &self.kind {
            TypeKind::Struct(fields) => fields,
            _ => &[],
        }
    }
}

/// One named struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Rc<TypeInfo>,
    /// Property name from the `json` tag, the field name without one, `None` for `json:"-"`
    pub json_name: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub is_required: bool,
    pub is_omit_empty: bool,
    pub is_exported: bool,
    pub description: Option<String>,
    /// Values of a `validate:"oneof=..."` rule
    pub enum_values: Vec<String>,
}

pub struct TypeInspector<'a> {
    specs: HashMap<String, TypeSpec<'a>>,
    enum_constants: HashMap<String, Vec<String>>,
    cache: HashMap<String, Rc<TypeInfo>>,
    resolving: HashSet<String>,
}

impl<'a> TypeInspector<'a> {
    /// Indexes the type declarations and typed string constants of `packages`.
    ///
    /// The first declaration of a name wins when several packages declare it.
    pub fn new(packages: impl IntoIterator<Item = &'a GoPackage>) -> Self {
        let mut specs = HashMap::new();
        let mut enum_constants: HashMap<String, Vec<String>> = HashMap::new();

        for file in packages.into_iter().flat_map(GoPackage::syntax_trees) {
            for spec in file.type_specs() {
                specs.entry(spec.name().to_string()).or_insert(spec);
            }
            for spec in file.const_specs() {
                let Some(ty) = spec.ty().filter(|ty| ty.kind() == "type_identifier") else {
                    continue;
                };
                let values = spec
                    .values()
                    .into_iter()
                    .take(spec.names().len())
                    .filter_map(GoNode::string_value);
                enum_constants
                    .entry(ty.text().to_string())
                    .or_default()
                    .extend(values);
            }
        }
        enum_constants.retain(|_, values| !values.is_empty());

        debug!(
            "Indexed {} type declarations, {} enum types",
            specs.len(),
            enum_constants.len()
        );
        Self {
            specs,
            enum_constants,
            cache: HashMap::new(),
            resolving: HashSet::new(),
        }
    }

    pub fn spec(&self, name: &str) -> Option<TypeSpec<'a>> {
        self.specs.get(name).copied()
    }

    /// String constants declared with type `name`, in declaration order.
    pub fn enum_constants(&self, name: &str) -> &[String] {
        self.enum_constants.get(name).map_or(&[], Vec::as_slice)
    }

    /// Resolves a type name.
    ///
    /// Unknown names are not an error: predeclared types become [`TypeKind::Basic`], anything else
    /// [`TypeKind::Unknown`]. A name that is already being resolved further up the stack yields
    /// an uncached `Unknown` stub.
    pub fn inspect_type(&mut self, name: &str) -> Rc<TypeInfo> {
        if let Some(info) = self.cache.get(name) {
            return Rc::clone(info);
        }
        if self.resolving.contains(name) {
            debug!("Circular reference to {}", name);
            return Rc::new(TypeInfo::unknown(name));
        }

        let Some(spec) = self.spec(name) else {
            let info = Rc::new(builtin_type(name));
            self.cache.insert(name.to_string(), Rc::clone(&info));
            return info;
        };

        self.resolving.insert(name.to_string());
        let info = Rc::new(self.resolve_spec(spec));
        self.resolving.remove(name);

        self.cache.insert(name.to_string(), Rc::clone(&info));
        info
    }

    /// Resolves a declaration directly, bypassing the cache.
    pub fn inspect_spec(&mut self, spec: TypeSpec<'_>) -> TypeInfo {
        let name = spec.name();
        let fresh = self.resolving.insert(name.to_string());
        let info = self.resolve_spec(spec);
        if fresh {
            self.resolving.remove(name);
        }
        info
    }

    fn resolve_spec(&mut self, spec: TypeSpec<'_>) -> TypeInfo {
        let name = spec.name();
        let Some(ty) = spec.ty() else {
            return TypeInfo::unknown(name);
        };
        match (ty.kind(), ty.text()) {
            ("type_identifier", "string") => {
                let values = self.enum_constants(name).to_vec();
                if values.is_empty() {
                    TypeInfo::new(name, TypeKind::Basic("string".to_string()))
                } else {
                    TypeInfo::new(
                        name,
                        TypeKind::Enum {
                            base: "string".to_string(),
                            values,
                        },
                    )
                }
            }
            ("type_identifier", underlying) => {
                let aliased = self.inspect_type(underlying);
                TypeInfo {
                    name: name.to_string(),
                    is_exported: ast::is_exported(name),
                    ..(*aliased).clone()
                }
            }
            _ => match self.inspect_expr(ty) {
                Ok(info) => TypeInfo {
                    name: name.to_string(),
                    is_exported: ast::is_exported(name),
                    package: String::new(),
                    ..(*info).clone()
                },
                Err(e) => {
                    debug!("Type {} left unknown: {}", name, e);
                    TypeInfo::unknown(name)
                }
            },
        }
    }

    /// Resolves a type expression as it appears in a field, parameter or declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTypeExpr`] when the node does not denote a type.
    pub fn inspect_expr(&mut self, expr: GoNode<'_>) -> Result<Rc<TypeInfo>> {
        let info = match expr.kind() {
            "type_identifier" => return Ok(self.inspect_type(expr.text())),
            "parenthesized_type" => return self.inspect_expr(first_child(expr)?),
            // generic instantiation resolves to its base declaration
            "generic_type" => return self.inspect_expr(field(expr, "type")?),
            "qualified_type" => {
                let Some((package, name)) = expr.qualified_name() else {
                    return Err(Error::UnsupportedTypeExpr(expr.text().to_string()));
                };
                TypeInfo {
                    name: format!("{}.{}", package, name),
                    package: package.to_string(),
                    kind: TypeKind::Unknown,
                    is_exported: ast::is_exported(name),
                }
            }
            "pointer_type" => {
                let elem = self.inspect_expr(first_child(expr)?)?;
                TypeInfo::new(format!("*{}", elem.name), TypeKind::Pointer(elem))
            }
            "slice_type" | "implicit_length_array_type" => {
                let elem = self.inspect_expr(field(expr, "element")?)?;
                TypeInfo::new(format!("[]{}", elem.name), TypeKind::Slice(elem))
            }
            "array_type" => {
                let elem = self.inspect_expr(field(expr, "element")?)?;
                TypeInfo::new(format!("[]{}", elem.name), TypeKind::Array(elem))
            }
            "map_type" => {
                let key = self.inspect_expr(field(expr, "key")?)?;
                let value = self.inspect_expr(field(expr, "value")?)?;
                TypeInfo::new(
                    format!("map[{}]{}", key.name, value.name),
                    TypeKind::Map { key, value },
                )
            }
            "struct_type" => {
                TypeInfo::new("", TypeKind::Struct(self.inspect_fields(StructType(expr))))
            }
            "interface_type" => TypeInfo::new("interface{}", TypeKind::Interface),
            "function_type" => TypeInfo::new("func", TypeKind::Func),
            "channel_type" => TypeInfo::new("chan", TypeKind::Chan),
            other => return Err(Error::UnsupportedTypeExpr(other.to_string())),
        };
        Ok(Rc::new(info))
    }

    fn inspect_fields(&mut self, st: StructType<'_>) -> Vec<FieldInfo> {
        let mut fields = Vec::new();
        for field in st.fields() {
            let names = field.names();
            if names.is_empty() {
                debug!("Skipping embedded field {}", field.0.text());
                continue;
            }
            for name in names {
                match self.inspect_field(field, name) {
                    Ok(info) => fields.push(info),
                    Err(e) => debug!("Failed to inspect field {}: {}", name, e),
                }
            }
        }
        fields
    }

    fn inspect_field(&mut self, field: Field<'_>, name: &str) -> Result<FieldInfo> {
        let ty = field
            .ty()
            .ok_or_else(|| Error::UnsupportedTypeExpr(format!("field {} has no type", name)))?;
        let ty = self.inspect_expr(ty)?;

        let mut info = FieldInfo {
            name: name.to_string(),
            ty,
            json_name: Some(name.to_string()),
            tags: BTreeMap::new(),
            is_required: false,
            is_omit_empty: false,
            is_exported: ast::is_exported(name),
            description: field_description(field),
            enum_values: Vec::new(),
        };

        if let Some(raw_tag) = field.tag() {
            let tags = StructTag::parse(&raw_tag);
            if let Some(json) = tags.get("json") {
                let json = JsonTag::parse(json);
                if json.skip {
                    info.json_name = None;
                } else if let Some(json_name) = json.name {
                    info.json_name = Some(json_name);
                }
                info.is_omit_empty = json.omit_empty;
            }
            if let Some(validate) = tags.get("validate") {
                info.is_required |= tag::has_required_rule(validate);
                info.enum_values = tag::oneof_values(validate);
            }
            if let Some(binding) = tags.get("binding") {
                info.is_required |= tag::has_required_rule(binding);
            }
            info.tags = tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }

        Ok(info)
    }
}

fn field<'n>(node: GoNode<'n>, name: &str) -> Result<GoNode<'n>> {
    node.field(name)
        .ok_or_else(|| Error::UnsupportedTypeExpr(node.kind().to_string()))
}

fn first_child(node: GoNode<'_>) -> Result<GoNode<'_>> {
    node.children()
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnsupportedTypeExpr(node.kind().to_string()))
}

/// First line of the field's doc comment, else of its trailing comment.
pub fn field_description(field: Field<'_>) -> Option<String> {
    field
        .doc()
        .and_then(|doc| doc.first_line())
        .or_else(|| field.comment().and_then(|c| c.first_line()))
        .filter(|line| !line.is_empty())
}

fn builtin_type(name: &str) -> TypeInfo {
    if is_basic_type(name) {
        TypeInfo {
            is_exported: true,
            ..TypeInfo::new(name, TypeKind::Basic(name.to_string()))
        }
    } else {
        TypeInfo::unknown(name)
    }
}
