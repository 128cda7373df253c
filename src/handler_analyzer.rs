//! Inference of request and response shapes from Gin handler bodies.
//!
//! Two passes run over a handler body. The first records the declared type of every `var`
//! declaration; the second looks at calls and assignments:
//!
//! - `c.ShouldBindJSON(&req)` and friends mark a request body, typed through the first pass
//! - `c.JSON(status, value)` and friends type the response from `value`
//! - `c.Query("name")` records a query parameter
//! - an assignment to a variable whose name mentions "request" types the request, unless a
//!   binding call already did

use crate::ast::{visit_children, FuncDecl, GoNode, Visit};
use crate::documentation;
use crate::parser::GoPackage;
use crate::route_discovery::{DiscoveredRoute, HttpMethod};
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;

/// Gin methods that bind the request body into their argument.
const BINDING_METHODS: &[&str] = &["ShouldBindJSON", "BindJSON", "ShouldBind", "Bind"];

/// Gin methods that serialize their second argument as the response.
const RESPONSE_METHODS: &[&str] = &["JSON", "YAML", "XML"];

/// What a handler body reveals about its request and response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerInfo {
    /// Where the handler was found; `None` when no Gin handler of the route's name exists
    pub function: Option<FunctionRef>,
    pub request_type: Option<String>,
    pub response_type: Option<String>,
    /// Doc-comment lines that are not directives
    pub documentation: Vec<String>,
    pub path_params: Vec<String>,
    pub query_params: Vec<String>,
    pub has_request_body: bool,
}

/// Location of a handler declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
}

pub struct HandlerAnalyzer<'a> {
    packages: &'a [GoPackage],
}

impl<'a> HandlerAnalyzer<'a> {
    pub fn new(packages: &'a [GoPackage]) -> Self {
        Self { packages }
    }

    /// Analyzes the handler of `route`.
    ///
    /// A route whose handler cannot be found still gets path parameters, and a request body is
    /// assumed for every method but GET.
    pub fn analyze_handler(&self, route: &DiscoveredRoute) -> HandlerInfo {
        let path_params = path_params(&route.path);
        let Some((func, file)) = self.find_handler(&route.function_name) else {
            debug!("No Gin handler named {} found", route.function_name);
            return HandlerInfo {
                path_params,
                has_request_body: route.method != HttpMethod::Get,
                ..Default::default()
            };
        };

        let mut info = HandlerInfo {
            function: Some(FunctionRef {
                name: func.name().to_string(),
                file,
                line: func.line(),
            }),
            documentation: func
                .doc()
                .map(|doc| documentation::doc_lines(&doc))
                .unwrap_or_default(),
            path_params,
            ..Default::default()
        };
        analyze_body(func, &mut info);
        debug!(
            "Handler {}: request {:?}, response {:?}, body {}",
            route.function_name, info.request_type, info.response_type, info.has_request_body
        );
        info
    }

    /// First function of this name whose first parameter is a `*gin.Context`.
    fn find_handler(&self, name: &str) -> Option<(FuncDecl<'a>, PathBuf)> {
        self.packages
            .iter()
            .flat_map(|package| &package.files)
            .find_map(|file| {
                file.syntax()
                    .func_decls()
                    .find(|func| func.name() == name && is_gin_handler(*func))
                    .map(|func| (func, file.path.clone()))
            })
    }
}

pub fn is_gin_handler(func: FuncDecl<'_>) -> bool {
    let Some(first) = func.params().into_iter().next() else {
        return false;
    };
    first
        .field("type")
        .filter(|ty| ty.kind() == "pointer_type")
        .and_then(|ty| ty.children().into_iter().next())
        .and_then(GoNode::qualified_name)
        == Some(("gin", "Context"))
}

/// `:name` and `{name}` segments of a route path.
fn path_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|segment| {
            segment
                .strip_prefix(':')
                .or_else(|| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        })
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn analyze_body(func: FuncDecl<'_>, info: &mut HandlerInfo) {
    let Some(body) = func.body() else {
        return;
    };

    let mut declarations = VarTypes::default();
    declarations.visit_node(body);
    debug!(
        "Collected {} variable types in {}",
        declarations.types.len(),
        func.name()
    );

    let mut analyzer = BodyAnalyzer {
        var_types: &declarations.types,
        info,
    };
    analyzer.visit_node(body);
}

/// Declared type names of `var` declarations, package qualifiers dropped.
#[derive(Default)]
struct VarTypes {
    types: HashMap<String, String>,
}

impl<'a> Visit<'a> for VarTypes {
    fn visit_node(&mut self, node: GoNode<'a>) {
        if node.kind() == "var_spec" {
            let type_name = node.field("type").and_then(|ty| match ty.kind() {
                "type_identifier" => Some(ty.text()),
                _ => ty.qualified_name().map(|(_, name)| name),
            });
            if let Some(type_name) = type_name {
                for name in node.fields("name") {
                    self.types.insert(name.text().to_string(), type_name.to_string());
                }
            }
        }
        visit_children(self, node);
    }
}

struct BodyAnalyzer<'i> {
    var_types: &'i HashMap<String, String>,
    info: &'i mut HandlerInfo,
}

impl BodyAnalyzer<'_> {
    fn analyze_call(&mut self, call: GoNode<'_>) {
        let Some(method) = call
            .field("function")
            .filter(|fun| fun.kind() == "selector_expression")
            .and_then(|fun| fun.field("field"))
        else {
            return;
        };
        let method = method.text();
        let args = call
            .field("arguments")
            .map(GoNode::children)
            .unwrap_or_default();

        if BINDING_METHODS.contains(&method) {
            self.info.has_request_body = true;
            let var = args
                .first()
                .filter(|arg| arg.kind() == "unary_expression")
                .and_then(|arg| arg.field("operand"))
                .filter(|operand| operand.kind() == "identifier");
            if let Some(var) = var {
                let type_name = self
                    .var_types
                    .get(var.text())
                    .cloned()
                    .unwrap_or_else(|| var.text().to_string());
                self.info.request_type = Some(type_name);
            }
        } else if RESPONSE_METHODS.contains(&method) {
            if let Some(value) = args.get(1) {
                self.info.response_type = extract_type(*value);
            }
        } else if method == "Query" {
            if let Some(name) = args.first().and_then(|arg| arg.string_value()) {
                self.info.query_params.push(name);
            }
        }
    }

    fn analyze_assignment(&mut self, assignment: GoNode<'_>) {
        // binding evidence outranks naming heuristics
        if self.info.request_type.is_some() && self.info.has_request_body {
            return;
        }
        let side = |name| {
            assignment
                .field(name)
                .map(GoNode::children)
                .unwrap_or_default()
        };
        for (target, value) in side("left").into_iter().zip(side("right")) {
            if target.kind() != "identifier" {
                continue;
            }
            if target.text().to_lowercase().contains("request") {
                self.info.request_type = extract_type(value);
            }
        }
    }
}

impl<'a> Visit<'a> for BodyAnalyzer<'_> {
    fn visit_node(&mut self, node: GoNode<'a>) {
        match node.kind() {
            "call_expression" => self.analyze_call(node),
            "short_var_declaration" | "assignment_statement" => self.analyze_assignment(node),
            _ => {}
        }
        visit_children(self, node);
    }
}

/// Type name suggested by an expression's shape.
pub fn extract_type(expr: GoNode<'_>) -> Option<String> {
    let qualified = |node: GoNode<'_>| match node.kind() {
        "identifier" | "type_identifier" => Some(node.text().to_string()),
        _ => node
            .qualified_name()
            .map(|(package, name)| format!("{}.{}", package, name)),
    };
    match expr.kind() {
        "identifier" | "selector_expression" => qualified(expr),
        "composite_literal" => expr.field("type").and_then(qualified),
        "unary_expression" => expr.field("operand").and_then(extract_type),
        "parenthesized_expression" => expr.children().into_iter().next().and_then(extract_type),
        "call_expression" => expr
            .field("function")
            .filter(|fun| fun.kind() == "identifier")
            .map(|fun| fun.text().to_string()),
        _ => None,
    }
}
