//! The `@Directive` annotations of handler doc comments.
//!
//! ```text
//! // @Summary Get a widget
//! // @Tags widgets, catalog
//! // @Param id path string true "Widget ID"
//! // @Success 200 {object} models.Widget "ok"
//! // @Router /widgets/:id [GET]
//! ```
//!
//! Each comment line parses on its own into one [`Directive`]. Lines that do not start with `@`
//! are documentation, not directives.

use crate::route_discovery::{HttpMethod, ParameterLocation};
use regex::Regex;
use std::sync::LazyLock;

static ROUTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\S+)\s+\[(\w+)\]").unwrap());

/// Package qualifiers removed from `@Success` type names so they match component names.
pub const STRIPPED_PACKAGE_PREFIXES: &[&str] = &["models.", "config.", "services.", "api."];

/// Component used for `map[string]...` success payloads.
pub const STANDARD_SUCCESS_RESPONSE: &str = "StandardSuccessResponse";

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Summary(String),
    Description(String),
    Tags(Vec<String>),
    Router {
        path: String,
        method: HttpMethod,
    },
    Param(ParamDirective),
    /// Component name of the 200 response payload
    Success(String),
    Deprecated,
    /// An unrecognised, malformed or deliberately ignored directive, with its raw text
    Unknown(String),
}

/// `@Param <name> <in> <type> <required> ["description"]`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDirective {
    pub name: String,
    pub location: ParameterLocation,
    pub param_type: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    fn parse(token: &str) -> Self {
        match token {
            "int" | "integer" => ParamType::Integer,
            "bool" | "boolean" => ParamType::Boolean,
            _ => ParamType::String,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }
}

impl Directive {
    /// Parses one doc-comment line (markers already stripped). `None` when the line is not a
    /// directive at all.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let body = line.strip_prefix('@')?;
        let (keyword, rest) = match body.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (body, ""),
        };

        if keyword.eq_ignore_ascii_case("deprecated") {
            return Some(Directive::Deprecated);
        }
        if rest.is_empty() {
            return Some(Directive::Unknown(line.to_string()));
        }

        let directive = match keyword {
            "Summary" => Some(Directive::Summary(rest.to_string())),
            "Description" => Some(Directive::Description(rest.to_string())),
            "Tags" => Some(Directive::Tags(
                rest.split(',').map(|tag| tag.trim().to_string()).collect(),
            )),
            "Router" => parse_router(rest),
            "Param" => parse_param(rest).map(Directive::Param),
            "Success" => parse_success(rest).map(Directive::Success),
            _ => None,
        };
        Some(directive.unwrap_or_else(|| Directive::Unknown(line.to_string())))
    }
}

fn parse_router(rest: &str) -> Option<Directive> {
    let captures = ROUTER.captures(rest)?;
    let method = captures[2].parse().ok()?;
    Some(Directive::Router {
        path: captures[1].to_string(),
        method,
    })
}

fn parse_param(rest: &str) -> Option<ParamDirective> {
    let tokens = tokenize(rest);
    if tokens.len() < 4 {
        return None;
    }
    // OpenAPI 3 parameters live only in these four places; `body` and swagger 2 `formData`
    // describe request bodies, so they are dropped
    let location = match tokens[1].as_str() {
        "path" => ParameterLocation::Path,
        "query" => ParameterLocation::Query,
        "header" => ParameterLocation::Header,
        "cookie" => ParameterLocation::Cookie,
        _ => return None,
    };
    Some(ParamDirective {
        name: tokens[0].clone(),
        location,
        param_type: ParamType::parse(&tokens[2]),
        required: tokens[3] == "true",
        description: tokens.get(4).cloned(),
    })
}

fn parse_success(rest: &str) -> Option<String> {
    let tokens = tokenize(rest);
    if tokens.len() < 3 || tokens[0] != "200" || !tokens[1].contains("object") {
        return None;
    }
    if tokens[2].contains("map[string]") {
        return Some(STANDARD_SUCCESS_RESPONSE.to_string());
    }
    Some(strip_package_prefix(&tokens[2]).to_string())
}

/// Removes one of the known package qualifiers (`models.Widget` becomes `Widget`).
pub fn strip_package_prefix(type_name: &str) -> &str {
    STRIPPED_PACKAGE_PREFIXES
        .iter()
        .fold(type_name, |name, prefix| name.strip_prefix(prefix).unwrap_or(name))
}

/// Splits on spaces, keeping double-quoted runs together. Quote characters are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_respects_quotes() {
        assert_eq!(
            tokenize(r#"id path string true "Widget  ID""#),
            vec!["id", "path", "string", "true", "Widget  ID"]
        );
        assert_eq!(tokenize("  a   b "), vec!["a", "b"]);
    }

    #[test]
    fn test_plain_text_is_not_a_directive() {
        assert_eq!(Directive::parse("GetWidget returns one widget."), None);
    }

    #[test]
    fn test_summary_description_tags() {
        assert_eq!(
            Directive::parse("@Summary Get a widget"),
            Some(Directive::Summary("Get a widget".to_string()))
        );
        assert_eq!(
            Directive::parse("@Description Fetches it by id"),
            Some(Directive::Description("Fetches it by id".to_string()))
        );
        assert_eq!(
            Directive::parse("@Tags widgets, catalog"),
            Some(Directive::Tags(vec!["widgets".to_string(), "catalog".to_string()]))
        );
    }

    #[test]
    fn test_router() {
        assert_eq!(
            Directive::parse("@Router /widgets/:id [get]"),
            Some(Directive::Router {
                path: "/widgets/:id".to_string(),
                method: HttpMethod::Get
            })
        );
        assert!(matches!(
            Directive::parse("@Router /widgets"),
            Some(Directive::Unknown(_))
        ));
    }

    #[test]
    fn test_param() {
        let Some(Directive::Param(param)) =
            Directive::parse(r#"@Param limit query int false "Page size""#)
        else {
            panic!("expected a param directive");
        };
        assert_eq!(
            param,
            ParamDirective {
                name: "limit".to_string(),
                location: ParameterLocation::Query,
                param_type: ParamType::Integer,
                required: false,
                description: Some("Page size".to_string()),
            }
        );
    }

    #[test]
    fn test_param_rejections() {
        // too few tokens
        assert!(matches!(
            Directive::parse("@Param id path string"),
            Some(Directive::Unknown(_))
        ));
        // body parameters are dropped
        assert!(matches!(
            Directive::parse(r#"@Param request body CreateWidgetRequest true "payload""#),
            Some(Directive::Unknown(_))
        ));
        // so are swagger 2 form fields and anything else outside OpenAPI 3's locations
        for location in ["formData", "form", "Query"] {
            let line = format!("@Param avatar {} file true", location);
            assert!(
                matches!(Directive::parse(&line), Some(Directive::Unknown(_))),
                "{} should not become a parameter",
                location
            );
        }
        assert!(matches!(
            Directive::parse("@Param session cookie string false"),
            Some(Directive::Param(ParamDirective {
                location: ParameterLocation::Cookie,
                ..
            }))
        ));
    }

    #[test]
    fn test_param_type_defaults_to_string() {
        let Some(Directive::Param(param)) = Directive::parse("@Param x header uuid true") else {
            panic!("expected a param directive");
        };
        assert_eq!(param.param_type, ParamType::String);
        assert!(param.required);
        assert_eq!(param.description, None);
    }

    #[test]
    fn test_success() {
        assert_eq!(
            Directive::parse(r#"@Success 200 {object} models.Widget "ok""#),
            Some(Directive::Success("Widget".to_string()))
        );
        assert_eq!(
            Directive::parse("@Success 200 {object} map[string]interface{}"),
            Some(Directive::Success(STANDARD_SUCCESS_RESPONSE.to_string()))
        );
        assert!(matches!(
            Directive::parse("@Success 201 {object} Widget"),
            Some(Directive::Unknown(_))
        ));
        assert!(matches!(
            Directive::parse("@Success 200 {array} Widget"),
            Some(Directive::Unknown(_))
        ));
    }

    #[test]
    fn test_deprecated_and_unknown() {
        assert_eq!(Directive::parse("@deprecated"), Some(Directive::Deprecated));
        assert_eq!(Directive::parse("@Deprecated use v2"), Some(Directive::Deprecated));
        assert_eq!(
            Directive::parse("@Accept json"),
            Some(Directive::Unknown("@Accept json".to_string()))
        );
    }

    #[test]
    fn test_strip_package_prefix() {
        assert_eq!(strip_package_prefix("models.Widget"), "Widget");
        assert_eq!(strip_package_prefix("api.LoginRequest"), "LoginRequest");
        assert_eq!(strip_package_prefix("gin.H"), "gin.H");
    }
}
