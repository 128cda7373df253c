//! Documentation text derived from doc comments and handler names.

use crate::route_discovery::{DiscoveredRoute, HttpMethod};
use crate::ast::CommentGroup;
use regex::Regex;
use std::sync::LazyLock;

static WORD_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Path segments skipped when naming the resource of a route.
const VERSION_SEGMENTS: &[&str] = &["api", "v1", "v2"];

/// Non-empty doc lines that are not `@` directives.
pub fn doc_lines(doc: &CommentGroup) -> Vec<String> {
    doc.lines()
        .into_iter()
        .filter(|line| !line.is_empty() && !line.starts_with('@'))
        .collect()
}

/// Upper-cases the first character.
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `createUserAccount` becomes `Create user account`.
pub fn camel_to_sentence(name: &str) -> String {
    let spaced = WORD_BOUNDARY.replace_all(name, "$1 $2");
    spaced
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i == 0 {
                title_case(&lower)
            } else {
                lower
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapses whitespace and makes sure the text ends like a sentence.
pub fn clean_description(text: &str) -> String {
    let mut cleaned = WHITESPACE.replace_all(text, " ").trim().to_string();
    if !cleaned.is_empty() && !cleaned.ends_with(['.', '!', '?']) {
        cleaned.push('.');
    }
    cleaned
}

/// First path segment that is neither a version prefix nor a parameter.
pub fn resource_from_path(path: &str) -> &str {
    path.trim_matches('/')
        .split('/')
        .find(|part| {
            !part.is_empty()
                && !VERSION_SEGMENTS.contains(part)
                && !part.contains(':')
                && !part.contains('{')
        })
        .unwrap_or("resource")
}

fn method_word(method: HttpMethod) -> String {
    title_case(&method.as_str().to_lowercase())
}

pub fn default_summary(handler_name: &str, method: HttpMethod) -> String {
    let name = handler_name.strip_suffix("Gin").unwrap_or(handler_name);
    let summary = camel_to_sentence(name);
    if summary.is_empty() {
        format!("{} operation", method_word(method))
    } else {
        summary
    }
}

pub fn default_description(method: HttpMethod, path: &str) -> String {
    format!("{} {} endpoint", method_word(method), resource_from_path(path))
}

/// Fills a missing summary and description from the handler name, path and doc lines.
pub fn apply_defaults(route: &mut DiscoveredRoute) {
    if route.summary.is_none() {
        route.summary = Some(default_summary(&route.function_name, route.method));
    }
    if route.description.is_none() {
        let documented = clean_description(&route.documentation.join(" "));
        route.description = Some(if documented.is_empty() {
            default_description(route.method, &route.path)
        } else {
            documented
        });
    }
}
