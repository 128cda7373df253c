//! Go struct tags: `json:"name,omitempty" validate:"required,oneof=a b"`.

use crate::ast::unquote;

/// The key/value pairs of a struct tag, in source order.
///
/// Parsing follows Go's `reflect.StructTag` conventions: pairs are separated by spaces, keys run
/// up to a colon, values are interpreted string literals. Parsing stops at the first malformed
/// pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructTag {
    pairs: Vec<(String, String)>,
}

impl StructTag {
    pub fn parse(tag: &str) -> Self {
        let mut pairs = Vec::new();
        let mut rest = tag;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }

            let key_len = rest
                .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
                .unwrap_or(rest.len());
            if key_len == 0 || !rest[key_len..].starts_with(":\"") {
                break;
            }
            let key = &rest[..key_len];
            rest = &rest[key_len + 1..];

            // find the closing quote, honouring escapes
            let mut end = None;
            let mut escaped = false;
            for (i, c) in rest.char_indices().skip(1) {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => {
                        end = Some(i);
                        break;
                    }
                    _ => escaped = false,
                }
            }
            let Some(end) = end else { break };
            let Some(value) = unquote(&rest[..=end]) else {
                break;
            };
            pairs.push((key.to_string(), value));
            rest = &rest[end + 1..];
        }
        Self { pairs }
    }

    /// The value for `key`, like `reflect.StructTag.Lookup`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A decoded `json` tag value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonTag {
    /// Explicit property name; `None` when the tag leaves it empty
    pub name: Option<String>,
    /// `json:"-"`
    pub skip: bool,
    pub omit_empty: bool,
}

impl JsonTag {
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            return JsonTag {
                skip: true,
                ..Default::default()
            };
        }
        let mut parts = value.split(',');
        let name = parts
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let omit_empty = parts.any(|option| option == "omitempty");
        JsonTag {
            name,
            skip: false,
            omit_empty,
        }
    }
}

/// Whether a `validate` or `binding` tag value carries the `required` rule.
pub fn has_required_rule(value: &str) -> bool {
    value.split(',').any(|rule| rule.trim() == "required")
}

/// Values permitted by a `oneof=` rule.
///
/// Everything after `oneof=` is split on whitespace up to the next token that itself holds a
/// `key=value` rule; trailing `,` and `;` are trimmed from each value.
pub fn oneof_values(value: &str) -> Vec<String> {
    let Some(index) = value.find("oneof=") else {
        return Vec::new();
    };
    value[index + "oneof=".len()..]
        .split_whitespace()
        .take_while(|part| !part.contains('='))
        .map(|part| part.trim_end_matches([',', ';']))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_struct_tag() {
        let tag = StructTag::parse(r#"json:"name,omitempty" validate:"required,oneof=a b" db:"name""#);
        assert_eq!(tag.get("json"), Some("name,omitempty"));
        assert_eq!(tag.get("validate"), Some("required,oneof=a b"));
        assert_eq!(tag.get("db"), Some("name"));
        assert_eq!(tag.get("xml"), None);
        assert_eq!(tag.iter().count(), 3);
    }

    #[test]
    fn test_parse_struct_tag_escapes_and_garbage() {
        let tag = StructTag::parse(r#"desc:"say \"hi\"" broken"#);
        assert_eq!(tag.get("desc"), Some(r#"say "hi""#));
        assert_eq!(tag.iter().count(), 1);
    }

    #[test]
    fn test_json_tag() {
        assert_eq!(
            JsonTag::parse("id,omitempty"),
            JsonTag {
                name: Some("id".to_string()),
                skip: false,
                omit_empty: true
            }
        );
        assert_eq!(JsonTag::parse(",omitempty").name, None);
        assert!(JsonTag::parse("-").skip);
        // "-," names a property literally called "-"
        assert_eq!(JsonTag::parse("-,").name.as_deref(), Some("-"));
    }

    #[test]
    fn test_required_rule() {
        assert!(has_required_rule("required"));
        assert!(has_required_rule("omitempty,required,min=1"));
        assert!(!has_required_rule("required_if=Kind a"));
        assert!(!has_required_rule("omitempty"));
    }

    #[test]
    fn test_oneof_values() {
        assert_eq!(oneof_values("required,oneof=draft active done"), vec!["draft", "active", "done"]);
        assert_eq!(oneof_values("oneof=a b, min=1"), vec!["a", "b"]);
        assert_eq!(oneof_values("oneof=x; y;"), vec!["x", "y"]);
        assert!(oneof_values("required").is_empty());
    }
}
