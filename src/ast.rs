//! Views over `tree-sitter-go` syntax trees.
//!
//! A [`GoNode`] pairs a tree-sitter node with the source it was parsed from. The typed views
//! ([`FuncDecl`], [`TypeSpec`], [`Field`], [`ValueSpec`]) read the node kinds and field names of
//! the Go grammar. Comments are `comment` nodes among the children of the enclosing node; the doc
//! comment of a declaration is the run of comments ending on the line right above it.

use std::fmt;
use tree_sitter::{Node, Tree};

/// A syntax node together with its source text.
#[derive(Clone, Copy)]
pub struct GoNode<'a> {
    node: Node<'a>,
    source: &'a str,
}

impl fmt::Debug for GoNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoNode")
            .field("kind", &self.kind())
            .field("line", &self.line())
            .finish()
    }
}

impl<'a> GoNode<'a> {
    pub fn new(node: Node<'a>, source: &'a str) -> Self {
        Self { node, source }
    }

    fn wrap(self, node: Node<'a>) -> Self {
        Self {
            node,
            source: self.source,
        }
    }

    pub fn kind(self) -> &'static str {
        self.node.kind()
    }

    pub fn text(self) -> &'a str {
        self.node
            .utf8_text(self.source.as_bytes())
            .unwrap_or_default()
    }

    /// 1-based line of the first character.
    pub fn line(self) -> usize {
        self.node.start_position().row + 1
    }

    /// 1-based column of the first character.
    pub fn column(self) -> usize {
        self.node.start_position().column + 1
    }

    /// The child stored under the grammar field `name`.
    pub fn field(self, name: &str) -> Option<Self> {
        self.node.child_by_field_name(name).map(|node| self.wrap(node))
    }

    /// Every child stored under the grammar field `name`, in source order.
    pub fn fields(self, name: &str) -> Vec<Self> {
        let mut cursor = self.node.walk();
        let nodes: Vec<Node<'a>> = self
            .node
            .children_by_field_name(name, &mut cursor)
            .collect();
        nodes.into_iter().map(|node| self.wrap(node)).collect()
    }

    /// Named children, comments left out.
    pub fn children(self) -> Vec<Self> {
        let mut cursor = self.node.walk();
        let nodes: Vec<Node<'a>> = self
            .node
            .named_children(&mut cursor)
            .filter(|node| node.kind() != "comment")
            .collect();
        nodes.into_iter().map(|node| self.wrap(node)).collect()
    }

    pub fn child_of_kind(self, kind: &str) -> Option<Self> {
        self.children().into_iter().find(|child| child.kind() == kind)
    }

    /// Decoded value of a string literal.
    pub fn string_value(self) -> Option<String> {
        match self.kind() {
            "interpreted_string_literal" | "raw_string_literal" => unquote(self.text()),
            _ => None,
        }
    }

    /// `(package, name)` of a `qualified_type`, or of a selector on a plain identifier.
    pub fn qualified_name(self) -> Option<(&'a str, &'a str)> {
        match self.kind() {
            "qualified_type" => Some((self.field("package")?.text(), self.field("name")?.text())),
            "selector_expression" => {
                let operand = self.field("operand")?;
                if operand.kind() != "identifier" {
                    return None;
                }
                Some((operand.text(), self.field("field")?.text()))
            }
            _ => None,
        }
    }

    /// Comments on the lines directly above the node, unless the first of them trails code.
    pub fn doc(self) -> Option<CommentGroup> {
        let mut comments = Vec::new();
        let mut next_row = self.node.start_position().row;
        let mut current = self.node.prev_named_sibling();

        while let Some(node) = current {
            if node.kind() != "comment" || node.end_position().row + 1 != next_row {
                break;
            }
            let trails_code = node.prev_named_sibling().is_some_and(|prev| {
                prev.kind() != "comment" && prev.end_position().row == node.start_position().row
            });
            if trails_code {
                break;
            }
            comments.push(self.wrap(node).text().to_string());
            next_row = node.start_position().row;
            current = node.prev_named_sibling();
        }

        if comments.is_empty() {
            return None;
        }
        comments.reverse();
        Some(CommentGroup {
            comments,
            line: next_row + 1,
        })
    }

    /// A comment starting on the line the node ends on.
    pub fn trailing_comment(self) -> Option<CommentGroup> {
        let next = self.node.next_named_sibling()?;
        if next.kind() != "comment" || next.start_position().row != self.node.end_position().row {
            return None;
        }
        Some(CommentGroup {
            comments: vec![self.wrap(next).text().to_string()],
            line: next.start_position().row + 1,
        })
    }
}

/// A run of adjacent comments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentGroup {
    /// Raw comment text including the `//` or `/* */` markers
    pub comments: Vec<String>,
    pub line: usize,
}

impl CommentGroup {
    /// Comment text with markers stripped, one entry per source line, trimmed.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for comment in &self.comments {
            if let Some(rest) = comment.strip_prefix("//") {
                lines.push(rest.trim().to_string());
            } else {
                let body = comment
                    .strip_prefix("/*")
                    .and_then(|c| c.strip_suffix("*/"))
                    .unwrap_or(comment);
                lines.extend(
                    body.lines()
                        .map(|l| l.trim().trim_start_matches('*').trim().to_string()),
                );
            }
        }
        lines
    }

    pub fn first_line(&self) -> Option<String> {
        self.lines().into_iter().next()
    }
}

/// Go's exported rule: the first character is an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Decodes an interpreted (`"..."`) or raw (`` `...` ``) Go string literal.
pub fn unquote(raw: &str) -> Option<String> {
    if let Some(body) = raw.strip_prefix('`').and_then(|r| r.strip_suffix('`')) {
        return Some(body.replace('\r', ""));
    }
    let body = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'x' => hex_escape(&mut chars, 2)?,
            'u' => hex_escape(&mut chars, 4)?,
            'U' => hex_escape(&mut chars, 8)?,
            d @ '0'..='7' => {
                let mut value = d.to_digit(8)?;
                for _ in 0..2 {
                    value = value * 8 + chars.next()?.to_digit(8)?;
                }
                char::from_u32(value)?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..digits {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(value)
}

/// The top-level declarations of one file.
#[derive(Debug, Clone, Copy)]
pub struct GoFile<'a> {
    root: GoNode<'a>,
}

impl<'a> GoFile<'a> {
    pub fn new(tree: &'a Tree, source: &'a str) -> Self {
        Self {
            root: GoNode::new(tree.root_node(), source),
        }
    }

    pub fn root(self) -> GoNode<'a> {
        self.root
    }

    pub fn package_name(self) -> Option<&'a str> {
        self.root
            .child_of_kind("package_clause")?
            .child_of_kind("package_identifier")
            .map(GoNode::text)
    }

    /// Functions and methods.
    pub fn func_decls(self) -> impl Iterator<Item = FuncDecl<'a>> {
        self.root
            .children()
            .into_iter()
            .filter(|node| matches!(node.kind(), "function_declaration" | "method_declaration"))
            .map(FuncDecl)
    }

    /// Type definitions and aliases, grouped ones included.
    pub fn type_specs(self) -> impl Iterator<Item = TypeSpec<'a>> {
        self.top_level_specs("type_declaration", &["type_spec", "type_alias"])
            .map(TypeSpec)
    }

    pub fn const_specs(self) -> impl Iterator<Item = ValueSpec<'a>> {
        self.top_level_specs("const_declaration", &["const_spec"])
            .map(ValueSpec)
    }

    fn top_level_specs(
        self,
        declaration: &'static str,
        specs: &'static [&'static str],
    ) -> impl Iterator<Item = GoNode<'a>> {
        self.root
            .children()
            .into_iter()
            .filter(move |node| node.kind() == declaration)
            .flat_map(GoNode::children)
            .filter(move |node| specs.contains(&node.kind()))
    }

    /// The innermost error or missing node, when the parser had to recover.
    pub fn first_error(self) -> Option<GoNode<'a>> {
        let mut node = self.root.node;
        if !node.has_error() {
            return None;
        }
        loop {
            if node.is_error() || node.is_missing() {
                return Some(self.root.wrap(node));
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
            match children.into_iter().find(|child| child.has_error()) {
                Some(child) => node = child,
                None => return Some(self.root.wrap(node)),
            }
        }
    }
}

/// A `function_declaration` or `method_declaration`.
#[derive(Debug, Clone, Copy)]
pub struct FuncDecl<'a>(pub GoNode<'a>);

impl<'a> FuncDecl<'a> {
    pub fn name(self) -> &'a str {
        self.0.field("name").map_or("", GoNode::text)
    }

    pub fn line(self) -> usize {
        self.0.line()
    }

    pub fn doc(self) -> Option<CommentGroup> {
        self.0.doc()
    }

    /// Parameter declarations; `a, b int` is one declaration with two names.
    pub fn params(self) -> Vec<GoNode<'a>> {
        self.0
            .field("parameters")
            .map(GoNode::children)
            .unwrap_or_default()
    }

    pub fn body(self) -> Option<GoNode<'a>> {
        self.0.field("body")
    }
}

/// A `type_spec` or `type_alias`.
#[derive(Debug, Clone, Copy)]
pub struct TypeSpec<'a>(pub GoNode<'a>);

impl<'a> TypeSpec<'a> {
    pub fn name(self) -> &'a str {
        self.0.field("name").map_or("", GoNode::text)
    }

    pub fn is_exported(self) -> bool {
        is_exported(self.name())
    }

    /// The type expression being named.
    pub fn ty(self) -> Option<GoNode<'a>> {
        self.0.field("type")
    }

    pub fn struct_type(self) -> Option<StructType<'a>> {
        self.ty()
            .filter(|ty| ty.kind() == "struct_type")
            .map(StructType)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StructType<'a>(pub GoNode<'a>);

impl<'a> StructType<'a> {
    pub fn fields(self) -> Vec<Field<'a>> {
        self.0
            .child_of_kind("field_declaration_list")
            .map(|list| {
                list.children()
                    .into_iter()
                    .filter(|node| node.kind() == "field_declaration")
                    .map(Field)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One `field_declaration` of a struct.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a>(pub GoNode<'a>);

impl<'a> Field<'a> {
    /// Declared names; empty for an embedded field.
    pub fn names(self) -> Vec<&'a str> {
        self.0.fields("name").into_iter().map(GoNode::text).collect()
    }

    pub fn ty(self) -> Option<GoNode<'a>> {
        self.0.field("type")
    }

    /// Decoded tag literal.
    pub fn tag(self) -> Option<String> {
        self.0.field("tag")?.string_value()
    }

    pub fn doc(self) -> Option<CommentGroup> {
        self.0.doc()
    }

    pub fn comment(self) -> Option<CommentGroup> {
        self.0.trailing_comment()
    }
}

/// A `const_spec` or `var_spec`.
#[derive(Debug, Clone, Copy)]
pub struct ValueSpec<'a>(pub GoNode<'a>);

impl<'a> ValueSpec<'a> {
    pub fn names(self) -> Vec<&'a str> {
        self.0.fields("name").into_iter().map(GoNode::text).collect()
    }

    pub fn ty(self) -> Option<GoNode<'a>> {
        self.0.field("type")
    }

    pub fn values(self) -> Vec<GoNode<'a>> {
        self.0
            .field("value")
            .map(GoNode::children)
            .unwrap_or_default()
    }
}

/// Depth-first traversal over named nodes.
///
/// `visit_node` defaults to [`visit_children`]; an implementation inspects the nodes it cares
/// about and calls `visit_children` to keep descending.
pub trait Visit<'a> {
    fn visit_node(&mut self, node: GoNode<'a>) {
        visit_children(self, node);
    }
}

pub fn visit_children<'a, V>(v: &mut V, node: GoNode<'a>)
where
    V: Visit<'a> + ?Sized,
{
    let mut cursor = node.node.walk();
    if !cursor.goto_first_child() {
        return;
    }
    loop {
        let child = cursor.node();
        if child.is_named() {
            v.visit_node(node.wrap(child));
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
}
