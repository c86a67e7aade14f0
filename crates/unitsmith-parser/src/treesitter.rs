//! Tree-sitter integration for Java parsing and declaration helpers.

use tree_sitter::{Node, Tree};

/// Source text could not be parsed into a well-formed compilation unit.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to set tree-sitter language: {0}")]
    Language(String),
    #[error("tree-sitter produced no tree")]
    NoTree,
    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// Declaration kinds that carry a member body.
pub const CLASS_LIKE: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

pub fn java_language() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

/// Parse Java source, tolerating syntax errors (tree-sitter recovers).
pub fn parse_lenient(source: &str) -> Result<Tree, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&java_language())
        .map_err(|e| ParseError::Language(e.to_string()))?;
    parser.parse(source.as_bytes(), None).ok_or(ParseError::NoTree)
}

/// Parse Java source and reject any tree containing error or missing nodes.
pub fn parse_strict(source: &str) -> Result<Tree, ParseError> {
    let tree = parse_lenient(source)?;
    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error(&root)
            .map(|n| (n.start_position().row + 1, n.start_position().column + 1))
            .unwrap_or((1, 1));
        return Err(ParseError::Syntax { line, column });
    }
    Ok(tree)
}

fn first_error<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(*node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error()
            && let Some(found) = first_error(&child)
        {
            return Some(found);
        }
    }
    None
}

pub fn node_text<'s>(node: &Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

pub fn is_class_like(kind: &str) -> bool {
    CLASS_LIKE.contains(&kind)
}

/// The node holding a class-like declaration's members.
///
/// Enum constants live directly in `enum_body`; their members live in the
/// nested `enum_body_declarations`.
pub fn member_container<'t>(decl: &Node<'t>) -> Option<Node<'t>> {
    let body = decl.child_by_field_name("body")?;
    if body.kind() != "enum_body" {
        return Some(body);
    }
    let mut cursor = body.walk();
    let found = body
        .named_children(&mut cursor)
        .find(|c| c.kind() == "enum_body_declarations");
    found
}

/// Whether a declaration carries `modifier` (e.g. `private`, `static`).
pub fn has_modifier(decl: &Node<'_>, modifier: &str) -> bool {
    let mut cursor = decl.walk();
    let Some(modifiers) = decl
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
    else {
        return false;
    };
    let mut inner = modifiers.walk();
    let found = modifiers.children(&mut inner).any(|m| m.kind() == modifier);
    found
}

/// Parameter types of a method or constructor, whitespace-stripped.
///
/// Varargs keep their `...` suffix; C-style array dimensions on the
/// parameter name are folded into the type.
pub fn parameter_types(decl: &Node<'_>, source: &str) -> Vec<String> {
    let Some(params) = decl.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut types = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => {
                let Some(ty) = param.child_by_field_name("type") else {
                    continue;
                };
                let mut text = strip_ws(node_text(&ty, source));
                if let Some(dims) = param.child_by_field_name("dimensions") {
                    text.push_str(&strip_ws(node_text(&dims, source)));
                }
                types.push(text);
            }
            "spread_parameter" => {
                let mut inner = param.walk();
                let ty = param
                    .named_children(&mut inner)
                    .find(|c| c.kind() != "modifiers" && c.kind() != "variable_declarator");
                if let Some(ty) = ty {
                    types.push(format!("{}...", strip_ws(node_text(&ty, source))));
                }
            }
            _ => {}
        }
    }
    types
}

/// Normalized `name(T1,T2)` signature of a method or constructor declaration.
pub fn declared_signature(decl: &Node<'_>, source: &str) -> Option<String> {
    let name = decl.child_by_field_name("name")?;
    Some(format!(
        "{}({})",
        node_text(&name, source),
        parameter_types(decl, source).join(",")
    ))
}

/// Declaration text up to (not including) the body, e.g. `public int size()`.
pub fn header_text<'s>(decl: &Node<'_>, source: &'s str) -> &'s str {
    match decl.child_by_field_name("body") {
        Some(body) => source[decl.start_byte()..body.start_byte()].trim_end(),
        None => source[decl.byte_range()].trim_end_matches(';').trim_end(),
    }
}

fn strip_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
