//! Reduce a class's source to the methods a caller actually uses.
//!
//! For every class-like declaration (nested ones included, local classes in
//! method bodies excluded):
//!
//! - private fields are removed,
//! - methods whose normalized signature is wanted keep their body,
//! - other public methods become bodiless stubs,
//! - every other method is removed.
//!
//! Constructors, initializers, enum constants and nested types are kept as
//! written. The edits are spliced into the original text, so formatting of
//! kept members is preserved byte for byte.

use crate::treesitter::{
    ParseError, declared_signature, has_modifier, header_text, is_class_like, member_container,
    parse_strict,
};
use std::collections::BTreeSet;
use std::ops::Range;
use tree_sitter::Node;
use unitsmith_core::model::normalize_signatures;

/// Result of pruning one compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunedSource {
    pub source: String,
    /// Normalized signatures whose bodies were kept.
    pub kept: BTreeSet<String>,
    /// Number of public methods reduced to stubs.
    pub stubbed: usize,
    /// Number of fields and methods removed.
    pub removed: usize,
}

/// Prune `source` down to the `wanted` method bodies plus public stubs.
///
/// Fails if the input, or the pruned output, does not parse cleanly.
pub fn prune(source: &str, wanted: &BTreeSet<String>) -> Result<PrunedSource, ParseError> {
    let tree = parse_strict(source)?;
    let wanted = normalize_signatures(wanted);

    let mut pass = PrunePass {
        source,
        wanted: &wanted,
        edits: Vec::new(),
        result: PrunedSource::default(),
    };
    pass.visit_declarations(&tree.root_node());

    let PrunePass {
        mut edits,
        mut result,
        ..
    } = pass;
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    let mut out = source.to_string();
    for (range, replacement) in edits {
        out.replace_range(range, replacement);
    }
    parse_strict(&out)?;

    result.source = out;
    Ok(result)
}

/// Normalized signatures of every method `prune` would consider in `source`.
pub fn declared_signatures(source: &str) -> Result<Vec<String>, ParseError> {
    fn collect(node: &Node<'_>, source: &str, out: &mut Vec<String>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if !is_class_like(child.kind()) {
                continue;
            }
            let Some(container) = member_container(&child) else {
                continue;
            };
            let mut members = container.walk();
            for member in container.named_children(&mut members) {
                if member.kind() == "method_declaration" {
                    out.extend(declared_signature(&member, source));
                }
            }
            collect(&container, source, out);
        }
    }

    let tree = parse_strict(source)?;
    let mut out = Vec::new();
    collect(&tree.root_node(), source, &mut out);
    Ok(out)
}

struct PrunePass<'a> {
    source: &'a str,
    wanted: &'a BTreeSet<String>,
    edits: Vec<(Range<usize>, &'static str)>,
    result: PrunedSource,
}

impl PrunePass<'_> {
    /// Find class-like declarations at the top level and inside class bodies.
    fn visit_declarations(&mut self, node: &Node<'_>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if is_class_like(child.kind()) {
                self.prune_class(&child);
            }
        }
    }

    fn prune_class(&mut self, decl: &Node<'_>) {
        let Some(container) = member_container(decl) else {
            return;
        };
        let implicitly_public = decl.kind() == "interface_declaration";

        let mut cursor = container.walk();
        for member in container.named_children(&mut cursor) {
            match member.kind() {
                "field_declaration" if has_modifier(&member, "private") => {
                    self.remove(&member);
                }
                "method_declaration" => self.prune_method(&member, implicitly_public),
                kind if is_class_like(kind) => self.prune_class(&member),
                _ => {}
            }
        }
    }

    fn prune_method(&mut self, method: &Node<'_>, implicitly_public: bool) {
        let Some(signature) = declared_signature(method, self.source) else {
            return;
        };
        if self.wanted.contains(&signature) {
            self.result.kept.insert(signature);
            return;
        }

        let public = has_modifier(method, "public")
            || (implicitly_public && !has_modifier(method, "private"));
        if !public {
            self.remove(method);
            return;
        }

        // Abstract and interface methods are already stubs.
        if let Some(body) = method.child_by_field_name("body") {
            let header_end = method.start_byte() + header_text(method, self.source).len();
            self.edits.push((header_end..body.end_byte(), ";"));
            self.result.stubbed += 1;
        }
    }

    fn remove(&mut self, node: &Node<'_>) {
        self.edits.push((line_span(self.source, node.byte_range()), ""));
        self.result.removed += 1;
    }
}

/// Widen `range` to whole lines when the node sits alone on its lines.
fn line_span(source: &str, range: Range<usize>) -> Range<usize> {
    let bytes = source.as_bytes();

    let mut start = range.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let alone_before = start == 0 || bytes[start - 1] == b'\n';

    let mut end = range.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'\r') {
        end += 1;
    }
    let alone_after = end == bytes.len() || bytes[end] == b'\n';

    if !(alone_before && alone_after) {
        return range;
    }
    if end < bytes.len() {
        end += 1;
    }
    start..end
}
