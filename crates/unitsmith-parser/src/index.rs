//! Index Java sources into the project model.
//!
//! Each class-like declaration becomes a [`ClassUnit`]; each method a
//! [`MethodUnit`] whose `dependent_methods` records the calls it makes, keyed
//! by the receiver's fully-qualified class. Argument types are inferred from
//! declared locals, fields, literals and `new` expressions; anything else is
//! recorded as `?` and reconciled against the callee's declared overloads by
//! [`reconcile_call_signatures`].

use crate::treesitter::{
    ParseError, declared_signature, header_text, is_class_like, member_container, node_text,
    parameter_types, parse_lenient,
};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tree_sitter::Node;
use unitsmith_core::model::{ClassUnit, DependencyMap, MemberSource, MethodUnit, ProjectIndex};

/// Placeholder for an argument whose static type could not be inferred.
pub const UNKNOWN_TYPE: &str = "?";

const PRIMITIVES: &[&str] = &[
    "byte", "short", "int", "long", "float", "double", "boolean", "char", "void",
];

/// `java.lang` types that never resolve to a project or library class.
const JAVA_LANG: &[&str] = &[
    "Object",
    "String",
    "StringBuilder",
    "Math",
    "System",
    "Integer",
    "Long",
    "Short",
    "Byte",
    "Double",
    "Float",
    "Boolean",
    "Character",
    "Number",
    "Thread",
    "Exception",
    "RuntimeException",
    "Iterable",
    "Comparable",
    "CharSequence",
    "Class",
    "Enum",
];

/// Index every class declared in one Java compilation unit.
pub fn index_source(source: &str) -> Result<Vec<ClassUnit>, ParseError> {
    let tree = parse_lenient(source)?;
    let root = tree.root_node();

    let mut scope = FileScope::new(source, &root);
    scope.register_types(&root, None);

    let mut classes = BTreeMap::new();
    scope.collect_classes(&root, None, &mut classes);
    reconcile_call_signatures(&mut classes);
    Ok(classes.into_values().collect())
}

/// All `.java` files under `roots`, honouring `.gitignore`, sorted.
pub fn collect_java_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build();
        for entry in walker.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "java") {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Parse every Java file under `roots` into a [`ProjectIndex`].
///
/// Unreadable or unparseable files are logged and skipped.
pub fn index_sources(roots: &[PathBuf]) -> Result<ProjectIndex> {
    for root in roots {
        if !root.exists() {
            anyhow::bail!("source root {} does not exist", root.display());
        }
    }

    let files = collect_java_files(roots);
    tracing::debug!(files = files.len(), "indexing java sources");

    let parsed: Vec<Vec<ClassUnit>> = files
        .par_iter()
        .filter_map(|path| index_file(path))
        .collect();

    let mut index = ProjectIndex::new();
    for class in parsed.into_iter().flatten() {
        index.insert(class);
    }
    reconcile_call_signatures(&mut index.classes);

    tracing::info!(
        classes = index.len(),
        methods = index.method_count(),
        "indexed project sources"
    );
    Ok(index)
}

fn index_file(path: &Path) -> Option<Vec<ClassUnit>> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable source");
            return None;
        }
    };
    match index_source(&source) {
        Ok(classes) => Some(classes),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unparseable source");
            None
        }
    }
}

/// Per-file name resolution state.
struct FileScope<'s> {
    source: &'s str,
    /// Dotted package name, empty for the default package.
    package: String,
    package_line: String,
    import_lines: Vec<String>,
    /// Simple name → fully-qualified name, from imports and local declarations.
    known_types: HashMap<String, String>,
}

impl<'s> FileScope<'s> {
    fn new(source: &'s str, root: &Node<'_>) -> Self {
        let mut scope = Self {
            source,
            package: String::new(),
            package_line: String::new(),
            import_lines: Vec::new(),
            known_types: HashMap::new(),
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => {
                    let line = node_text(&child, source).trim().to_string();
                    scope.package = line
                        .trim_start_matches("package")
                        .trim_end_matches(';')
                        .trim()
                        .to_string();
                    scope.package_line = line;
                }
                "import_declaration" => {
                    let line = node_text(&child, source).trim().to_string();
                    let path = line
                        .trim_start_matches("import")
                        .trim()
                        .trim_end_matches(';')
                        .trim();
                    if !path.starts_with("static ") && !path.ends_with(".*") {
                        let simple = path.rsplit('.').next().unwrap_or(path);
                        scope
                            .known_types
                            .insert(simple.to_string(), path.to_string());
                    }
                    scope.import_lines.push(line);
                }
                _ => {}
            }
        }
        scope
    }

    fn qualified(&self, outer: Option<&str>, name: &str) -> String {
        match outer {
            Some(outer) => format!("{outer}.{name}"),
            None if self.package.is_empty() => name.to_string(),
            None => format!("{}.{name}", self.package),
        }
    }

    /// Record classes declared in this file so references to them qualify.
    fn register_types(&mut self, node: &Node<'_>, outer: Option<&str>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if !is_class_like(child.kind()) {
                continue;
            }
            let Some(name) = child.child_by_field_name("name") else {
                continue;
            };
            let name = node_text(&name, self.source);
            let full = self.qualified(outer, name);
            self.known_types.insert(name.to_string(), full.clone());
            if let Some(members) = member_container(&child) {
                self.register_types(&members, Some(&full));
            }
        }
    }

    /// Resolve a type as written to the class a call on it would land in.
    ///
    /// Returns `None` for primitives, arrays, type variables and common
    /// `java.lang` types.
    fn resolve_class(&self, type_text: &str) -> Option<String> {
        let base = type_text.split('<').next().unwrap_or(type_text).trim();
        if base.is_empty() || base.ends_with(']') || base == "var" || PRIMITIVES.contains(&base) {
            return None;
        }
        if let Some((head, rest)) = base.split_once('.') {
            if head.starts_with(|c: char| c.is_ascii_lowercase()) {
                return Some(base.to_string());
            }
            let outer = self.resolve_class(head)?;
            return Some(format!("{outer}.{rest}"));
        }
        if let Some(full) = self.known_types.get(base) {
            return Some(full.clone());
        }
        if JAVA_LANG.contains(&base) || is_type_variable(base) {
            return None;
        }
        Some(self.qualified(None, base))
    }

    /// JVM descriptor component for a type as written.
    fn descriptor_type(&self, type_text: &str) -> String {
        let mut text = type_text.trim();
        let mut dims = 0;
        if let Some(stripped) = text.strip_suffix("...") {
            text = stripped;
            dims += 1;
        }
        let mut base = text.split('<').next().unwrap_or(text).trim();
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped.trim_end();
            dims += 1;
        }

        let element = match base {
            "byte" => "B".to_string(),
            "short" => "S".to_string(),
            "int" => "I".to_string(),
            "long" => "J".to_string(),
            "float" => "F".to_string(),
            "double" => "D".to_string(),
            "boolean" => "Z".to_string(),
            "char" => "C".to_string(),
            "void" => "V".to_string(),
            _ => {
                let full = if is_type_variable(base) {
                    "java.lang.Object".to_string()
                } else if JAVA_LANG.contains(&base) && !self.known_types.contains_key(base) {
                    format!("java.lang.{base}")
                } else {
                    self.resolve_class(base)
                        .unwrap_or_else(|| self.qualified(None, base))
                };
                format!("L{};", full.replace('.', "/"))
            }
        };
        format!("{}{element}", "[".repeat(dims))
    }

    fn collect_classes(
        &self,
        node: &Node<'_>,
        outer: Option<&str>,
        out: &mut BTreeMap<String, ClassUnit>,
    ) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if !is_class_like(child.kind()) {
                continue;
            }
            let Some(name) = child.child_by_field_name("name") else {
                continue;
            };
            let full = self.qualified(outer, node_text(&name, self.source));
            let class = self.build_class(&child, &full);
            out.insert(full.clone(), class);
            if let Some(members) = member_container(&child) {
                self.collect_classes(&members, Some(&full), out);
            }
        }
    }

    fn build_class(&self, decl: &Node<'_>, full_name: &str) -> ClassUnit {
        let source = self.source;
        let name = decl
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
            .unwrap_or_default();

        let mut class = ClassUnit {
            full_name: full_name.to_string(),
            name,
            package: self.package_line.clone(),
            signature: header_text(decl, source).to_string(),
            imports: self.import_lines.clone(),
            ..ClassUnit::default()
        };

        let Some(members) = member_container(decl) else {
            return class;
        };

        let mut field_types = HashMap::new();
        let mut cursor = members.walk();
        for member in members.named_children(&mut cursor) {
            if member.kind() == "field_declaration" {
                class.fields.push(node_text(&member, source).trim().to_string());
                collect_declarators(&member, source, &mut field_types);
            }
        }

        let mut cursor = members.walk();
        for member in members.named_children(&mut cursor) {
            match member.kind() {
                "constructor_declaration" => {
                    let Some(signature) = declared_signature(&member, source) else {
                        continue;
                    };
                    let deps = self.calls_in(&member, &class, &field_types);
                    for (target, methods) in deps {
                        if !class.is_named(&target) {
                            class.constructor_deps.entry(target).or_default().extend(methods);
                        }
                    }
                    class.constructors.push(MemberSource {
                        signature,
                        brief: format!("{};", header_text(&member, source)),
                        source: node_text(&member, source).to_string(),
                    });
                }
                "method_declaration" => {
                    let Some(method) = self.build_method(&member, &class, &field_types) else {
                        continue;
                    };
                    let params = parameter_types(&member, source);
                    if is_accessor(&method.name, params.len()) {
                        class.accessors.push(MemberSource {
                            signature: method.signature.clone(),
                            brief: method.brief.clone(),
                            source: method.source.clone(),
                        });
                    }
                    class.insert_method(method);
                }
                _ => {}
            }
        }
        class
    }

    fn build_method(
        &self,
        decl: &Node<'_>,
        class: &ClassUnit,
        field_types: &HashMap<String, String>,
    ) -> Option<MethodUnit> {
        let source = self.source;
        let name = node_text(&decl.child_by_field_name("name")?, source).to_string();
        let signature = declared_signature(decl, source)?;

        let params: Vec<String> = parameter_types(decl, source)
            .iter()
            .map(|t| self.descriptor_type(t))
            .collect();
        let ret = decl
            .child_by_field_name("type")
            .map_or_else(|| "V".to_string(), |t| self.descriptor_type(node_text(&t, source)));

        Some(MethodUnit {
            name,
            signature,
            descriptor: format!("({}){ret}", params.concat()),
            brief: format!("{};", header_text(decl, source)),
            source: node_text(decl, source).to_string(),
            dependent_methods: self.calls_in(decl, class, field_types),
        })
    }

    /// Calls made by a method or constructor, keyed by receiver class.
    fn calls_in(
        &self,
        decl: &Node<'_>,
        class: &ClassUnit,
        field_types: &HashMap<String, String>,
    ) -> DependencyMap {
        let mut locals = HashMap::new();
        if let Some(params) = decl.child_by_field_name("parameters") {
            collect_parameters(&params, self.source, &mut locals);
        }
        let Some(body) = decl.child_by_field_name("body") else {
            return DependencyMap::new();
        };
        collect_locals(&body, self.source, &mut locals);

        let mut calls = CallCollector {
            scope: self,
            class,
            fields: field_types,
            locals: &locals,
            deps: DependencyMap::new(),
        };
        calls.visit(&body);
        calls.deps
    }
}

struct CallCollector<'a, 's> {
    scope: &'a FileScope<'s>,
    class: &'a ClassUnit,
    fields: &'a HashMap<String, String>,
    locals: &'a HashMap<String, String>,
    deps: DependencyMap,
}

impl CallCollector<'_, '_> {
    fn visit(&mut self, node: &Node<'_>) {
        if node.kind() == "method_invocation" {
            self.record_call(node);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(&child);
        }
    }

    fn record_call(&mut self, call: &Node<'_>) {
        let source = self.scope.source;
        let Some(name) = call.child_by_field_name("name") else {
            return;
        };
        let Some(target) = self.receiver_class(call.child_by_field_name("object")) else {
            return;
        };

        let mut arg_types = Vec::new();
        if let Some(args) = call.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                arg_types.push(self.infer_type(&arg));
            }
        }
        let signature = format!("{}({})", node_text(&name, source), arg_types.join(","));
        self.deps.entry(target).or_default().insert(signature);
    }

    fn variable_type(&self, name: &str) -> Option<&String> {
        self.locals.get(name).or_else(|| self.fields.get(name))
    }

    fn receiver_class(&self, object: Option<Node<'_>>) -> Option<String> {
        let source = self.scope.source;
        let Some(object) = object else {
            return Some(self.class.full_name.clone());
        };
        match object.kind() {
            "this" => Some(self.class.full_name.clone()),
            "identifier" => {
                let ident = node_text(&object, source);
                match self.variable_type(ident) {
                    Some(ty) => self.scope.resolve_class(ty),
                    None if ident.starts_with(|c: char| c.is_ascii_uppercase()) => {
                        self.scope.resolve_class(ident)
                    }
                    None => None,
                }
            }
            "field_access" => {
                let inner = object.child_by_field_name("object")?;
                if inner.kind() != "this" {
                    return None;
                }
                let field = object.child_by_field_name("field")?;
                let ty = self.fields.get(node_text(&field, source))?;
                self.scope.resolve_class(ty)
            }
            _ => None,
        }
    }

    fn infer_type(&self, arg: &Node<'_>) -> String {
        let source = self.scope.source;
        let text = node_text(arg, source);
        match arg.kind() {
            "identifier" => self
                .variable_type(text)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
            "string_literal" | "text_block" => "String".to_string(),
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => {
                if text.ends_with(['l', 'L']) {
                    "long".to_string()
                } else {
                    "int".to_string()
                }
            }
            "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                if text.ends_with(['f', 'F']) {
                    "float".to_string()
                } else {
                    "double".to_string()
                }
            }
            "true" | "false" => "boolean".to_string(),
            "character_literal" => "char".to_string(),
            "this" => self.class.name.clone(),
            "object_creation_expression" | "cast_expression" => arg
                .child_by_field_name("type")
                .map_or_else(
                    || UNKNOWN_TYPE.to_string(),
                    |t| strip_diamond(&strip_ws(node_text(&t, source))),
                ),
            "parenthesized_expression" => arg
                .named_child(0)
                .map_or_else(|| UNKNOWN_TYPE.to_string(), |inner| self.infer_type(&inner)),
            _ => UNKNOWN_TYPE.to_string(),
        }
    }
}

fn strip_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `ArrayList<>` carries no type arguments; compare on the raw type.
fn strip_diamond(type_text: &str) -> String {
    type_text.strip_suffix("<>").unwrap_or(type_text).to_string()
}

fn is_type_variable(name: &str) -> bool {
    name.len() == 1 && name.starts_with(|c: char| c.is_ascii_uppercase())
}

fn is_accessor(name: &str, params: usize) -> bool {
    let has_suffix = |prefix: &str| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
    };
    ((has_suffix("get") || has_suffix("is")) && params == 0) || (has_suffix("set") && params == 1)
}

/// Record `name → type` for every declarator of a field or local declaration.
fn collect_declarators(decl: &Node<'_>, source: &str, out: &mut HashMap<String, String>) {
    let Some(ty) = decl.child_by_field_name("type") else {
        return;
    };
    let declared = strip_ws(node_text(&ty, source));
    let mut cursor = decl.walk();
    for declarator in decl.children_by_field_name("declarator", &mut cursor) {
        let Some(name) = declarator.child_by_field_name("name") else {
            continue;
        };
        let mut ty = declared.clone();
        if declared == "var"
            && let Some(value) = declarator.child_by_field_name("value")
            && value.kind() == "object_creation_expression"
            && let Some(created) = value.child_by_field_name("type")
        {
            ty = strip_diamond(&strip_ws(node_text(&created, source)));
        }
        if let Some(dims) = declarator.child_by_field_name("dimensions") {
            ty.push_str(&strip_ws(node_text(&dims, source)));
        }
        out.insert(node_text(&name, source).to_string(), ty);
    }
}

fn collect_parameters(params: &Node<'_>, source: &str, out: &mut HashMap<String, String>) {
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => {
                if let (Some(ty), Some(name)) = (
                    param.child_by_field_name("type"),
                    param.child_by_field_name("name"),
                ) {
                    out.insert(
                        node_text(&name, source).to_string(),
                        strip_ws(node_text(&ty, source)),
                    );
                }
            }
            "spread_parameter" => {
                let mut inner = param.walk();
                let children: Vec<Node<'_>> = param.named_children(&mut inner).collect();
                let ty = children
                    .iter()
                    .find(|c| c.kind() != "modifiers" && c.kind() != "variable_declarator");
                let name = children
                    .iter()
                    .find(|c| c.kind() == "variable_declarator")
                    .and_then(|d| d.child_by_field_name("name"));
                if let (Some(ty), Some(name)) = (ty, name) {
                    out.insert(
                        node_text(&name, source).to_string(),
                        format!("{}[]", strip_ws(node_text(ty, source))),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Collect local variable types declared anywhere in a body.
///
/// Block scoping is ignored; a later declaration of the same name wins.
fn collect_locals(node: &Node<'_>, source: &str, out: &mut HashMap<String, String>) {
    match node.kind() {
        "local_variable_declaration" => collect_declarators(node, source, out),
        "enhanced_for_statement" => {
            if let (Some(ty), Some(name)) = (
                node.child_by_field_name("type"),
                node.child_by_field_name("name"),
            ) {
                out.insert(
                    node_text(&name, source).to_string(),
                    strip_ws(node_text(&ty, source)),
                );
            }
        }
        "resource" => {
            if let (Some(ty), Some(name)) = (
                node.child_by_field_name("type"),
                node.child_by_field_name("name"),
            ) {
                out.insert(
                    node_text(&name, source).to_string(),
                    strip_ws(node_text(&ty, source)),
                );
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_locals(&child, source, out);
    }
}

/// Split `name(A,Map<K,V>,C)` into its name and top-level parameter types.
fn split_signature(signature: &str) -> Option<(&str, Vec<&str>)> {
    let open = signature.find('(')?;
    let inner = signature.get(open + 1..signature.len().checked_sub(1)?)?;
    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                params.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !inner.is_empty() {
        params.push(&inner[start..]);
    }
    Some((&signature[..open], params))
}

/// Whether an argument of `inferred` type can be passed as `declared`.
///
/// `widen` also admits primitive widening, boxing and `Object` parameters.
fn argument_fits(declared: &str, inferred: &str, widen: bool) -> bool {
    if inferred == UNKNOWN_TYPE || declared == inferred {
        return true;
    }
    let raw = |t: &str| {
        let base = t.split('<').next().unwrap_or(t).to_string();
        base.rsplit('.').next().unwrap_or(&base).to_string()
    };
    let (declared, inferred) = (raw(declared), raw(inferred.trim_end_matches("...")));
    if declared == inferred {
        return true;
    }
    widen && (declared == "Object" || widens(&inferred, &declared) || boxes(&inferred, &declared))
}

/// Primitive widening conversion from `from` to `to`.
fn widens(from: &str, to: &str) -> bool {
    let targets: &[&str] = match from {
        "byte" => &["short", "int", "long", "float", "double"],
        "short" | "char" => &["int", "long", "float", "double"],
        "int" => &["long", "float", "double"],
        "long" => &["float", "double"],
        "float" => &["double"],
        _ => &[],
    };
    targets.contains(&to)
}

fn boxes(from: &str, to: &str) -> bool {
    const PAIRS: &[(&str, &str)] = &[
        ("boolean", "Boolean"),
        ("byte", "Byte"),
        ("short", "Short"),
        ("char", "Character"),
        ("int", "Integer"),
        ("long", "Long"),
        ("float", "Float"),
        ("double", "Double"),
    ];
    PAIRS
        .iter()
        .any(|&(p, b)| (from == p && to == b) || (from == b && to == p))
}

/// Declared overloads a call may bind to.
///
/// Exact-typed matches win; widening is tried only when none exist.
fn candidates<'d>(call: &str, declared: &'d [String]) -> Vec<&'d String> {
    let Some((name, args)) = split_signature(call) else {
        return Vec::new();
    };
    let matching = |widen: bool| -> Vec<&'d String> {
        declared
            .iter()
            .filter(|d| {
                split_signature(d).is_some_and(|(dname, params)| {
                    dname == name
                        && params.len() == args.len()
                        && params.iter().zip(&args).all(|(p, a)| argument_fits(p, a, widen))
                })
            })
            .collect()
    };
    let exact = matching(false);
    if exact.is_empty() { matching(true) } else { exact }
}

/// Rewrite inferred call signatures to the callee's declared signature.
///
/// A call edge whose signature is not declared verbatim by an indexed callee
/// is matched by name, arity and compatible argument types; a unique match
/// replaces it. Edges to classes outside `classes` are left as inferred.
pub fn reconcile_call_signatures(classes: &mut BTreeMap<String, ClassUnit>) {
    let catalog: HashMap<String, Vec<String>> = classes
        .iter()
        .map(|(name, class)| (name.clone(), class.methods.keys().cloned().collect()))
        .collect();

    let reconcile = |deps: &mut DependencyMap| {
        for (target, signatures) in deps.iter_mut() {
            let Some(declared) = catalog.get(target) else {
                continue;
            };
            let rewritten = signatures
                .iter()
                .map(|sig| match_declared(sig, declared).unwrap_or_else(|| sig.clone()))
                .collect();
            *signatures = rewritten;
        }
    };

    for class in classes.values_mut() {
        reconcile(&mut class.constructor_deps);
        for method in class.methods.values_mut() {
            reconcile(&mut method.dependent_methods);
        }
    }
}

fn match_declared(call: &str, declared: &[String]) -> Option<String> {
    if declared.iter().any(|d| d == call) {
        return None;
    }
    match candidates(call, declared).as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

/// Map wanted call signatures onto the signatures `declared` by their class.
///
/// Used for classes outside the index, whose call edges were never
/// reconciled. A signature declared verbatim is kept. Otherwise every
/// compatible overload is kept; if none is compatible, every overload with
/// the same name and arity is. Unmatched signatures are kept as given.
pub fn reconcile_wanted(wanted: &BTreeSet<String>, declared: &[String]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for call in wanted {
        if declared.iter().any(|d| d == call) {
            out.insert(call.clone());
            continue;
        }
        let mut found = candidates(call, declared);
        if found.is_empty()
            && let Some((name, args)) = split_signature(call)
        {
            found = declared
                .iter()
                .filter(|d| {
                    split_signature(d)
                        .is_some_and(|(dname, params)| dname == name && params.len() == args.len())
                })
                .collect();
        }
        if found.is_empty() {
            out.insert(call.clone());
        } else {
            out.extend(found.into_iter().cloned());
        }
    }
    out
}
