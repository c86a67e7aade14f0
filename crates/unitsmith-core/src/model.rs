//! Project model: parsed classes, methods, and the dependency edges between them.
//!
//! Method signatures are the join key between a caller's wanted calls and a
//! callee's available methods, so every lookup goes through
//! [`normalize_signature`] on both sides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `dependency class name → set(method signature)`.
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

/// Normalize a method signature to `name(T1,T2,...)` with all whitespace removed.
pub fn normalize_signature(signature: &str) -> String {
    signature.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalize every signature of a wanted set.
pub fn normalize_signatures<'a, I>(signatures: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    signatures
        .into_iter()
        .map(|s| normalize_signature(s))
        .collect()
}

/// Last segment of a dotted (possibly generic) type or class name.
///
/// `com.a.Outer$Inner` → `Outer$Inner`, `java.util.List<String>` → `List`.
pub fn simple_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit('.').next().unwrap_or(base)
}

/// One dependency edge: a class and the methods of it that are called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge<'a> {
    pub class_name: &'a str,
    pub methods: &'a BTreeSet<String>,
}

/// Iterate a dependency map as edges.
pub fn edges(map: &DependencyMap) -> impl Iterator<Item = DependencyEdge<'_>> {
    map.iter().map(|(class_name, methods)| DependencyEdge {
        class_name,
        methods,
    })
}

/// A constructor or accessor excerpt kept alongside its class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSource {
    /// Normalized signature, e.g. `setName(String)`.
    pub signature: String,
    /// Declaration without body, e.g. `public void setName(String name);`.
    pub brief: String,
    /// Full source text including body.
    pub source: String,
}

/// A parsed method of a project class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodUnit {
    pub name: String,
    /// Normalized signature, e.g. `add(int,java.util.List<String>)`.
    pub signature: String,
    /// JVM-style descriptor, best effort for unresolved types.
    pub descriptor: String,
    /// Declaration without body.
    pub brief: String,
    /// Full method source.
    pub source: String,
    /// Methods this method calls, keyed by the declaring class.
    /// In-class self calls are keyed by the enclosing class's own name.
    pub dependent_methods: DependencyMap,
}

/// A parsed class (or interface, enum, record) of the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassUnit {
    /// Fully-qualified name, e.g. `com.acme.Cart`.
    pub full_name: String,
    /// Simple name, e.g. `Cart`.
    pub name: String,
    /// Package declaration line (`package com.acme;`), empty for the default package.
    pub package: String,
    /// Declaration header without body, e.g. `public class Cart extends Base`.
    pub signature: String,
    /// Import declaration lines.
    pub imports: Vec<String>,
    /// Field declaration lines.
    pub fields: Vec<String>,
    pub constructors: Vec<MemberSource>,
    /// Getter/setter excerpts.
    pub accessors: Vec<MemberSource>,
    /// Methods of other classes called by this class's constructors.
    pub constructor_deps: DependencyMap,
    /// Methods keyed by normalized signature.
    pub methods: BTreeMap<String, MethodUnit>,
}

impl ClassUnit {
    pub fn has_constructor(&self) -> bool {
        !self.constructors.is_empty()
    }

    /// Whether `name` refers to this class, by fully-qualified or simple name.
    pub fn is_named(&self, name: &str) -> bool {
        name == self.full_name || name == self.name
    }

    /// Look up a method by signature (normalized before lookup).
    pub fn method(&self, signature: &str) -> Option<&MethodUnit> {
        self.methods.get(&normalize_signature(signature))
    }

    /// Insert a method under its normalized signature.
    pub fn insert_method(&mut self, mut method: MethodUnit) {
        method.signature = normalize_signature(&method.signature);
        self.methods.insert(method.signature.clone(), method);
    }

    /// A compact excerpt of this class holding only the wanted methods' bodies.
    ///
    /// Used as dependency context for classes that are part of the parsed project.
    pub fn excerpt(&self, wanted: &BTreeSet<String>) -> String {
        let mut out = String::new();
        if !self.package.is_empty() {
            out.push_str(&self.package);
            out.push('\n');
        }
        out.push_str(&self.signature);
        out.push_str(" {\n");
        for field in &self.fields {
            out.push_str("    ");
            out.push_str(field);
            out.push('\n');
        }
        for signature in wanted {
            if let Some(method) = self.method(signature) {
                out.push('\n');
                out.push_str(&method.source);
                out.push('\n');
            }
        }
        out.push('}');
        out
    }
}

/// Read-only access to the parsed project.
pub trait ProjectModel: Send + Sync {
    /// Find a class by fully-qualified (or unambiguous simple) name.
    fn class_unit(&self, name: &str) -> Option<&ClassUnit>;

    /// Find a method of `class` by signature.
    fn method_unit<'a>(&'a self, class: &'a ClassUnit, signature: &str) -> Option<&'a MethodUnit> {
        class.method(signature)
    }
}

/// JSON-backed project model produced by a parse pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectIndex {
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Classes keyed by fully-qualified name.
    pub classes: BTreeMap<String, ClassUnit>,
}

impl Default for ProjectIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectIndex {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            classes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, class: ClassUnit) {
        self.classes.insert(class.full_name.clone(), class);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Total number of indexed methods across all classes.
    pub fn method_count(&self) -> usize {
        self.classes.values().map(|c| c.methods.len()).sum()
    }
}

impl ProjectModel for ProjectIndex {
    fn class_unit(&self, name: &str) -> Option<&ClassUnit> {
        if let Some(class) = self.classes.get(name) {
            return Some(class);
        }
        if name.contains('.') {
            return None;
        }
        let mut matches = self.classes.values().filter(|c| c.name == name);
        match (matches.next(), matches.next()) {
            (Some(class), None) => Some(class),
            _ => None,
        }
    }
}
