//! Build the prompt context for one attempt at one method.
//!
//! Constructor dependencies come first, skipping any class the method also
//! calls (call dependencies take precedence and the two are never merged).
//! In-class self calls contribute briefs and bodies of the class's own
//! methods. Every other call dependency is resolved from the project model
//! or, failing that, reconstructed from compiled artifacts, and its own calls
//! are followed for `depth` further hops. A dependency that cannot be resolved
//! is left out; assembly itself never fails.

use crate::resolver::{Resolution, SourceResolver};
use std::collections::BTreeSet;
use unitsmith_core::context::PromptContext;
use unitsmith_core::model::{
    ClassUnit, DependencyMap, MethodUnit, ProjectModel, edges, normalize_signatures, simple_name,
};
use unitsmith_parser::index::index_source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepKind {
    Constructor,
    Method,
}

pub struct DependencyContextAssembler<'a> {
    model: &'a dyn ProjectModel,
    resolver: &'a SourceResolver,
    depth: usize,
}

impl<'a> DependencyContextAssembler<'a> {
    pub fn new(model: &'a dyn ProjectModel, resolver: &'a SourceResolver, depth: usize) -> Self {
        Self {
            model,
            resolver,
            depth,
        }
    }

    pub fn assemble(&self, class: &ClassUnit, method: &MethodUnit, attempt: usize) -> PromptContext {
        let mut ctx = PromptContext::new(class, method, attempt);

        for edge in edges(&class.constructor_deps) {
            if method.dependent_methods.contains_key(edge.class_name)
                || ctx.is_target_class(edge.class_name)
            {
                continue;
            }
            self.file_dependency(&mut ctx, edge.class_name, edge.methods, DepKind::Constructor);
        }

        let mut self_briefs = Vec::new();
        let mut self_bodies = Vec::new();
        for edge in edges(&method.dependent_methods) {
            if class.is_named(edge.class_name) {
                for signature in edge.methods {
                    match self.model.method_unit(class, signature) {
                        Some(callee) => {
                            self_briefs.push(callee.brief.as_str());
                            self_bodies.push(callee.source.as_str());
                        }
                        None => {
                            tracing::debug!(
                                class = %class.full_name,
                                signature = %signature,
                                "self call not found in class, skipping"
                            );
                        }
                    }
                }
                continue;
            }
            if let Some(next) =
                self.file_dependency(&mut ctx, edge.class_name, edge.methods, DepKind::Method)
            {
                self.follow(&mut ctx, &next, self.depth);
            }
        }

        ctx.context = class_context(class, method);
        let (briefs, bodies) = other_members(class, &self_briefs, &self_bodies);
        ctx.other_method_brief = briefs;
        ctx.other_method_bodies = bodies;

        tracing::debug!(
            class = %ctx.class_name,
            method = %ctx.method_signature,
            attempt,
            method_deps = ctx.method_deps.len(),
            external_method_deps = ctx.external_method_deps.len(),
            constructor_deps = ctx.constructor_deps.len(),
            external_constructor_deps = ctx.external_constructor_deps.len(),
            activations = ctx.activations,
            "assembled prompt context"
        );
        ctx
    }

    /// Add public-surface context for classes named by compiler diagnostics.
    ///
    /// Classes already present in the context are left alone. Returns how many
    /// classes were added.
    pub fn enrich(&self, ctx: &mut PromptContext, class_names: &BTreeSet<String>) -> usize {
        let none = BTreeSet::new();
        let mut added = 0;
        for name in class_names {
            if ctx.is_target_class(name) || ctx.has_dependency(name) {
                continue;
            }
            if self.file_dependency(ctx, name, &none, DepKind::Method).is_some() {
                added += 1;
            }
        }
        if added > 0 {
            tracing::debug!(
                class = %ctx.class_name,
                added,
                activations = ctx.activations,
                "enriched context from diagnostics"
            );
        }
        added
    }

    /// Walk call edges of already-resolved dependencies for `remaining` hops.
    fn follow(&self, ctx: &mut PromptContext, deps: &DependencyMap, remaining: usize) {
        if remaining == 0 {
            return;
        }
        for edge in edges(deps) {
            if ctx.is_target_class(edge.class_name) || ctx.has_dependency(edge.class_name) {
                continue;
            }
            if let Some(next) =
                self.file_dependency(ctx, edge.class_name, edge.methods, DepKind::Method)
            {
                self.follow(ctx, &next, remaining - 1);
            }
        }
    }

    /// Resolve one dependency class into the context.
    ///
    /// Returns the dependency's own call edges (for the wanted methods) when
    /// it was resolved, `None` when it was left out.
    fn file_dependency(
        &self,
        ctx: &mut PromptContext,
        class_name: &str,
        wanted: &BTreeSet<String>,
        kind: DepKind,
    ) -> Option<DependencyMap> {
        if ctx.has_dependency(class_name) {
            return None;
        }
        let wanted = normalize_signatures(wanted);

        if let Some(unit) = self.model.class_unit(class_name) {
            let target = match kind {
                DepKind::Constructor => &mut ctx.constructor_deps,
                DepKind::Method => &mut ctx.method_deps,
            };
            target.insert(class_name.to_string(), unit.excerpt(&wanted));
            return Some(merged_calls(unit, &wanted));
        }

        match self.resolver.resolve(self.model, class_name, &wanted) {
            Resolution::Found {
                reconstructed,
                pruned,
            } => {
                let target = match kind {
                    DepKind::Constructor => &mut ctx.external_constructor_deps,
                    DepKind::Method => &mut ctx.external_method_deps,
                };
                let calls = reconstructed_calls(class_name, &reconstructed.source, &pruned.kept);
                target.insert(class_name.to_string(), pruned.source);
                ctx.record_activation(class_name);
                Some(calls)
            }
            Resolution::NotApplicable | Resolution::NotFound | Resolution::Unusable(_) => None,
        }
    }
}

/// Union of the call edges of `wanted` methods of an indexed class.
fn merged_calls(unit: &ClassUnit, wanted: &BTreeSet<String>) -> DependencyMap {
    let mut calls = DependencyMap::new();
    for signature in wanted {
        if let Some(method) = unit.method(signature) {
            for (target, methods) in &method.dependent_methods {
                calls
                    .entry(target.clone())
                    .or_default()
                    .extend(methods.iter().cloned());
            }
        }
    }
    calls
}

/// Call edges of `wanted` methods of a reconstructed class, by indexing its source.
fn reconstructed_calls(class_name: &str, source: &str, wanted: &BTreeSet<String>) -> DependencyMap {
    let classes = match index_source(source) {
        Ok(classes) => classes,
        Err(e) => {
            tracing::debug!(class = class_name, error = %e, "cannot index reconstructed source");
            return DependencyMap::new();
        }
    };
    let unit = classes
        .iter()
        .find(|c| c.full_name == class_name)
        .or_else(|| classes.iter().find(|c| c.name == simple_name(class_name)));
    unit.map(|u| merged_calls(u, wanted)).unwrap_or_default()
}

/// Package, imports, class header, fields and the target method, closed.
fn class_context(class: &ClassUnit, method: &MethodUnit) -> String {
    let mut out = String::new();
    out.push_str(&class.package);
    out.push('\n');
    for import in &class.imports {
        out.push_str(import);
        out.push('\n');
    }
    out.push_str(&class.signature);
    out.push_str(" {\n");
    for field in &class.fields {
        out.push_str("    ");
        out.push_str(field);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&method.source);
    out.push_str("\n}");
    out
}

/// Briefs and bodies of constructors, accessors and called in-class methods.
fn other_members(class: &ClassUnit, self_briefs: &[&str], self_bodies: &[&str]) -> (String, String) {
    let mut briefs = String::new();
    let mut bodies = String::new();
    let mut push = |brief: &str, body: &str| {
        briefs.push_str(brief);
        briefs.push('\n');
        bodies.push_str(body);
        bodies.push_str("\n\n");
    };

    if class.has_constructor() {
        for ctor in &class.constructors {
            push(&ctor.brief, &ctor.source);
        }
    }
    for accessor in &class.accessors {
        push(&accessor.brief, &accessor.source);
    }
    for (brief, body) in self_briefs.iter().zip(self_bodies) {
        if class.accessors.iter().any(|a| a.source == *body) {
            continue;
        }
        push(brief, body);
    }
    (briefs, bodies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitsmith_core::model::{MemberSource, ProjectIndex};

    fn sigs(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn project() -> (ProjectIndex, ClassUnit, MethodUnit) {
        let helper = MethodUnit {
            name: "normalize".into(),
            signature: "normalize(int)".into(),
            brief: "private int normalize(int n);".into(),
            source: "private int normalize(int n) { return Math.max(n, 0); }".into(),
            ..MethodUnit::default()
        };

        let mut target = MethodUnit {
            name: "add".into(),
            signature: "add(int)".into(),
            source: "public void add(int n) { total = normalize(n) + tax.rate(n); }".into(),
            ..MethodUnit::default()
        };
        target
            .dependent_methods
            .insert("com.acme.Cart".into(), sigs(&["normalize(int)", "missing()"]));
        target
            .dependent_methods
            .insert("com.acme.Tax".into(), sigs(&["rate(int)"]));

        let mut cart = ClassUnit {
            full_name: "com.acme.Cart".into(),
            name: "Cart".into(),
            package: "package com.acme;".into(),
            imports: vec!["import java.util.List;".into()],
            signature: "public class Cart".into(),
            fields: vec!["private int total;".into()],
            constructors: vec![MemberSource {
                signature: "Cart(Tax)".into(),
                brief: "public Cart(Tax tax);".into(),
                source: "public Cart(Tax tax) { this.tax = tax; }".into(),
            }],
            ..ClassUnit::default()
        };
        cart.constructor_deps
            .insert("com.acme.Tax".into(), sigs(&["init()"]));
        cart.constructor_deps
            .insert("com.acme.Audit".into(), sigs(&["open()"]));
        cart.insert_method(helper);
        cart.insert_method(target.clone());

        let mut rate = MethodUnit {
            name: "rate".into(),
            signature: "rate(int)".into(),
            source: "public int rate(int n) { return n / 10; }".into(),
            ..MethodUnit::default()
        };
        rate.dependent_methods
            .insert("com.acme.Table".into(), sigs(&["lookup(int)"]));
        let mut tax = ClassUnit {
            full_name: "com.acme.Tax".into(),
            name: "Tax".into(),
            signature: "public class Tax".into(),
            ..ClassUnit::default()
        };
        tax.insert_method(rate);

        let table = ClassUnit {
            full_name: "com.acme.Table".into(),
            name: "Table".into(),
            signature: "public class Table".into(),
            ..ClassUnit::default()
        };

        let mut index = ProjectIndex::new();
        index.insert(cart.clone());
        index.insert(tax);
        index.insert(table);
        (index, cart, target)
    }

    #[test]
    fn test_in_model_dependencies_do_not_activate() {
        let (index, cart, target) = project();
        let resolver = SourceResolver::without_fallback();
        let ctx = DependencyContextAssembler::new(&index, &resolver, 1).assemble(&cart, &target, 0);

        assert_eq!(ctx.activations, 0);
        assert!(ctx.method_deps["com.acme.Tax"].contains("return n / 10;"));
        assert!(ctx.method_deps.contains_key("com.acme.Table"), "depth 1 follows Tax.rate");
        assert!(ctx.external_method_deps.is_empty());
    }

    #[test]
    fn test_call_dependency_takes_precedence_over_constructor_dependency() {
        let (index, cart, target) = project();
        let resolver = SourceResolver::without_fallback();
        let ctx = DependencyContextAssembler::new(&index, &resolver, 0).assemble(&cart, &target, 0);

        assert!(!ctx.constructor_deps.contains_key("com.acme.Tax"));
        assert!(ctx.method_deps.contains_key("com.acme.Tax"));
        assert!(
            !ctx.constructor_deps.contains_key("com.acme.Audit"),
            "Audit is neither indexed nor reconstructable"
        );
    }

    #[test]
    fn test_depth_zero_stops_at_immediate_edge() {
        let (index, cart, target) = project();
        let resolver = SourceResolver::without_fallback();
        let ctx = DependencyContextAssembler::new(&index, &resolver, 0).assemble(&cart, &target, 0);
        assert!(!ctx.method_deps.contains_key("com.acme.Table"));
    }

    #[test]
    fn test_self_calls_fill_other_methods_and_skip_missing() {
        let (index, cart, target) = project();
        let resolver = SourceResolver::without_fallback();
        let ctx = DependencyContextAssembler::new(&index, &resolver, 0).assemble(&cart, &target, 3);

        assert!(ctx.other_method_brief.contains("public Cart(Tax tax);"));
        assert!(ctx.other_method_brief.contains("private int normalize(int n);"));
        assert!(ctx.other_method_bodies.contains("Math.max(n, 0)"));
        assert!(!ctx.method_deps.contains_key("com.acme.Cart"));
        assert_eq!(ctx.attempt, 3);
    }

    #[test]
    fn test_context_text_layout() {
        let (index, cart, target) = project();
        let resolver = SourceResolver::without_fallback();
        let ctx = DependencyContextAssembler::new(&index, &resolver, 0).assemble(&cart, &target, 0);

        assert!(ctx.context.starts_with("package com.acme;\nimport java.util.List;\npublic class Cart {\n"));
        assert!(ctx.context.contains("    private int total;\n"));
        assert!(ctx.context.ends_with("tax.rate(n); }\n}"));

        let full = ctx.full_context();
        let helper = full.find("Math.max").unwrap();
        let method = full.find("public void add").unwrap();
        assert!(helper < method);
    }

    #[test]
    fn test_enrich_skips_present_and_target() {
        let (index, cart, target) = project();
        let resolver = SourceResolver::without_fallback();
        let assembler = DependencyContextAssembler::new(&index, &resolver, 0);
        let mut ctx = assembler.assemble(&cart, &target, 0);

        let names = sigs(&["com.acme.Cart", "com.acme.Tax", "com.acme.Table", "org.gone.Ghost"]);
        assert_eq!(assembler.enrich(&mut ctx, &names), 1);
        assert!(ctx.method_deps["com.acme.Table"].starts_with("public class Table {"));
        assert_eq!(ctx.activations, 0);
    }
}
