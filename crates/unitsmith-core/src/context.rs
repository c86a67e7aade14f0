//! Per-attempt prompt context handed to the generation oracle.

use crate::model::{ClassUnit, MethodUnit, simple_name};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A generated (or repaired) unit test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedTest {
    /// Fully-qualified test class name.
    pub class_name: String,
    pub source: String,
}

/// The validation failure of one round, kept for the repair step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundFailure {
    pub round: usize,
    pub diagnostics: String,
}

/// Aggregated context for one attempt at one target method.
///
/// Built fresh per attempt by the assembler, advanced round by round by the
/// controller, and dropped once the attempt's record is exported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    /// Fully-qualified name of the class under test.
    pub class_name: String,
    pub simple_class_name: String,
    pub package: String,
    pub method_name: String,
    pub method_signature: String,
    pub method_descriptor: String,
    pub method_source: String,
    pub attempt: usize,
    pub round: usize,

    /// Package, imports, class header, fields and the target method.
    pub context: String,
    /// Briefs of constructors, accessors and called in-class methods.
    pub other_method_brief: String,
    /// Full bodies of constructors, accessors and called in-class methods.
    pub other_method_bodies: String,

    /// Constructor dependencies resolved from the project model.
    pub constructor_deps: BTreeMap<String, String>,
    /// Constructor dependencies reconstructed from compiled artifacts.
    pub external_constructor_deps: BTreeMap<String, String>,
    /// Call dependencies resolved from the project model.
    pub method_deps: BTreeMap<String, String>,
    /// Call dependencies reconstructed from compiled artifacts.
    pub external_method_deps: BTreeMap<String, String>,

    /// Number of distinct external classes reconstructed via the fallback path.
    pub activations: usize,
    #[serde(skip)]
    fallback_classes: BTreeSet<String>,

    pub unit_test: Option<GeneratedTest>,
    pub failures: Vec<RoundFailure>,
}

impl PromptContext {
    pub fn new(class: &ClassUnit, method: &MethodUnit, attempt: usize) -> Self {
        Self {
            class_name: class.full_name.clone(),
            simple_class_name: class.name.clone(),
            package: class.package.clone(),
            method_name: method.name.clone(),
            method_signature: method.signature.clone(),
            method_descriptor: method.descriptor.clone(),
            method_source: method.source.clone(),
            attempt,
            ..Self::default()
        }
    }

    /// Count a fallback reconstruction of `class_name`.
    ///
    /// Returns `true` the first time a class is seen; repeats do not increment.
    pub fn record_activation(&mut self, class_name: &str) -> bool {
        let inserted = self.fallback_classes.insert(class_name.to_string());
        if inserted {
            self.activations += 1;
        }
        inserted
    }

    /// Classes reconstructed via the fallback path so far.
    pub fn fallback_classes(&self) -> &BTreeSet<String> {
        &self.fallback_classes
    }

    /// Whether any dependency map already holds `class_name`.
    pub fn has_dependency(&self, class_name: &str) -> bool {
        self.constructor_deps.contains_key(class_name)
            || self.external_constructor_deps.contains_key(class_name)
            || self.method_deps.contains_key(class_name)
            || self.external_method_deps.contains_key(class_name)
    }

    /// Whether `class_name` names the class under test.
    pub fn is_target_class(&self, class_name: &str) -> bool {
        class_name == self.class_name || class_name == self.simple_class_name
    }

    /// Class header plus fields, other member bodies and the target method,
    /// closed into one synthetic class body.
    pub fn full_context(&self) -> String {
        if self.method_source.is_empty() {
            return self.context.clone();
        }
        let Some(open) = self.context.rfind(&self.method_source) else {
            return self.context.clone();
        };
        let mut out = String::with_capacity(self.context.len() + self.other_method_bodies.len());
        out.push_str(&self.context[..open]);
        let bodies = self.other_method_bodies.trim();
        if !bodies.is_empty() {
            out.push_str(bodies);
            out.push_str("\n\n");
        }
        out.push_str(&self.context[open..]);
        out
    }

    /// Name the oracle is asked to give the test class.
    pub fn test_class_name(&self) -> String {
        format!(
            "{}_{}_{}_Test",
            simple_name(&self.simple_class_name),
            self.method_name,
            self.attempt
        )
    }

    /// Diagnostics of the latest failed round, if any.
    pub fn last_failure(&self) -> Option<&RoundFailure> {
        self.failures.last()
    }

    pub fn push_failure(&mut self, diagnostics: impl Into<String>) {
        self.failures.push(RoundFailure {
            round: self.round,
            diagnostics: diagnostics.into(),
        });
    }
}
