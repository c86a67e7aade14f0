//! Go/no-go decision before any oracle call is made.

use std::fmt;
use unitsmith_core::config::GatePolicy;
use unitsmith_core::context::PromptContext;
use unitsmith_parser::complexity::{DecisionProfile, analyze_method};

/// Why the gate refused a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The method's branching scored under the policy threshold.
    BelowThreshold {
        policy: &'static str,
        score: usize,
        threshold: usize,
    },
    /// No dependency had to be reconstructed from compiled artifacts.
    NoActivations,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowThreshold {
                policy,
                score,
                threshold,
            } => write!(f, "{policy} score {score} is below threshold {threshold}"),
            Self::NoActivations => write!(f, "no dependency required fallback reconstruction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Admit { score: usize },
    Reject(Rejection),
}

impl GateDecision {
    pub fn admitted(&self) -> bool {
        matches!(self, Self::Admit { .. })
    }
}

/// Scores a method's branching under a configured policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityGate {
    policy: GatePolicy,
}

impl ComplexityGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Decision profile of a method; unparseable source counts as no branching.
    pub fn profile(&self, method_source: &str) -> DecisionProfile {
        analyze_method(method_source).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "method source did not parse, counting zero decision points");
            DecisionProfile::default()
        })
    }

    /// The policy's score for a method.
    pub fn score(&self, method_source: &str) -> usize {
        let profile = self.profile(method_source);
        match self.policy {
            GatePolicy::BranchConstructs { .. } => profile.branch_constructs(),
            GatePolicy::DecisionPoints { .. } => profile.decision_points(),
        }
    }

    pub fn admit(&self, ctx: &PromptContext) -> GateDecision {
        let score = self.score(&ctx.method_source);
        let threshold = self.policy.threshold();
        tracing::debug!(
            class = %ctx.class_name,
            method = %ctx.method_signature,
            policy = self.policy.name(),
            score,
            activations = ctx.activations,
            "complexity gate"
        );

        if score < threshold {
            return GateDecision::Reject(Rejection::BelowThreshold {
                policy: self.policy.name(),
                score,
                threshold,
            });
        }
        if ctx.activations == 0 {
            return GateDecision::Reject(Rejection::NoActivations);
        }
        GateDecision::Admit { score }
    }
}
