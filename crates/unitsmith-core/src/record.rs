//! Attempt results and the records exported for them.

use crate::context::PromptContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Terminal state of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// A validation passed.
    Succeeded,
    /// Every round failed validation.
    Exhausted,
    /// The complexity gate refused the method; no oracle call was made.
    Skipped,
    /// Shutdown was requested before the attempt reached a terminal round.
    Cancelled,
}

/// Branch coverage of a passing test, or why it could not be measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Percent(f64),
    Error(String),
}

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub status: AttemptStatus,
    /// Round reached: the succeeding round, or the last round tried.
    pub round: usize,
    pub elapsed: Duration,
    pub coverage: Option<Coverage>,
}

impl AttemptResult {
    pub fn passed(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }

    pub fn skipped() -> Self {
        Self {
            status: AttemptStatus::Skipped,
            round: 0,
            elapsed: Duration::ZERO,
            coverage: None,
        }
    }
}

/// Everything exported about one finished attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub class_name: String,
    pub method_signature: String,
    pub attempt: usize,
    pub round: usize,
    pub status: AttemptStatus,
    pub passed: bool,
    pub elapsed_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_source: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Build the record for an attempt that ran the generate/repair loop.
    pub fn finished(ctx: &PromptContext, result: &AttemptResult) -> Self {
        Self {
            class_name: ctx.class_name.clone(),
            method_signature: ctx.method_signature.clone(),
            attempt: ctx.attempt,
            round: result.round,
            status: result.status,
            passed: result.passed(),
            elapsed_secs: result.elapsed.as_secs_f64(),
            coverage: result.coverage.clone(),
            skip_reason: None,
            test_class: ctx.unit_test.as_ref().map(|t| t.class_name.clone()),
            test_source: ctx.unit_test.as_ref().map(|t| t.source.clone()),
            recorded_at: Utc::now(),
        }
    }

    /// Build the record for an attempt the complexity gate refused.
    pub fn skipped(ctx: &PromptContext, reason: impl Into<String>) -> Self {
        Self {
            class_name: ctx.class_name.clone(),
            method_signature: ctx.method_signature.clone(),
            attempt: ctx.attempt,
            round: 0,
            status: AttemptStatus::Skipped,
            passed: false,
            elapsed_secs: 0.0,
            coverage: None,
            skip_reason: Some(reason.into()),
            test_class: None,
            test_source: None,
            recorded_at: Utc::now(),
        }
    }

    /// File stem used for the JSON report: `<Class>_<method>[_<param>...]_<attempt>`.
    ///
    /// Parameter types are part of the stem so overloads get distinct files,
    /// e.g. `add(int, String[])` attempt 0 of `Cart` is `Cart_add_int_StringArray_0`.
    pub fn report_stem(&self) -> String {
        let class = crate::model::simple_name(&self.class_name);
        let (method, params) = self
            .method_signature
            .split_once('(')
            .unwrap_or((&self.method_signature, ""));

        let mut depth = 0usize;
        let erased: String = params
            .trim_end_matches(')')
            .chars()
            .filter(|&c| {
                match c {
                    '<' => depth += 1,
                    '>' => depth = depth.saturating_sub(1),
                    _ => return depth == 0,
                }
                false
            })
            .collect();

        let mut stem = format!("{}_{}", class, method.trim());
        for param in erased.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let arrays = param.matches("[]").count() + usize::from(param.ends_with("..."));
            let base = param.trim_end_matches("...").replace("[]", "");
            stem.push('_');
            stem.extend(
                crate::model::simple_name(base.trim())
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '$'),
            );
            for _ in 0..arrays {
                stem.push_str("Array");
            }
        }
        format!("{}_{}", stem, self.attempt)
    }
}
