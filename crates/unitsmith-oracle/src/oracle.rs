//! The generation oracle backed by an LLM provider.

use crate::cost::CostTracker;
use crate::extract::{class_name, declared_package, java_block, package_name};
use crate::prompt;
use crate::provider::{LlmProvider, LlmResponse, ProviderError};
use std::sync::Mutex;
use std::time::Duration;
use unitsmith_core::context::{GeneratedTest, PromptContext};
use unitsmith_engine::CancellationToken;
use unitsmith_engine::collaborators::{GenerationOracle, OracleError};

/// Upper bound on a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct LlmOracle {
    provider: Box<dyn LlmProvider>,
    max_retries: usize,
    backoff: Duration,
    cost: Mutex<CostTracker>,
}

impl LlmOracle {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: usize) -> Self {
        let cost = Mutex::new(CostTracker::new(provider.as_ref()));
        Self {
            provider,
            max_retries,
            backoff: Duration::from_secs(1),
            cost,
        }
    }

    /// Base delay before the first retry; doubles on every further retry.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Usage so far.
    pub fn usage(&self) -> CostTracker {
        self.cost
            .lock()
            .map(|tracker| tracker.clone())
            .unwrap_or_default()
    }

    fn call_with_retry(
        &self,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, OracleError> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if cancel.is_cancelled() {
                return Err(OracleError::Cancelled);
            }
            match self.provider.complete(prompt::SYSTEM, user) {
                Ok(response) => {
                    if let Ok(mut tracker) = self.cost.lock() {
                        tracker.record(response.input_tokens, response.output_tokens);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(
                        model = self.provider.model_name(),
                        attempt = attempt + 1,
                        error = %e,
                        "LLM call failed"
                    );
                    let retry = e.is_retryable() && attempt < self.max_retries;
                    last_err = Some(e);
                    if !retry {
                        break;
                    }
                    std::thread::sleep(backoff_delay(self.backoff, attempt));
                }
            }
        }
        Err(OracleError::Request(last_err.map_or_else(
            || "no request was made".to_string(),
            |e: ProviderError| e.to_string(),
        )))
    }

    fn answer(
        &self,
        ctx: &PromptContext,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<GeneratedTest, OracleError> {
        let response = self.call_with_retry(user, cancel)?;
        let test = test_from_answer(ctx, &response.text)?;
        tracing::debug!(
            class = %ctx.class_name,
            attempt = ctx.attempt,
            round = ctx.round,
            test = %test.class_name,
            "oracle produced test"
        );
        Ok(test)
    }
}

impl GenerationOracle for LlmOracle {
    fn generate(
        &self,
        ctx: &PromptContext,
        cancel: &CancellationToken,
    ) -> Result<GeneratedTest, OracleError> {
        self.answer(ctx, &prompt::generation(ctx), cancel)
    }

    fn repair(
        &self,
        ctx: &PromptContext,
        diagnostics: &str,
        cancel: &CancellationToken,
    ) -> Result<GeneratedTest, OracleError> {
        let user = match &ctx.unit_test {
            Some(test) => prompt::repair(ctx, test, diagnostics),
            // The previous round produced no test at all; start over.
            None => prompt::generation(ctx),
        };
        self.answer(ctx, &user, cancel)
    }
}

/// Reduce a model answer to a named test class in the target's package.
pub fn test_from_answer(ctx: &PromptContext, text: &str) -> Result<GeneratedTest, OracleError> {
    let code = java_block(text)
        .ok_or_else(|| OracleError::NoTest("the answer holds no Java code block".to_string()))?;
    let simple = class_name(code)
        .ok_or_else(|| OracleError::NoTest("the code block declares no class".to_string()))?;

    let package = declared_package(code).unwrap_or_else(|| package_name(&ctx.package));
    let mut source = String::new();
    if declared_package(code).is_none() && !package.is_empty() {
        source.push_str(&format!("package {package};\n\n"));
    }
    source.push_str(code);
    source.push('\n');

    let class_name = if package.is_empty() {
        simple.to_string()
    } else {
        format!("{package}.{simple}")
    };
    Ok(GeneratedTest { class_name, source })
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|exp| 2u32.checked_pow(exp))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PromptContext {
        let mut ctx = PromptContext::default();
        ctx.class_name = "com.acme.Cart".into();
        ctx.simple_class_name = "Cart".into();
        ctx.package = "package com.acme;".into();
        ctx.method_name = "add".into();
        ctx
    }

    #[test]
    fn test_backoff_delay_doubles_then_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 6), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 32), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, usize::MAX), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::ZERO, 40), Duration::ZERO);
    }

    #[test]
    fn test_answer_without_package_gets_target_package() {
        let answer = "Sure.\n```java\nimport org.junit.jupiter.api.Test;\nclass Cart_add_0_Test {}\n```";
        let test = test_from_answer(&ctx(), answer).unwrap();
        assert_eq!(test.class_name, "com.acme.Cart_add_0_Test");
        assert!(test.source.starts_with("package com.acme;\n\nimport"));
    }

    #[test]
    fn test_declared_package_wins() {
        let answer = "```java\npackage com.acme.tests;\npublic class CartTest {}\n```";
        let test = test_from_answer(&ctx(), answer).unwrap();
        assert_eq!(test.class_name, "com.acme.tests.CartTest");
        assert_eq!(test.source.matches("package").count(), 1);
    }

    #[test]
    fn test_answer_without_code_is_no_test() {
        let err = test_from_answer(&ctx(), "I cannot help with that.").unwrap_err();
        assert!(matches!(err, OracleError::NoTest(_)));
    }

    #[test]
    fn test_default_package() {
        let mut ctx = ctx();
        ctx.package.clear();
        let test = test_from_answer(&ctx, "```java\nclass T {}\n```").unwrap();
        assert_eq!(test.class_name, "T");
        assert_eq!(test.source, "class T {}\n");
    }
}
