//! Token usage and spend across a run.

use crate::provider::LlmProvider;
use std::fmt;

/// Running totals for every completion a run made.
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    pub calls: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    input_rate: f64,
    output_rate: f64,
}

impl CostTracker {
    pub fn new(provider: &dyn LlmProvider) -> Self {
        Self {
            input_rate: provider.cost_per_mtok_input(),
            output_rate: provider.cost_per_mtok_output(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, input_tokens: Option<u64>, output_tokens: Option<u64>) {
        self.calls += 1;
        self.total_input_tokens += input_tokens.unwrap_or(0);
        self.total_output_tokens += output_tokens.unwrap_or(0);
    }

    pub fn total_cost_usd(&self) -> f64 {
        (self.total_input_tokens as f64 / 1_000_000.0) * self.input_rate
            + (self.total_output_tokens as f64 / 1_000_000.0) * self.output_rate
    }
}

impl fmt::Display for CostTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} calls, {} input / {} output tokens, ${:.4}",
            self.calls,
            self.total_input_tokens,
            self.total_output_tokens,
            self.total_cost_usd()
        )
    }
}
