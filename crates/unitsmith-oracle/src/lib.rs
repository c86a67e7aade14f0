//! LLM-backed generation oracle for unitsmith.
//!
//! - **provider**: `LlmProvider` trait with Anthropic and OpenAI implementations
//! - **prompt**: generation and repair prompts built from a `PromptContext`
//! - **extract**: reduce a model answer to one named test class
//! - **oracle**: `LlmOracle`, the `GenerationOracle` with retries and cost tracking
//! - **cost**: token and spend accounting

pub mod cost;
pub mod extract;
pub mod oracle;
pub mod prompt;
pub mod provider;

pub use cost::CostTracker;
pub use oracle::LlmOracle;
pub use provider::{
    LlmProvider, LlmResponse, ProviderError, available_providers, create_provider,
    provider_from_config,
};
