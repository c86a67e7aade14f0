//! Chat-completion providers over blocking HTTP.
//!
//! Anthropic Messages and OpenAI-compatible Chat Completions are supported.
//! Calls run on attempt worker threads, so providers must be `Send + Sync`.

use serde_json::Value;
use std::time::Duration;
use unitsmith_core::config::OracleConfig;

/// Errors from provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("empty response from LLM")]
    EmptyResponse,
    #[error("{0} is not set")]
    MissingKey(&'static str),
    #[error("unknown provider '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },
}

impl ProviderError {
    /// Whether another try may succeed. Client errors other than rate limits are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) | Self::EmptyResponse => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MissingKey(_) | Self::UnknownProvider { .. } => false,
        }
    }
}

/// Text and token usage of one completion.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

pub trait LlmProvider: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError>;

    fn model_name(&self) -> &str;

    /// USD per million input tokens.
    fn cost_per_mtok_input(&self) -> f64;

    /// USD per million output tokens.
    fn cost_per_mtok_output(&self) -> f64;
}

const MAX_TOKENS: u32 = 8192;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

fn agent() -> ureq::Agent {
    ureq::Agent::new_with_config(
        ureq::config::Config::builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build(),
    )
}

fn post_json(
    request: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: &Value,
) -> Result<Value, ProviderError> {
    let mut response = request
        .header("content-type", "application/json")
        .send_json(body)
        .map_err(|e| match e {
            ureq::Error::StatusCode(status) => ProviderError::Api {
                status,
                message: "request rejected".to_string(),
            },
            other => ProviderError::Http(other.to_string()),
        })?;
    let json: Value = response
        .body_mut()
        .read_json()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(ProviderError::Api {
            status: 400,
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(json)
}

fn usage(json: &Value, input_key: &str, output_key: &str) -> (Option<u64>, Option<u64>) {
    let usage = json.get("usage");
    (
        usage.and_then(|u| u.get(input_key)).and_then(Value::as_u64),
        usage.and_then(|u| u.get(output_key)).and_then(Value::as_u64),
    )
}

#[cfg(feature = "anthropic")]
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

#[cfg(feature = "anthropic")]
impl AnthropicProvider {
    pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
    pub const KEY_VAR: &str = "ANTHROPIC_API_KEY";
    const API_URL: &str = "https://api.anthropic.com/v1/messages";

    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            agent: agent(),
        }
    }
}

#[cfg(feature = "anthropic")]
impl LlmProvider for AnthropicProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{"role": "user", "content": user}]
        });
        let request = self
            .agent
            .post(Self::API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let json = post_json(request, &body)?;

        let text = json
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;
        let (input_tokens, output_tokens) = usage(&json, "input_tokens", "output_tokens");

        Ok(LlmResponse {
            text,
            input_tokens,
            output_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_mtok_input(&self) -> f64 {
        if self.model.contains("haiku") {
            1.00
        } else if self.model.contains("opus") {
            15.00
        } else {
            3.00
        }
    }

    fn cost_per_mtok_output(&self) -> f64 {
        if self.model.contains("haiku") {
            5.00
        } else if self.model.contains("opus") {
            75.00
        } else {
            15.00
        }
    }
}

/// OpenAI or any server speaking its Chat Completions API.
#[cfg(feature = "openai")]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    agent: ureq::Agent,
}

#[cfg(feature = "openai")]
impl OpenAiProvider {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const KEY_VAR: &str = "OPENAI_API_KEY";
    const DEFAULT_BASE_URL: &str = "https://api.openai.com";

    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            agent: agent(),
        }
    }
}

#[cfg(feature = "openai")]
impl LlmProvider for OpenAiProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });
        let request = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key));
        let json = post_json(request, &body)?;

        let text = json
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?
            .to_string();
        let (input_tokens, output_tokens) = usage(&json, "prompt_tokens", "completion_tokens");

        Ok(LlmResponse {
            text,
            input_tokens,
            output_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_mtok_input(&self) -> f64 {
        if self.model.contains("4o-mini") {
            0.15
        } else if self.model.contains("4o") {
            2.50
        } else {
            0.50
        }
    }

    fn cost_per_mtok_output(&self) -> f64 {
        if self.model.contains("4o-mini") {
            0.60
        } else if self.model.contains("4o") {
            10.00
        } else {
            1.50
        }
    }
}

/// Build a provider by name with an explicit key.
pub fn create_provider(
    provider_name: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    match provider_name {
        #[cfg(feature = "anthropic")]
        "anthropic" => Ok(Box::new(AnthropicProvider::new(
            api_key.to_string(),
            model.map(String::from),
        ))),
        #[cfg(feature = "openai")]
        "openai" => Ok(Box::new(OpenAiProvider::new(
            api_key.to_string(),
            model.map(String::from),
            base_url.map(String::from),
        ))),
        other => Err(ProviderError::UnknownProvider {
            name: other.to_string(),
            available: available_providers().join(", "),
        }),
    }
}

/// Environment variable holding the API key of a provider.
pub fn api_key_var(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        #[cfg(feature = "anthropic")]
        "anthropic" => Some(AnthropicProvider::KEY_VAR),
        #[cfg(feature = "openai")]
        "openai" => Some(OpenAiProvider::KEY_VAR),
        _ => None,
    }
}

/// Build the configured provider, reading its key from the environment.
pub fn provider_from_config(config: &OracleConfig) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let Some(var) = api_key_var(&config.provider) else {
        return Err(ProviderError::UnknownProvider {
            name: config.provider.clone(),
            available: available_providers().join(", "),
        });
    };
    let key = std::env::var(var).map_err(|_| ProviderError::MissingKey(var))?;
    create_provider(
        &config.provider,
        &key,
        config.model.as_deref(),
        config.base_url.as_deref(),
    )
}

/// Compiled-in provider names.
pub fn available_providers() -> Vec<&'static str> {
    vec![
        #[cfg(feature = "anthropic")]
        "anthropic",
        #[cfg(feature = "openai")]
        "openai",
    ]
}
