//! rig-core integration for the review backend.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Cohere, Gemini, Perplexity,
//! DeepSeek, xAI, Groq, and any OpenAI-compatible API.

use std::sync::LazyLock;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use super::{BackendError, ReviewBackend};
use crate::config::ProviderConfig;
use crate::models::ProviderName;
use crate::prompt::ReviewRequest;

/// Maximum tokens per LLM completion response.
///
/// Set high enough to accommodate thinking models (e.g. Gemini 2.5 Pro)
/// that consume part of the budget for internal reasoning tokens.
const MAX_TOKENS: u64 = 65536;

/// Build a single-turn agent from a rig-core client and prompt it.
///
/// Always sets `max_tokens`: without it some providers (e.g. Gemini)
/// default to a low limit that truncates responses. No `output_schema`
/// is set because the answer is wrapped in review markers.
macro_rules! prompt_simple {
    ($client:expr, $model:expr, $request:expr, $label:expr) => {{
        let agent = $client
            .agent($model)
            .preamble(&$request.system)
            .temperature(0.0)
            .max_tokens(MAX_TOKENS)
            .build();
        agent
            .prompt($request.user.as_str())
            .await
            .map_err(|e| classify_error(&format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            BackendError::Request(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based review backend.
///
/// The provider name in config selects which rig-core client to use.
pub struct RigBackend {
    config: ProviderConfig,
}

impl RigBackend {
    /// Fails with `InvalidCredential` when no API key is configured.
    pub fn new(config: ProviderConfig) -> Result<Self, BackendError> {
        if config.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(BackendError::InvalidCredential(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var()
            )));
        }
        if config.name == ProviderName::OpenAICompatible && config.base_url.is_none() {
            return Err(BackendError::Request(
                "openai-compatible provider requires base_url to be set".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
        label: &str,
    ) -> Result<providers::openai::CompletionsClient, BackendError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        builder
            .build()
            .map_err(|e| BackendError::Request(format!("failed to create {label} client: {e}")))
    }
}

#[async_trait]
impl ReviewBackend for RigBackend {
    async fn complete(&self, model: &str, request: &ReviewRequest) -> Result<String, BackendError> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        BackendError::Request(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, model, request, "Anthropic")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key, "OpenAI")?;
                prompt_simple!(client, model, request, "OpenAI")
            }
            ProviderName::OpenAICompatible => {
                let client = self.build_openai_client(api_key, "OpenAI-compatible")?;
                prompt_simple!(client, model, request, "OpenAI-compatible")
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_simple!(client, model, request, "Cohere")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, model, request, "Gemini")
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_simple!(client, model, request, "Perplexity")
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, model, request, "DeepSeek")
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_simple!(client, model, request, "xAI")
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, model, request, "Groq")
            }
        }
    }
}

/// First standalone 4xx/5xx number in a provider message, taken as the
/// HTTP status. Digits inside longer numbers or identifiers never match.
static STATUS_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\b([45]\d{2})\b").expect("valid regex"));

fn http_status(msg: &str) -> Option<u16> {
    STATUS_RE
        .captures(msg)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Classify a provider error message into a [`BackendError`] kind.
///
/// rig-core surfaces HTTP failures as formatted strings, so this reads the
/// status code and the phrases providers put in their error bodies.
pub fn classify_error(msg: &str) -> BackendError {
    let status = http_status(msg);
    let lower = msg.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if matches!(status, Some(401 | 403))
        || has(&[
            "unauthorized",
            "invalid api key",
            "invalid_api_key",
            "incorrect api key",
            "api key not valid",
            "invalid x-api-key",
            "authentication_error",
            "authentication failed",
            "permission_denied",
        ])
    {
        BackendError::InvalidCredential(msg.to_string())
    } else if status == Some(429)
        || has(&["rate limit", "too many requests", "resource_exhausted", "quota"])
    {
        BackendError::RateLimited(msg.to_string())
    } else if has(&["timeout", "timed out", "deadline exceeded"]) {
        BackendError::Timeout(msg.to_string())
    } else if matches!(status, Some(500..=599))
        || has(&[
            "internal server error",
            "service unavailable",
            "bad gateway",
            "overloaded",
            "high demand",
            "connection",
            "temporarily",
            "try again",
        ])
    {
        BackendError::ServerError(msg.to_string())
    } else {
        BackendError::Request(msg.to_string())
    }
}
