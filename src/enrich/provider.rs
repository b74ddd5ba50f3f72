//! Remote text-completion providers.
//!
//! Defines the [`CompletionProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: always errors; used when enrichment is not configured.
//! - **[`OpenAiProvider`]**: calls an OpenAI-compatible `/chat/completions` endpoint.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/generate` endpoint.
//!
//! # Provider Selection
//!
//! ```rust
//! # use article_harness::config::EnrichmentConfig;
//! # use article_harness::enrich::provider::create_provider;
//! let config = EnrichmentConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)
//!
//! Every request carries the configured timeout, so a dead endpoint costs at
//! most `timeout_secs × (max_retries + 1)` plus backoff.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::EnrichmentConfig;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const MAX_COMPLETION_TOKENS: u32 = 200;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("enrichment provider is disabled")]
    Disabled,
    #[error("{0} is not set")]
    MissingCredentials(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Disabled or unconfigured providers are a normal operating mode, not
    /// a failure worth a warning.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            CompletionError::Disabled | CompletionError::MissingCredentials(_)
        )
    }
}

/// A remote service that completes a single text prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider identifier used in logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Send `prompt` and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

// ============ Disabled Provider ============

pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Disabled)
    }
}

// ============ OpenAI Provider ============

/// OpenAI-compatible chat completion provider.
///
/// The API key is read from the environment variable named by
/// `enrichment.api_key_env` on every call, so a key exported after startup
/// is picked up without a restart.
pub struct OpenAiProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
    api_key_env: String,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("enrichment.model required for OpenAI provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            model,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key_env: config.api_key_env.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::MissingCredentials(self.api_key_env.clone()))?;

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.0,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let json = send_with_retry(self.name(), self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completion response.
pub fn parse_chat_response(json: &Value) -> Result<String, CompletionError> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CompletionError::Malformed("missing choices[0].message.content".to_string())
        })
}

// ============ Ollama Provider ============

/// Provider backed by a local Ollama instance. No credentials required.
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("enrichment.model required for Ollama provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            model,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0 },
        });

        let json =
            send_with_retry(self.name(), self.max_retries, || self.client.post(&url).json(&body))
                .await?;

        json.get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CompletionError::Malformed("missing response field".to_string()))
    }
}

/// POST with retry/backoff, returning the decoded JSON body.
async fn send_with_retry<F>(
    provider: &str,
    max_retries: u32,
    build: F,
) -> Result<Value, CompletionError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| CompletionError::Malformed(e.to_string()));
                }

                let err = CompletionError::Status {
                    provider: provider.to_string(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                };

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(CompletionError::Transport(e));
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| CompletionError::Malformed("request was never sent".to_string())))
}

/// Create the provider named by `enrichment.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAiProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EnrichmentConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown enrichment provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "7" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "7");
    }

    #[test]
    fn test_parse_chat_response_missing_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(
            parse_chat_response(&json),
            Err(CompletionError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_provider_is_expected_failure() {
        let err = DisabledProvider.complete("hi").await.unwrap_err();
        assert!(err.is_expected());
    }

    #[tokio::test]
    async fn test_openai_without_key_is_expected_failure() {
        let config = EnrichmentConfig {
            provider: "openai".to_string(),
            model: Some("gpt-test".to_string()),
            api_key_env: "ARTICLE_HARNESS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config).unwrap();
        let err = provider.complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::MissingCredentials(_)));
        assert!(err.is_expected());
    }

    #[test]
    fn test_create_provider_unknown() {
        let config = EnrichmentConfig {
            provider: "nope".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
