//! Generation API client
//!
//! HTTP client for the external text-generation API, behind a trait so the
//! pipeline can be exercised against scripted responses. Failures are
//! classified into the retry taxonomy the Naturalizer acts on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;

use fns_common::config::TomlConfig;

/// Default generation model
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Generation API failure classification
///
/// Only `QuotaExhausted` is fatal to a run; the other kinds are absorbed by
/// retries and identity fallback.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Upstream asked us to slow down; retry after an increasing delay
    #[error("Generation API rate limited: {0}")]
    RateLimited(String),

    /// Account quota or credit exhausted; aborts the run
    #[error("Generation API quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Network blip, timeout, 5xx, or malformed response; retry then fall
    /// back to identity mapping
    #[error("Generation API transient failure: {0}")]
    Transient(String),
}

/// Client interface for the text-generation API
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send one prompt, return the raw text response
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Messages-API response payload
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// HTTP implementation of [`GenerationClient`]
///
/// Targets an Anthropic-style messages endpoint. Each attempt is bounded by
/// the transport timeouts; retry policy lives in the Naturalizer, not here.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpGenerationClient {
    /// Create a new client with the given API key
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be built (should not happen with
    /// valid config).
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create with a specific model and base URL
    pub fn with_options(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let mut this = Self::new(api_key);
        if let Some(model) = model {
            this.model = model;
        }
        if let Some(base_url) = base_url {
            this.base_url = base_url.trim_end_matches('/').to_string();
        }
        this
    }

    /// Create from configuration sources
    ///
    /// API key resolution priority: Database → ENV → TOML. Model and base
    /// URL come from the environment or TOML when present.
    pub async fn from_config(
        db: &SqlitePool,
        toml_config: &TomlConfig,
    ) -> fns_common::Result<Self> {
        let api_key = crate::config::resolve_generation_api_key(db, toml_config).await?;
        let model = std::env::var("FNS_GENERATION_MODEL")
            .ok()
            .or_else(|| toml_config.generation_model.clone());
        Ok(Self::with_options(
            api_key,
            model,
            toml_config.generation_base_url.clone(),
        ))
    }

    /// Classify a non-success HTTP status plus body into a GenerationError
    fn classify_status(status: reqwest::StatusCode, body: &str) -> GenerationError {
        let summary: String = body.chars().take(200).collect();

        if status.as_u16() == 429 {
            return GenerationError::RateLimited(summary);
        }

        let lower = body.to_ascii_lowercase();
        let quota_worded =
            lower.contains("quota") || lower.contains("credit") || lower.contains("billing");
        if status.as_u16() == 402 || (status.as_u16() == 403 && quota_worded) {
            return GenerationError::QuotaExhausted(summary);
        }

        GenerationError::Transient(format!("status {}: {}", status, summary))
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Generation API request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": prompt}]
            }))
            .send()
            .await
            .map_err(|e| GenerationError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transient(format!("malformed response: {}", e)))?;

        api_response
            .content
            .first()
            .and_then(|block| block.text.clone())
            .ok_or_else(|| GenerationError::Transient("empty response content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_uses_default_model() {
        let client = HttpGenerationClient::new("test-key".to_string());
        assert_eq!(client.model_name(), DEFAULT_MODEL);
        assert!(client.base_url.contains("api.anthropic.com"));
    }

    #[test]
    fn with_options_overrides_model_and_base_url() {
        let client = HttpGenerationClient::with_options(
            "test-key".to_string(),
            Some("other-model".to_string()),
            Some("http://localhost:9100/".to_string()),
        );
        assert_eq!(client.model_name(), "other-model");
        assert_eq!(client.base_url, "http://localhost:9100");
    }

    #[test]
    fn status_429_classifies_as_rate_limited() {
        let err = HttpGenerationClient::classify_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "slow down",
        );
        assert!(matches!(err, GenerationError::RateLimited(_)));
    }

    #[test]
    fn quota_worded_403_classifies_as_quota_exhausted() {
        let err = HttpGenerationClient::classify_status(
            reqwest::StatusCode::FORBIDDEN,
            r#"{"error": "credit balance too low"}"#,
        );
        assert!(matches!(err, GenerationError::QuotaExhausted(_)));
    }

    #[test]
    fn plain_403_classifies_as_transient() {
        let err =
            HttpGenerationClient::classify_status(reqwest::StatusCode::FORBIDDEN, "forbidden");
        assert!(matches!(err, GenerationError::Transient(_)));
    }

    #[test]
    fn server_errors_classify_as_transient() {
        let err = HttpGenerationClient::classify_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "oops",
        );
        assert!(matches!(err, GenerationError::Transient(_)));
    }
}
