//! Perplexity LLM Provider
//!
//! Implementation of `LlmProvider` over Perplexity's OpenAI-compatible
//! chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use finance_core::{
    error::{FinanceError, Result},
    message::Message,
    provider::{Completion, GenerationOptions, LlmProvider, TokenUsage},
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Perplexity";

/// Perplexity provider configuration
#[derive(Clone, Debug)]
pub struct PerplexityConfig {
    /// API root, without trailing slash
    pub base_url: String,

    /// Bearer key; the provider reports itself unconfigured without one
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.perplexity.ai".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl PerplexityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = std::env::var("PERPLEXITY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let base_url = std::env::var("PERPLEXITY_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Self {
            base_url,
            api_key,
            timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Perplexity LLM provider
pub struct PerplexityProvider {
    client: reqwest::Client,
    config: PerplexityConfig,
}

impl PerplexityProvider {
    /// Create from configuration
    pub fn from_config(config: PerplexityConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FinanceError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(PerplexityConfig::from_env())
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| {
                FinanceError::Configuration("PERPLEXITY_API_KEY is not a valid header value".into())
            })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl LlmProvider for PerplexityProvider {
    fn name(&self) -> &str {
        SERVICE
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    // There is no cheap unauthenticated ping, so a key is all we can check.
    async fn health_check(&self) -> Result<bool> {
        Ok(self.is_configured())
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| FinanceError::Configuration("PERPLEXITY_API_KEY not set".into()))?;

        let body = ChatRequest {
            model: &options.model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .headers(self.headers(api_key)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| FinanceError::upstream(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FinanceError::upstream(SERVICE, format!("{status} {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| FinanceError::upstream(SERVICE, format!("parse response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FinanceError::upstream(SERVICE, "response had no choices"))?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| options.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}
