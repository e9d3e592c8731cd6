//! LLM Provider Strategy Pattern
//!
//! Common interface for hosted chat-completion models, so the advice
//! pipeline can run against Perplexity in production and a stub in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Default Perplexity model
pub const DEFAULT_MODEL: &str = "sonar-medium-online";

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier
    pub model: String,

    /// Sampling temperature; provider default when unset
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Completion length cap; provider default when unset
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Strategy trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "Perplexity")
    fn name(&self) -> &str;

    /// Whether credentials are present. Checked before any outbound call.
    fn is_configured(&self) -> bool;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion from messages
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.model, "sonar-medium-online");
        assert!(opts.temperature.is_none());
        assert!(opts.max_tokens.is_none());
    }
}
