//! Advice Pipeline
//!
//! One linear pass per request:
//!
//! ```text
//! credentials ─▶ cache ─┬─ hit ───────────────────────────────────────────▶ respond
//!                       └─ miss ─▶ load ─▶ aggregate ─▶ prompt ─▶ model ─▶ store ─▶ respond
//! ```
//!
//! Any failing step aborts the request. There is no retry and no fallback.
//! In [`CacheMode::PerUser`] the cache holds the rendered summary instead of
//! the advice, so a hit still goes through prompt and model.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{AdviceCache, CacheMode};
use crate::error::{FinanceError, Result};
use crate::message::Message;
use crate::prompt::{build_prompt, render_summary};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::store::TransactionStore;
use crate::summary::get_monthly_summary;

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub cache_mode: CacheMode,

    /// Lifetime of cached entries; `None` keeps them until evicted
    pub cache_ttl: Option<Duration>,

    pub generation: GenerationOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let cache_mode = CacheMode::default();
        Self {
            cache_mode,
            cache_ttl: cache_mode.default_ttl(),
            generation: GenerationOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self.cache_ttl = mode.default_ttl();
        self
    }
}

/// Caller identity and free-text question
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdviceRequest {
    pub user_id: String,
    pub user_input: String,
}

/// Where the advice came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Cache,
    Model,
}

/// Generated (or cached) advice text
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Advice {
    pub content: String,
    pub source: AdviceSource,
}

/// The advice request handler
pub struct AdvicePipeline {
    provider: Arc<dyn LlmProvider>,
    cache: Arc<dyn AdviceCache>,
    store: Arc<dyn TransactionStore>,
    config: PipelineConfig,
}

impl AdvicePipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        cache: Arc<dyn AdviceCache>,
        store: Arc<dyn TransactionStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            store,
            config,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<dyn AdviceCache> {
        &self.cache
    }

    /// Answer a question from cache or from the model
    pub async fn advise(&self, request: &AdviceRequest) -> Result<Advice> {
        if !self.provider.is_configured() {
            return Err(FinanceError::Configuration(format!(
                "{} API key is not set",
                self.provider.name()
            )));
        }

        let key = self.config.cache_mode.key(&request.user_id, &request.user_input);
        // An empty stored value counts as a miss
        let cached = self.cache.get(&key).await?.filter(|v| !v.is_empty());

        match self.config.cache_mode {
            CacheMode::PerQuestion => {
                if let Some(advice) = cached {
                    tracing::info!(%key, "Retrieved cached advice");
                    return Ok(Advice {
                        content: advice,
                        source: AdviceSource::Cache,
                    });
                }

                tracing::info!(%key, "Cache miss, generating advice");
                let summary = self.load_summary().await?;
                let advice = self.ask_model(&summary, &request.user_input).await?;
                self.cache.set(&key, &advice, self.config.cache_ttl).await?;

                Ok(Advice {
                    content: advice,
                    source: AdviceSource::Model,
                })
            }
            CacheMode::PerUser => {
                let summary = match cached {
                    Some(summary) => {
                        tracing::info!(%key, "Retrieved cached summary");
                        summary
                    }
                    None => {
                        tracing::info!(%key, "Caching new summary");
                        let summary = self.load_summary().await?;
                        self.cache.set(&key, &summary, self.config.cache_ttl).await?;
                        summary
                    }
                };

                Ok(Advice {
                    content: self.ask_model(&summary, &request.user_input).await?,
                    source: AdviceSource::Model,
                })
            }
        }
    }

    async fn load_summary(&self) -> Result<String> {
        let transactions = self.store.load().await?;
        let summary = get_monthly_summary(&transactions);
        tracing::debug!(
            transactions = transactions.len(),
            categories = summary.len(),
            "Summarized"
        );
        render_summary(&summary)
    }

    async fn ask_model(&self, summary: &str, question: &str) -> Result<String> {
        let prompt = build_prompt(summary, question);
        tracing::debug!(%prompt, "Prompt");

        let completion = self
            .provider
            .complete(&[Message::user(prompt)], &self.config.generation)
            .await?;

        tracing::info!(model = %completion.model, "Model responded");
        Ok(completion.content)
    }
}
