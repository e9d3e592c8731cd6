//! # finance-runtime
//!
//! Concrete clients behind the `finance-core` traits.
//!
//! ## Clients
//!
//! - **Perplexity**: advice generation (`LlmProvider`)
//! - **Plaid**: token exchange and transaction retrieval (`BankAggregator`)
//! - **Redis** (default feature `redis-cache`): shared `AdviceCache`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use finance_runtime::{PerplexityProvider, PlaidClient};
//!
//! let provider = Arc::new(PerplexityProvider::from_env()?);
//! let plaid = Arc::new(PlaidClient::from_env()?);
//! ```

pub mod perplexity;
pub mod plaid;

#[cfg(feature = "redis-cache")]
pub mod redis_cache;

pub use perplexity::{PerplexityConfig, PerplexityProvider};
pub use plaid::{PlaidClient, PlaidConfig, PlaidEnvironment};

#[cfg(feature = "redis-cache")]
pub use redis_cache::{RedisCache, RedisConfig};

// Re-export core types for convenience
pub use finance_core::{
    AdviceCache, AdvicePipeline, BankAggregator, FinanceError, IngestionService, LlmProvider,
    Result, TransactionStore,
};
