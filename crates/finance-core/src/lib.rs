//! # finance-core
//!
//! Transaction summaries, spending trends and the cached advice pipeline,
//! written against traits so every external service can be swapped.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       AdvicePipeline                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ AdviceCache  │  │ Transaction  │  │    LlmProvider     │  │
//! │  │  (Strategy)  │  │    Store     │  │    (Strategy)      │  │
//! │  └──────────────┘  └──────┬───────┘  └────────────────────┘  │
//! └───────────────────────────┼──────────────────────────────────┘
//!                             │ save
//! ┌───────────────────────────┴──────────────────────────────────┐
//! │  IngestionService ──▶ BankAggregator (Strategy)               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concrete Perplexity, Plaid and Redis clients live in `finance-runtime`.

pub mod advice;
pub mod aggregator;
pub mod cache;
pub mod error;
pub mod ingest;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod summary;
pub mod transaction;
pub mod trend;

pub use advice::{Advice, AdvicePipeline, AdviceRequest, AdviceSource, PipelineConfig};
pub use aggregator::{BankAggregator, DateRange, Pagination, RawTransaction, TransactionPage};
pub use cache::{AdviceCache, CacheMode, MemoryCache};
pub use error::{ErrorKind, FinanceError, Result};
pub use ingest::{IngestionService, RetryPolicy};
pub use message::{Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use store::{JsonFileStore, MemoryStore, TransactionStore, WriteMode};
pub use summary::{get_monthly_summary, MonthlySummary};
pub use transaction::Transaction;
pub use trend::{analyze_changes, calculate_trends, ChangeReport, TrendAnalysis, TrendReport};
