//! Application State

use std::sync::Arc;

use finance_core::{AdvicePipeline, IngestionService, TransactionStore};

use crate::config::ServerConfig;

/// Shared application state. Every client in here is built once in `main`.
#[derive(Clone)]
pub struct AppState {
    /// Cache → summary → prompt → model
    pub pipeline: Arc<AdvicePipeline>,

    /// Plaid ingestion (None if Plaid credentials are missing)
    pub ingestion: Option<Arc<IngestionService>>,

    /// Transaction file the pipeline and insights read
    pub store: Arc<dyn TransactionStore>,

    pub config: Arc<ServerConfig>,
}
