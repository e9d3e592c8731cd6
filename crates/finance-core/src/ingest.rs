//! Transaction Ingestion
//!
//! Pulls transactions from a [`BankAggregator`], maps them to the local
//! shape and hands them to a [`TransactionStore`].

use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::{transform, BankAggregator, DateRange, Pagination, RawTransaction};
use crate::error::{FinanceError, Result};
use crate::store::TransactionStore;
use crate::transaction::Transaction;

/// Pacing and retry limits for paged fetches
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Give up after this many consecutive "not ready" answers
    pub max_not_ready_retries: u32,

    /// Wait before re-requesting a page that was not ready
    pub not_ready_delay: Duration,

    /// Pause between successful pages
    pub page_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_not_ready_retries: 30,
            not_ready_delay: Duration::from_secs(2),
            page_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No waiting at all
    pub fn immediate(max_not_ready_retries: u32) -> Self {
        Self {
            max_not_ready_retries,
            not_ready_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
        }
    }
}

/// Fetch-and-persist service
pub struct IngestionService {
    aggregator: Arc<dyn BankAggregator>,
    store: Arc<dyn TransactionStore>,
    retry: RetryPolicy,
}

impl IngestionService {
    pub fn new(aggregator: Arc<dyn BankAggregator>, store: Arc<dyn TransactionStore>) -> Self {
        Self {
            aggregator,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn aggregator(&self) -> &Arc<dyn BankAggregator> {
        &self.aggregator
    }

    /// Fetch a single page, persist it and return the stored shape
    pub async fn fetch_page(
        &self,
        access_token: &str,
        range: DateRange,
        page: Pagination,
    ) -> Result<Vec<Transaction>> {
        let response = self.aggregator.fetch_transactions(access_token, range, page).await?;
        tracing::info!(
            count = response.transactions.len(),
            total = ?response.total_transactions,
            "Fetched transaction page"
        );

        let transactions = transform(response.transactions);
        self.store.save(&transactions).await?;
        Ok(transactions)
    }

    /// Fetch every page of `batch_size` until a short page comes back.
    ///
    /// A "not ready" answer re-requests the same offset; other errors abort.
    pub async fn fetch_all(
        &self,
        access_token: &str,
        range: DateRange,
        batch_size: u32,
    ) -> Result<Vec<RawTransaction>> {
        if batch_size == 0 {
            return Err(FinanceError::Configuration("batch size must be positive".into()));
        }

        let mut all = Vec::new();
        let mut offset = 0;
        let mut not_ready = 0;

        loop {
            let page = Pagination::new(batch_size, offset);
            let result = self.aggregator.fetch_transactions(access_token, range, page).await;
            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_retryable() => {
                    not_ready += 1;
                    if not_ready > self.retry.max_not_ready_retries {
                        return Err(FinanceError::upstream(
                            self.aggregator.name(),
                            format!(
                                "transactions still not ready after {} retries",
                                self.retry.max_not_ready_retries
                            ),
                        ));
                    }
                    tracing::warn!(
                        offset,
                        attempt = not_ready,
                        "Waiting for transactions to be ready..."
                    );
                    tokio::time::sleep(self.retry.not_ready_delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };
            not_ready = 0;

            let fetched = u32::try_from(response.transactions.len()).unwrap_or(u32::MAX);
            all.extend(response.transactions);
            tracing::info!("Fetched {} transactions (total: {})", fetched, all.len());

            if fetched < batch_size {
                break;
            }
            offset += batch_size;
            tokio::time::sleep(self.retry.page_delay).await;
        }

        Ok(all)
    }

    /// Fetch everything in `range`, persist it and return the stored shape
    pub async fn sync_all(
        &self,
        access_token: &str,
        range: DateRange,
        batch_size: u32,
    ) -> Result<Vec<Transaction>> {
        let transactions = transform(self.fetch_all(access_token, range, batch_size).await?);
        self.store.save(&transactions).await?;
        Ok(transactions)
    }
}
