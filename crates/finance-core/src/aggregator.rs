//! Bank Aggregator Integration
//!
//! Abstraction over the bank-data API (Plaid): token exchange and paged
//! transaction retrieval, plus the mapping from aggregator records to
//! [`Transaction`].

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transaction::{Transaction, UNCATEGORIZED};

/// Transaction as the aggregator returns it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub transaction_id: Option<String>,

    pub date: NaiveDate,

    pub amount: Decimal,

    /// Category hierarchy, most general first
    #[serde(default)]
    pub category: Option<Vec<String>>,

    /// Merchant or description
    #[serde(default)]
    pub name: Option<String>,
}

impl RawTransaction {
    /// Keep date and amount, take the top-level category or "Uncategorized"
    pub fn into_transaction(self) -> Transaction {
        let category = self
            .category
            .and_then(|c| c.into_iter().next())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        Transaction {
            id: self.transaction_id,
            date: self.date,
            category,
            amount: self.amount,
        }
    }
}

/// Map a batch of aggregator records to local transactions
pub fn transform(raw: Vec<RawTransaction>) -> Vec<Transaction> {
    raw.into_iter().map(RawTransaction::into_transaction).collect()
}

/// Inclusive date window for a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Page window for a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub count: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(count: u32, offset: u32) -> Self {
        Self { count, offset }
    }
}

/// One page of aggregator results
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<RawTransaction>,

    /// Total matching the query, when the aggregator reports it
    #[serde(default)]
    pub total_transactions: Option<u32>,
}

/// Bank aggregator client trait (Strategy pattern)
#[async_trait]
pub trait BankAggregator: Send + Sync {
    /// Aggregator name
    fn name(&self) -> &str;

    /// Create a link token for the client-side account linking widget
    async fn create_link_token(&self, client_user_id: &str) -> Result<String>;

    /// Create a public token against a sandbox institution, bypassing the widget
    async fn create_sandbox_public_token(&self, institution_id: &str) -> Result<String>;

    /// Exchange a public token for a long-lived access token
    async fn exchange_public_token(&self, public_token: &str) -> Result<String>;

    /// Fetch one page of transactions.
    ///
    /// Fails with `FinanceError::ProductNotReady` while the item is still
    /// being prepared.
    async fn fetch_transactions(
        &self,
        access_token: &str,
        range: DateRange,
        page: Pagination,
    ) -> Result<TransactionPage>;
}
