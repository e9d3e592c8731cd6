//! Transaction Records
//!
//! The flat shape every other module works with. Uses `rust_decimal` for
//! amounts; positive is an expense, negative is income.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Category used when the aggregator gives none
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A single transaction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Aggregator transaction id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Posting date (YYYY-MM-DD)
    pub date: NaiveDate,

    /// Free-form category label, compared verbatim
    pub category: String,

    /// Signed amount (positive = expense, negative = income)
    pub amount: Decimal,
}

impl Transaction {
    pub fn new(date: NaiveDate, category: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: None,
            date,
            category: category.into(),
            amount,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Year-month key (`YYYY-MM`)
    pub fn month(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}
