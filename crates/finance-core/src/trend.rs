//! Spending Trends
//!
//! Groups transactions by calendar month and compares the two most recent
//! months category by category.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::summary::MonthlySummary;
use crate::transaction::Transaction;

/// `YYYY-MM` to that month's category totals
pub type TrendReport = BTreeMap<String, MonthlySummary>;

/// Period-over-period percentage change per category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub current_month: String,
    pub previous_month: String,
    pub changes: BTreeMap<String, Decimal>,
}

/// Outcome of a trend comparison
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendAnalysis {
    /// Fewer than two distinct months
    InsufficientData { message: String },
    Changes(ChangeReport),
}

/// Group transactions into per-month summaries
pub fn calculate_trends(transactions: &[Transaction]) -> TrendReport {
    let mut months = TrendReport::new();
    for tx in transactions {
        months.entry(tx.month()).or_default().add(&tx.category, tx.amount);
    }
    months
}

/// Compare the two latest months in `transactions`
pub fn analyze_changes(transactions: &[Transaction]) -> TrendAnalysis {
    compare_latest(&calculate_trends(transactions))
}

/// Compare the two lexicographically largest month keys of a report.
///
/// Categories missing from the previous month, or zero there, are omitted,
/// as are changes too large to represent.
pub fn compare_latest(report: &TrendReport) -> TrendAnalysis {
    let mut latest = report.iter().rev();
    let (Some((current_month, current)), Some((previous_month, previous))) =
        (latest.next(), latest.next())
    else {
        return TrendAnalysis::InsufficientData {
            message: "Insufficient data for trend analysis".into(),
        };
    };

    let changes = current
        .categories()
        .filter_map(|(category, now)| {
            let before = previous.get(category).unwrap_or(Decimal::ZERO);
            if before.is_zero() {
                return None;
            }
            let percent = now
                .checked_sub(before)?
                .checked_div(before.abs())?
                .checked_mul(dec!(100))?;
            Some((category.to_string(), percent))
        })
        .collect();

    TrendAnalysis::Changes(ChangeReport {
        current_month: current_month.clone(),
        previous_month: previous_month.clone(),
        changes,
    })
}
