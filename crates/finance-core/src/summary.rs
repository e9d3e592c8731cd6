//! Category Summary
//!
//! Reduces a transaction list to category totals.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transaction::Transaction;

/// Category label to cumulative signed amount
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlySummary(BTreeMap<String, Decimal>);

impl MonthlySummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount to a category, starting unseen categories at zero.
    ///
    /// Totals saturate at `Decimal::MAX` / `Decimal::MIN`.
    pub fn add(&mut self, category: &str, amount: Decimal) {
        let total = self.0.entry(category.to_string()).or_insert(Decimal::ZERO);
        *total = total.checked_add(amount).unwrap_or_else(|| {
            tracing::warn!(category, "Category total overflowed, saturating");
            total.saturating_add(amount)
        });
    }

    pub fn get(&self, category: &str) -> Option<Decimal> {
        self.0.get(category).copied()
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sum over every category
    pub fn total(&self) -> Decimal {
        self.0.values().fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indented JSON, as embedded in prompts and cached per user
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromIterator<(String, Decimal)> for MonthlySummary {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        let mut summary = Self::new();
        for (category, amount) in iter {
            summary.add(&category, amount);
        }
        summary
    }
}

/// Total each category across the given transactions
pub fn get_monthly_summary(transactions: &[Transaction]) -> MonthlySummary {
    let mut summary = MonthlySummary::new();
    for tx in transactions {
        summary.add(&tx.category, tx.amount);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tx(day: u32, category: &str, amount: Decimal) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(2024, 5, day).unwrap(), category, amount)
    }

    /// Heap's algorithm, enough for a handful of items
    fn permutations(items: &[Transaction]) -> Vec<Vec<Transaction>> {
        fn go(k: usize, items: &mut Vec<Transaction>, out: &mut Vec<Vec<Transaction>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            for i in 0..k {
                go(k - 1, items, out);
                let j = if k % 2 == 0 { i } else { 0 };
                items.swap(j, k - 1);
            }
        }
        let mut out = Vec::new();
        go(items.len(), &mut items.to_vec(), &mut out);
        out
    }

    #[test]
    fn test_empty_input() {
        assert!(get_monthly_summary(&[]).is_empty());
    }

    #[test]
    fn test_same_category_accumulates() {
        let summary = get_monthly_summary(&[tx(1, "Food", dec!(10)), tx(2, "Food", dec!(5))]);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.get("Food"), Some(dec!(15)));
    }

    #[test]
    fn test_categories_are_not_normalized() {
        let summary = get_monthly_summary(&[
            tx(1, "Food", dec!(1)),
            tx(1, "food", dec!(2)),
            tx(1, "Food ", dec!(3)),
        ]);
        assert_eq!(summary.len(), 3);
    }

    #[test]
    fn test_sum_preserved_for_every_order() {
        let input = vec![
            tx(1, "Food", dec!(12.40)),
            tx(2, "Rent", dec!(950)),
            tx(3, "Payroll", dec!(-2100.55)),
            tx(4, "Food", dec!(3.10)),
            tx(5, "Travel", dec!(0.01)),
        ];
        let expected: Decimal = input.iter().map(|t| t.amount).sum();
        let baseline = get_monthly_summary(&input);

        for order in permutations(&input) {
            let summary = get_monthly_summary(&order);
            assert_eq!(summary.total(), expected);
            assert_eq!(summary, baseline);
        }
    }

    #[test]
    fn test_huge_totals_saturate() {
        let half = Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0);
        let summary = get_monthly_summary(&[
            tx(1, "Rent", half),
            tx(2, "Rent", half),
            tx(3, "Refund", Decimal::MIN),
            tx(4, "Refund", dec!(-1)),
        ]);
        assert_eq!(summary.get("Rent"), Some(Decimal::MAX));
        assert_eq!(summary.get("Refund"), Some(Decimal::MIN));
        assert_eq!(summary.total(), Decimal::ZERO);
    }

    #[test]
    fn test_pretty_json_uses_numbers() {
        let summary = get_monthly_summary(&[tx(1, "Food", dec!(15))]);
        let json = summary.to_pretty_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Food"], serde_json::json!(15.0));
        assert!(json.contains('\n'));
    }
}
