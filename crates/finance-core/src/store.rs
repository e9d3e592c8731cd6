//! Transaction Store
//!
//! Persisted transaction list. The file store keeps a pretty-printed JSON
//! array at a fixed path; ingestion replaces it wholesale unless merge mode
//! is selected.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{FinanceError, Result};
use crate::transaction::Transaction;

/// Default location of the transaction file, relative to the working dir
pub const DEFAULT_STORE_PATH: &str = "data/transactions.json";

/// How a fresh batch is combined with what is already stored
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Last fetch replaces the entire store
    #[default]
    Replace,

    /// Keep stored records whose id is absent from the new batch.
    /// Records without an id are always dropped.
    MergeById,
}

impl FromStr for WriteMode {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(WriteMode::Replace),
            "merge" | "merge-by-id" => Ok(WriteMode::MergeById),
            other => Err(FinanceError::Configuration(format!("unknown write mode: {other}"))),
        }
    }
}

impl WriteMode {
    /// Combine `existing` with `batch` according to this mode
    pub fn combine(&self, existing: Vec<Transaction>, batch: &[Transaction]) -> Vec<Transaction> {
        match self {
            WriteMode::Replace => batch.to_vec(),
            WriteMode::MergeById => {
                let fresh: HashSet<&str> = batch.iter().filter_map(|t| t.id.as_deref()).collect();
                let mut merged: Vec<Transaction> = existing
                    .into_iter()
                    .filter(|t| t.id.as_deref().is_some_and(|id| !fresh.contains(id)))
                    .collect();
                merged.extend_from_slice(batch);
                merged.sort_by(|a, b| b.date.cmp(&a.date));
                merged
            }
        }
    }
}

/// Storage strategy trait for transaction lists
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Read every stored transaction
    async fn load(&self) -> Result<Vec<Transaction>>;

    /// Persist an ingested batch, honoring the store's write mode
    async fn save(&self, batch: &[Transaction]) -> Result<()>;
}

/// JSON file backed store
pub struct JsonFileStore {
    path: PathBuf,
    mode: WriteMode,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, err: &io::Error) -> FinanceError {
        FinanceError::Data(format!("cannot read {}: {err}", self.path.display()))
    }

    fn parse(&self, raw: &str) -> Result<Vec<Transaction>> {
        serde_json::from_str(raw)
            .map_err(|e| FinanceError::Data(format!("malformed {}: {e}", self.path.display())))
    }

    async fn write_atomic(&self, transactions: &[Transaction]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_string_pretty(transactions)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Transaction>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.read_error(&e))?;
        self.parse(&raw)
    }

    async fn save(&self, batch: &[Transaction]) -> Result<()> {
        let combined = match self.mode {
            WriteMode::Replace => batch.to_vec(),
            WriteMode::MergeById => {
                let existing = match tokio::fs::read_to_string(&self.path).await {
                    Ok(raw) => self.parse(&raw)?,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        tracing::info!(
                            path = %self.path.display(),
                            "No stored transactions yet, merging into empty"
                        );
                        Vec::new()
                    }
                    Err(e) => return Err(self.read_error(&e)),
                };
                self.mode.combine(existing, batch)
            }
        };

        self.write_atomic(&combined).await?;
        tracing::info!(path = %self.path.display(), count = combined.len(), "Saved transactions");
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    transactions: RwLock<Vec<Transaction>>,
    mode: WriteMode,
}

impl MemoryStore {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: RwLock::new(transactions),
            mode: WriteMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.read().await.clone())
    }

    async fn save(&self, batch: &[Transaction]) -> Result<()> {
        let mut stored = self.transactions.write().await;
        let existing = std::mem::take(&mut *stored);
        *stored = self.mode.combine(existing, batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tx(id: Option<&str>, day: u32, amount: rust_decimal::Decimal) -> Transaction {
        let t = Transaction::new(NaiveDate::from_ymd_opt(2024, 5, day).unwrap(), "Food", amount);
        match id {
            Some(id) => t.with_id(id),
            None => t,
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("transactions.json"));

        let batch = vec![tx(Some("a"), 2, dec!(10)), tx(None, 1, dec!(-5.5))];
        store.save(&batch).await.unwrap();

        assert_eq!(store.load().await.unwrap(), batch);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_replace_discards_previous_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("transactions.json"));

        store.save(&[tx(Some("a"), 1, dec!(1)), tx(Some("b"), 2, dec!(2))]).await.unwrap();
        store.save(&[tx(Some("c"), 3, dec!(3))]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_merge_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("transactions.json"))
            .with_mode(WriteMode::MergeById);

        store
            .save(&[tx(Some("a"), 1, dec!(1)), tx(Some("b"), 2, dec!(2)), tx(None, 3, dec!(9))])
            .await
            .unwrap();
        store.save(&[tx(Some("b"), 2, dec!(20)), tx(Some("c"), 4, dec!(3))]).await.unwrap();

        let loaded = store.load().await.unwrap();
        let ids: Vec<_> = loaded.iter().map(|t| t.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(loaded[1].amount, dec!(20));
    }

    #[tokio::test]
    async fn test_merge_keeps_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let truncated = r#"[{"id": "keep", "date": "2024-05-01", "category": "Food", "amount": 1"#;
        std::fs::write(&path, truncated).unwrap();

        let store = JsonFileStore::new(&path).with_mode(WriteMode::MergeById);
        let result = store.save(&[tx(Some("new"), 2, dec!(2))]).await;

        assert!(matches!(result, Err(FinanceError::Data(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), truncated);
    }

    #[tokio::test]
    async fn test_merge_into_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("transactions.json"))
            .with_mode(WriteMode::MergeById);

        store.save(&[tx(Some("a"), 1, dec!(1))]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load().await, Err(FinanceError::Data(_))));
    }

    #[tokio::test]
    async fn test_malformed_file_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        std::fs::write(&path, "[{\"date\": \"not a date\"}]").unwrap();
        assert!(matches!(JsonFileStore::new(path).load().await, Err(FinanceError::Data(_))));
    }

    #[test]
    fn test_write_mode_parsing() {
        assert_eq!("Merge".parse::<WriteMode>().unwrap(), WriteMode::MergeById);
        assert_eq!(" replace ".parse::<WriteMode>().unwrap(), WriteMode::Replace);
        assert!(matches!("append".parse::<WriteMode>(), Err(FinanceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_memory_store_replaces() {
        let store = MemoryStore::new(vec![tx(Some("a"), 1, dec!(1))]);
        store.save(&[tx(Some("b"), 2, dec!(2))]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }
}
