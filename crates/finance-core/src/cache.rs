//! Advice Cache
//!
//! A thin typed accessor over an external key-value store. Eviction and
//! persistence belong to the store; the only local policy is the
//! in-process [`MemoryCache`] used when no store is configured.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{FinanceError, Result};

/// Default lifetime of per-question advice entries
pub const ADVICE_TTL: Duration = Duration::from_secs(3600);

/// Key-value cache strategy trait
#[async_trait]
pub trait AdviceCache: Send + Sync {
    /// Backend name, for logs and health output
    fn name(&self) -> &str;

    /// Look up a key. An unset or expired key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
}

/// What the advice pipeline caches, and under which key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// `advice:{user}:{question}` holds finished advice. A paraphrased
    /// question misses.
    #[default]
    PerQuestion,

    /// `summary:{user}` holds the rendered summary. It is reused for any
    /// later question, however stale.
    PerUser,
}

impl CacheMode {
    pub fn key(&self, user_id: &str, user_input: &str) -> String {
        match self {
            CacheMode::PerQuestion => format!("advice:{user_id}:{user_input}"),
            CacheMode::PerUser => format!("summary:{user_id}"),
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        match self {
            CacheMode::PerQuestion => Some(ADVICE_TTL),
            CacheMode::PerUser => None,
        }
    }
}

impl FromStr for CacheMode {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "question" | "per-question" | "advice" => Ok(CacheMode::PerQuestion),
            "user" | "per-user" | "summary" => Ok(CacheMode::PerUser),
            other => Err(FinanceError::Configuration(format!("unknown cache mode: {other}"))),
        }
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process cache, for running without a store and for tests
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl AdviceCache for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }
}
