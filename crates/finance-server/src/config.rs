//! Server Configuration
//!
//! Read once from the environment (after `.env` is loaded) at startup.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use finance_core::{
    aggregator::DateRange, cache::CacheMode, provider::DEFAULT_MODEL, store::DEFAULT_STORE_PATH,
    store::WriteMode,
};

/// Settings for the HTTP server and the pipeline it hosts
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub transactions_path: PathBuf,
    pub cache_mode: CacheMode,
    pub cache_ttl: Option<Duration>,
    pub write_mode: WriteMode,
    pub model: String,

    /// Window used by `/plaid/transactions` when the body gives none
    pub default_range: DateRange,

    /// Page size used by `/plaid/transactions` when the body gives none
    pub page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let cache_mode = CacheMode::default();
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            transactions_path: DEFAULT_STORE_PATH.into(),
            cache_mode,
            cache_ttl: cache_mode.default_ttl(),
            write_mode: WriteMode::default(),
            model: DEFAULT_MODEL.into(),
            default_range: DateRange::new(date(2024, 4, 1), date(2025, 5, 1)),
            page_size: 10,
        }
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let cache_mode = parse_var("ADVICE_CACHE_MODE")?.unwrap_or(defaults.cache_mode);
        let cache_ttl = match parse_var::<u64>("ADVICE_CACHE_TTL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => cache_mode.default_ttl(),
        };
        let write_mode = parse_var("STORE_WRITE_MODE")?.unwrap_or(defaults.write_mode);

        let default_range = DateRange::new(
            parse_var("TRANSACTIONS_START_DATE")?.unwrap_or(defaults.default_range.start),
            parse_var("TRANSACTIONS_END_DATE")?.unwrap_or(defaults.default_range.end),
        );
        if default_range.start > default_range.end {
            bail!("TRANSACTIONS_START_DATE is after TRANSACTIONS_END_DATE");
        }

        let page_size = parse_var("TRANSACTIONS_PAGE_SIZE")?.unwrap_or(defaults.page_size);
        if page_size == 0 {
            bail!("TRANSACTIONS_PAGE_SIZE must be positive");
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            transactions_path: var("TRANSACTIONS_PATH")
                .map_or(defaults.transactions_path, PathBuf::from),
            cache_mode,
            cache_ttl,
            write_mode,
            model: var("PERPLEXITY_MODEL").unwrap_or(defaults.model),
            default_range,
            page_size,
        })
    }
}

fn var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            tracing::debug!("{key} not set, using default");
            None
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
    T::Err: Display + Send + Sync + std::error::Error + 'static,
{
    var(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("Invalid {key} value: {raw}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.transactions_path, PathBuf::from("data/transactions.json"));
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.default_range.start.to_string(), "2024-04-01");
        assert_eq!(config.default_range.end.to_string(), "2025-05-01");
        assert_eq!(config.page_size, 10);
    }
}
