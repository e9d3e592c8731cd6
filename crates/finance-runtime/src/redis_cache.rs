//! Redis Advice Cache
//!
//! `AdviceCache` over any Redis-compatible store. Hosted stores that hand
//! out an access token (Upstash and friends) get it as the AUTH password.
//! Expiry is delegated to the store via `SET EX`.

use std::time::Duration;

use async_trait::async_trait;
use finance_core::{
    cache::AdviceCache,
    error::{FinanceError, Result},
};
use redis::{aio::ConnectionManager, AsyncCommands, ConnectionInfo, IntoConnectionInfo};

const SERVICE: &str = "Redis";

/// Redis connection settings
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
    pub token: Option<String>,
}

impl RedisConfig {
    /// `None` when `REDIS_URL` is unset
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty())?;
        let token = std::env::var("REDIS_TOKEN").ok().filter(|t| !t.trim().is_empty());
        Some(Self { url, token })
    }

    fn connection_info(&self) -> Result<ConnectionInfo> {
        let mut info = self
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| FinanceError::Configuration(format!("REDIS_URL: {e}")))?;

        if let Some(token) = &self.token {
            info.redis.password = Some(token.clone());
        }
        Ok(info)
    }
}

/// Cache backed by a Redis connection manager
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Open a managed connection. Reconnects are handled by the manager.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.connection_info()?)
            .map_err(|e| FinanceError::Configuration(format!("REDIS_URL: {e}")))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| FinanceError::upstream(SERVICE, e))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl AdviceCache for RedisCache {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| FinanceError::upstream(SERVICE, e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        result.map_err(|e| FinanceError::upstream(SERVICE, e))
    }
}
