//! Redis-backed [`KeyValueStore`].
//!
//! All counters and cache entries live here in production. The connection
//! manager multiplexes one connection and reconnects on failure; individual
//! command errors surface as [`StoreError`] and the cache/rate-limit layer
//! decides whether to fail open or closed.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};

use crate::cache::{KeyValueStore, StoreError};

use super::error::InfraError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = Client::open(url)
            .map_err(|err| InfraError::redis(format!("invalid redis url: {err}")))?;

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(3)
            .set_connection_timeout(CONNECT_TIMEOUT);

        let manager = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|err| InfraError::redis(format!("failed to connect: {err}")))?;

        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        // The manager is a cheap handle over one multiplexed connection.
        self.manager.clone()
    }
}

fn map_err(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::unavailable(err.to_string())
    } else {
        StoreError::protocol(err.to_string())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection();
        conn.incr(key, 1i64).await.map_err(map_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        let secs = ttl.as_secs().max(1) as i64;
        conn.expire(key, secs).await.map_err(map_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection();
        conn.get(key).await.map_err(map_err)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection();
        let secs = ttl.as_secs().max(1);
        conn.set_ex(key, value, secs).await.map_err(map_err)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection();
        conn.del(keys).await.map_err(map_err)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection();
        conn.exists(key).await.map_err(map_err)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection();
        let secs: i64 = conn.ttl(key).await.map_err(map_err)?;
        // -2 means the key is absent, -1 means no expiry is set.
        if secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(secs as u64)))
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection();
        let mut iter = conn
            .scan_match::<_, String>(pattern)
            .await
            .map_err(map_err)?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}
