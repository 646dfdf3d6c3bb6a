//! Redis implementation of the TTL cache.
//!
//! Backs the [`TtlCache`] seam with a multiplexed connection manager, which
//! reconnects transparently and is cheap to clone across tasks. Pattern
//! invalidation walks the keyspace with cursor `SCAN` + batched `DEL`
//! rather than `KEYS`, so it never blocks the server on a large keyspace.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use encore_core::cache::{CacheError, TtlCache};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// How many keys a single `SCAN` step asks for.
const SCAN_COUNT: u32 = 100;

/// Redis-backed [`TtlCache`].
#[derive(Clone)]
pub struct RedisTtlCache {
    connection: ConnectionManager,
}

impl RedisTtlCache {
    /// Connect to Redis at the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the client cannot be created or
    /// the initial connection fails.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Backend(format!("Failed to create client: {e}")))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to connect: {e}")))?;

        tracing::info!(url = %url, "Cache connected");
        Ok(Self { connection })
    }
}

#[async_trait]
impl TtlCache for RedisTtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        connection
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn setex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .del(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut connection = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut connection)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

            if !keys.is_empty() {
                let deleted: u64 = connection
                    .del(&keys)
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if removed > 0 {
            tracing::debug!(pattern = %pattern, removed = removed, "Invalidated cache entries");
        }

        Ok(removed)
    }
}
