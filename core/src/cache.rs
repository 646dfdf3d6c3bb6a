//! The TTL cache seam and the typed envelope stored in it.
//!
//! The cache is a keyed blob store with per-entry expiry. Three things live
//! in it: zone snapshots (key = zone id), concert snapshots (key = concert
//! id) and replayable ticket results (key = ticket id). Every blob is a
//! [`CachedValue`] so readers can tell which of the three they got back.

use crate::dto::TicketDetail;
use crate::entities::{ConcertDetail, Zone};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a cache implementation.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The backend rejected or failed the operation.
    #[error("cache failure: {0}")]
    Backend(String),
    /// A stored blob could not be decoded.
    #[error("cache decode failure: {0}")]
    Decode(String),
}

/// Keyed blob store with per-entry TTL.
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Fetch the raw blob stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the backend fails.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the backend fails.
    async fn setex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove the entry under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the backend fails.
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every key matching `pattern` (glob syntax) and return how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the backend fails.
    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError>;
}

/// A cached blob, tagged with what it is.
///
/// The `_cached_type` discriminator keeps result replay honest: a `GET` for
/// a ticket id must never mistake a cached zone snapshot for a ticket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_cached_type")]
pub enum CachedValue {
    /// A replayable reservation result
    TicketDetail(TicketDetail),
    /// A zone snapshot used by the worker's hot path
    Zone(Zone),
    /// A concert snapshot with zones attached
    Concert(ConcertDetail),
}

/// Read and decode the entry under `key`.
///
/// A blob that no longer decodes is treated as absent and evicted so it
/// cannot wedge the key until its TTL runs out.
///
/// # Errors
///
/// Returns [`CacheError::Backend`] if the backend fails.
pub async fn read_value(
    cache: &dyn TtlCache,
    key: &str,
) -> Result<Option<CachedValue>, CacheError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Evicting undecodable cache entry");
            cache.del(key).await?;
            Ok(None)
        }
    }
}

/// Encode and store `value` under `key` with the given TTL.
///
/// # Errors
///
/// Returns [`CacheError::Decode`] if the value cannot be encoded and
/// [`CacheError::Backend`] if the backend fails.
pub async fn write_value(
    cache: &dyn TtlCache,
    key: &str,
    value: &CachedValue,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value).map_err(|e| CacheError::Decode(e.to_string()))?;
    cache.setex(key, &raw, ttl).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ConcertId, TicketId, ZoneId};
    use chrono::Utc;

    #[test]
    fn cached_values_carry_a_type_discriminator() {
        let detail = TicketDetail {
            id: TicketId::new(),
            zone_id: ZoneId::new("zon_c1_1"),
            concert_id: ConcertId::new("con_abc"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            concert_name: "Night Run".to_string(),
            concert_description: None,
            price: 55.0,
            zone_name: "VIP".to_string(),
            zone_description: None,
        };

        let json = serde_json::to_value(CachedValue::TicketDetail(detail)).unwrap();
        assert_eq!(json["_cached_type"], "TicketDetail");
        assert_eq!(json["zone_name"], "VIP");
    }
}
