//! In-memory [`TtlCache`] double.

use async_trait::async_trait;
use encore_core::cache::{CacheError, TtlCache};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Hash-map-backed TTL cache. Expiry is honored lazily, on read.
#[derive(Default)]
pub struct InMemoryTtlCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryTtlCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.expires_at > now).count()
    }

    /// Whether the cache holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Glob match supporting `*` wildcards, the subset the cache contract uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == key;
    }

    let mut remainder = key;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            let Some(rest) = remainder.strip_prefix(segment) else {
                return false;
            };
            remainder = rest;
        } else if i == segments.len() - 1 {
            return remainder.ends_with(segment);
        } else {
            let Some(found) = remainder.find(segment) else {
                return false;
            };
            remainder = &remainder[found + segment.len()..];
        }
    }

    // Pattern ended with '*'
    true
}

#[async_trait]
impl TtlCache for InMemoryTtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn setex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = self.lock();
        let matching: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        for key in &matching {
            entries.remove(key);
        }
        Ok(matching.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_prefix_patterns() {
        assert!(glob_match("zon_c1_*", "zon_c1_vip"));
        assert!(glob_match("*c1*", "zon_c1_vip"));
        assert!(!glob_match("zon_c2_*", "zon_c1_vip"));
        assert!(glob_match("zon_c1_vip", "zon_c1_vip"));
        assert!(!glob_match("zon_c1_vip", "zon_c1_vip2"));
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = InMemoryTtlCache::new();
        cache.setex("k", "v", Duration::from_millis(10)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_delete_removes_only_matching_keys() {
        let cache = InMemoryTtlCache::new();
        let ttl = Duration::from_secs(60);
        cache.setex("zon_c1_1", "a", ttl).await.unwrap();
        cache.setex("zon_c1_2", "b", ttl).await.unwrap();
        cache.setex("zon_c2_1", "c", ttl).await.unwrap();

        let removed = cache.scan_delete("zon_c1_*").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.get("zon_c1_1").await.unwrap(), None);
        assert_eq!(cache.get("zon_c2_1").await.unwrap().as_deref(), Some("c"));
    }
}
