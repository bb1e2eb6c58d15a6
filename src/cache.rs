use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

/// A single cached response payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

/// In-memory cache with a fixed TTL per instance.
///
/// Each cache namespace (standard lookups, auto/global lookups) gets its own
/// instance with its own TTL. Expired entries are not swept; they are simply
/// ignored by `get` and overwritten by the next `set`. Memory stays bounded by
/// the number of distinct resolvable cities. Entries do not survive a restart.
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl_secs: u64,
}

impl TtlCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// Get a cached payload, or None if absent or older than the TTL.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age = Utc::now().signed_duration_since(entry.stored_at).num_seconds();
        if age >= 0 && (age as u64) < self.ttl_secs {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store a payload, overwriting any previous entry for the key.
    pub async fn set(&self, key: &str, payload: Value) {
        let entry = CacheEntry {
            payload,
            stored_at: Utc::now(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
    }

    /// Number of stored entries, including expired ones awaiting overwrite.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_miss_then_hit() {
        let cache = TtlCache::new(1800);

        assert!(cache.get("istanbul").await.is_none());

        cache.set("istanbul", json!({"city": "İstanbul"})).await;

        let hit = cache.get("istanbul").await.unwrap();
        assert_eq!(hit["city"], "İstanbul");
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = TtlCache::new(0);

        cache.set("ankara", json!({"city": "Ankara"})).await;

        // Entry is stored but never fresh.
        assert_eq!(cache.entry_count().await, 1);
        assert!(cache.get("ankara").await.is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = TtlCache::new(1800);

        cache.set("izmir", json!({"n": 1})).await;
        cache.set("izmir", json!({"n": 2})).await;

        assert_eq!(cache.get("izmir").await.unwrap()["n"], 2);
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_keys_independent() {
        let cache = TtlCache::new(1800);

        cache.set("bursa", json!({"ok": true})).await;

        assert!(cache.get("bursa").await.is_some());
        assert!(cache.get("adana").await.is_none());
    }
}
