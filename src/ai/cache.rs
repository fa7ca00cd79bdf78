//! Response Cache
//!
//! Content-addressed memo of prior AI results. Keys are SHA-256 digests over
//! an operation discriminator plus the canonicalized inputs, so identical
//! input to an identical operation is served byte-identically without a new
//! network call.
//!
//! Only successful results are stored - a degraded fallback must never mask
//! a later healthy answer. Capacity is a bounded LRU; identical content
//! dedupes onto one entry, and cold entries age out instead of growing the
//! map for the process lifetime.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::cache as cache_constants;

pub struct ResponseCache {
    inner: Mutex<LruCache<String, Value>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(cache_constants::DEFAULT_CAPACITY).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Derive a cache key from an operation discriminator and its inputs.
    ///
    /// Each part is length-prefixed before hashing so distinct part splits
    /// can never collide onto one digest.
    pub fn key(operation: &str, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().await;
        let hit = inner.get(key).cloned();
        if hit.is_some() {
            debug!(key = %&key[..12.min(key.len())], "Cache hit");
        }
        hit
    }

    /// Store a successful result. Last write wins on concurrent misses for
    /// the same key; results for identical input are equivalent.
    pub async fn put(&self, key: String, value: Value) {
        let mut inner = self.inner.lock().await;
        inner.put(key, value);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(cache_constants::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ResponseCache::new(16);
        let key = ResponseCache::key("categorize", &["Lab 3 due Friday"]);

        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), json!({"category": "assignments"})).await;

        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit["category"], "assignments");
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = ResponseCache::key("format", &["text", "assignments"]);
        let b = ResponseCache::key("format", &["text", "assignments"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_discriminates_operations() {
        let categorize = ResponseCache::key("categorize", &["same text"]);
        let format = ResponseCache::key("format", &["same text"]);
        assert_ne!(categorize, format);
    }

    #[test]
    fn test_key_part_boundaries_cannot_collide() {
        let a = ResponseCache::key("format", &["ab", "c"]);
        let b = ResponseCache::key("format", &["a", "bc"]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_lru_eviction_bounds_size() {
        let cache = ResponseCache::new(2);
        cache.put("a".into(), json!(1)).await;
        cache.put("b".into(), json!(2)).await;
        cache.put("c".into(), json!(3)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_is_last_write_wins() {
        let cache = ResponseCache::new(4);
        cache.put("k".into(), json!("first")).await;
        cache.put("k".into(), json!("second")).await;
        assert_eq!(cache.get("k").await.unwrap(), json!("second"));
    }
}
