//! In-memory response cache with per-entry expiry
//!
//! Holds successful GET responses for the request client. Entries are
//! replaced, never mutated, and an entry past its expiry is never returned.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// A cached value and the instant it stops being servable
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Mutex-guarded TTL map keyed by request key
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live entry. Expired entries are evicted on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store (or replace) a value for `ttl`
    pub fn put(&self, key: &str, value: V, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            let expires_at = Instant::now()
                .checked_add(ttl)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(365 * 24 * 60 * 60));
            entries.insert(key.to_string(), CacheEntry { value, expires_at });
        }
    }

    /// Remove a single entry
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        self.entries
            .lock()
            .map(|mut entries| {
                let count = entries.len();
                entries.clear();
                count
            })
            .unwrap_or(0)
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, live or not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_put_get_before_expiry() {
        let cache = ResponseCache::new();
        cache.put("k", "v".to_string(), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_served_after_expiry() {
        let cache = ResponseCache::new();
        cache.put("k", 1u32, Duration::from_secs(300));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(cache.get("k"), None);
        // Expired entry was evicted on read
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_entry_and_expiry() {
        let cache = ResponseCache::new();
        cache.put("k", 1u32, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put("k", 2u32, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new();
        cache.put("short", 1u32, Duration::from_secs(1));
        cache.put("long", 2u32, Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_and_remove() {
        let cache = ResponseCache::new();
        cache.put("a", 1u32, Duration::from_secs(60));
        cache.put("b", 2u32, Duration::from_secs(60));

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }
}
