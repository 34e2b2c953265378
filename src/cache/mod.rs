//! In-memory response cache keyed by exact request URL.
//!
//! Keys are compared byte-for-byte: `/a?x=1&y=2` and `/a?y=2&x=1` are distinct,
//! as are `/a` and `/a/`. Values are decoded JSON documents shared behind an
//! [`Arc`], so a hit hands out the very document stored by the first successful
//! fetch.
//!
//! The cache is unbounded in entry count. An optional time-to-live makes older
//! entries behave as absent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// A stored JSON document and the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Arc<Value>,
    stored_at: Instant,
}

impl CacheEntry {
    fn new(value: Arc<Value>) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    pub fn value(&self) -> &Arc<Value> {
        &self.value
    }

    /// Time elapsed since the entry was stored.
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.is_none_or(|ttl| self.age() < ttl)
    }
}

/// URL → [`CacheEntry`] map with optional TTL.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use taxocache::cache::ResponseCache;
///
/// let mut cache = ResponseCache::new();
/// cache.insert("/species/42", Arc::new(json!({"id": 42})));
///
/// assert_eq!(cache.get("/species/42").as_deref(), Some(&json!({"id": 42})));
/// assert!(cache.get("/species/42/").is_none());
/// ```
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Option<Duration>,
}

impl ResponseCache {
    /// Creates an empty cache whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache whose entries expire `ttl` after being stored.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the stored document for `url`, dropping it first if it has expired.
    pub fn get(&mut self, url: &str) -> Option<Arc<Value>> {
        let fresh = self.entries.get(url)?.is_fresh(self.ttl);
        if !fresh {
            self.entries.remove(url);
            return None;
        }
        self.entries.get(url).map(|entry| Arc::clone(&entry.value))
    }

    /// Returns the entry for `url` without applying the TTL.
    pub fn peek(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Stores `value` under `url`, replacing any previous entry.
    pub fn insert(&mut self, url: impl Into<String>, value: Arc<Value>) {
        self.entries.insert(url.into(), CacheEntry::new(value));
    }

    /// Removes the entry for `url`. Returns `true` if one was present.
    pub fn remove(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` if a fresh entry exists for `url`.
    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .get(url)
            .is_some_and(|entry| entry.is_fresh(self.ttl))
    }

    /// Number of stored entries, including any expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.is_fresh(ttl));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_key_match() {
        let mut cache = ResponseCache::new();
        cache.insert("/a?x=1&y=2", Arc::new(json!(1)));
        assert!(cache.get("/a?y=2&x=1").is_none());
        assert!(cache.get("/a?x=1&y=2/").is_none());
        assert_eq!(cache.get("/a?x=1&y=2").as_deref(), Some(&json!(1)));
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let mut cache = ResponseCache::new();
        cache.insert("/a", Arc::new(json!({"k": "a"})));
        cache.insert("/b", Arc::new(json!({"k": "b"})));
        assert_eq!(cache.get("/a").unwrap()["k"], "a");
        assert_eq!(cache.get("/b").unwrap()["k"], "b");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn hit_returns_same_allocation() {
        let mut cache = ResponseCache::new();
        let doc = Arc::new(json!([1, 2, 3]));
        cache.insert("/list", Arc::clone(&doc));
        assert!(Arc::ptr_eq(&cache.get("/list").unwrap(), &doc));
    }

    #[test]
    fn remove_and_clear() {
        let mut cache = ResponseCache::new();
        cache.insert("/a", Arc::new(json!(null)));
        cache.insert("/b", Arc::new(json!(true)));
        assert!(cache.remove("/a"));
        assert!(!cache.remove("/a"));
        assert!(cache.contains("/b"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry() {
        let mut cache = ResponseCache::with_ttl(Duration::from_secs(60));
        cache.insert("/a", Arc::new(json!("x")));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.contains("/a"));
        assert!(cache.get("/a").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.contains("/a"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("/a").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_keeps_fresh_entries() {
        let mut cache = ResponseCache::with_ttl(Duration::from_secs(10));
        cache.insert("/old", Arc::new(json!(1)));
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert("/new", Arc::new(json!(2)));
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.contains("/new"));
        assert!(cache.peek("/old").is_none());
    }
}
