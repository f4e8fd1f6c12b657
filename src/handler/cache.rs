//! Cache-backed session handler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use super::SessionHandler;
use crate::session::SessionId;

/// Narrow interface to the cache layer the handler delegates to.
///
/// The cache itself is a collaborator outside this crate; these are
/// exactly the operations the session design needs, named rather than
/// forwarded. [`InMemoryCache`] is the bundled implementation.
pub trait CacheStore: Send {
    /// Get a value, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value for `ttl_minutes`. Returns `false` on failure.
    fn put(&mut self, key: &str, value: &str, ttl_minutes: u64) -> bool;

    /// Store a value with no expiry. Returns `false` on failure.
    fn forever(&mut self, key: &str, value: &str) -> bool;

    /// Remove a value. Returns `false` if nothing was removed.
    fn forget(&mut self, key: &str) -> bool;

    /// Add to a numeric value, creating it from zero if absent. Returns
    /// the new value, or `None` if the existing value is not numeric.
    fn increment(&mut self, key: &str, by: i64) -> Option<i64>;

    /// Subtract from a numeric value. Returns the new value, or `None`
    /// if the existing value is not numeric.
    fn decrement(&mut self, key: &str, by: i64) -> Option<i64>;
}

/// Delegates session persistence to a [`CacheStore`] with a fixed TTL.
///
/// `gc` is a no-op: the cache's own expiry reclaims stale sessions.
pub struct CacheSessionHandler {
    cache: Arc<Mutex<dyn CacheStore>>,
    ttl_minutes: u64,
}

impl CacheSessionHandler {
    /// Create a handler over a shared cache with the given entry TTL.
    pub fn new(cache: Arc<Mutex<dyn CacheStore>>, ttl_minutes: u64) -> Self {
        Self { cache, ttl_minutes }
    }

    /// The TTL applied to written sessions, in minutes.
    pub fn ttl_minutes(&self) -> u64 {
        self.ttl_minutes
    }
}

impl SessionHandler for CacheSessionHandler {
    fn read(&mut self, id: &SessionId) -> String {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(id.as_str()))
            .unwrap_or_default()
    }

    fn write(&mut self, id: &SessionId, data: &str) -> bool {
        match self.cache.lock() {
            Ok(mut cache) => cache.put(id.as_str(), data, self.ttl_minutes),
            Err(_) => {
                warn!(session = %id, "cache lock poisoned");
                false
            }
        }
    }

    fn destroy(&mut self, id: &SessionId) -> bool {
        self.cache
            .lock()
            .map(|mut cache| cache.forget(id.as_str()))
            .unwrap_or(false)
    }

    fn gc(&mut self, _max_lifetime_secs: u64) -> usize {
        // Expiry is the cache's job.
        0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`CacheStore`] with per-entry TTLs, for tests and
/// single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: HashMap<String, CacheEntry>,
}

impl InMemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache behind the shared handle the handler expects.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Number of entries, counting expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn store(&mut self, key: &str, value: &str, expires_at: Option<Instant>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn adjust(&mut self, key: &str, delta: i64) -> Option<i64> {
        let (current, expires_at) = match self.entries.get(key) {
            Some(entry) if entry.is_expired() => (0, None),
            Some(entry) => (entry.value.parse::<i64>().ok()?, entry.expires_at),
            None => (0, None),
        };
        let next = current + delta;
        self.store(key, &next.to_string(), expires_at);
        Some(next)
    }
}

impl CacheStore for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: &str, value: &str, ttl_minutes: u64) -> bool {
        let expires_at = Instant::now() + Duration::from_secs(ttl_minutes * 60);
        self.store(key, value, Some(expires_at));
        true
    }

    fn forever(&mut self, key: &str, value: &str) -> bool {
        self.store(key, value, None);
        true
    }

    fn forget(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn increment(&mut self, key: &str, by: i64) -> Option<i64> {
        self.adjust(key, by)
    }

    fn decrement(&mut self, key: &str, by: i64) -> Option<i64> {
        self.adjust(key, -by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_roundtrip() {
        let cache = InMemoryCache::shared();
        let mut handler = CacheSessionHandler::new(cache, 30);
        let id = SessionId::generate();

        assert_eq!(handler.read(&id), "");
        assert!(handler.write(&id, r#"{"k":"v"}"#));
        assert_eq!(handler.read(&id), r#"{"k":"v"}"#);
    }

    #[test]
    fn test_handler_destroy() {
        let cache = InMemoryCache::shared();
        let mut handler = CacheSessionHandler::new(cache.clone(), 30);
        let id = SessionId::generate();

        handler.write(&id, "payload");
        assert!(handler.destroy(&id));
        assert_eq!(handler.read(&id), "");
        assert!(cache.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_gc_is_noop() {
        let cache = InMemoryCache::shared();
        let mut handler = CacheSessionHandler::new(cache.clone(), 30);
        let id = SessionId::generate();

        handler.write(&id, "payload");
        assert_eq!(handler.gc(0), 0);
        assert_eq!(handler.read(&id), "payload");
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = InMemoryCache::shared();
        let mut handler = CacheSessionHandler::new(cache, 0);
        let id = SessionId::generate();

        handler.write(&id, "payload");
        assert_eq!(handler.read(&id), "");
    }

    #[test]
    fn test_forever_never_expires() {
        let mut cache = InMemoryCache::new();
        cache.forever("key", "value");
        assert_eq!(cache.get("key"), Some("value".to_string()));
    }

    #[test]
    fn test_forget_missing_is_false() {
        let mut cache = InMemoryCache::new();
        assert!(!cache.forget("missing"));
    }

    #[test]
    fn test_increment_and_decrement() {
        let mut cache = InMemoryCache::new();

        assert_eq!(cache.increment("hits", 1), Some(1));
        assert_eq!(cache.increment("hits", 4), Some(5));
        assert_eq!(cache.decrement("hits", 2), Some(3));
    }

    #[test]
    fn test_increment_non_numeric_is_none() {
        let mut cache = InMemoryCache::new();
        cache.forever("label", "not a number");
        assert_eq!(cache.increment("label", 1), None);
    }
}
