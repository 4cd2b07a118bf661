//! Memoized backend responses.
//!
//! Keys combine the backend with the full composed prompt (memory included),
//! so the same question asked in a different conversation is a different key.
//! The cache is bounded by an LRU policy unless built with [`ResponseCache::unbounded`],
//! which keeps every entry for the life of the process.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::backend::BackendId;

/// Default number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Cache key: which backend answered which prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Backend that produced the response.
    pub backend: BackendId,
    /// Full composed prompt.
    pub prompt: String,
}

impl CacheKey {
    /// Create a key.
    pub fn new(backend: BackendId, prompt: impl Into<String>) -> Self {
        Self {
            backend,
            prompt: prompt.into(),
        }
    }
}

/// Shared response cache.
pub struct ResponseCache {
    entries: Mutex<LruCache<CacheKey, String>>,
}

impl ResponseCache {
    /// Cache holding at most `capacity` responses; `0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        match NonZeroUsize::new(capacity) {
            Some(cap) => Self {
                entries: Mutex::new(LruCache::new(cap)),
            },
            None => Self::unbounded(),
        }
    }

    /// Cache that never evicts.
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Look up a response, marking it recently used.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Store a response; an existing value for the key is replaced.
    pub fn put(&self, key: CacheKey, value: impl Into<String>) {
        self.lock().put(key, value.into());
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_miss_then_hit() {
        let cache = ResponseCache::default();
        let key = CacheKey::new(BackendId::Groq, "hello");
        assert_eq!(cache.get(&key), None);

        cache.put(key.clone(), "hi");
        assert_eq!(cache.get(&key), Some("hi".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_includes_backend() {
        let cache = ResponseCache::default();
        cache.put(CacheKey::new(BackendId::Groq, "hello"), "from groq");
        assert_eq!(cache.get(&CacheKey::new(BackendId::OpenRouter, "hello")), None);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ResponseCache::default();
        let key = CacheKey::new(BackendId::Groq, "hello");
        cache.put(key.clone(), "one");
        cache.put(key.clone(), "two");
        assert_eq!(cache.get(&key), Some("two".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let cache = ResponseCache::new(2);
        let a = CacheKey::new(BackendId::Groq, "a");
        let b = CacheKey::new(BackendId::Groq, "b");
        let c = CacheKey::new(BackendId::Groq, "c");

        cache.put(a.clone(), "A");
        cache.put(b.clone(), "B");
        // Touch `a` so `b` becomes the eviction candidate.
        assert!(cache.get(&a).is_some());
        cache.put(c.clone(), "C");

        assert_eq!(cache.capacity(), 2);
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let cache = ResponseCache::new(0);
        for i in 0..2000 {
            cache.put(CacheKey::new(BackendId::Groq, format!("p{}", i)), "r");
        }
        assert_eq!(cache.len(), 2000);
    }
}
