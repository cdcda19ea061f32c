use moka::policy::EvictionPolicy;
use moka::sync::Cache;

/// Optimized image URLs keyed by source URL and width.
///
/// Holds at most [`OptimizedUrlCache::CAPACITY`] entries and evicts the
/// least recently used. Clones share the same cache.
#[derive(Clone)]
pub struct OptimizedUrlCache {
    inner: Cache<(String, u32), String>,
}

impl OptimizedUrlCache {
    pub const CAPACITY: u64 = 100;

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// The cached URL for `(src, width)`, computing and storing it on a miss.
    /// A builder returning `None` stores nothing.
    pub fn get_or_insert_with(
        &self,
        src: &str,
        width: u32,
        build: impl FnOnce() -> Option<String>,
    ) -> Option<String> {
        self.inner.optionally_get_with((src.to_string(), width), build)
    }

    #[must_use]
    pub fn get(&self, src: &str, width: u32) -> Option<String> {
        self.inner.get(&(src.to_string(), width))
    }

    /// Entry count after pending evictions have been applied.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OptimizedUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_skips_builder() {
        let cache = OptimizedUrlCache::new();
        let first = cache.get_or_insert_with("a.jpg", 400, || Some("a-400".to_string()));
        let second = cache.get_or_insert_with("a.jpg", 400, || unreachable!("cached"));
        assert_eq!(first, second);
        assert!(cache.get("a.jpg", 800).is_none());
    }

    #[test]
    fn test_misses_are_not_stored() {
        let cache = OptimizedUrlCache::new();
        assert_eq!(cache.get_or_insert_with("x.png", 400, || None), None);
        assert!(cache.get("x.png", 400).is_none());
    }

    #[test]
    fn test_bounded() {
        let cache = OptimizedUrlCache::new();
        for i in 0..250 {
            cache.get_or_insert_with(&format!("{i}.jpg"), 400, || Some(format!("{i}-400")));
        }
        assert!(cache.len() <= OptimizedUrlCache::CAPACITY);
        assert!(!cache.is_empty());
    }
}
