//! Lookup cache in front of metadata store reads.
//!
//! # Responsibility
//! - Define the minimal `get/put/invalidate` capability injected into the
//!   storage commander.
//! - Provide a no-op default and an in-process memory implementation.
//!
//! # Invariants
//! - A cache hit never returns a record the store no longer considers live.
//!   The storage commander invalidates every name it mutates.
//! - Swapping implementations changes performance only, never results.

use crate::model::sound::Sound;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Name-keyed memoization capability.
pub trait SoundCache {
    /// Returns the cached record for `name`, if any.
    fn get(&self, name: &str) -> Option<Sound>;
    /// Stores `sound` under `name`.
    fn put(&self, name: &str, sound: Sound);
    /// Drops any cached record for `name`.
    fn invalidate(&self, name: &str);
}

impl<C: SoundCache + ?Sized> SoundCache for Arc<C> {
    fn get(&self, name: &str) -> Option<Sound> {
        (**self).get(name)
    }

    fn put(&self, name: &str, sound: Sound) {
        (**self).put(name, sound)
    }

    fn invalidate(&self, name: &str) {
        (**self).invalidate(name)
    }
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl SoundCache for NoopCache {
    fn get(&self, _name: &str) -> Option<Sound> {
        None
    }

    fn put(&self, _name: &str, _sound: Sound) {}

    fn invalidate(&self, _name: &str) {}
}

/// Unbounded in-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Sound>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Sound>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SoundCache for MemoryCache {
    fn get(&self, name: &str) -> Option<Sound> {
        self.lock().get(name).cloned()
    }

    fn put(&self, name: &str, sound: Sound) {
        self.lock().insert(name.to_string(), sound);
    }

    fn invalidate(&self, name: &str) {
        self.lock().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryCache, NoopCache, SoundCache};
    use crate::model::sound::Sound;

    #[test]
    fn noop_cache_always_misses() {
        let cache = NoopCache;
        cache.put("coffee", Sound::new("coffee", "/a/coffee.wav"));
        assert!(cache.get("coffee").is_none());
    }

    #[test]
    fn memory_cache_put_get_invalidate() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());

        cache.put("coffee", Sound::new("coffee", "/a/coffee.wav"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("coffee").unwrap().name, "coffee");

        cache.invalidate("coffee");
        assert!(cache.get("coffee").is_none());
        cache.invalidate("never-cached");
        assert!(cache.is_empty());
    }
}
