//! Bounded lookup cache and the cached obsolete-status resolver.

use super::ObsoleteLookup;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Thread-safe string-keyed cache holding at most `capacity` answers.
///
/// Eviction is first-in first-out. The cache lives as long as its owner;
/// nothing is global.
pub struct LookupCache<V> {
    capacity: usize,
    inner: Mutex<CacheState<V>>,
}

struct CacheState<V> {
    entries: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V: Clone> LookupCache<V> {
    /// Create a cache; a zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut state = self.inner.lock();
        if state.entries.insert(key.clone(), value).is_none() {
            state.order.push_back(key);
        }
        while state.entries.len() > self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.order.clear();
    }
}

/// Obsolete-status lookup backed by an explicit cache.
///
/// Lookup failures are logged and reported as "not obsolete"; they are not
/// cached, so a later call may still succeed.
pub struct Supersession<O> {
    lookup: Arc<O>,
    cache: Arc<LookupCache<Option<String>>>,
}

impl<O> Clone for Supersession<O> {
    fn clone(&self) -> Self {
        Self {
            lookup: Arc::clone(&self.lookup),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<O: ObsoleteLookup> Supersession<O> {
    pub fn new(lookup: Arc<O>, cache: Arc<LookupCache<Option<String>>>) -> Self {
        Self { lookup, cache }
    }

    /// Create with a private cache of the given capacity.
    pub fn with_capacity(lookup: Arc<O>, capacity: usize) -> Self {
        Self::new(lookup, Arc::new(LookupCache::new(capacity)))
    }

    pub fn cache(&self) -> &LookupCache<Option<String>> {
        &self.cache
    }

    /// The lowercase id superseding `code`, if `code` is obsolete.
    pub async fn superseded_by(&self, code: &str) -> Option<String> {
        let key = code.to_lowercase();
        if let Some(answer) = self.cache.get(&key) {
            return answer;
        }

        match self.lookup.superseded_by(&key).await {
            Ok(answer) => {
                let answer = answer.map(|s| s.to_lowercase());
                if let Some(new_code) = &answer {
                    info!("{} is obsolete, superseded by {}", key, new_code);
                }
                self.cache.insert(key, answer.clone());
                answer
            }
            Err(e) => {
                warn!("Could not check obsolete status of {}: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeService;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_cache_evicts_oldest() {
        let cache = LookupCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_cache_overwrite_keeps_single_slot() {
        let cache = LookupCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 5);
        cache.insert("b", 2);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(5));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let cache: LookupCache<u8> = LookupCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("x", 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_supersession_answers_are_cached() {
        let service = Arc::new(FakeService::offline().with_superseded("1ABC", "2XYZ"));
        let supersession = Supersession::with_capacity(Arc::clone(&service), 16);

        assert_eq!(supersession.superseded_by("1abc").await, Some("2xyz".to_string()));
        assert_eq!(supersession.superseded_by("1ABC").await, Some("2xyz".to_string()));
        assert_eq!(supersession.superseded_by("3def").await, None);
        assert_eq!(supersession.superseded_by("3def").await, None);

        assert_eq!(service.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_supersession_failures_are_not_cached() {
        let service = Arc::new(FakeService::offline().with_unreachable("9bad"));
        let supersession = Supersession::with_capacity(Arc::clone(&service), 16);

        assert_eq!(supersession.superseded_by("9bad").await, None);
        assert_eq!(supersession.superseded_by("9bad").await, None);

        assert!(supersession.cache().is_empty());
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 2);
    }
}
