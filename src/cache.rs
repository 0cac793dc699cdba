//! Bounded key-value cache with approximate-size LRU eviction
//!
//! **Why**: Decoded animations are large (every frame is a full RGBA buffer at
//! display size) and cheap to rebuild relative to RAM. A budgeted cache keeps
//! recently viewed records hot and lets everything else go.
//!
//! **Used by**: Pipeline (fetch/create records), Viewer (clear on resize and
//! folder switch)
//!
//! # Eviction
//!
//! The size of a value is whatever the caller-supplied estimator says it is,
//! re-measured on every post-mutation check because cached values keep growing
//! while a decode is in flight. After any mutating operation, least-recently-
//! used entries are popped until the total fits the budget — or until a single
//! entry remains. A lone oversized entry is never evicted; that is the
//! documented steady state, not an error, and it keeps eviction from looping
//! forever on a record bigger than the whole budget.
//!
//! # Concurrency
//!
//! One `Mutex` around the whole map. Cache operations are cheap next to image
//! decode, so exclusive sections beat a lock-free design here.

use log::debug;
use lru::LruCache;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Mutex;

type Estimator<V> = Box<dyn Fn(&V) -> usize + Send + Sync>;
type Factory<V> = Box<dyn Fn() -> V + Send + Sync>;

/// Cache errors
#[derive(Debug, PartialEq, Eq)]
pub enum CacheError {
    /// `get_or_create` missed and no default factory is registered
    NoFactory,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::NoFactory => write!(f, "cache miss and no default factory registered"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Size-budgeted LRU store. Values should be cheap to clone (`Arc`-shaped).
pub struct BoundedCache<K: Hash + Eq + Debug, V: Clone> {
    state: Mutex<LruCache<K, V>>,
    budget: usize,
    estimate: Estimator<V>,
    factory: Option<Factory<V>>,
}

impl<K: Hash + Eq + Debug, V: Clone> BoundedCache<K, V> {
    /// Cache with a size budget and estimator, no default factory.
    pub fn new<E>(budget: usize, estimate: E) -> Self
    where
        E: Fn(&V) -> usize + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(LruCache::unbounded()),
            budget,
            estimate: Box::new(estimate),
            factory: None,
        }
    }

    /// Cache whose misses produce and insert a fresh value.
    pub fn with_factory<E, F>(budget: usize, estimate: E, factory: F) -> Self
    where
        E: Fn(&V) -> usize + Send + Sync + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            factory: Some(Box::new(factory)),
            ..Self::new(budget, estimate)
        }
    }

    /// Look up a key, promoting it to most-recently-used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut lru = self.state.lock().expect("lock");
        lru.get(key).cloned()
    }

    /// Look up a key; on a miss, build a fresh value with the registered
    /// factory, insert it, and return it. Fails fast without a factory.
    pub fn get_or_create(&self, key: K) -> Result<V, CacheError> {
        let mut lru = self.state.lock().expect("lock");
        if let Some(value) = lru.get(&key) {
            return Ok(value.clone());
        }
        let factory = self.factory.as_ref().ok_or(CacheError::NoFactory)?;
        let value = factory();
        lru.put(key, value.clone());
        self.evict_over_budget(&mut lru);
        Ok(value)
    }

    /// Insert or replace, then enforce the budget.
    pub fn put(&self, key: K, value: V) {
        let mut lru = self.state.lock().expect("lock");
        lru.put(key, value);
        self.evict_over_budget(&mut lru);
    }

    /// Bulk insert with a single post-condition check at the end.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&self, entries: I) {
        let mut lru = self.state.lock().expect("lock");
        for (key, value) in entries {
            lru.put(key, value);
        }
        self.evict_over_budget(&mut lru);
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.state.lock().expect("lock").pop(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.state.lock().expect("lock").clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test without promotion.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().expect("lock").contains(key)
    }

    /// Configured size budget.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Current estimated total size.
    pub fn total_size(&self) -> usize {
        let lru = self.state.lock().expect("lock");
        Self::measure(&lru, &self.estimate)
    }

    fn measure(lru: &LruCache<K, V>, estimate: &Estimator<V>) -> usize {
        lru.iter().map(|(_, v)| estimate(v)).sum()
    }

    /// Pop LRU entries until the total fits the budget or one entry remains.
    fn evict_over_budget(&self, lru: &mut LruCache<K, V>) {
        while lru.len() > 1 && Self::measure(lru, &self.estimate) > self.budget {
            if let Some((key, value)) = lru.pop_lru() {
                debug!(
                    "Evicted {:?} ({} bytes, {} entries left)",
                    key,
                    (self.estimate)(&value),
                    lru.len()
                );
            } else {
                break;
            }
        }
    }
}
