//! Thread-safe key→value caches with pluggable eviction.
//!
//! Every cache serializes `get`/`put`/`clear` behind a single internal
//! mutex — reads included, because the recency-based policies mutate their
//! bookkeeping on every lookup. Bounded caches never exceed their capacity.
//!
//! The [`CacheRegistry`] is a process-wide keyed table that lets worker
//! threads re-resolve a cache created elsewhere instead of relying on
//! ambient inherited state; [`CacheOp`](crate::ops::CacheOp) registers its
//! cache there and unregisters it when the produced dataset is dropped.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, LazyLock, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sample::Sample;

/// Thread-safe key→value store with policy-driven eviction.
///
/// Values are returned by clone; keep them cheap to duplicate (samples and
/// items share their payloads internally).
pub trait Cache<K, V>: Send + Sync {
    /// Returns the cached value for `key`, if present.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` under `key`, evicting per the cache policy when full.
    fn put(&self, key: K, value: V);

    /// Returns the number of cached entries.
    fn len(&self) -> usize;

    /// Drops every cached entry.
    fn clear(&self);

    /// Returns `true` if the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded memoization cache.
pub struct MemoCache<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> MemoCache<K, V> {
    /// Creates an empty [`MemoCache`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for MemoCache<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock().expect("cache mutex poisoned");
        guard.get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let _ = guard.insert(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    fn clear(&self) {
        self.inner.lock().expect("cache mutex poisoned").clear();
    }
}

struct FifoInner<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

/// Bounded cache evicting the oldest-inserted entry.
pub struct FifoCache<K, V> {
    inner: Mutex<FifoInner<K, V>>,
    capacity: usize,
}

impl<K, V> FifoCache<K, V> {
    /// Creates a [`FifoCache`] holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FifoInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }
}

impl<K, V> Cache<K, V> for FifoCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        if guard.map.contains_key(&key) {
            let _ = guard.map.insert(key, value);
            return;
        }
        if guard.order.len() >= self.capacity {
            if let Some(evicted) = guard.order.pop_front() {
                let _ = guard.map.remove(&evicted);
            }
        }
        guard.order.push_back(key.clone());
        let _ = guard.map.insert(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").map.len()
    }

    fn clear(&self) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.clear();
        guard.order.clear();
    }
}

struct LifoInner<K, V> {
    map: HashMap<K, V>,
    stack: Vec<K>,
}

/// Bounded cache replacing the most-recently-inserted entry.
pub struct LifoCache<K, V> {
    inner: Mutex<LifoInner<K, V>>,
    capacity: usize,
}

impl<K, V> LifoCache<K, V> {
    /// Creates a [`LifoCache`] holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LifoInner {
                map: HashMap::new(),
                stack: Vec::new(),
            }),
            capacity: capacity.max(1),
        }
    }
}

impl<K, V> Cache<K, V> for LifoCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        if guard.map.contains_key(&key) {
            let _ = guard.map.insert(key, value);
            return;
        }
        if guard.stack.len() >= self.capacity {
            if let Some(evicted) = guard.stack.pop() {
                let _ = guard.map.remove(&evicted);
            }
        }
        guard.stack.push(key.clone());
        let _ = guard.map.insert(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").map.len()
    }

    fn clear(&self) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.clear();
        guard.stack.clear();
    }
}

struct RrInner<K, V> {
    map: HashMap<K, V>,
    keys: Vec<K>,
    rng: StdRng,
}

/// Bounded cache evicting a uniformly random occupant.
pub struct RrCache<K, V> {
    inner: Mutex<RrInner<K, V>>,
    capacity: usize,
}

impl<K, V> RrCache<K, V> {
    /// Creates an [`RrCache`] holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RrInner {
                map: HashMap::new(),
                keys: Vec::new(),
                rng: StdRng::from_entropy(),
            }),
            capacity: capacity.max(1),
        }
    }
}

impl<K, V> Cache<K, V> for RrCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        if guard.map.contains_key(&key) {
            let _ = guard.map.insert(key, value);
            return;
        }
        if guard.keys.len() >= self.capacity {
            let len = guard.keys.len();
            let slot = guard.rng.gen_range(0..len);
            let evicted = std::mem::replace(&mut guard.keys[slot], key.clone());
            let _ = guard.map.remove(&evicted);
        } else {
            guard.keys.push(key.clone());
        }
        let _ = guard.map.insert(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").map.len()
    }

    fn clear(&self) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.map.clear();
        guard.keys.clear();
    }
}

struct RecencyInner<K, V> {
    map: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K, V> RecencyInner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    fn touch(&mut self, key: &K) -> Option<&V> {
        self.tick += 1;
        let tick = self.tick;
        let (_, stamp) = self.map.get_mut(key)?;
        let _ = self.order.remove(stamp);
        *stamp = tick;
        let _ = self.order.insert(tick, key.clone());
        self.map.get(key).map(|(value, _)| value)
    }

    fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        let _ = self.order.insert(self.tick, key.clone());
        if let Some((_, stamp)) = self.map.insert(key, (value, self.tick)) {
            let _ = self.order.remove(&stamp);
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.tick = 0;
    }
}

/// Bounded cache evicting the least-recently-used entry.
///
/// Reads count as use, and `put` promotes the key to most-recent.
pub struct LruCache<K, V> {
    inner: Mutex<RecencyInner<K, V>>,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an [`LruCache`] holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RecencyInner::new()),
            capacity: capacity.max(1),
        }
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.touch(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        if !guard.map.contains_key(&key) && guard.map.len() >= self.capacity {
            if let Some((_, evicted)) = guard.order.pop_first() {
                let _ = guard.map.remove(&evicted);
            }
        }
        guard.insert(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").map.len()
    }

    fn clear(&self) {
        self.inner.lock().expect("cache mutex poisoned").clear();
    }
}

/// Bounded cache evicting the most-recently-used entry.
pub struct MruCache<K, V> {
    inner: Mutex<RecencyInner<K, V>>,
    capacity: usize,
}

impl<K, V> MruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an [`MruCache`] holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RecencyInner::new()),
            capacity: capacity.max(1),
        }
    }
}

impl<K, V> Cache<K, V> for MruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        guard.touch(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        if !guard.map.contains_key(&key) && guard.map.len() >= self.capacity {
            if let Some((_, evicted)) = guard.order.pop_last() {
                let _ = guard.map.remove(&evicted);
            }
        }
        guard.insert(key, value);
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").map.len()
    }

    fn clear(&self) {
        self.inner.lock().expect("cache mutex poisoned").clear();
    }
}

/// Eviction discipline configuration, buildable into a cache instance.
///
/// # Examples
///
/// ```
/// use weir_core::caches::{Cache, CachePolicy};
///
/// let cache = CachePolicy::Fifo { capacity: 2 }.build::<usize, String>();
/// cache.put(0, "a".into());
/// cache.put(1, "b".into());
/// cache.put(2, "c".into());
/// assert_eq!(cache.len(), 2);
/// assert!(cache.get(&0).is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CachePolicy {
    /// Unbounded memoization.
    Memo,
    /// Evict the oldest-inserted entry.
    Fifo {
        /// Maximum number of entries.
        capacity: usize,
    },
    /// Replace the most-recently-inserted entry.
    Lifo {
        /// Maximum number of entries.
        capacity: usize,
    },
    /// Evict a uniformly random occupant.
    Rr {
        /// Maximum number of entries.
        capacity: usize,
    },
    /// Evict the least-recently-used entry.
    Lru {
        /// Maximum number of entries.
        capacity: usize,
    },
    /// Evict the most-recently-used entry.
    Mru {
        /// Maximum number of entries.
        capacity: usize,
    },
}

impl CachePolicy {
    /// Builds a cache instance implementing this policy.
    #[must_use]
    pub fn build<K, V>(self) -> Arc<dyn Cache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self {
            Self::Memo => Arc::new(MemoCache::new()),
            Self::Fifo { capacity } => Arc::new(FifoCache::new(capacity)),
            Self::Lifo { capacity } => Arc::new(LifoCache::new(capacity)),
            Self::Rr { capacity } => Arc::new(RrCache::new(capacity)),
            Self::Lru { capacity } => Arc::new(LruCache::new(capacity)),
            Self::Mru { capacity } => Arc::new(MruCache::new(capacity)),
        }
    }
}

/// Opaque identifier of a registered cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheId(Uuid);

impl CacheId {
    /// Generates a fresh, unique id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type SampleCache = Arc<dyn Cache<usize, Sample>>;

/// Process-wide keyed registry of dataset caches.
///
/// Worker threads look caches up by id instead of capturing ambient state;
/// the dataset produced by [`CacheOp`](crate::ops::CacheOp) owns a guard
/// that removes its entry on drop.
#[must_use]
#[derive(Clone, Default)]
pub struct CacheRegistry {
    inner: Arc<Mutex<HashMap<CacheId, SampleCache>>>,
}

static GLOBAL_CACHES: LazyLock<CacheRegistry> = LazyLock::new(CacheRegistry::default);

impl CacheRegistry {
    /// Returns the process-wide registry.
    pub fn global() -> &'static CacheRegistry {
        &GLOBAL_CACHES
    }

    /// Registers `cache` under `id`, replacing any previous entry.
    pub fn insert(&self, id: CacheId, cache: SampleCache) {
        let mut guard = self.inner.lock().expect("CacheRegistry mutex poisoned");
        let _ = guard.insert(id, cache);
    }

    /// Looks up the cache registered under `id`.
    #[must_use]
    pub fn lookup(&self, id: CacheId) -> Option<SampleCache> {
        let guard = self.inner.lock().expect("CacheRegistry mutex poisoned");
        guard.get(&id).cloned()
    }

    /// Removes the cache registered under `id`.
    pub fn remove(&self, id: CacheId) {
        let mut guard = self.inner.lock().expect("CacheRegistry mutex poisoned");
        let _ = guard.remove(&id);
    }

    /// Returns the number of registered caches.
    #[must_use]
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("CacheRegistry mutex poisoned");
        guard.len()
    }

    /// Returns `true` if no caches are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{
        Cache, CacheId, CachePolicy, CacheRegistry, FifoCache, LifoCache, LruCache, MemoCache,
        MruCache, RrCache,
    };

    #[test]
    fn memo_is_unbounded() {
        let cache = MemoCache::new();
        for i in 0..1000usize {
            cache.put(i, i);
        }
        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.get(&999), Some(999));
    }

    #[test]
    fn fifo_evicts_oldest() {
        let cache = FifoCache::new(2);
        cache.put(0, "zero");
        cache.put(1, "one");
        cache.put(2, "two");
        assert_eq!(cache.get(&0), None);
        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.get(&2), Some("two"));
    }

    #[test]
    fn lifo_replaces_top() {
        let cache = LifoCache::new(2);
        cache.put(0, "zero");
        cache.put(1, "one");
        cache.put(2, "two");
        assert_eq!(cache.get(&0), Some("zero"));
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some("two"));
    }

    #[test]
    fn rr_respects_capacity() {
        let cache = RrCache::new(4);
        for i in 0..100usize {
            cache.put(i, i);
            assert!(cache.len() <= 4);
        }
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn lru_read_refreshes() {
        let cache = LruCache::new(2);
        cache.put(0, "zero");
        cache.put(1, "one");
        // Touching 0 makes 1 the eviction candidate.
        assert_eq!(cache.get(&0), Some("zero"));
        cache.put(2, "two");
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&0), Some("zero"));
        assert_eq!(cache.get(&2), Some("two"));
    }

    #[test]
    fn lru_put_counts_as_use() {
        let cache = LruCache::new(2);
        cache.put(0, "zero");
        cache.put(1, "one");
        // Re-putting 0 promotes it, so 1 is evicted next.
        cache.put(0, "zero again");
        cache.put(2, "two");
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&0), Some("zero again"));
    }

    #[test]
    fn mru_evicts_most_recent() {
        let cache = MruCache::new(2);
        cache.put(0, "zero");
        cache.put(1, "one");
        cache.put(2, "two");
        // 1 was most recent, so it went away.
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&0), Some("zero"));
        assert_eq!(cache.get(&2), Some("two"));
    }

    #[test]
    fn clear_empties_everything() {
        let caches: Vec<Arc<dyn Cache<usize, usize>>> = vec![
            CachePolicy::Memo.build(),
            CachePolicy::Fifo { capacity: 8 }.build(),
            CachePolicy::Lru { capacity: 8 }.build(),
        ];
        for cache in caches {
            cache.put(1, 1);
            cache.put(2, 2);
            cache.clear();
            assert!(cache.is_empty());
            assert_eq!(cache.get(&1), None);
        }
    }

    #[test]
    fn concurrent_access_keeps_capacity() {
        let cache = Arc::new(LruCache::<usize, usize>::new(16));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    cache.put(t * 1000 + i, i);
                    let _ = cache.get(&(t * 1000));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }

    #[test]
    fn registry_round_trip() {
        let registry = CacheRegistry::default();
        let id = CacheId::fresh();
        registry.insert(id, CachePolicy::Memo.build());
        assert!(registry.lookup(id).is_some());

        registry.remove(id);
        assert!(registry.lookup(id).is_none());
        assert!(registry.lookup(CacheId::fresh()).is_none());
    }
}
