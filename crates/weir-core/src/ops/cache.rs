//! Caching operators: per-item memoization, policy-driven dataset caches,
//! and eager whole-dataset memorization.

use std::sync::Arc;

use crate::caches::{Cache, CacheId, CachePolicy, CacheRegistry, MemoCache};
use crate::dataset::{Data, LazyDataset};
use crate::grabber::Grabber;
use crate::mappers::{CacheMapper, Mapper};
use crate::ops::MapOp;
use crate::progress::Progress;
use crate::sample::Sample;
use crate::Result;

/// Unregisters a cache id when the produced dataset is dropped.
struct RegistryGuard {
    id: CacheId,
    registry: CacheRegistry,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Wraps every item of every sample in a memoizing layer.
///
/// Repeated [`Item::get`] calls on the same sample handle hit memory after
/// the first read. The wrapping happens lazily, so re-materializing a
/// sample produces a fresh memo.
///
/// [`Item::get`]: crate::Item::get
#[derive(Clone, Copy, Debug, Default)]
pub struct ItemCacheOp {
    _priv: (),
}

impl ItemCacheOp {
    /// Creates a new [`ItemCacheOp`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }

    /// Applies the item caching to `data`.
    pub fn apply(&self, data: &Data) -> Data {
        MapOp::new(CacheMapper::new()).apply(data)
    }
}

/// Wraps a dataset with a shared, policy-driven sample cache keyed by
/// index.
///
/// On a miss, the upstream sample is materialized, item-cached, stored and
/// returned. The cache is registered in a keyed registry (process-wide by
/// default) so worker threads can resolve it by id, and it lives exactly
/// as long as the produced dataset.
///
/// The cache mutex serializes its own state only: two threads racing on
/// the same missing key may both materialize the upstream sample, and the
/// later store wins. Duplicate builds are accepted by design.
#[derive(Clone, Debug)]
pub struct CacheOp {
    policy: CachePolicy,
    registry: CacheRegistry,
}

impl CacheOp {
    /// Creates a new [`CacheOp`] with the given eviction policy.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            registry: CacheRegistry::global().clone(),
        }
    }

    /// Registers the cache in `registry` instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: CacheRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Wraps `data` with a fresh cache.
    pub fn apply(&self, data: &Data) -> Data {
        let id = CacheId::fresh();
        let registry = self.registry.clone();
        registry.insert(id, self.policy.build());
        let guard = Arc::new(RegistryGuard {
            id,
            registry: registry.clone(),
        });

        let source = data.clone();
        let mapper = CacheMapper::new();
        Data::new(LazyDataset::new(data.len(), move |i| {
            let _guard = &guard;
            let Some(cache) = registry.lookup(id) else {
                return source.get(i);
            };
            if let Some(sample) = cache.get(&i) {
                return Ok(sample);
            }
            let sample = mapper.map(i, source.get(i)?)?;
            cache.put(i, sample.clone());
            Ok(sample)
        }))
    }
}

/// Eagerly materializes the whole dataset into an unbounded cache.
///
/// Samples are item-cached and stored through the configured grabber, then
/// served from memory.
#[derive(Clone, Debug, Default)]
pub struct MemorizeEverythingOp {
    grabber: Grabber,
}

impl MemorizeEverythingOp {
    /// Creates a new [`MemorizeEverythingOp`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes through `grabber`.
    #[must_use]
    pub fn with_grabber(mut self, grabber: Grabber) -> Self {
        self.grabber = grabber;
        self
    }

    /// Applies the memorization to `data`.
    pub fn apply(&self, data: &Data) -> Result<Data> {
        self.apply_with(data, &Progress::default())
    }

    /// Applies the memorization, reporting iteration through `progress`.
    pub fn apply_with(&self, data: &Data, progress: &Progress) -> Result<Data> {
        let cache: Arc<dyn Cache<usize, Sample>> = Arc::new(MemoCache::new());
        let registry = CacheRegistry::global().clone();
        let id = CacheId::fresh();
        registry.insert(id, Arc::clone(&cache));
        let guard = Arc::new(RegistryGuard {
            id,
            registry: registry.clone(),
        });

        let mapper = CacheMapper::new();
        let task = progress.task("memorize", data.len());
        let store = &cache;
        self.grabber.run(
            data.len(),
            |i| mapper.map(i, data.get(i)?),
            |i, sample| {
                task.step(i);
                store.put(i, sample);
                Ok(())
            },
        )?;
        task.finish();

        let source = data.clone();
        Ok(Data::new(LazyDataset::new(data.len(), move |i| {
            let _guard = &guard;
            match registry.lookup(id).and_then(|c| c.get(&i)) {
                Some(sample) => Ok(sample),
                None => source.get(i),
            }
        })))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{CacheOp, ItemCacheOp, MemorizeEverythingOp};
    use crate::caches::{CachePolicy, CacheRegistry};
    use crate::dataset::{Data, LazyDataset};
    use crate::grabber::Grabber;
    use crate::item::Item;
    use crate::parsers::{JsonParser, Parser};
    use crate::sample::Sample;
    use crate::value::Value;

    fn counted(len: usize) -> (Data, Arc<AtomicUsize>) {
        let materializations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&materializations);
        let parser: Arc<dyn Parser> = Arc::new(JsonParser::new());
        let data = Data::new(LazyDataset::new(len, move |i| {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            let item = Item::memory(Value::from(i as i64), Arc::clone(&parser));
            Ok(Sample::typeless([("number".to_string(), item)]))
        }));
        (data, materializations)
    }

    #[test]
    fn memo_cache_materializes_once() {
        let (data, materializations) = counted(5);
        let cached = CacheOp::new(CachePolicy::Memo).apply(&data);
        for _ in 0..4 {
            for i in 0..5 {
                let _ = cached.get(i).unwrap();
            }
        }
        assert_eq!(materializations.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn bounded_cache_rematerializes_evicted() {
        let (data, materializations) = counted(4);
        let cached = CacheOp::new(CachePolicy::Fifo { capacity: 2 }).apply(&data);
        for i in 0..4 {
            let _ = cached.get(i).unwrap();
        }
        // 0 and 1 were evicted by 2 and 3.
        let _ = cached.get(0).unwrap();
        assert_eq!(materializations.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn cache_is_unregistered_on_drop() {
        let registry = CacheRegistry::default();
        let (data, _) = counted(2);
        let cached = CacheOp::new(CachePolicy::Memo)
            .with_registry(registry.clone())
            .apply(&data);
        assert_eq!(registry.len(), 1);
        let _ = cached.get(0).unwrap();

        let clone = cached.clone();
        drop(cached);
        assert_eq!(registry.len(), 1);
        drop(clone);
        assert!(registry.is_empty());
    }

    #[test]
    fn item_cache_hits_on_same_handle() {
        let (data, _) = counted(2);
        let cached = ItemCacheOp::new().apply(&data);
        let sample = cached.get(0).unwrap();
        assert_eq!(sample.value("number").unwrap(), Value::from(0i64));
        assert_eq!(sample.value("number").unwrap(), Value::from(0i64));
    }

    #[test]
    fn memorize_everything_serves_from_memory() {
        let (data, materializations) = counted(6);
        let memorized = MemorizeEverythingOp::new()
            .with_grabber(Grabber::new(2))
            .apply(&data)
            .unwrap();
        assert_eq!(materializations.load(Ordering::SeqCst), 6);
        for _ in 0..3 {
            for i in 0..6 {
                let sample = memorized.get(i).unwrap();
                assert_eq!(sample.value("number").unwrap(), Value::from(i as i64));
            }
        }
        assert_eq!(materializations.load(Ordering::SeqCst), 6);
    }
}
