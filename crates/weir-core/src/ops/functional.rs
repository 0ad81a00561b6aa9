//! Content-observing operators: map, filter, sort and group-by.
//!
//! Filter, sort and group-by materialize their index bookkeeping by running
//! the user function once per sample — through a [`Grabber`], so the work
//! parallelizes — and stay order-deterministic regardless of the grabber's
//! delivery mode. The resulting datasets are still lazy.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::dataset::{Data, LazyDataset};
use crate::grabber::Grabber;
use crate::mappers::Mapper;
use crate::progress::Progress;
use crate::sample::Sample;
use crate::Result;

/// Lazily applies a [`Mapper`] to every sample.
pub struct MapOp<M> {
    mapper: Arc<M>,
}

impl<M> MapOp<M>
where
    M: Mapper + 'static,
{
    /// Creates a new [`MapOp`].
    pub fn new(mapper: M) -> Self {
        Self {
            mapper: Arc::new(mapper),
        }
    }

    /// Applies the mapper to `data`.
    pub fn apply(&self, data: &Data) -> Data {
        let mapper = Arc::clone(&self.mapper);
        let source = data.clone();
        Data::new(LazyDataset::new(data.len(), move |i| {
            mapper.map(i, source.get(i)?)
        }))
    }
}

/// Keeps the samples satisfying a predicate.
///
/// The predicate runs once per sample when the filter is applied; the
/// surviving indices are kept in ascending order, so the output preserves
/// the input order even under an unordered grabber.
pub struct FilterOp<F> {
    predicate: Arc<F>,
    negate: bool,
    grabber: Grabber,
}

impl<F> FilterOp<F>
where
    F: Fn(usize, &Sample) -> Result<bool> + Send + Sync + 'static,
{
    /// Creates a new [`FilterOp`].
    pub fn new(predicate: F, negate: bool) -> Self {
        Self {
            predicate: Arc::new(predicate),
            negate,
            grabber: Grabber::default(),
        }
    }

    /// Runs the predicate through `grabber`.
    #[must_use]
    pub fn with_grabber(mut self, grabber: Grabber) -> Self {
        self.grabber = grabber;
        self
    }

    /// Applies the filter to `data`.
    pub fn apply(&self, data: &Data) -> Result<Data> {
        self.apply_with(data, &Progress::default())
    }

    /// Applies the filter, reporting iteration through `progress`.
    pub fn apply_with(&self, data: &Data, progress: &Progress) -> Result<Data> {
        let task = progress.task("filter", data.len());
        let mut kept = Vec::new();
        self.grabber.run(
            data.len(),
            |i| Ok(((self.predicate)(i, &data.get(i)?)?, i)),
            |index, (keep, i)| {
                task.step(index);
                if keep ^ self.negate {
                    kept.push(i);
                }
                Ok(())
            },
        )?;
        task.finish();
        kept.sort_unstable();
        Ok(Data::new(LazyDataset::remapped(data.clone(), kept)))
    }
}

/// Stable-sorts the samples by a computed key.
///
/// Keys are materialized once per sample; ties keep the original index
/// order in both directions.
pub struct SortOp<K, F> {
    key: Arc<F>,
    reverse: bool,
    grabber: Grabber,
    _marker: std::marker::PhantomData<fn() -> K>,
}

impl<K, F> SortOp<K, F>
where
    K: Ord + Send,
    F: Fn(usize, &Sample) -> Result<K> + Send + Sync + 'static,
{
    /// Creates a new [`SortOp`].
    pub fn new(key: F, reverse: bool) -> Self {
        Self {
            key: Arc::new(key),
            reverse,
            grabber: Grabber::default(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Computes sort keys through `grabber`.
    #[must_use]
    pub fn with_grabber(mut self, grabber: Grabber) -> Self {
        self.grabber = grabber;
        self
    }

    /// Applies the sort to `data`.
    pub fn apply(&self, data: &Data) -> Result<Data> {
        self.apply_with(data, &Progress::default())
    }

    /// Applies the sort, reporting iteration through `progress`.
    pub fn apply_with(&self, data: &Data, progress: &Progress) -> Result<Data> {
        let task = progress.task("sort", data.len());
        let mut keyed: Vec<(K, usize)> = Vec::with_capacity(data.len());
        self.grabber.run(
            data.len(),
            |i| Ok(((self.key)(i, &data.get(i)?)?, i)),
            |index, pair| {
                task.step(index);
                keyed.push(pair);
                Ok(())
            },
        )?;
        task.finish();
        // Unordered grabbers deliver in completion order; re-anchor on the
        // original index so ties stay stable.
        keyed.sort_by(|a, b| a.1.cmp(&b.1));
        if self.reverse {
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
        }
        let table = keyed.into_iter().map(|(_, i)| i).collect();
        Ok(Data::new(LazyDataset::remapped(data.clone(), table)))
    }
}

/// Partitions the samples into keyed groups.
///
/// Groups are ordered by first occurrence and preserve the input order
/// internally.
pub struct GroupByOp<F> {
    key: Arc<F>,
    grabber: Grabber,
}

impl<F> GroupByOp<F>
where
    F: Fn(usize, &Sample) -> Result<String> + Send + Sync + 'static,
{
    /// Creates a new [`GroupByOp`].
    pub fn new(key: F) -> Self {
        Self {
            key: Arc::new(key),
            grabber: Grabber::default(),
        }
    }

    /// Computes group keys through `grabber`.
    #[must_use]
    pub fn with_grabber(mut self, grabber: Grabber) -> Self {
        self.grabber = grabber;
        self
    }

    /// Applies the grouping to `data`.
    pub fn apply(&self, data: &Data) -> Result<IndexMap<String, Data>> {
        self.apply_with(data, &Progress::default())
    }

    /// Applies the grouping, reporting iteration through `progress`.
    pub fn apply_with(&self, data: &Data, progress: &Progress) -> Result<IndexMap<String, Data>> {
        let task = progress.task("groupby", data.len());
        let mut keyed: Vec<(usize, String)> = Vec::with_capacity(data.len());
        self.grabber.run(
            data.len(),
            |i| Ok((i, (self.key)(i, &data.get(i)?)?)),
            |index, pair| {
                task.step(index);
                keyed.push(pair);
                Ok(())
            },
        )?;
        task.finish();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut tables: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (index, key) in keyed {
            tables.entry(key).or_default().push(index);
        }
        Ok(tables
            .into_iter()
            .map(|(key, table)| {
                let group = Data::new(LazyDataset::remapped(data.clone(), table));
                (key, group)
            })
            .collect())
    }
}
