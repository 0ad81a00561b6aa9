//! Finite, indexable sequences of samples.
//!
//! The [`Dataset`] trait is the engine's central abstraction: a finite
//! sequence with a length and per-index materialization. [`Data`] is the
//! reference-shared handle every operator consumes and produces; it pairs a
//! type-erased dataset with an affine view so that slicing composes into a
//! single index rewrite and never copies samples.

use std::fmt;
use std::sync::Arc;

use crate::sample::Sample;
use crate::{Error, ErrorKind, Result};

/// A finite, indexable sequence of [`Sample`]s.
///
/// `get` must be pure: concurrent calls with the same index return the same
/// sample (given deterministic readers and parsers), and implementations
/// must be safe to share across threads.
pub trait Dataset: Send + Sync {
    /// Returns the number of samples.
    fn len(&self) -> usize;

    /// Materializes the sample at `index`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Index`] when `index` is out of range, or
    /// with the underlying read/decode error.
    fn get(&self, index: usize) -> Result<Sample>;

    /// Returns `true` if the dataset holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Materialized dataset over an owned vector of samples.
#[derive(Clone, Default)]
pub struct ListDataset {
    samples: Arc<Vec<Sample>>,
}

impl ListDataset {
    /// Creates a new [`ListDataset`] from already materialized samples.
    #[must_use]
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: Arc::new(samples),
        }
    }
}

impl Dataset for ListDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        self.samples
            .get(index)
            .cloned()
            .ok_or_else(|| Error::out_of_range(index, self.samples.len()))
    }
}

impl fmt::Debug for ListDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListDataset")
            .field("len", &self.len())
            .finish()
    }
}

type FetchFn = dyn Fn(usize) -> Result<Sample> + Send + Sync;

/// Lazy dataset over a `(length, index → sample)` closure.
///
/// The closure is only invoked on access; the dataset itself holds no
/// samples.
#[derive(Clone)]
pub struct LazyDataset {
    len: usize,
    fetch: Arc<FetchFn>,
}

impl LazyDataset {
    /// Creates a new [`LazyDataset`].
    ///
    /// `fetch` is called with indices in `0..len` only.
    pub fn new(len: usize, fetch: impl Fn(usize) -> Result<Sample> + Send + Sync + 'static) -> Self {
        Self {
            len,
            fetch: Arc::new(fetch),
        }
    }

    /// Creates a lazy dataset that projects `source` through an index table.
    ///
    /// Element `i` of the result is `source[table[i]]`.
    #[must_use]
    pub fn remapped(source: Data, table: Vec<usize>) -> Self {
        let len = table.len();
        Self::new(len, move |i| source.get(table[i]))
    }

    /// Creates a lazy dataset that projects `source` through an index
    /// function, producing `len` elements.
    pub fn remapped_by(
        source: Data,
        len: usize,
        index: impl Fn(usize) -> usize + Send + Sync + 'static,
    ) -> Self {
        Self::new(len, move |i| source.get(index(i)))
    }
}

impl Dataset for LazyDataset {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<Sample> {
        if index >= self.len {
            return Err(Error::out_of_range(index, self.len));
        }
        (self.fetch)(index)
    }
}

impl fmt::Debug for LazyDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDataset")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Affine index rewrite: element `i` maps to `offset + i * step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct View {
    offset: usize,
    step: usize,
    len: usize,
}

impl View {
    const fn identity(len: usize) -> Self {
        Self {
            offset: 0,
            step: 1,
            len,
        }
    }

    const fn apply(&self, index: usize) -> usize {
        self.offset + index * self.step
    }
}

/// Reference-shared handle to a dataset.
///
/// `Data` is the currency of the operator algebra: cloning it shares the
/// underlying dataset, and [`slice`](Data::slice) stacks an affine remap on
/// top of it, so chained slices collapse into one compound rewrite over a
/// stable materialization function.
///
/// # Examples
///
/// ```
/// use weir_core::{Data, LazyDataset, Sample};
///
/// let data = Data::new(LazyDataset::new(10, |_| Ok(Sample::typeless([]))));
/// let sliced = data.slice(Some(2), None, Some(3))?;
/// assert_eq!(sliced.len(), 3); // indices 2, 5, 8
///
/// let again = sliced.slice(Some(1), None, None)?;
/// assert_eq!(again.len(), 2); // indices 5, 8
/// # weir_core::Result::Ok(())
/// ```
#[must_use]
#[derive(Clone)]
pub struct Data {
    inner: Arc<dyn Dataset>,
    view: View,
}

impl Data {
    /// Wraps a concrete dataset into a shared handle.
    pub fn new<D>(dataset: D) -> Self
    where
        D: Dataset + 'static,
    {
        let view = View::identity(dataset.len());
        Self {
            inner: Arc::new(dataset),
            view,
        }
    }

    /// Creates a materialized dataset handle from owned samples.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self::new(ListDataset::new(samples))
    }

    /// Returns the number of samples visible through this handle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len
    }

    /// Returns `true` if no samples are visible through this handle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.len == 0
    }

    /// Materializes the sample at `index`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Index`] when `index` is out of range, or
    /// with the underlying read/decode error.
    pub fn get(&self, index: usize) -> Result<Sample> {
        if index >= self.view.len {
            return Err(Error::out_of_range(index, self.view.len));
        }
        self.inner.get(self.view.apply(index))
    }

    /// Returns a sliced view of this dataset.
    ///
    /// `start` and `stop` clamp to the dataset length and default to its
    /// ends; `step` defaults to 1. The result has
    /// `len = ceil(max(0, stop - start) / step)` and its element `j` is
    /// `self[start + j * step]`. No samples are copied, and slicing a slice
    /// composes the two rewrites.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when `step` is zero.
    pub fn slice(
        &self,
        start: Option<usize>,
        stop: Option<usize>,
        step: Option<usize>,
    ) -> Result<Self> {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(Error::new(ErrorKind::Config, "slice step must be nonzero"));
        }
        let start = start.unwrap_or(0).min(self.view.len);
        let stop = stop.unwrap_or(self.view.len).min(self.view.len);
        let span = stop.saturating_sub(start);
        let view = View {
            offset: self.view.offset + start * self.view.step,
            step: self.view.step * step,
            len: span.div_ceil(step),
        };
        Ok(Self {
            inner: Arc::clone(&self.inner),
            view,
        })
    }

    /// Iterates over all samples, materializing them one by one.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// Materializes every sample into a vector.
    ///
    /// # Errors
    ///
    /// Fails with the first materialization error.
    pub fn samples(&self) -> Result<Vec<Sample>> {
        self.iter().collect()
    }
}

impl Dataset for Data {
    fn len(&self) -> usize {
        Data::len(self)
    }

    fn get(&self, index: usize) -> Result<Sample> {
        Data::get(self, index)
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("len", &self.view.len)
            .field("offset", &self.view.offset)
            .field("step", &self.view.step)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::{Data, Dataset, LazyDataset, ListDataset};
    use crate::sample::Sample;
    use crate::testutil::{numbered, numbers_of};
    use crate::ErrorKind;

    #[test]
    fn list_dataset_bounds() {
        let data = ListDataset::new(vec![Sample::typeless([])]);
        assert_eq!(data.len(), 1);
        assert!(data.get(0).is_ok());
        assert_eq!(data.get(1).unwrap_err().kind(), ErrorKind::Index);
    }

    #[test]
    fn slice_len_formula() {
        let data = numbered(10);
        for (start, stop, step, expected) in [
            (None, None, None, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
            (Some(5), None, None, vec![5, 6, 7, 8, 9]),
            (None, Some(6), None, vec![0, 1, 2, 3, 4, 5]),
            (None, None, Some(3), vec![0, 3, 6, 9]),
            (Some(12), None, None, vec![]),
            (None, Some(14), Some(2), vec![0, 2, 4, 6, 8]),
        ] {
            let sliced = data.slice(start, stop, step).unwrap();
            assert_eq!(numbers_of(&sliced), expected);
        }
    }

    #[test]
    fn slice_composes_affine() {
        let data = numbered(100);
        let chained = data
            .slice(Some(30), Some(90), Some(2))
            .unwrap()
            .slice(Some(5), Some(25), Some(3))
            .unwrap();
        // Equivalent single remap: start 40, step 6, len 7.
        let single = data.slice(Some(40), Some(82), Some(6)).unwrap();
        assert_eq!(numbers_of(&chained), numbers_of(&single));
    }

    #[test]
    fn slice_rejects_zero_step() {
        let data = numbered(3);
        let err = data.slice(None, None, Some(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn lazy_remap_table() {
        let data = numbered(5);
        let remapped = Data::new(LazyDataset::remapped(data, vec![4, 0, 2]));
        assert_eq!(numbers_of(&remapped), [4, 0, 2]);
        assert_eq!(remapped.get(3).unwrap_err().kind(), ErrorKind::Index);
    }

    #[test]
    fn handles_share_storage() {
        let data = numbered(4);
        let clone = data.clone();
        assert_eq!(numbers_of(&clone), numbers_of(&data));
    }
}
