//! Fan-out operators splitting one dataset into several.

use crate::dataset::Data;
use crate::{Error, ErrorKind, Result};

/// Splits the dataset into contiguous fixed-size batches.
///
/// The last batch may be short.
#[derive(Clone, Copy, Debug)]
pub struct BatchOp {
    size: usize,
}

impl BatchOp {
    /// Creates a new [`BatchOp`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::new(ErrorKind::Config, "batch size must be positive"));
        }
        Ok(Self { size })
    }

    /// Applies the batching to `data`.
    pub fn apply(&self, data: &Data) -> Result<Vec<Data>> {
        let mut batches = Vec::with_capacity(data.len().div_ceil(self.size));
        let mut start = 0;
        while start < data.len() {
            batches.push(data.slice(Some(start), Some(start + self.size), None)?);
            start += self.size;
        }
        Ok(batches)
    }
}

/// Partitions the dataset into `n` near-equal chunks.
///
/// The first `len mod n` chunks carry one extra element.
#[derive(Clone, Copy, Debug)]
pub struct ChunkOp {
    chunks: usize,
}

impl ChunkOp {
    /// Creates a new [`ChunkOp`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when `chunks` is zero.
    pub fn new(chunks: usize) -> Result<Self> {
        if chunks == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "number of chunks must be positive",
            ));
        }
        Ok(Self { chunks })
    }

    /// Applies the chunking to `data`.
    pub fn apply(&self, data: &Data) -> Result<Vec<Data>> {
        let len = data.len();
        let floor = len / self.chunks;
        let remainder = len % self.chunks;
        let mut out = Vec::with_capacity(self.chunks);
        let mut start = 0;
        for index in 0..self.chunks {
            let size = floor + usize::from(index < remainder);
            out.push(data.slice(Some(start), Some(start + size), None)?);
            start += size;
        }
        Ok(out)
    }
}

/// One requested size of a [`SplitOp`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplitSize {
    /// Literal sample count.
    Count(usize),
    /// Fraction of the input length, floored.
    Frac(f64),
    /// Whatever remains after the other parts.
    Rest,
}

/// Splits the dataset into consecutive parts of requested sizes.
///
/// Sizes are either all counts or all fractions, with at most one
/// [`SplitSize::Rest`] taking the remainder.
#[derive(Clone, Debug)]
pub struct SplitOp {
    sizes: Vec<SplitSize>,
}

impl SplitOp {
    /// Creates a new [`SplitOp`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when counts and fractions are
    /// mixed, more than one [`SplitSize::Rest`] is given, or a fraction
    /// falls outside `[0, 1]`.
    pub fn new(sizes: Vec<SplitSize>) -> Result<Self> {
        let counts = sizes
            .iter()
            .filter(|s| matches!(s, SplitSize::Count(_)))
            .count();
        let fracs = sizes
            .iter()
            .filter(|s| matches!(s, SplitSize::Frac(_)))
            .count();
        let rests = sizes.iter().filter(|s| matches!(s, SplitSize::Rest)).count();
        if counts > 0 && fracs > 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "split sizes must be all counts or all fractions, not mixed",
            ));
        }
        if rests > 1 {
            return Err(Error::new(
                ErrorKind::Config,
                "at most one split size may take the remainder",
            ));
        }
        for size in &sizes {
            if let SplitSize::Frac(frac) = size {
                if !(0.0..=1.0).contains(frac) {
                    let message = format!("split fraction {frac} is outside [0, 1]");
                    return Err(Error::new(ErrorKind::Config, message));
                }
            }
        }
        Ok(Self { sizes })
    }

    /// Applies the split to `data`.
    pub fn apply(&self, data: &Data) -> Result<Vec<Data>> {
        let len = data.len();
        let mut fixed_total = 0usize;
        for size in &self.sizes {
            fixed_total += match size {
                SplitSize::Count(count) => *count,
                SplitSize::Frac(frac) => (frac * len as f64) as usize,
                SplitSize::Rest => 0,
            };
        }
        let rest = len.saturating_sub(fixed_total);

        let mut out = Vec::with_capacity(self.sizes.len());
        let mut start = 0;
        for size in &self.sizes {
            let size = match size {
                SplitSize::Count(count) => *count,
                SplitSize::Frac(frac) => (frac * len as f64) as usize,
                SplitSize::Rest => rest,
            };
            out.push(data.slice(Some(start), Some(start + size), None)?);
            start += size;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::{BatchOp, ChunkOp, SplitOp, SplitSize};
    use crate::testutil::{numbered, numbers_of};
    use crate::ErrorKind;

    #[test]
    fn batch_last_is_short() {
        let batches = BatchOp::new(4).unwrap().apply(&numbered(10)).unwrap();
        let sizes: Vec<usize> = batches.iter().map(super::Data::len).collect();
        assert_eq!(sizes, [4, 4, 2]);
        assert_eq!(numbers_of(&batches[2]), [8, 9]);
    }

    #[test]
    fn batch_rejects_zero() {
        assert_eq!(BatchOp::new(0).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn chunk_spreads_remainder() {
        let chunks = ChunkOp::new(3).unwrap().apply(&numbered(11)).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(super::Data::len).collect();
        assert_eq!(sizes, [4, 4, 3]);
        assert_eq!(numbers_of(&chunks[0]), [0, 1, 2, 3]);
        assert_eq!(numbers_of(&chunks[2]), [8, 9, 10]);
    }

    #[test]
    fn split_counts() {
        let op = SplitOp::new(vec![SplitSize::Count(10), SplitSize::Count(16)]).unwrap();
        let parts = op.apply(&numbered(26)).unwrap();
        assert_eq!(parts[0].len(), 10);
        assert_eq!(parts[1].len(), 16);
    }

    #[test]
    fn split_fraction_and_rest() {
        let op = SplitOp::new(vec![SplitSize::Frac(0.5), SplitSize::Rest]).unwrap();
        let parts = op.apply(&numbered(26)).unwrap();
        assert_eq!(parts[0].len(), 13);
        assert_eq!(parts[1].len(), 13);
        assert_eq!(numbers_of(&parts[1]), (13..26).collect::<Vec<_>>());
    }

    #[test]
    fn split_rejects_mixing_and_double_rest() {
        let mixed = SplitOp::new(vec![SplitSize::Count(1), SplitSize::Frac(0.5)]);
        assert_eq!(mixed.unwrap_err().kind(), ErrorKind::Config);

        let rests = SplitOp::new(vec![SplitSize::Rest, SplitSize::Rest]);
        assert_eq!(rests.unwrap_err().kind(), ErrorKind::Config);

        let frac = SplitOp::new(vec![SplitSize::Frac(1.5)]);
        assert_eq!(frac.unwrap_err().kind(), ErrorKind::Config);
    }
}
