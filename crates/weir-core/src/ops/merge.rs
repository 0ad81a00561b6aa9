//! Fan-in operators combining several datasets into one.

use crate::dataset::{Data, LazyDataset};
use crate::{Error, ErrorKind, Result};

/// Concatenates datasets back to back.
///
/// Materialization binary-searches the prefix sums to locate the source
/// dataset and the effective index within it.
#[derive(Clone, Copy, Debug, Default)]
pub struct CatOp {
    _priv: (),
}

impl CatOp {
    /// Creates a new [`CatOp`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }

    /// Applies the concatenation to `parts`.
    pub fn apply(&self, parts: &[Data]) -> Data {
        let parts: Vec<Data> = parts.to_vec();
        let mut prefix = Vec::with_capacity(parts.len() + 1);
        prefix.push(0usize);
        for part in &parts {
            prefix.push(prefix[prefix.len() - 1] + part.len());
        }
        let total = *prefix.last().unwrap_or(&0);
        Data::new(LazyDataset::new(total, move |i| {
            let slot = prefix.partition_point(|&p| p <= i) - 1;
            parts[slot].get(i - prefix[slot])
        }))
    }
}

/// Merges datasets of equal length by key union.
///
/// Sample `i` of the output carries the union of the inputs' items at `i`,
/// with later inputs overwriting earlier ones on key collisions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipOp {
    _priv: (),
}

impl ZipOp {
    /// Creates a new [`ZipOp`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }

    /// Applies the zip to `parts`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when `parts` is empty or the
    /// lengths differ.
    pub fn apply(&self, parts: &[Data]) -> Result<Data> {
        let Some(first) = parts.first() else {
            return Err(Error::new(
                ErrorKind::Config,
                "zip requires at least one dataset",
            ));
        };
        let len = first.len();
        if let Some(odd) = parts.iter().find(|part| part.len() != len) {
            let message = format!(
                "zip requires equal lengths, got {} and {}",
                len,
                odd.len()
            );
            return Err(Error::new(ErrorKind::Config, message));
        }
        let parts: Vec<Data> = parts.to_vec();
        Ok(Data::new(LazyDataset::new(len, move |i| {
            let mut merged = parts[0].get(i)?.to_typeless();
            for part in &parts[1..] {
                let sample = part.get(i)?;
                let items: Vec<_> = sample
                    .iter()
                    .map(|(k, item)| (k.to_owned(), item.clone()))
                    .collect();
                merged = merged.with_items(items);
            }
            Ok(merged)
        })))
    }
}
