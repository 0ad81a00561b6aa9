//! Index-rewriting operators: identity, slice, repeat, cycle, reverse, pad
//! and index selection.

use crate::dataset::{Data, LazyDataset};
use crate::{Error, ErrorKind, Result};

/// Passthrough operator.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityOp {
    _priv: (),
}

impl IdentityOp {
    /// Creates a new [`IdentityOp`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }

    /// Returns the input unchanged.
    pub fn apply(&self, data: &Data) -> Data {
        data.clone()
    }
}

/// Standard slicing with optional start, stop and step.
#[derive(Clone, Copy, Debug, Default)]
pub struct SliceOp {
    start: Option<usize>,
    stop: Option<usize>,
    step: Option<usize>,
}

impl SliceOp {
    /// Creates a new [`SliceOp`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when `step` is zero.
    pub fn new(start: Option<usize>, stop: Option<usize>, step: Option<usize>) -> Result<Self> {
        if step == Some(0) {
            return Err(Error::new(ErrorKind::Config, "slice step must be nonzero"));
        }
        Ok(Self { start, stop, step })
    }

    /// Applies the slice to `data`.
    pub fn apply(&self, data: &Data) -> Result<Data> {
        data.slice(self.start, self.stop, self.step)
    }
}

/// Repeats the whole dataset `times` times.
///
/// Non-interleaved order cycles through the input (`a b c a b c …`);
/// interleaved order repeats each element consecutively (`a a b b c c …`).
#[derive(Clone, Copy, Debug)]
pub struct RepeatOp {
    times: usize,
    interleave: bool,
}

impl RepeatOp {
    /// Creates a new [`RepeatOp`].
    #[must_use]
    pub const fn new(times: usize, interleave: bool) -> Self {
        Self { times, interleave }
    }

    /// Applies the repetition to `data`.
    pub fn apply(&self, data: &Data) -> Data {
        let len = data.len();
        let times = self.times;
        let out_len = len.saturating_mul(times);
        let interleave = self.interleave;
        Data::new(LazyDataset::remapped_by(data.clone(), out_len, move |i| {
            if interleave { i / times } else { i % len }
        }))
    }
}

/// Extends (or truncates) the dataset to `total` elements by cycling.
///
/// Element `i` of the output is `input[i mod len]`; an empty input yields
/// an empty output regardless of `total`.
#[derive(Clone, Copy, Debug)]
pub struct CycleOp {
    total: usize,
}

impl CycleOp {
    /// Creates a new [`CycleOp`].
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self { total }
    }

    /// Applies the cycling to `data`.
    pub fn apply(&self, data: &Data) -> Data {
        let len = data.len();
        let out_len = if len == 0 { 0 } else { self.total };
        Data::new(LazyDataset::remapped_by(data.clone(), out_len, move |i| {
            i % len
        }))
    }
}

/// Reverses the dataset order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReverseOp {
    _priv: (),
}

impl ReverseOp {
    /// Creates a new [`ReverseOp`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }

    /// Applies the reversal to `data`.
    pub fn apply(&self, data: &Data) -> Data {
        let len = data.len();
        Data::new(LazyDataset::remapped_by(data.clone(), len, move |i| {
            len - 1 - i
        }))
    }
}

/// Truncates or pads the dataset to an exact length.
///
/// When the input is shorter than `length`, the element at the pad index
/// (last by default) fills the remaining positions.
#[derive(Clone, Copy, Debug)]
pub struct PadOp {
    length: usize,
    pad_with: Option<usize>,
}

impl PadOp {
    /// Creates a [`PadOp`] padding with the last element.
    #[must_use]
    pub const fn new(length: usize) -> Self {
        Self {
            length,
            pad_with: None,
        }
    }

    /// Pads with the element at `index` instead of the last one.
    #[must_use]
    pub const fn pad_with(mut self, index: usize) -> Self {
        self.pad_with = Some(index);
        self
    }

    /// Applies the padding to `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when a nonzero `length` is requested
    /// over an empty dataset, or when the pad index is out of range.
    pub fn apply(&self, data: &Data) -> Result<Data> {
        let len = data.len();
        if self.length <= len {
            return data.slice(None, Some(self.length), None);
        }
        if len == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "cannot pad an empty dataset to a nonzero length",
            ));
        }
        let pad_index = self.pad_with.unwrap_or(len - 1);
        if pad_index >= len {
            let message = format!("pad index {pad_index} is out of range for length {len}");
            return Err(Error::new(ErrorKind::Config, message));
        }
        Ok(Data::new(LazyDataset::remapped_by(
            data.clone(),
            self.length,
            move |i| if i < len { i } else { pad_index },
        )))
    }
}

/// Selects explicit indices, or everything but them.
///
/// Without `negate`, the listed indices are selected in the given order.
/// With `negate`, all indices *not* listed are selected, ascending.
#[derive(Clone, Debug)]
pub struct IndexOp {
    indices: Vec<usize>,
    negate: bool,
}

impl IndexOp {
    /// Creates a new [`IndexOp`].
    #[must_use]
    pub fn new(indices: Vec<usize>, negate: bool) -> Self {
        Self { indices, negate }
    }

    /// Applies the selection to `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when a listed index is out of range.
    pub fn apply(&self, data: &Data) -> Result<Data> {
        let len = data.len();
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= len) {
            let message = format!("selected index {bad} is out of range for length {len}");
            return Err(Error::new(ErrorKind::Config, message));
        }
        let table = if self.negate {
            let mut listed = vec![false; len];
            for &i in &self.indices {
                listed[i] = true;
            }
            (0..len).filter(|&i| !listed[i]).collect()
        } else {
            self.indices.clone()
        };
        Ok(Data::new(LazyDataset::remapped(data.clone(), table)))
    }
}
