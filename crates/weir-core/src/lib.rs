#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod caches;
pub mod mappers;
pub mod ops;
pub mod parsers;
pub mod sinks;
pub mod sources;

mod dataset;
mod error;
mod grabber;
mod item;
mod progress;
mod reader;
mod sample;
#[cfg(test)]
mod testutil;
mod value;

#[doc(hidden)]
pub mod prelude;

pub use crate::dataset::{Data, Dataset, LazyDataset, ListDataset};
pub use crate::error::{BoxError, Error, ErrorKind};
pub use crate::grabber::Grabber;
pub use crate::item::Item;
pub use crate::progress::{LoopEvent, LoopTask, Progress};
pub use crate::reader::{FileReader, Reader};
pub use crate::sample::{Sample, Schema};
pub use crate::value::{Value, ValueKind};

/// Specialized [`Result`] type for dataset materialization and pipeline
/// execution.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error> = std::result::Result<T, E>;
