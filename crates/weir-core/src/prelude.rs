//! A convenience module that re-exports commonly used items.
//!
//! This module is intended to be glob-imported for convenience:
//!
//! ```
//! use weir_core::prelude::*;
//! ```

pub use crate::caches::{
    Cache, CacheId, CachePolicy, CacheRegistry, FifoCache, LifoCache, LruCache, MemoCache,
    MruCache, RrCache,
};
pub use crate::mappers::{
    CacheMapper, ComposeMapper, ConvertMapper, DuplicateItemMapper, FilterKeysMapper,
    KeyFormatMapper, Mapper, RenameMapper, ShareMapper,
};
pub use crate::ops::{
    BatchOp, CacheOp, CatOp, ChunkOp, CycleOp, FilterOp, GroupByOp, IdentityOp, IndexOp,
    ItemCacheOp, MapOp, MemorizeEverythingOp, PadOp, RepeatOp, ReverseOp, ShuffleOp, SliceOp,
    SortOp, SplitOp, SplitSize, ZipOp,
};
pub use crate::parsers::{JsonParser, Parser, ParserRegistry, RawParser, TextParser, YamlParser};
pub use crate::sinks::{CopyPolicy, OverwritePolicy, Sink, UnderfolderSink, write_item_to_file};
pub use crate::sources::{Source, UnderfolderSource};
pub use crate::{
    BoxError, Data, Dataset, Error, ErrorKind, FileReader, Grabber, Item, LazyDataset,
    ListDataset, LoopEvent, LoopTask, Progress, Reader, Result, Sample, Schema, Value, ValueKind,
};
