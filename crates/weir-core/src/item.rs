//! Lazy handles to parsed values.
//!
//! An [`Item`] pairs a payload source with the [`Parser`] that decodes it
//! and a shared-flag. Items are functional: every updater returns a new item
//! and never mutates the original, so samples can be rebuilt freely while
//! clones keep observing the old state.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::parsers::Parser;
use crate::reader::Reader;
use crate::value::Value;
use crate::Result;

/// Lazy handle to a parsed value with a parser and a shared-flag.
///
/// Three variants exist:
/// - *memory* items hold an already-decoded [`Value`];
/// - *stored* items hold a [`Reader`] and re-read + re-parse on every
///   [`get`](Item::get);
/// - *cached* items wrap another item and memoize the first successful
///   `get` until dropped.
///
/// `shared = true` signals that the item's value is identical across all
/// samples of its parent dataset; storage layers may then write it once at
/// the dataset root instead of per-sample. The flag never affects `get`.
#[derive(Clone)]
pub struct Item {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Memory {
        value: Value,
        parser: Arc<dyn Parser>,
        shared: bool,
    },
    Stored {
        reader: Arc<dyn Reader>,
        parser: Arc<dyn Parser>,
        shared: bool,
    },
    Cached {
        source: Box<Item>,
        cell: Arc<Mutex<Option<Value>>>,
    },
}

impl Item {
    /// Creates an item holding an in-memory value.
    pub fn memory(value: Value, parser: Arc<dyn Parser>) -> Self {
        let repr = Repr::Memory {
            value,
            parser,
            shared: false,
        };
        Self { repr }
    }

    /// Creates an item that reads and parses its payload on access.
    pub fn stored(reader: Arc<dyn Reader>, parser: Arc<dyn Parser>) -> Self {
        let repr = Repr::Stored {
            reader,
            parser,
            shared: false,
        };
        Self { repr }
    }

    /// Wraps this item in a memoizing layer.
    ///
    /// The wrapped source is consulted at most once; the memo lives until
    /// every clone of the returned item is dropped. Wrapping an already
    /// cached item returns it unchanged.
    pub fn into_cached(self) -> Self {
        if matches!(self.repr, Repr::Cached { .. }) {
            return self;
        }
        let repr = Repr::Cached {
            source: Box::new(self),
            cell: Arc::new(Mutex::new(None)),
        };
        Self { repr }
    }

    /// Retrieves the decoded value.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Read`] when the underlying reader fails and
    /// [`ErrorKind::Decode`] when the parser rejects the bytes.
    ///
    /// [`ErrorKind::Read`]: crate::ErrorKind::Read
    /// [`ErrorKind::Decode`]: crate::ErrorKind::Decode
    pub fn get(&self) -> Result<Value> {
        match &self.repr {
            Repr::Memory { value, .. } => Ok(value.clone()),
            Repr::Stored { reader, parser, .. } => parser.parse(&reader.read()?),
            Repr::Cached { source, cell } => {
                let mut guard = cell.lock().expect("item memo mutex poisoned");
                match &*guard {
                    Some(value) => Ok(value.clone()),
                    None => {
                        let value = source.get()?;
                        *guard = Some(value.clone());
                        Ok(value)
                    }
                }
            }
        }
    }

    /// Returns the parser associated with this item.
    #[must_use]
    pub fn parser(&self) -> Arc<dyn Parser> {
        match &self.repr {
            Repr::Memory { parser, .. } | Repr::Stored { parser, .. } => Arc::clone(parser),
            Repr::Cached { source, .. } => source.parser(),
        }
    }

    /// Returns `true` if the item's value is shared across its dataset.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        match &self.repr {
            Repr::Memory { shared, .. } | Repr::Stored { shared, .. } => *shared,
            Repr::Cached { source, .. } => source.is_shared(),
        }
    }

    /// Returns the path of the backing file, when the payload is stored.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        match &self.repr {
            Repr::Memory { .. } => None,
            Repr::Stored { reader, .. } => reader.path(),
            Repr::Cached { source, .. } => source.source_path(),
        }
    }

    /// Returns the raw payload bytes, when the payload is stored.
    ///
    /// Memory items have no byte form until re-encoded by their parser.
    pub fn raw_bytes(&self) -> Option<Result<Bytes>> {
        match &self.repr {
            Repr::Memory { .. } => None,
            Repr::Stored { reader, .. } => Some(reader.read()),
            Repr::Cached { source, .. } => source.raw_bytes(),
        }
    }

    /// Returns a new memory item holding `value`, keeping the parser and
    /// the shared-flag of this one.
    pub fn with_value(&self, value: Value) -> Self {
        let repr = Repr::Memory {
            value,
            parser: self.parser(),
            shared: self.is_shared(),
        };
        Self { repr }
    }

    /// Returns a new item identical to this one but decoded by `parser`.
    ///
    /// A cached wrapper is rebuilt with a fresh memo, since the parser
    /// change invalidates any decoded value.
    pub fn with_parser(&self, parser: Arc<dyn Parser>) -> Self {
        let repr = match &self.repr {
            Repr::Memory { value, shared, .. } => Repr::Memory {
                value: value.clone(),
                parser,
                shared: *shared,
            },
            Repr::Stored { reader, shared, .. } => Repr::Stored {
                reader: Arc::clone(reader),
                parser,
                shared: *shared,
            },
            Repr::Cached { source, .. } => {
                return source.with_parser(parser).into_cached();
            }
        };
        Self { repr }
    }

    /// Returns a new item identical to this one with the given shared-flag.
    ///
    /// A cached wrapper keeps its memo: sharedness does not affect the
    /// decoded value.
    pub fn with_sharedness(&self, shared: bool) -> Self {
        let repr = match &self.repr {
            Repr::Memory { value, parser, .. } => Repr::Memory {
                value: value.clone(),
                parser: Arc::clone(parser),
                shared,
            },
            Repr::Stored { reader, parser, .. } => Repr::Stored {
                reader: Arc::clone(reader),
                parser: Arc::clone(parser),
                shared,
            },
            Repr::Cached { source, cell } => Repr::Cached {
                source: Box::new(source.with_sharedness(shared)),
                cell: Arc::clone(cell),
            },
        };
        Self { repr }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match &self.repr {
            Repr::Memory { .. } => "memory",
            Repr::Stored { .. } => "stored",
            Repr::Cached { .. } => "cached",
        };
        f.debug_struct("Item")
            .field("variant", &variant)
            .field("shared", &self.is_shared())
            .finish_non_exhaustive()
    }
}
