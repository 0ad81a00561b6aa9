//! Lazy byte producers backing stored items.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{Error, ErrorKind, Result};

/// Opaque byte producer.
///
/// A reader is referentially transparent for the lifetime of the dataset
/// that owns it: repeated [`read`](Reader::read) calls return the same
/// bytes. [`path`](Reader::path) exposes the backing file, when there is
/// one, so sinks can link or copy the payload instead of re-encoding it.
pub trait Reader: Send + Sync {
    /// Retrieves the raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Read`] error when the underlying store fails.
    fn read(&self) -> Result<Bytes>;

    /// Returns the path of the backing file, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Canonical [`Reader`] over a local file at a known path.
#[derive(Clone, Debug)]
pub struct FileReader {
    path: PathBuf,
}

impl FileReader {
    /// Creates a new [`FileReader`] for the file at `path`.
    ///
    /// The file is not opened until the first [`read`](Reader::read).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reader for FileReader {
    fn read(&self) -> Result<Bytes> {
        let bytes = fs::read(&self.path).map_err(|e| {
            let message = format!("failed to read {}", self.path.display());
            Error::with_source(ErrorKind::Read, message, Box::new(e))
        })?;
        Ok(Bytes::from(bytes))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

impl fmt::Debug for dyn Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}
