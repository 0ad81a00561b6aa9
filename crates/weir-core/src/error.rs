use std::convert::Infallible;
use std::{fmt, io};

/// Type alias for a type-erased [`Error`] type.
///
/// [`Error`]: std::error::Error
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kind representing the category of error that occurred.
///
/// This enum categorizes errors by their source and nature, making it easier
/// to handle different error scenarios programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dataset access beyond its length.
    Index,

    /// Parser failure while decoding bytes into a value.
    Decode,

    /// Parser failure while encoding a value into bytes.
    Encode,

    /// Reader or file-system failure while loading data.
    Read,

    /// Storage failure while persisting data.
    Write,

    /// An expected directory is missing or not a directory.
    NotADirectory,

    /// A sink refused to overwrite data under the configured policy.
    Policy,

    /// Mis-specified operator, option, or registry entry.
    Config,

    /// Malformed workflow graph (duplicate names, cycles, bad sockets).
    Graph,

    /// Failure raised inside a worker during parallel iteration.
    Worker,

    /// User cancellation during a run.
    Cancelled,
}

impl ErrorKind {
    /// Returns a string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Decode => "decode",
            Self::Encode => "encode",
            Self::Read => "read",
            Self::Write => "write",
            Self::NotADirectory => "not a directory",
            Self::Policy => "policy",
            Self::Config => "config",
            Self::Graph => "graph",
            Self::Worker => "worker",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecoverable failure during dataset materialization or pipeline
/// execution.
///
/// `Error` provides structured error information including an [`ErrorKind`]
/// for categorization and an optional source error for error chains.
///
/// # Examples
///
/// ```
/// use weir_core::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::Config, "batch size must be positive");
/// assert_eq!(err.kind(), ErrorKind::Config);
/// ```
#[must_use]
#[derive(thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new [`Error`] with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new [`Error`] with the given kind, message, and source error.
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: BoxError) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates an [`ErrorKind::Index`] error for an out-of-range access.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        let message = format!("index {index} is out of range for a dataset of length {len}");
        Self::new(ErrorKind::Index, message)
    }

    /// Returns the error kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("kind", &self.kind)
            .field("message", &self.message);

        if let Some(ref source) = self.source {
            debug.field("source", source);
        }

        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<Infallible> for Error {
    #[inline]
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::with_source(ErrorKind::Read, "I/O error", Box::new(error))
    }
}
