//! Dynamic payload values produced and consumed by [`Parser`]s.
//!
//! [`Parser`]: crate::parsers::Parser

use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;

/// The dynamic value every parser targets.
///
/// Items decode their raw bytes into a `Value`, and sinks encode a `Value`
/// back into bytes. The variants deliberately mirror what the common
/// metadata formats (JSON, YAML) can express, with an extra [`Bytes`]
/// variant for opaque binary payloads.
///
/// # Examples
///
/// ```
/// use weir_core::Value;
///
/// let value = Value::from(vec![Value::from(1i64), Value::from(2i64)]);
/// assert_eq!(value.as_seq().map(<[Value]>::len), Some(2));
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Absent or null value.
    #[default]
    Null,

    /// Boolean scalar.
    Bool(bool),

    /// Signed integer scalar.
    Int(i64),

    /// Floating point scalar.
    Float(f64),

    /// UTF-8 string.
    Str(String),

    /// Opaque binary payload.
    Bytes(Bytes),

    /// Ordered sequence of values.
    Seq(Vec<Value>),

    /// Ordered string-keyed mapping.
    Map(IndexMap<String, Value>),
}

/// Schema-side tag mirroring the [`Value`] variants, plus a wildcard
/// [`ValueKind::Any`] for fields with no declared type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum ValueKind {
    #[display("any")]
    Any,
    #[display("null")]
    Null,
    #[display("bool")]
    Bool,
    #[display("int")]
    Int,
    #[display("float")]
    Float,
    #[display("str")]
    Str,
    #[display("bytes")]
    Bytes,
    #[display("seq")]
    Seq,
    #[display("map")]
    Map,
}

impl Value {
    /// Returns the kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Seq(_) => ValueKind::Seq,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Returns `true` if the value is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean scalar, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the integer scalar, if this is one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(x) => Some(*x as f64),
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(x) => Some(x.as_str()),
            _ => None,
        }
    }

    /// Returns the binary payload, if this is one.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(x) => Some(x),
            _ => None,
        }
    }

    /// Returns the sequence elements, if this is a sequence.
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(x) => Some(x.as_slice()),
            _ => None,
        }
    }

    /// Returns the mapping, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(x) => Some(x),
            _ => None,
        }
    }

    /// Looks up `key` in a mapping value.
    ///
    /// Returns `None` for non-mapping values and missing keys alike.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl ValueKind {
    /// Returns `true` if `value` belongs to this kind.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        self == Self::Any || self == value.kind()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(x) => write!(f, "{x}"),
            Self::Int(x) => write!(f, "{x}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(x) => f.write_str(x),
            Self::Bytes(x) => write!(f, "<{} bytes>", x.len()),
            Self::Seq(x) => write!(f, "<seq of {}>", x.len()),
            Self::Map(x) => write!(f, "<map of {}>", x.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Seq(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().collect())
    }
}
