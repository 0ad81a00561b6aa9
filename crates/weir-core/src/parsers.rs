//! Bidirectional byte codecs and the process-wide extension registry.
//!
//! A [`Parser`] turns raw bytes into a [`Value`] and back, and declares the
//! file extensions it recognizes. The [`ParserRegistry`] maps extensions to
//! parser instances so directory sources can pick a codec per file;
//! third-party code may register additional parsers at any time, and the
//! last registration wins per extension.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

use bytes::Bytes;
use indexmap::IndexMap;

use crate::value::Value;
use crate::{Error, ErrorKind, Result};

/// Pure bidirectional codec between raw bytes and [`Value`]s.
///
/// Parsers are value objects: they carry no I/O state and are shared behind
/// [`Arc`] handles. [`extensions`](Parser::extensions) is ordered; the first
/// entry is the canonical extension used when a sink names output files.
pub trait Parser: Send + Sync {
    /// Decodes raw bytes into a value.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Decode`] error when the bytes are not a valid
    /// encoding for this format.
    fn parse(&self, bytes: &[u8]) -> Result<Value>;

    /// Encodes a value into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Encode`] error when the value cannot be
    /// represented in this format.
    fn dump(&self, value: &Value) -> Result<Bytes>;

    /// Recognized file extensions, without a leading dot, canonical first.
    fn extensions(&self) -> &'static [&'static str];
}

/// JSON codec backed by `serde_json`.
///
/// Binary payloads have no JSON form and encode as arrays of integers;
/// decoding never produces [`Value::Bytes`].
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonParser {
    _priv: (),
}

impl JsonParser {
    /// Creates a new [`JsonParser`].
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Parser for JsonParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::with_source(ErrorKind::Decode, "invalid JSON", Box::new(e)))?;
        Ok(from_json(json))
    }

    fn dump(&self, value: &Value) -> Result<Bytes> {
        let json = to_json(value)?;
        let bytes = serde_json::to_vec(&json)
            .map_err(|e| Error::with_source(ErrorKind::Encode, "invalid JSON value", Box::new(e)))?;
        Ok(Bytes::from(bytes))
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }
}

/// YAML codec backed by `serde_yaml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlParser {
    _priv: (),
}

impl YamlParser {
    /// Creates a new [`YamlParser`].
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Parser for YamlParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value> {
        let yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)
            .map_err(|e| Error::with_source(ErrorKind::Decode, "invalid YAML", Box::new(e)))?;
        from_yaml(yaml)
    }

    fn dump(&self, value: &Value) -> Result<Bytes> {
        let yaml = to_yaml(value)?;
        let text = serde_yaml::to_string(&yaml)
            .map_err(|e| Error::with_source(ErrorKind::Encode, "invalid YAML value", Box::new(e)))?;
        Ok(Bytes::from(text.into_bytes()))
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }
}

/// Plain UTF-8 text codec mapping to and from [`Value::Str`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TextParser {
    _priv: (),
}

impl TextParser {
    /// Creates a new [`TextParser`].
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Parser for TextParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::with_source(ErrorKind::Decode, "invalid UTF-8 text", Box::new(e)))?;
        Ok(Value::Str(text.to_owned()))
    }

    fn dump(&self, value: &Value) -> Result<Bytes> {
        match value.as_str() {
            Some(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            None => Err(Error::new(
                ErrorKind::Encode,
                format!("cannot encode a {} value as plain text", value.kind()),
            )),
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt"]
    }
}

/// Identity codec for opaque binary payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawParser {
    _priv: (),
}

impl RawParser {
    /// Creates a new [`RawParser`].
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Parser for RawParser {
    fn parse(&self, bytes: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(Bytes::copy_from_slice(bytes)))
    }

    fn dump(&self, value: &Value) -> Result<Bytes> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::Str(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            other => Err(Error::new(
                ErrorKind::Encode,
                format!("cannot encode a {} value as raw bytes", other.kind()),
            )),
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["bin"]
    }
}

/// A registry that maps file extensions to shared [`Parser`] instances.
///
/// The registry is cheap to clone; clones share the same underlying table.
/// Lookup is last-write-wins per extension, tolerates a leading dot, and is
/// case-insensitive.
///
/// # Examples
///
/// ```
/// use weir_core::parsers::ParserRegistry;
///
/// let registry = ParserRegistry::with_builtins();
/// assert!(registry.lookup("json").is_some());
/// assert!(registry.lookup(".YAML").is_some());
/// assert!(registry.lookup("png").is_none());
/// ```
#[must_use]
#[derive(Clone, Default)]
pub struct ParserRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<dyn Parser>>>>,
}

static GLOBAL_REGISTRY: LazyLock<ParserRegistry> = LazyLock::new(ParserRegistry::with_builtins);

impl ParserRegistry {
    /// Creates an empty [`ParserRegistry`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry populated with the built-in parsers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(JsonParser::new()));
        registry.register(Arc::new(YamlParser::new()));
        registry.register(Arc::new(TextParser::new()));
        registry.register(Arc::new(RawParser::new()));
        registry
    }

    /// Returns the process-wide registry, pre-populated with the built-ins.
    pub fn global() -> &'static ParserRegistry {
        &GLOBAL_REGISTRY
    }

    /// Registers `parser` for every extension it declares.
    ///
    /// An extension already present is remapped to the new parser.
    pub fn register(&self, parser: Arc<dyn Parser>) {
        let mut guard = self.inner.lock().expect("ParserRegistry mutex poisoned");
        for ext in parser.extensions() {
            let _ = guard.insert(normalize(ext), Arc::clone(&parser));
        }
    }

    /// Looks up the parser registered for `ext`.
    #[must_use]
    pub fn lookup(&self, ext: &str) -> Option<Arc<dyn Parser>> {
        let guard = self.inner.lock().expect("ParserRegistry mutex poisoned");
        guard.get(&normalize(ext)).cloned()
    }

    /// Returns the number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("ParserRegistry mutex poisoned");
        guard.len()
    }

    /// Returns `true` if no extensions have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry").finish_non_exhaustive()
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(x) => Value::Bool(x),
        serde_json::Value::Number(x) => match x.as_i64() {
            Some(int) => Value::Int(int),
            None => Value::Float(x.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(x) => Value::Str(x),
        serde_json::Value::Array(x) => Value::Seq(x.into_iter().map(from_json).collect()),
        serde_json::Value::Object(x) => {
            Value::Map(x.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn to_json(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(x) => serde_json::Value::Bool(*x),
        Value::Int(x) => serde_json::Value::from(*x),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                Error::new(ErrorKind::Encode, "non-finite float has no JSON form")
            })?,
        Value::Str(x) => serde_json::Value::String(x.clone()),
        Value::Bytes(x) => serde_json::Value::Array(
            x.iter().map(|b| serde_json::Value::from(i64::from(*b))).collect(),
        ),
        Value::Seq(x) => {
            serde_json::Value::Array(x.iter().map(to_json).collect::<Result<_>>()?)
        }
        Value::Map(x) => serde_json::Value::Object(
            x.iter()
                .map(|(k, v)| Ok((k.clone(), to_json(v)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

fn from_yaml(yaml: serde_yaml::Value) -> Result<Value> {
    Ok(match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(x) => Value::Bool(x),
        serde_yaml::Value::Number(x) => match x.as_i64() {
            Some(int) => Value::Int(int),
            None => Value::Float(x.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(x) => Value::Str(x),
        serde_yaml::Value::Sequence(x) => {
            Value::Seq(x.into_iter().map(from_yaml).collect::<Result<_>>()?)
        }
        serde_yaml::Value::Mapping(x) => {
            let mut map = IndexMap::with_capacity(x.len());
            for (key, val) in x {
                let key = match key {
                    serde_yaml::Value::String(k) => k,
                    other => {
                        let message = format!("unsupported non-string YAML key: {other:?}");
                        return Err(Error::new(ErrorKind::Decode, message));
                    }
                };
                let _ = map.insert(key, from_yaml(val)?);
            }
            Value::Map(map)
        }
        serde_yaml::Value::Tagged(x) => from_yaml(x.value)?,
    })
}

fn to_yaml(value: &Value) -> Result<serde_yaml::Value> {
    Ok(match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(x) => serde_yaml::Value::Bool(*x),
        Value::Int(x) => serde_yaml::Value::from(*x),
        Value::Float(x) => serde_yaml::Value::from(*x),
        Value::Str(x) => serde_yaml::Value::String(x.clone()),
        Value::Bytes(x) => serde_yaml::Value::Sequence(
            x.iter().map(|b| serde_yaml::Value::from(i64::from(*b))).collect(),
        ),
        Value::Seq(x) => {
            serde_yaml::Value::Sequence(x.iter().map(to_yaml).collect::<Result<_>>()?)
        }
        Value::Map(x) => {
            let mut map = serde_yaml::Mapping::with_capacity(x.len());
            for (key, val) in x {
                let _ = map.insert(serde_yaml::Value::String(key.clone()), to_yaml(val)?);
            }
            serde_yaml::Value::Mapping(map)
        }
    })
}
