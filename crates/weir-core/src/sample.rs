//! Ordered key→item maps, optionally bound to a schema.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::item::Item;
use crate::value::{Value, ValueKind};
use crate::{Error, ErrorKind, Result};

/// Declared key set of a typed [`Sample`], with a value kind per key.
///
/// # Examples
///
/// ```
/// use weir_core::{Schema, ValueKind};
///
/// let schema = Schema::new()
///     .field("image", ValueKind::Bytes)
///     .field("metadata", ValueKind::Map);
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    fields: IndexMap<String, ValueKind>,
}

impl Schema {
    /// Creates an empty [`Schema`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous kind declared for `name`.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        let _ = self.fields.insert(name.into(), kind);
        self
    }

    /// Returns the declared kind of `name`, if present.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.fields.get(name).copied()
    }

    /// Returns `true` if `name` is a declared field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over the declared field names, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An ordered mapping from string keys to [`Item`]s.
///
/// Samples come in two flavors: *typeless* samples carry a dynamic key set,
/// while *typed* samples fix their keys at construction against a
/// [`Schema`]. All updates are purely functional — each `with_*` method
/// returns a new sample and leaves the original untouched.
#[derive(Clone)]
pub enum Sample {
    /// Dynamic key set.
    Typeless(IndexMap<String, Item>),

    /// Key set fixed by a schema.
    Typed {
        /// The declared key set and value kinds.
        schema: Arc<Schema>,
        /// Items, in schema declaration order.
        items: IndexMap<String, Item>,
    },
}

impl Sample {
    /// Creates a typeless sample from `(key, item)` pairs.
    ///
    /// Later duplicates overwrite earlier ones, keeping the first position.
    #[must_use]
    pub fn typeless(items: impl IntoIterator<Item = (String, Item)>) -> Self {
        Self::Typeless(items.into_iter().collect())
    }

    /// Creates a typed sample whose keys must exactly match `schema`.
    ///
    /// Items are reordered into schema declaration order.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when a schema key is missing or an
    /// extra key is present.
    pub fn typed(
        schema: Arc<Schema>,
        items: impl IntoIterator<Item = (String, Item)>,
    ) -> Result<Self> {
        let mut by_key: IndexMap<String, Item> = items.into_iter().collect();
        let mut ordered = IndexMap::with_capacity(schema.len());
        for key in schema.keys() {
            let item = by_key.shift_remove(key).ok_or_else(|| {
                Error::new(ErrorKind::Config, format!("missing schema key '{key}'"))
            })?;
            let _ = ordered.insert(key.to_owned(), item);
        }
        if let Some((extra, _)) = by_key.first() {
            let message = format!("key '{extra}' is not part of the schema");
            return Err(Error::new(ErrorKind::Config, message));
        }
        Ok(Self::Typed {
            schema,
            items: ordered,
        })
    }

    fn items(&self) -> &IndexMap<String, Item> {
        match self {
            Self::Typeless(items) | Self::Typed { items, .. } => items,
        }
    }

    /// Returns the schema, for typed samples.
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Self::Typeless(_) => None,
            Self::Typed { schema, .. } => Some(schema),
        }
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns `true` if the sample holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Iterates over the keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items().keys().map(String::as_str)
    }

    /// Iterates over `(key, item)` pairs, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.items().iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the item under `key`, if present.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&Item> {
        self.items().get(key)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items().contains_key(key)
    }

    /// Materializes the value of the item under `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] for a missing key, or with the
    /// item's own read/decode error.
    pub fn value(&self, key: &str) -> Result<Value> {
        let item = self
            .item(key)
            .ok_or_else(|| Error::new(ErrorKind::Config, format!("no item under key '{key}'")))?;
        item.get()
    }

    /// Returns a new sample with `item` stored under `key`.
    #[must_use]
    pub fn with_item(&self, key: impl Into<String>, item: Item) -> Self {
        self.with_items([(key.into(), item)])
    }

    /// Returns a new sample whose key set is the union of this one and
    /// `extra`.
    ///
    /// Existing keys keep their position and take their overwrites from
    /// `extra`; genuinely new keys append in argument order. A typed sample
    /// stays typed while every key remains within its schema, and degrades
    /// to typeless otherwise.
    #[must_use]
    pub fn with_items(&self, extra: impl IntoIterator<Item = (String, Item)>) -> Self {
        let mut items = self.items().clone();
        let mut within_schema = true;
        for (key, item) in extra {
            if let Some(schema) = self.schema() {
                within_schema &= schema.contains(&key);
            }
            let _ = items.insert(key, item);
        }
        match self.schema() {
            Some(schema) if within_schema => Self::Typed {
                schema: Arc::clone(schema),
                items,
            },
            _ => Self::Typeless(items),
        }
    }

    /// Returns a new sample with the value under `key` replaced.
    ///
    /// The existing item's parser and shared-flag are kept.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when `key` is absent.
    pub fn with_value(&self, key: &str, value: Value) -> Result<Self> {
        self.with_values([(key.to_owned(), value)])
    }

    /// Returns a new sample with several values replaced at once.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when any key is absent.
    pub fn with_values(&self, values: impl IntoIterator<Item = (String, Value)>) -> Result<Self> {
        let mut updates = Vec::new();
        for (key, value) in values {
            let item = self.item(&key).ok_or_else(|| {
                Error::new(ErrorKind::Config, format!("no item under key '{key}'"))
            })?;
            updates.push((key, item.with_value(value)));
        }
        Ok(self.with_items(updates))
    }

    /// Returns a typeless sample without the listed keys.
    #[must_use]
    pub fn without(&self, keys: &[&str]) -> Self {
        let items = self
            .items()
            .iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()));
        Self::typeless(items)
    }

    /// Returns a typeless sample keeping only the listed keys.
    #[must_use]
    pub fn with_only(&self, keys: &[&str]) -> Self {
        let items = self
            .items()
            .iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()));
        Self::typeless(items)
    }

    /// Returns a typeless sample with keys renamed according to `fromto`.
    ///
    /// Keys keep their original position. With `exclude = true`, only the
    /// listed source keys survive the remap.
    #[must_use]
    pub fn remap(&self, fromto: &[(&str, &str)], exclude: bool) -> Self {
        let items = self.items().iter().filter_map(|(key, item)| {
            let renamed = fromto.iter().find(|(from, _)| from == key);
            match renamed {
                Some((_, to)) => Some(((*to).to_owned(), item.clone())),
                None if exclude => None,
                None => Some((key.clone(), item.clone())),
            }
        });
        Self::typeless(items)
    }

    /// Drops the schema, returning a typeless view of the same items.
    #[must_use]
    pub fn to_typeless(&self) -> Self {
        Self::Typeless(self.items().clone())
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("typed", &self.schema().is_some())
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{Sample, Schema};
    use crate::item::Item;
    use crate::parsers::JsonParser;
    use crate::value::{Value, ValueKind};
    use crate::ErrorKind;

    fn item(value: i64) -> Item {
        Item::memory(Value::from(value), Arc::new(JsonParser::new()))
    }

    fn sample(pairs: &[(&str, i64)]) -> Sample {
        Sample::typeless(pairs.iter().map(|(k, v)| ((*k).to_owned(), item(*v))))
    }

    #[test]
    fn with_items_union_ordering() {
        let base = sample(&[("a", 0), ("b", 1)]);
        let updated = base.with_items([("b".to_owned(), item(10)), ("c".to_owned(), item(2))]);

        assert_eq!(updated.keys().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(updated.value("b").unwrap(), Value::from(10i64));
        // The original is untouched.
        assert_eq!(base.value("b").unwrap(), Value::from(1i64));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn with_values_requires_existing_keys() {
        let base = sample(&[("a", 0)]);
        let updated = base.with_value("a", Value::from(5i64)).unwrap();
        assert_eq!(updated.value("a").unwrap(), Value::from(5i64));

        let err = base.with_value("missing", Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn without_and_with_only() {
        let base = sample(&[("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(base.without(&["b"]).keys().collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(
            base.with_only(&["c", "a"]).keys().collect::<Vec<_>>(),
            ["a", "c"]
        );
    }

    #[test]
    fn remap_keeps_positions() {
        let base = sample(&[("a", 0), ("b", 1)]);
        let renamed = base.remap(&[("a", "x")], false);
        assert_eq!(renamed.keys().collect::<Vec<_>>(), ["x", "b"]);

        let only = base.remap(&[("b", "y")], true);
        assert_eq!(only.keys().collect::<Vec<_>>(), ["y"]);
    }

    #[test]
    fn typed_samples_follow_schema_order() {
        let schema = Arc::new(
            Schema::new()
                .field("first", ValueKind::Int)
                .field("second", ValueKind::Int),
        );
        let sample = Sample::typed(
            Arc::clone(&schema),
            [("second".to_owned(), item(2)), ("first".to_owned(), item(1))],
        )
        .unwrap();
        assert_eq!(sample.keys().collect::<Vec<_>>(), ["first", "second"]);
        assert!(sample.schema().is_some());
    }

    #[test]
    fn typed_rejects_mismatched_keys() {
        let schema = Arc::new(Schema::new().field("only", ValueKind::Any));
        let missing = Sample::typed(Arc::clone(&schema), []);
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::Config);

        let extra = Sample::typed(
            schema,
            [("only".to_owned(), item(1)), ("more".to_owned(), item(2))],
        );
        assert_eq!(extra.unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn typed_degrades_on_foreign_keys() {
        let schema = Arc::new(Schema::new().field("only", ValueKind::Any));
        let typed = Sample::typed(schema, [("only".to_owned(), item(1))]).unwrap();

        let still_typed = typed.with_item("only", item(3));
        assert!(still_typed.schema().is_some());

        let degraded = typed.with_item("new", item(4));
        assert!(degraded.schema().is_none());
        assert_eq!(degraded.keys().collect::<Vec<_>>(), ["only", "new"]);
    }
}
