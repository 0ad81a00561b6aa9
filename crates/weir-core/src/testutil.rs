//! Shared fixtures for unit tests.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::dataset::{Data, LazyDataset};
use crate::item::Item;
use crate::parsers::{JsonParser, Parser};
use crate::sample::Sample;
use crate::value::Value;

/// Lazy dataset of `len` samples, each carrying its own index under the
/// `number` key.
pub(crate) fn numbered(len: usize) -> Data {
    let parser: Arc<dyn Parser> = Arc::new(JsonParser::new());
    Data::new(LazyDataset::new(len, move |i| {
        let item = Item::memory(Value::from(i as i64), Arc::clone(&parser));
        Ok(Sample::typeless([("number".to_string(), item)]))
    }))
}

/// Collects every `number` value of `data`.
pub(crate) fn numbers_of(data: &Data) -> Vec<i64> {
    data.iter()
        .map(|s| s.unwrap().value("number").unwrap().as_i64().unwrap())
        .collect()
}

/// The 26-sample letter dataset: sample `i` has `metadata.letter = 'a' + i`
/// and `metadata.color`, with exactly one orange sample at letter `e`.
pub(crate) fn letters() -> Data {
    let parser: Arc<dyn Parser> = Arc::new(JsonParser::new());
    Data::new(LazyDataset::new(26, move |i| {
        let letter = char::from(b'a' + i as u8);
        let color = match i {
            4 => "orange",
            _ => ["red", "green", "blue", "yellow"][i % 4],
        };
        let metadata: IndexMap<String, Value> = [
            ("letter".to_string(), Value::from(letter.to_string())),
            ("color".to_string(), Value::from(color)),
        ]
        .into_iter()
        .collect();
        let item = Item::memory(Value::from(metadata), Arc::clone(&parser));
        Ok(Sample::typeless([("metadata".to_string(), item)]))
    }))
}

/// Extracts `metadata.letter` from every sample of `data`.
pub(crate) fn letters_of(data: &Data) -> Vec<String> {
    data.iter()
        .map(|s| {
            let metadata = s.unwrap().value("metadata").unwrap();
            metadata.get("letter").unwrap().as_str().unwrap().to_owned()
        })
        .collect()
}
