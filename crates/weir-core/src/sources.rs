//! Dataset producers tied to external storage.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dataset::{Data, LazyDataset};
use crate::item::Item;
use crate::parsers::{Parser, ParserRegistry};
use crate::progress::Progress;
use crate::reader::FileReader;
use crate::sample::{Sample, Schema};
use crate::{Error, ErrorKind, Result};

/// Tracing target for source-related events.
const TARGET: &str = "weir_core::sources";

/// A producer of datasets from external storage.
pub trait Source: Send {
    /// Produces the dataset.
    ///
    /// # Errors
    ///
    /// Propagates storage and configuration failures.
    fn produce(&mut self) -> Result<Data>;

    /// Installs a progress handle for long-running production loops.
    ///
    /// The default implementation ignores it; lazy sources have no loop to
    /// report.
    fn set_progress(&mut self, progress: Progress) {
        let _ = progress;
    }
}

/// One scanned file belonging to a sample.
struct ScannedItem {
    key: String,
    path: PathBuf,
    parser: Arc<dyn Parser>,
}

/// Reads a dataset laid out as an *underfolder*.
///
/// The root directory holds a `data/` subdirectory with one file per item,
/// named `{zero-padded id}_{key}.{ext}`, plus optional root-level
/// `{key}.{ext}` files whose items are shared across every sample. Parsers
/// are resolved from the registry by extension; files with unknown
/// extensions or malformed names are skipped with a warning.
///
/// Production is lazy: the directory is scanned once, but files are read
/// and decoded only when a sample is materialized.
#[must_use]
pub struct UnderfolderSource {
    root: PathBuf,
    schema: Option<Arc<Schema>>,
    registry: ParserRegistry,
}

impl UnderfolderSource {
    /// Creates a source reading from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            schema: None,
            registry: ParserRegistry::global().clone(),
        }
    }

    /// Produces typed samples bound to `schema`.
    ///
    /// Materialization fails when a schema key has no backing file; file
    /// keys outside the schema are dropped.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Resolves parsers from `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the `data/` subdirectory of an underfolder root.
    #[must_use]
    pub fn data_path(root: &Path) -> PathBuf {
        root.join("data")
    }

    fn sorted_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let entries = fs::read_dir(dir).map_err(|e| {
            let message = format!("{} is not a readable directory", dir.display());
            Error::with_source(ErrorKind::NotADirectory, message, Box::new(e))
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Splits a file name into its key and extension, resolving the parser.
    fn scan_keyed(&self, name: &str, path: PathBuf) -> Option<ScannedItem> {
        let (key, rest) = name.split_once('.')?;
        let ext = rest.rsplit('.').next().unwrap_or(rest);
        if key.is_empty() {
            return None;
        }
        let Some(parser) = self.registry.lookup(ext) else {
            tracing::warn!(
                target: TARGET,
                file = %path.display(),
                ext,
                "no parser registered for extension, skipping file",
            );
            return None;
        };
        Some(ScannedItem {
            key: key.to_owned(),
            path,
            parser,
        })
    }

    fn scan_root(&self) -> Result<Vec<ScannedItem>> {
        let mut shared = Vec::new();
        for (name, path) in Self::sorted_files(&self.root)? {
            if let Some(scanned) = self.scan_keyed(&name, path) {
                shared.push(scanned);
            }
        }
        Ok(shared)
    }

    fn scan_data(&self) -> Result<Vec<Vec<ScannedItem>>> {
        let data_dir = Self::data_path(&self.root);
        let mut samples: Vec<Vec<ScannedItem>> = Vec::new();
        for (name, path) in Self::sorted_files(&data_dir)? {
            let Some((id, rest)) = name.split_once('_') else {
                tracing::warn!(
                    target: TARGET,
                    file = %path.display(),
                    "file name does not match '<id>_<key>.<ext>', skipping",
                );
                continue;
            };
            let Ok(id) = id.parse::<usize>() else {
                tracing::warn!(
                    target: TARGET,
                    file = %path.display(),
                    "file name does not start with an integer id, skipping",
                );
                continue;
            };
            let Some(scanned) = self.scan_keyed(rest, path) else {
                continue;
            };
            if samples.len() <= id {
                samples.resize_with(id + 1, Vec::new);
            }
            samples[id].push(scanned);
        }
        Ok(samples)
    }
}

fn stored_item(scanned: &ScannedItem, shared: bool) -> (String, Item) {
    let reader = Arc::new(FileReader::new(scanned.path.clone()));
    let item = Item::stored(reader, Arc::clone(&scanned.parser)).with_sharedness(shared);
    (scanned.key.clone(), item)
}

impl Source for UnderfolderSource {
    fn produce(&mut self) -> Result<Data> {
        let shared = Arc::new(self.scan_root()?);
        let samples = Arc::new(self.scan_data()?);
        let schema = self.schema.clone();
        let len = samples.len();

        Ok(Data::new(LazyDataset::new(len, move |index| {
            // Sample-local items first, shared root items appended after;
            // both in file-name order, locals winning key collisions.
            let mut items: Vec<(String, Item)> = samples[index]
                .iter()
                .map(|scanned| stored_item(scanned, false))
                .collect();
            for scanned in shared.iter() {
                if !items.iter().any(|(key, _)| *key == scanned.key) {
                    items.push(stored_item(scanned, true));
                }
            }
            match &schema {
                None => Ok(Sample::typeless(items)),
                Some(schema) => {
                    let restricted = items.into_iter().filter(|(k, _)| schema.contains(k));
                    Sample::typed(Arc::clone(schema), restricted)
                }
            }
        })))
    }
}

impl fmt::Debug for UnderfolderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnderfolderSource")
            .field("root", &self.root)
            .field("typed", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tracing_test::traced_test;

    use super::{Source, UnderfolderSource};
    use crate::sample::Schema;
    use crate::value::{Value, ValueKind};
    use crate::ErrorKind;

    fn write_fixture(root: &std::path::Path) {
        let data = root.join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(root.join("config.json"), br#"{"version": 1}"#).unwrap();
        for (i, letter) in ["a", "b", "c"].iter().enumerate() {
            let name = format!("{i}_metadata.json");
            let body = format!(r#"{{"letter": "{letter}"}}"#);
            fs::write(data.join(name), body).unwrap();
            fs::write(data.join(format!("{i}_note.txt")), letter).unwrap();
        }
    }

    #[test]
    fn reads_samples_and_shared_items() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let data = UnderfolderSource::new(dir.path()).produce().unwrap();
        assert_eq!(data.len(), 3);

        let sample = data.get(1).unwrap();
        assert_eq!(
            sample.keys().collect::<Vec<_>>(),
            ["metadata", "note", "config"]
        );
        assert_eq!(sample.value("note").unwrap(), Value::from("b"));
        assert!(sample.item("config").unwrap().is_shared());
        assert!(!sample.item("metadata").unwrap().is_shared());
        assert_eq!(
            sample.value("config").unwrap().get("version").cloned(),
            Some(Value::from(1i64))
        );
    }

    #[test]
    fn missing_directories_fail() {
        let err = UnderfolderSource::new("/weir/does/not/exist")
            .produce()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);

        // A root without a data/ subdirectory fails the same way.
        let dir = tempfile::tempdir().unwrap();
        let err = UnderfolderSource::new(dir.path()).produce().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }

    #[traced_test]
    #[test]
    fn unknown_extensions_are_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(dir.path().join("data/0_image.exr"), b"???").unwrap();

        let data = UnderfolderSource::new(dir.path()).produce().unwrap();
        let sample = data.get(0).unwrap();
        assert!(!sample.contains("image"));
        assert!(logs_contain("no parser registered for extension"));
    }

    #[test]
    fn schema_restricts_and_orders_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let schema = Schema::new()
            .field("note", ValueKind::Str)
            .field("metadata", ValueKind::Map);
        let data = UnderfolderSource::new(dir.path())
            .with_schema(schema)
            .produce()
            .unwrap();
        let sample = data.get(0).unwrap();
        assert_eq!(sample.keys().collect::<Vec<_>>(), ["note", "metadata"]);
        assert!(sample.schema().is_some());
    }

    #[test]
    fn schema_missing_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let schema = Schema::new().field("absent", ValueKind::Any);
        let data = UnderfolderSource::new(dir.path())
            .with_schema(schema)
            .produce()
            .unwrap();
        assert_eq!(data.get(0).unwrap_err().kind(), ErrorKind::Config);
    }
}
