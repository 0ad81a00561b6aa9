//! Dataset consumers persisting samples on external storage.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::Data;
use crate::grabber::Grabber;
use crate::item::Item;
use crate::progress::Progress;
use crate::sample::Sample;
use crate::{Error, ErrorKind, Result};

/// A consumer of datasets tied to external storage.
pub trait Sink: Send {
    /// Persists `data`.
    ///
    /// # Errors
    ///
    /// Propagates storage and policy failures.
    fn consume(&mut self, data: &Data) -> Result<()>;

    /// Installs a progress handle for the write loop.
    fn set_progress(&mut self, progress: Progress) {
        let _ = progress;
    }
}

/// How to handle destinations that already hold data.
///
/// Variants are ordered strict to loose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Fail on any collision, even an empty folder.
    #[default]
    Forbid,

    /// Allow writing only into an empty folder.
    AllowIfEmpty,

    /// Allow adding new files, never touching existing ones.
    AllowNewFiles,

    /// Overwrite individual conflicting files.
    OverwriteFiles,

    /// Delete and recreate the whole folder.
    Overwrite,
}

/// How a stored payload travels into the output folder.
///
/// Policies fall back deterministically when the file system refuses them:
/// hard-link → symlink → replicate → rewrite, and replicate → rewrite.
/// Rewriting re-encodes the decoded value through the item's parser and
/// surfaces its own failure. Memory items always rewrite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPolicy {
    /// Hard-link the source file.
    #[default]
    HardLink,

    /// Symlink the source file.
    SymbolicLink,

    /// Byte-for-byte copy.
    Replicate,

    /// Decode and re-encode through the parser.
    Rewrite,
}

/// Writes `item` to `path` honoring the copy policy and its fallbacks.
///
/// # Errors
///
/// Fails with [`ErrorKind::Write`] (or the parser's encode error) when the
/// final fallback cannot complete.
pub fn write_item_to_file(item: &Item, path: &Path, policy: CopyPolicy) -> Result<()> {
    match (policy, item.source_path()) {
        (CopyPolicy::HardLink, Some(source)) => fs::hard_link(source, path)
            .or_else(|_| symlink(source, path))
            .or_else(|_| replicate(item, path)),
        (CopyPolicy::SymbolicLink, Some(source)) => {
            symlink(source, path).or_else(|_| replicate(item, path))
        }
        (CopyPolicy::HardLink | CopyPolicy::SymbolicLink | CopyPolicy::Replicate, _) => {
            replicate(item, path)
        }
        (CopyPolicy::Rewrite, _) => rewrite(item, path),
    }
}

#[cfg(unix)]
fn raw_symlink(source: &Path, path: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, path)
}

#[cfg(windows)]
fn raw_symlink(source: &Path, path: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, path)
}

fn symlink(source: &Path, path: &Path) -> std::io::Result<()> {
    let absolute = source.canonicalize()?;
    raw_symlink(&absolute, path)
}

fn replicate(item: &Item, path: &Path) -> Result<()> {
    if let Some(source) = item.source_path() {
        if fs::copy(source, path).is_ok() {
            return Ok(());
        }
    } else if let Some(Ok(bytes)) = item.raw_bytes() {
        // Byte-replicate a pathless stored payload without re-encoding it.
        return fs::write(path, bytes).map_err(|e| {
            let message = format!("failed to write {}", path.display());
            Error::with_source(ErrorKind::Write, message, Box::new(e))
        });
    }
    rewrite(item, path)
}

fn rewrite(item: &Item, path: &Path) -> Result<()> {
    let bytes = item.parser().dump(&item.get()?)?;
    fs::write(path, bytes).map_err(|e| {
        let message = format!("failed to write {}", path.display());
        Error::with_source(ErrorKind::Write, message, Box::new(e))
    })
}

/// Writes a dataset as an *underfolder*.
///
/// Shared items (taken from sample 0) land once at the root as
/// `{key}.{ext}`; every other item lands under `data/` as
/// `{zero-padded id}_{key}.{ext}`, with the padding width covering the
/// sample count. An empty dataset creates nothing.
#[must_use]
pub struct UnderfolderSink {
    folder: PathBuf,
    grabber: Grabber,
    overwrite_policy: OverwritePolicy,
    copy_policy: CopyPolicy,
    progress: Progress,
}

impl UnderfolderSink {
    /// Creates a sink writing into `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            grabber: Grabber::default(),
            overwrite_policy: OverwritePolicy::default(),
            copy_policy: CopyPolicy::default(),
            progress: Progress::default(),
        }
    }

    /// Writes samples through `grabber`.
    pub fn with_grabber(mut self, grabber: Grabber) -> Self {
        self.grabber = grabber;
        self
    }

    /// Sets the overwrite policy.
    pub fn with_overwrite_policy(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite_policy = policy;
        self
    }

    /// Sets the copy policy for stored payloads.
    pub fn with_copy_policy(mut self, policy: CopyPolicy) -> Self {
        self.copy_policy = policy;
        self
    }

    fn prepare_folder(&self) -> Result<()> {
        if self.folder.exists() {
            match self.overwrite_policy {
                OverwritePolicy::Forbid => {
                    let message = format!(
                        "{} already exists and the overwrite policy forbids it",
                        self.folder.display()
                    );
                    return Err(Error::new(ErrorKind::Policy, message));
                }
                OverwritePolicy::Overwrite => {
                    let _ = fs::remove_dir_all(&self.folder);
                }
                _ => {}
            }
        }
        fs::create_dir_all(&self.folder)?;

        if self.overwrite_policy == OverwritePolicy::AllowIfEmpty {
            let mut entries = fs::read_dir(&self.folder)?;
            if entries.next().is_some() {
                let message = format!(
                    "{} is not empty and the overwrite policy requires it",
                    self.folder.display()
                );
                return Err(Error::new(ErrorKind::Policy, message));
            }
        }
        Ok(())
    }

    fn clear_collision(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        if self.overwrite_policy != OverwritePolicy::OverwriteFiles {
            let message = format!(
                "{} already exists and the overwrite policy forbids replacing files",
                path.display()
            );
            return Err(Error::new(ErrorKind::Policy, message));
        }
        fs::remove_file(path).map_err(|e| {
            let message = format!("failed to remove {}", path.display());
            Error::with_source(ErrorKind::Write, message, Box::new(e))
        })
    }

    fn write_one(&self, item: &Item, path: &Path) -> Result<()> {
        self.clear_collision(path)?;
        write_item_to_file(item, path, self.copy_policy)
    }

    fn file_name(item: &Item, key: &str) -> String {
        let ext = item
            .parser()
            .extensions()
            .first()
            .copied()
            .unwrap_or("bin");
        format!("{key}.{ext}")
    }

    fn write_sample(
        &self,
        data_dir: &Path,
        zfill: usize,
        shared_keys: &[String],
        index: usize,
        sample: &Sample,
    ) -> Result<()> {
        for (key, item) in sample.iter() {
            if shared_keys.iter().any(|shared| shared == key) {
                continue;
            }
            let name = format!("{index:0zfill$}_{}", Self::file_name(item, key));
            self.write_one(item, &data_dir.join(name))?;
        }
        Ok(())
    }
}

impl Sink for UnderfolderSink {
    fn consume(&mut self, data: &Data) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.prepare_folder()?;

        let data_dir = self.folder.join("data");
        fs::create_dir_all(&data_dir)?;
        let zfill = (data.len() - 1).to_string().len();

        // Shared items are written once, from the first sample.
        let first = data.get(0)?;
        let mut shared_keys = Vec::new();
        for (key, item) in first.iter() {
            if item.is_shared() {
                let path = self.folder.join(Self::file_name(item, key));
                self.write_one(item, &path)?;
                shared_keys.push(key.to_owned());
            }
        }

        let task = self.progress.task("write", data.len());
        self.grabber.run(
            data.len(),
            |index| {
                let sample = data.get(index)?;
                self.write_sample(&data_dir, zfill, &shared_keys, index, &sample)
            },
            |index, ()| {
                task.step(index);
                Ok(())
            },
        )?;
        task.finish();
        Ok(())
    }

    fn set_progress(&mut self, progress: Progress) {
        self.progress = progress;
    }
}

impl fmt::Debug for UnderfolderSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnderfolderSink")
            .field("folder", &self.folder)
            .field("overwrite_policy", &self.overwrite_policy)
            .field("copy_policy", &self.copy_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;

    use super::{CopyPolicy, OverwritePolicy, Sink, UnderfolderSink, write_item_to_file};
    use crate::dataset::Data;
    use crate::item::Item;
    use crate::parsers::{JsonParser, Parser, TextParser};
    use crate::reader::FileReader;
    use crate::sample::Sample;
    use crate::value::Value;
    use crate::ErrorKind;

    fn dataset(len: usize) -> Data {
        let parser: Arc<dyn Parser> = Arc::new(TextParser::new());
        let samples = (0..len)
            .map(|i| {
                let item = Item::memory(Value::from(format!("note {i}")), Arc::clone(&parser));
                Sample::typeless([("note".to_string(), item)])
            })
            .collect();
        Data::from_samples(samples)
    }

    #[test]
    fn writes_zero_padded_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = UnderfolderSink::new(&out);
        sink.consume(&dataset(11)).unwrap();

        assert!(out.join("data/00_note.txt").is_file());
        assert!(out.join("data/10_note.txt").is_file());
        assert_eq!(fs::read_to_string(out.join("data/03_note.txt")).unwrap(), "note 3");
    }

    #[test]
    fn empty_dataset_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = UnderfolderSink::new(&out);
        sink.consume(&dataset(0)).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn forbid_refuses_existing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = UnderfolderSink::new(dir.path());
        let err = sink.consume(&dataset(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn allow_if_empty_accepts_empty_rejects_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            UnderfolderSink::new(dir.path()).with_overwrite_policy(OverwritePolicy::AllowIfEmpty);
        sink.consume(&dataset(1)).unwrap();

        let mut again =
            UnderfolderSink::new(dir.path()).with_overwrite_policy(OverwritePolicy::AllowIfEmpty);
        let err = again.consume(&dataset(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn allow_new_files_rejects_collisions_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            UnderfolderSink::new(dir.path()).with_overwrite_policy(OverwritePolicy::AllowNewFiles);
        sink.consume(&dataset(2)).unwrap();

        // Writing a disjoint dataset into the same folder is fine: 2 and 3
        // are new ids.
        let parser: Arc<dyn Parser> = Arc::new(TextParser::new());
        let extra = Data::from_samples(
            (0..4)
                .map(|i| {
                    let key = if i < 2 { "other" } else { "note" };
                    let item = Item::memory(Value::from("x"), Arc::clone(&parser));
                    Sample::typeless([(key.to_string(), item)])
                })
                .collect(),
        );
        let mut sink =
            UnderfolderSink::new(dir.path()).with_overwrite_policy(OverwritePolicy::AllowNewFiles);
        sink.consume(&extra).unwrap();

        // Re-writing colliding ids fails.
        let mut sink =
            UnderfolderSink::new(dir.path()).with_overwrite_policy(OverwritePolicy::AllowNewFiles);
        let err = sink.consume(&dataset(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn overwrite_files_replaces_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = UnderfolderSink::new(dir.path())
            .with_overwrite_policy(OverwritePolicy::OverwriteFiles);
        sink.consume(&dataset(2)).unwrap();
        sink.consume(&dataset(2)).unwrap();
        assert!(dir.path().join("data/0_note.txt").is_file());
    }

    #[test]
    fn overwrite_recreates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink =
            UnderfolderSink::new(&out).with_overwrite_policy(OverwritePolicy::Overwrite);
        sink.consume(&dataset(11)).unwrap();
        sink.consume(&dataset(1)).unwrap();
        // The second write wiped the first one's files.
        assert!(out.join("data/0_note.txt").is_file());
        assert!(!out.join("data/00_note.txt").exists());
    }

    #[test]
    fn shared_items_land_at_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let parser: Arc<dyn Parser> = Arc::new(JsonParser::new());
        let config = Item::memory(Value::from(1i64), Arc::clone(&parser)).with_sharedness(true);
        let samples = (0..2)
            .map(|i| {
                let note = Item::memory(Value::from(i as i64), Arc::clone(&parser));
                Sample::typeless([
                    ("config".to_string(), config.clone()),
                    ("note".to_string(), note),
                ])
            })
            .collect();
        let mut sink = UnderfolderSink::new(&out);
        sink.consume(&Data::from_samples(samples)).unwrap();

        assert!(out.join("config.json").is_file());
        assert!(out.join("data/0_note.json").is_file());
        assert!(!out.join("data/0_config.json").exists());
    }

    #[test]
    fn memory_items_always_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        let item = Item::memory(Value::from("hello"), Arc::new(TextParser::new()));
        write_item_to_file(&item, &path, CopyPolicy::HardLink).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn hard_link_shares_the_inode() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        fs::write(&source, "payload").unwrap();

        let item = Item::stored(
            Arc::new(FileReader::new(&source)),
            Arc::new(TextParser::new()),
        );
        let linked = dir.path().join("linked.txt");
        write_item_to_file(&item, &linked, CopyPolicy::HardLink).unwrap();
        assert_eq!(fs::read_to_string(&linked).unwrap(), "payload");

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let a = fs::metadata(&source).unwrap().ino();
            let b = fs::metadata(&linked).unwrap().ino();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn replicate_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        fs::write(&source, "payload").unwrap();

        let item = Item::stored(
            Arc::new(FileReader::new(&source)),
            Arc::new(TextParser::new()),
        );
        let copied = dir.path().join("copied.txt");
        write_item_to_file(&item, &copied, CopyPolicy::Replicate).unwrap();
        assert_eq!(fs::read_to_string(&copied).unwrap(), "payload");
    }
}
