//! Materialization of node outputs between workflow steps.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use weir_core::sinks::{OverwritePolicy, Sink, UnderfolderSink};
use weir_core::sources::{Source, UnderfolderSource};
use weir_core::Result;

/// Produces paired sink/source endpoints used to persist a node's output
/// and immediately re-read it, guaranteeing materialization on disk.
pub trait CheckpointFactory: Send {
    /// Creates the endpoints for one node output.
    ///
    /// `execution` scopes the run, `name` the node output within it.
    fn create(&self, execution: &str, name: &str) -> (Box<dyn Sink>, Box<dyn Source>);

    /// Removes the checkpoint of one node output.
    ///
    /// # Errors
    ///
    /// Propagates file-system failures.
    fn destroy(&self, execution: &str, name: &str) -> Result<()>;
}

/// Checkpoints stored as underfolders beneath a root directory.
///
/// The layout is `<root>/<execution>/<name>`; the default root lives in
/// the system temporary directory.
#[must_use]
#[derive(Clone)]
pub struct UnderfolderCheckpoints {
    root: PathBuf,
}

impl UnderfolderCheckpoints {
    /// Creates a factory rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, execution: &str, name: &str) -> PathBuf {
        self.root.join(execution).join(name)
    }
}

impl Default for UnderfolderCheckpoints {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("weir-workflows"))
    }
}

impl CheckpointFactory for UnderfolderCheckpoints {
    fn create(&self, execution: &str, name: &str) -> (Box<dyn Sink>, Box<dyn Source>) {
        let path = self.path(execution, name);
        // Execution ids are fresh per run, so collisions only happen when
        // the same node output is checkpointed twice.
        let sink = UnderfolderSink::new(&path).with_overwrite_policy(OverwritePolicy::Forbid);
        let source = UnderfolderSource::new(&path);
        (Box::new(sink), Box::new(source))
    }

    fn destroy(&self, execution: &str, name: &str) -> Result<()> {
        let path = self.path(execution, name);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}

impl fmt::Debug for UnderfolderCheckpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnderfolderCheckpoints")
            .field("root", &self.root)
            .finish()
    }
}
