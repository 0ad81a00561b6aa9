//! Loop progress callbacks.
//!
//! Long-running components (filters, sorts, sink writers) report their
//! iteration through a [`Progress`] handle. The handle is a no-op unless a
//! callback is attached, so plain library use pays nothing; the workflow
//! executor attaches callbacks that forward loop events onto its event
//! queue.

use std::fmt;
use std::sync::Arc;

/// A single loop event reported through [`Progress`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopEvent {
    /// A loop over `total` units began.
    Start {
        /// Loop identifier, unique within the reporting component.
        loop_id: String,
        /// Number of units the loop will process.
        total: usize,
    },

    /// One unit of the loop finished.
    Step {
        /// Loop identifier.
        loop_id: String,
        /// Index of the finished unit.
        index: usize,
    },

    /// The loop finished or was abandoned.
    Finish {
        /// Loop identifier.
        loop_id: String,
    },
}

type Callback = dyn Fn(LoopEvent) + Send + Sync;

/// Clonable handle used to report loop progress.
///
/// The default handle is detached and ignores every event.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<Callback>>,
}

impl Progress {
    /// Creates a handle forwarding events to `callback`.
    pub fn new(callback: impl Fn(LoopEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Returns `true` if a callback is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.callback.is_some()
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    /// Starts a tracked loop over `total` units.
    ///
    /// The returned task reports steps and emits a finish event when
    /// explicitly finished or dropped.
    pub fn task(&self, loop_id: impl Into<String>, total: usize) -> LoopTask {
        let loop_id = loop_id.into();
        self.emit(LoopEvent::Start {
            loop_id: loop_id.clone(),
            total,
        });
        LoopTask {
            progress: self.clone(),
            loop_id,
            finished: false,
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// In-flight tracked loop handed out by [`Progress::task`].
#[must_use]
#[derive(Debug)]
pub struct LoopTask {
    progress: Progress,
    loop_id: String,
    finished: bool,
}

impl LoopTask {
    /// Reports that unit `index` finished.
    pub fn step(&self, index: usize) {
        self.progress.emit(LoopEvent::Step {
            loop_id: self.loop_id.clone(),
            index,
        });
    }

    /// Reports the end of the loop.
    pub fn finish(mut self) {
        self.finished = true;
        self.progress.emit(LoopEvent::Finish {
            loop_id: self.loop_id.clone(),
        });
    }
}

impl Drop for LoopTask {
    fn drop(&mut self) {
        if !self.finished {
            self.progress.emit(LoopEvent::Finish {
                loop_id: self.loop_id.clone(),
            });
        }
    }
}
