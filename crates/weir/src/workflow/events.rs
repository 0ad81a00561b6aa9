//! Cross-thread progress event bus.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use weir_core::{Error, ErrorKind, Result};

/// Progress message carried by an [`EventQueue`].
///
/// Task ids are slash-delimited paths (`<node>/<loop>`) that trackers use
/// to build their task tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A task over `total` units began.
    TaskStart {
        /// Slash-delimited task path.
        task: String,
        /// Number of units.
        total: u64,
    },

    /// Unit `unit` of the task finished.
    TaskUpdate {
        /// Slash-delimited task path.
        task: String,
        /// Index of the finished unit.
        unit: u64,
    },

    /// The task finished.
    TaskComplete {
        /// Slash-delimited task path.
        task: String,
    },
}

impl Event {
    /// Returns the task path of this event.
    #[must_use]
    pub fn task(&self) -> &str {
        match self {
            Self::TaskStart { task, .. }
            | Self::TaskUpdate { task, .. }
            | Self::TaskComplete { task } => task,
        }
    }
}

/// Multi-producer, single-consumer progress bus.
///
/// Emitters may live on any thread; the single consumer is the tracker.
/// `close` is idempotent, and events buffered before the close remain
/// capturable afterwards.
pub trait EventQueue: Send + Sync {
    /// Publishes an event.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] once the queue is closed.
    fn emit(&self, event: Event) -> Result<()>;

    /// Takes the next buffered event without blocking.
    fn capture(&self) -> Option<Event>;

    /// Takes the next event, waiting up to `timeout` for one to arrive.
    fn capture_timeout(&self, timeout: Duration) -> Option<Event>;

    /// Closes the queue. Further `emit` calls fail; buffered events drain.
    fn close(&self);
}

/// In-memory [`EventQueue`] over a standard channel.
pub struct InMemoryEventQueue {
    tx: Sender<Event>,
    rx: Mutex<Receiver<Event>>,
    closed: AtomicBool,
}

impl InMemoryEventQueue {
    /// Creates an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for InMemoryEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue for InMemoryEventQueue {
    fn emit(&self, event: Event) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Config, "the event queue is closed"));
        }
        self.tx
            .send(event)
            .map_err(|_| Error::new(ErrorKind::Config, "the event queue is gone"))
    }

    fn capture(&self) -> Option<Event> {
        let guard = self.rx.lock().expect("event queue receiver poisoned");
        guard.try_recv().ok()
    }

    fn capture_timeout(&self, timeout: Duration) -> Option<Event> {
        let guard = self.rx.lock().expect("event queue receiver poisoned");
        match guard.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for InMemoryEventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventQueue")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
