//! Terminal progress tracking over the event bus.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use weir_core::{Error, ErrorKind, Result};

use crate::workflow::events::{Event, EventQueue};

/// A consumer of progress events.
pub trait Tracker {
    /// Starts consuming events from `queue`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when already attached.
    fn attach(&mut self, queue: Arc<dyn EventQueue>) -> Result<()>;

    /// Stops consuming and releases the queue.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when not attached.
    fn detach(&mut self) -> Result<()>;
}

/// Tracker that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTracker {
    _priv: (),
}

impl NoTracker {
    /// Creates a new [`NoTracker`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Tracker for NoTracker {
    fn attach(&mut self, _queue: Arc<dyn EventQueue>) -> Result<()> {
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Terminal tracker rendering one progress bar per task.
///
/// A background thread polls the queue at the configured refresh rate and
/// maintains a bar per slash-delimited task path, indented by path depth:
/// titles on the left, bars and counters on the right. Updates for unknown
/// tasks are ignored, and queue trouble never panics the thread.
#[must_use]
pub struct ProgressTracker {
    refresh: Duration,
    hidden: bool,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTracker {
    /// Creates a tracker refreshing every 100 ms.
    pub fn new() -> Self {
        Self {
            refresh: Duration::from_millis(100),
            hidden: false,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Sets the refresh interval.
    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Renders nowhere; useful in tests and headless runs.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker for ProgressTracker {
    fn attach(&mut self, queue: Arc<dyn EventQueue>) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::new(
                ErrorKind::Config,
                "already attached to an event queue",
            ));
        }
        self.stop.store(false, Ordering::SeqCst);
        let stop = Arc::clone(&self.stop);
        let refresh = self.refresh;
        let hidden = self.hidden;
        let handle = std::thread::Builder::new()
            .name("weir-tracker".to_owned())
            .spawn(move || run_loop(&queue, &stop, refresh, hidden))
            .map_err(|e| {
                Error::with_source(ErrorKind::Config, "failed to spawn tracker thread", Box::new(e))
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Err(Error::new(
                ErrorKind::Config,
                "not attached to any event queue",
            ));
        };
        self.stop.store(true, Ordering::SeqCst);
        let _ = handle.join();
        Ok(())
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("refresh", &self.refresh)
            .field("attached", &self.handle.is_some())
            .finish()
    }
}

fn bar_style(depth: usize) -> ProgressStyle {
    let indent = "  ".repeat(depth);
    let template = format!("{indent}{{prefix:<30}} {{bar:40}} {{pos}}/{{len}}");
    ProgressStyle::with_template(&template).expect("progress bar template is valid")
}

fn run_loop(queue: &Arc<dyn EventQueue>, stop: &AtomicBool, refresh: Duration, hidden: bool) {
    let target = if hidden {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stderr()
    };
    let multi = MultiProgress::with_draw_target(target);
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    loop {
        match queue.capture_timeout(refresh) {
            Some(Event::TaskStart { task, total }) => {
                let depth = task.matches('/').count();
                let bar = multi.add(ProgressBar::new(total));
                bar.set_style(bar_style(depth));
                bar.set_prefix(task.clone());
                let _ = bars.insert(task, bar);
            }
            Some(Event::TaskUpdate { task, .. }) => {
                // Unknown tasks are ignored.
                if let Some(bar) = bars.get(&task) {
                    bar.inc(1);
                }
            }
            Some(Event::TaskComplete { task }) => {
                if let Some(bar) = bars.get(&task) {
                    bar.finish();
                }
            }
            // Stop only once the queue has drained.
            None if stop.load(Ordering::SeqCst) => break,
            None => {}
        }
    }

    for bar in bars.values() {
        bar.finish();
    }
    let _ = multi.clear();
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{NoTracker, ProgressTracker, Tracker};
    use crate::workflow::events::{Event, EventQueue, InMemoryEventQueue};
    use weir_core::ErrorKind;

    #[test]
    fn no_tracker_is_inert() {
        let mut tracker = NoTracker::new();
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        tracker.attach(Arc::clone(&queue)).unwrap();
        tracker.detach().unwrap();
    }

    #[test]
    fn tracker_consumes_events_and_joins() {
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let mut tracker = ProgressTracker::new()
            .with_refresh(Duration::from_millis(5))
            .hidden();
        tracker.attach(Arc::clone(&queue)).unwrap();

        queue
            .emit(Event::TaskStart {
                task: "node/write".to_owned(),
                total: 2,
            })
            .unwrap();
        queue
            .emit(Event::TaskUpdate {
                task: "node/write".to_owned(),
                unit: 0,
            })
            .unwrap();
        // Updates for unknown tasks must not crash the thread.
        queue
            .emit(Event::TaskUpdate {
                task: "nope/loop".to_owned(),
                unit: 0,
            })
            .unwrap();
        queue
            .emit(Event::TaskComplete {
                task: "node/write".to_owned(),
            })
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        tracker.detach().unwrap();
        // Everything was drained by the tracker.
        assert!(queue.capture().is_none());
    }

    #[test]
    fn double_attach_fails() {
        let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
        let mut tracker = ProgressTracker::new().hidden();
        tracker.attach(Arc::clone(&queue)).unwrap();
        let err = tracker.attach(Arc::clone(&queue)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        tracker.detach().unwrap();

        let err = tracker.detach().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
