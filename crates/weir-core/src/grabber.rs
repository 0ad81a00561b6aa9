//! Worker-pool iteration over indexable sequences.
//!
//! The [`Grabber`] evaluates an `index → element` function over `0..len`,
//! either inline or on a pool of worker threads, and hands each `(index,
//! element)` pair to a consumer callback on the calling thread. Delivery is
//! in index order when `keep_order` is set, otherwise in completion order;
//! every index is delivered exactly once.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::{Error, ErrorKind, Result};

/// Configurable parallel iterator over per-index evaluations.
///
/// - `num_workers = 0` evaluates inline on the calling thread, in index
///   order, spawning nothing.
/// - `num_workers > 0` spawns that many scoped worker threads; each claims
///   `prefetch`-sized batches of indices from a shared cursor and streams
///   results back over a bounded channel.
///
/// The first failure — whether raised by the fetch function inside a worker
/// or by the consumer callback — cancels the pool: workers observe a poison
/// flag and stop, pending results are dropped, and the error propagates to
/// the caller.
///
/// # Examples
///
/// ```
/// use weir_core::Grabber;
///
/// let grabber = Grabber::new(4).prefetch(8).keep_order(true);
/// let mut doubled = Vec::new();
/// grabber.run(10, |i| Ok(i * 2), |_, x| {
///     doubled.push(x);
///     Ok(())
/// })?;
/// assert_eq!(doubled, (0..10).map(|i| i * 2).collect::<Vec<_>>());
/// # weir_core::Result::Ok(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grabber {
    num_workers: usize,
    prefetch: usize,
    keep_order: bool,
}

impl Default for Grabber {
    fn default() -> Self {
        Self {
            num_workers: 0,
            prefetch: 2,
            keep_order: false,
        }
    }
}

impl Grabber {
    /// Creates a grabber with the given number of workers.
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Sets the batch size fed to each worker. Clamped to at least 1.
    #[must_use]
    pub fn prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    /// Sets whether results are delivered in index order.
    #[must_use]
    pub fn keep_order(mut self, keep_order: bool) -> Self {
        self.keep_order = keep_order;
        self
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Evaluates `fetch` for every index in `0..len` and feeds each result
    /// to `each` on the calling thread.
    ///
    /// # Errors
    ///
    /// Propagates the first error from `fetch` or `each`; remaining work is
    /// cancelled.
    pub fn run<T, F, E>(&self, len: usize, fetch: F, mut each: E) -> Result<()>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync,
        E: FnMut(usize, T) -> Result<()>,
    {
        if self.num_workers == 0 {
            for index in 0..len {
                each(index, fetch(index)?)?;
            }
            return Ok(());
        }
        self.run_pooled(len, &fetch, &mut each)
    }

    fn run_pooled<T, F, E>(&self, len: usize, fetch: &F, each: &mut E) -> Result<()>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync,
        E: FnMut(usize, T) -> Result<()>,
    {
        let workers = self.num_workers.min(len.max(1));
        let cursor = AtomicUsize::new(0);
        let poison = AtomicBool::new(false);
        let (tx, rx) = mpsc::sync_channel::<Result<(usize, T)>>(workers * self.prefetch);

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let poison = &poison;
                scope.spawn(move || {
                    loop {
                        if poison.load(Ordering::Relaxed) {
                            return;
                        }
                        let start = cursor.fetch_add(self.prefetch, Ordering::SeqCst);
                        if start >= len {
                            return;
                        }
                        let stop = start.saturating_add(self.prefetch).min(len);
                        for index in start..stop {
                            if poison.load(Ordering::Relaxed) {
                                return;
                            }
                            let message = fetch(index).map(|elem| (index, elem));
                            let failed = message.is_err();
                            if failed {
                                poison.store(true, Ordering::Relaxed);
                            }
                            // A send failure means the consumer is gone.
                            if tx.send(message).is_err() || failed {
                                return;
                            }
                        }
                    }
                });
            }
            drop(tx);

            let result = self.consume(len, rx, each, &poison);
            // The receiver is dropped here, unblocking producers on error.
            result
        })
    }

    fn consume<T, E>(
        &self,
        len: usize,
        rx: mpsc::Receiver<Result<(usize, T)>>,
        each: &mut E,
        poison: &AtomicBool,
    ) -> Result<()>
    where
        E: FnMut(usize, T) -> Result<()>,
    {
        let mut pending: BTreeMap<usize, T> = BTreeMap::new();
        let mut next = 0usize;
        let mut delivered = 0usize;

        while delivered < len {
            let message = match rx.recv() {
                Ok(message) => message,
                Err(_) => {
                    // All workers exited without finishing the range.
                    poison.store(true, Ordering::Relaxed);
                    return Err(Error::new(
                        ErrorKind::Worker,
                        "worker pool stopped before completing the range",
                    ));
                }
            };
            let (index, elem) = match message {
                Ok(pair) => pair,
                Err(error) => {
                    poison.store(true, Ordering::Relaxed);
                    return Err(error);
                }
            };

            if self.keep_order {
                let _ = pending.insert(index, elem);
                while let Some(elem) = pending.remove(&next) {
                    if let Err(error) = each(next, elem) {
                        poison.store(true, Ordering::Relaxed);
                        return Err(error);
                    }
                    next += 1;
                    delivered += 1;
                }
            } else {
                if let Err(error) = each(index, elem) {
                    poison.store(true, Ordering::Relaxed);
                    return Err(error);
                }
                delivered += 1;
            }
        }
        Ok(())
    }
}
