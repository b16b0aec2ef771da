//! Parallel scheduler.
//!
//! Runs diverted coroutines on one dedicated worker thread. The master
//! pushes into a shared queue and signals a condition variable; the
//! worker parks on it, with a timeout so a stop is never missed for long.

use super::Driver;
use super::handoff::Handback;
use super::queue::RunQueue;
use crate::coroutine::Coroutine;
use crate::coroutine::waker::make_waker;
use crate::env::context;
use crate::env::shared::Shared;
use crate::error::Result;

use log::{error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::Context;
use std::time::Duration;

/// Run queue of the parallel scheduler.
///
/// The lock is held for a single push or pop, never across a switch.
pub(crate) struct ParallelQueue {
    queue: Mutex<RunQueue<Coroutine>>,

    /// Maximum number of coroutines waiting for the worker.
    capacity: usize,

    /// Signalled on every push and on shutdown.
    available: Condvar,

    /// Termination flag of the parallel scheduler.
    stopped: AtomicBool,
}

impl ParallelQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(RunQueue::with_capacity(capacity)),
            capacity,
            available: Condvar::new(),
            stopped: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunQueue<Coroutine>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands a coroutine to the worker.
    ///
    /// Gives it back if the queue is full or the scheduler stopped.
    pub(crate) fn push(&self, coro: Coroutine) -> std::result::Result<(), Coroutine> {
        if self.is_stopped() {
            return Err(coro);
        }

        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            return Err(coro);
        }

        queue.push_back(coro);
        drop(queue);

        self.available.notify_one();
        Ok(())
    }

    /// Takes the next coroutine, parking up to `park` at a time while the
    /// queue is empty.
    ///
    /// Returns `None` once the scheduler is stopped.
    pub(crate) fn pop(&self, park: Duration) -> Option<Coroutine> {
        let mut queue = self.lock();

        loop {
            if self.is_stopped() {
                return None;
            }

            if let Some(coro) = queue.pop_front() {
                return Some(coro);
            }

            queue = self
                .available
                .wait_timeout(queue, park)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Signals shutdown and wakes the parked worker.
    pub(crate) fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);

        // Taking the lock orders the flag before a concurrent `pop` parks.
        drop(self.lock());
        self.available.notify_all();
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Releases every coroutine still waiting for the worker.
    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<Coroutine> = std::iter::from_fn(|| self.lock().pop_front()).collect();
        drained.len()
    }
}

/// The worker-side scheduler loop.
pub(crate) struct ParallelScheduler {
    shared: Arc<Shared>,

    /// Longest single park on an empty queue.
    park: Duration,
}

impl ParallelScheduler {
    pub(crate) fn new(shared: Arc<Shared>, park: Duration) -> Self {
        Self { shared, park }
    }

    /// Runs one blocking segment of a diverted coroutine, then sends it
    /// back to the master.
    ///
    /// The coroutine is left `Running` (or `Exited`): the master settles
    /// its state once the body is home again.
    fn switch(&self, coro: Coroutine) {
        let (handle, mut body) = coro.into_parts();
        let id = handle.id();

        trace!("parallel: switching into coroutine {id}");

        handle.header.begin();
        let waker = make_waker(handle.clone(), self.shared.clone());
        let mut cx = Context::from_waker(&waker);

        let poll = context::enter_coroutine(handle.clone(), || body.resume(&mut cx));
        if poll.is_ready() {
            handle.header.exit();
        }

        let record = Handback::Returned(Coroutine::from_parts(handle, body));
        if let Err(e) = self.shared.send_back(record) {
            error!("switch back to master failed: {e}");
            self.shared.strand(id);
        }
    }
}

impl Driver for ParallelScheduler {
    fn drive(&self) -> Result<()> {
        info!("parallel scheduler started");

        context::enter_parallel(self.shared.clone(), || {
            while let Some(coro) = self.shared.parallel.pop(self.park) {
                self.switch(coro);
            }
        });

        info!("parallel scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;
    use std::time::Instant;

    #[test]
    fn push_respects_capacity() {
        let queue = ParallelQueue::new(1);

        assert!(queue.push(Coroutine::new(async {})).is_ok());
        let rejected = queue.push(Coroutine::new(async {}));

        assert!(rejected.is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_is_fifo() {
        let queue = ParallelQueue::new(4);
        let a = Coroutine::new(async {});
        let b = Coroutine::new(async {});
        let (a_id, b_id) = (a.id(), b.id());

        assert!(queue.push(a).is_ok());
        assert!(queue.push(b).is_ok());

        let park = Duration::from_millis(1);
        assert_eq!(queue.pop(park).map(|c| c.id()), Some(a_id));
        assert_eq!(queue.pop(park).map(|c| c.id()), Some(b_id));
    }

    #[test]
    fn stopped_queue_rejects_and_releases() {
        let queue = ParallelQueue::new(4);
        queue.shutdown();

        assert!(queue.push(Coroutine::new(async {})).is_err());
        assert!(queue.pop(Duration::from_secs(10)).is_none());
    }

    #[test]
    fn push_wakes_parked_worker() {
        let queue = Arc::new(ParallelQueue::new(4));
        let coro = Coroutine::new(async {});
        let id = coro.id();

        let worker = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop(Duration::from_secs(10)).map(|c| c.id()))
        };

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        assert!(queue.push(coro).is_ok());

        assert_eq!(worker.join().unwrap(), Some(id));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn shutdown_wakes_parked_worker() {
        let queue = Arc::new(ParallelQueue::new(4));

        let worker = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop(Duration::from_secs(10)).is_none())
        };

        thread::sleep(Duration::from_millis(20));
        queue.shutdown();

        assert!(worker.join().unwrap());
    }
}
