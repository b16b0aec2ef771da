use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of scheduler activity, see [`Env::stats`](crate::Env::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Switches into coroutines performed by the master.
    pub switches: u64,

    /// Coroutines handed to the parallel scheduler.
    pub diverted: u64,

    /// Coroutines received back from the parallel scheduler.
    pub returned: u64,

    /// Diverts that failed and were put back on the master's queue.
    pub divert_retries: u64,

    /// Coroutines that could not be scheduled back.
    pub stranded: u64,
}

/// Live counters behind [`Stats`], shared by both threads.
#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) switches: AtomicU64,
    pub(crate) diverted: AtomicU64,
    pub(crate) returned: AtomicU64,
    pub(crate) divert_retries: AtomicU64,
    pub(crate) stranded: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            switches: self.switches.load(Ordering::Relaxed),
            diverted: self.diverted.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            divert_retries: self.divert_retries.load(Ordering::Relaxed),
            stranded: self.stranded.load(Ordering::Relaxed),
        }
    }
}
