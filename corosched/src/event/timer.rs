use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::task::Waker;
use std::time::Instant;

/// A pending [`Sleep`](super::future::Sleep) in the master's timer heap.
///
/// The heap is ordered by deadline only. A sleep dropped before it fires
/// flips `cancelled`; the entry then stays in the heap until it reaches
/// the top and is discarded without waking anyone.
pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,

    /// Waker of the coroutine that armed the sleep.
    pub(crate) waker: Waker,

    /// Set by the sleep's `Drop`.
    pub(crate) cancelled: Arc<AtomicBool>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Ord for TimerEntry {
    /// Earlier deadlines compare greater, so `BinaryHeap::peek` yields the
    /// next timer to fire.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
