use crate::coroutine::{CoroHandle, Coroutine, Header};

use std::collections::VecDeque;
use std::sync::atomic::Ordering;

/// Anything that can sit in a run queue.
///
/// The queue uses the coroutine header's link flag to enforce that a
/// coroutine is never linked into two queues, or twice into one.
pub(crate) trait Linked {
    fn header(&self) -> &Header;
}

impl Linked for CoroHandle {
    fn header(&self) -> &Header {
        &self.header
    }
}

impl Linked for Coroutine {
    fn header(&self) -> &Header {
        &self.handle.header
    }
}

/// A FIFO run queue.
///
/// The master queue holds handles (bodies stay in the registry); the
/// parallel queue holds whole coroutines, since their bodies travel to
/// the worker thread.
pub(crate) struct RunQueue<T: Linked> {
    inner: VecDeque<T>,
}

impl<T: Linked> RunQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: VecDeque::new(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a coroutine.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine is already linked into a run queue.
    pub(crate) fn push_back(&mut self, item: T) {
        link(&item);
        self.inner.push_back(item);
    }

    /// Inserts a coroutine ahead of every queued one.
    ///
    /// # Panics
    ///
    /// Panics if the coroutine is already linked into a run queue.
    pub(crate) fn push_front(&mut self, item: T) {
        link(&item);
        self.inner.push_front(item);
    }

    /// Removes the head of the queue.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        let item = self.inner.pop_front()?;
        item.header().linked.store(false, Ordering::Release);
        Some(item)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<T: Linked> Drop for RunQueue<T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}

fn link<T: Linked>(item: &T) {
    let header = item.header();
    if header.linked.swap(true, Ordering::AcqRel) {
        panic!("coroutine {} is already linked into a run queue", header.id);
    }
}
