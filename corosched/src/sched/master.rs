//! Master scheduler.
//!
//! The cooperative loop. Each iteration dequeues the head of the run
//! queue, discards it if it already exited, diverts it if it asked for the
//! parallel scheduler, and otherwise switches into it once. A coroutine
//! that exits is removed from the registry and its body released.
//!
//! Bodies live in the registry while their coroutine is parked or queued;
//! the run queue only holds handles. A body leaves the registry for the
//! duration of a switch or a trip to the worker, and no `RefCell` borrow
//! is held while a body runs.

use super::handoff::Handback;
use super::queue::RunQueue;
use super::{Driver, Step};
use crate::coroutine::waker::make_waker;
use crate::coroutine::{Body, CoroHandle, CoroId, Coroutine, Status};
use crate::env::context;
use crate::env::shared::Shared;
use crate::env::stats::Counters;
use crate::error::{Error, Result};
use crate::event::EventManager;
use crate::registry::Registry;

use log::{debug, info, trace, warn};
use std::cell::{RefCell, RefMut};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll};
use std::time::Duration;

/// What the loop should do next.
enum Next {
    /// Switch into this coroutine.
    Run(CoroHandle),

    /// Nothing runnable, or the scheduler is stopping.
    Empty,

    /// Only refused diverts are left; wait before retrying them.
    Backoff,
}

pub(crate) struct Master {
    shared: Arc<Shared>,
    queue: RefCell<RunQueue<CoroHandle>>,
    registry: RefCell<Registry>,
    events: RefCell<EventManager>,

    /// Coroutine being switched into, if any.
    current: RefCell<Option<CoroHandle>>,

    /// Leave the loop once no application coroutine is alive.
    exit_when_idle: bool,

    /// Pause after a failed divert.
    backoff: Duration,
}

impl Master {
    pub(crate) fn new(
        shared: Arc<Shared>,
        events: EventManager,
        capacity: usize,
        exit_when_idle: bool,
        backoff: Duration,
    ) -> Self {
        Self {
            shared,
            queue: RefCell::new(RunQueue::new()),
            registry: RefCell::new(Registry::new(capacity)),
            events: RefCell::new(events),
            current: RefCell::new(None),
            exit_when_idle,
            backoff,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Returns whether this master runs the environment `shared` belongs to.
    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        Arc::ptr_eq(&self.shared, shared)
    }

    /// Short-lived access to the event manager.
    ///
    /// Must not be held across a switch or while wakers run.
    pub(crate) fn events(&self) -> RefMut<'_, EventManager> {
        self.events.borrow_mut()
    }

    /// Inserts a coroutine into the registry and queues it.
    pub(crate) fn register(&self, coro: Coroutine) -> Result<CoroHandle> {
        let (handle, body) = coro.into_parts();

        self.registry.borrow_mut().insert(handle.clone(), body)?;
        self.queue.borrow_mut().push_back(handle.clone());

        trace!("registered coroutine {}", handle.id());
        Ok(handle)
    }

    pub(crate) fn lookup(&self, id: CoroId) -> Option<CoroHandle> {
        self.registry.borrow().lookup(id)
    }

    pub(crate) fn current(&self) -> Option<CoroHandle> {
        self.current.borrow().clone()
    }

    /// Queues a coroutine that a waker just made ready.
    pub(crate) fn make_ready(&self, handle: CoroHandle) {
        self.queue.borrow_mut().push_back(handle);
    }

    /// Runs at most one coroutine, diverting any flagged ones in front of it.
    pub(crate) fn step(&self) -> Step {
        match self.next() {
            Next::Run(handle) => {
                let id = handle.id();
                self.switch(handle);
                Step::Ran(id)
            }
            Next::Empty => Step::Idle,
            Next::Backoff => Step::Backoff,
        }
    }

    /// Picks the next coroutine to switch into.
    ///
    /// Coroutines whose divert is refused are set aside for the rest of the
    /// scan so they cannot starve the heads behind them, the schedule-back
    /// adapter included. They go back to the tail of the queue, `Ready`,
    /// before this returns.
    fn next(&self) -> Next {
        let mut refused = Vec::new();
        let next = self.scan(&mut refused);

        if !refused.is_empty() {
            let mut queue = self.queue.borrow_mut();
            for handle in refused {
                queue.push_back(handle);
            }
        }

        next
    }

    fn scan(&self, refused: &mut Vec<CoroHandle>) -> Next {
        loop {
            if self.shared.master_stopped() {
                return Next::Empty;
            }

            let head = self.queue.borrow_mut().pop_front();
            let Some(head) = head else {
                if refused.is_empty() {
                    return Next::Empty;
                }
                return Next::Backoff;
            };

            if head.header.is_exited() {
                self.reap(head.id(), None);
                continue;
            }

            if head.need_parallel() {
                if let Some(back) = self.divert(head) {
                    refused.push(back);
                }
                continue;
            }

            return Next::Run(head);
        }
    }

    /// Hands a coroutine over to the parallel scheduler.
    ///
    /// Returns the coroutine, `Ready` and with its body back in the
    /// registry, if the parallel queue refused it.
    fn divert(&self, handle: CoroHandle) -> Option<CoroHandle> {
        let id = handle.id();

        let body = self.registry.borrow_mut().take_body(id);
        let Some(body) = body else {
            debug!("coroutine {id} has no body to divert, dropping it from the queue");
            return None;
        };

        match self.shared.parallel.push(Coroutine::from_parts(handle, body)) {
            Ok(()) => {
                Counters::bump(&self.shared.counters.diverted);
                trace!("diverted coroutine {id} to the parallel scheduler");
                None
            }
            Err(coro) => {
                let (handle, body) = coro.into_parts();
                Counters::bump(&self.shared.counters.divert_retries);

                debug!(
                    "parallel scheduler refused coroutine {id} ({} waiting), retrying later",
                    self.shared.parallel.len()
                );

                if !self.restore(&handle, body) {
                    return None;
                }

                handle.header.ready();
                Some(handle)
            }
        }
    }

    /// Switches into a coroutine once.
    fn switch(&self, handle: CoroHandle) {
        let id = handle.id();

        let body = self.registry.borrow_mut().take_body(id);
        let Some(mut body) = body else {
            debug!("coroutine {id} has no body to run");
            return;
        };

        handle.header.begin();
        *self.current.borrow_mut() = Some(handle.clone());

        let waker = make_waker(handle.clone(), self.shared.clone());
        let mut cx = Context::from_waker(&waker);
        let poll = context::enter_coroutine(handle.clone(), || body.resume(&mut cx));

        *self.current.borrow_mut() = None;
        Counters::bump(&self.shared.counters.switches);

        match poll {
            Poll::Ready(()) => {
                handle.header.exit();
                self.reap(id, Some(body));
            }
            Poll::Pending => self.settle(handle, body),
        }
    }

    /// Puts a body back into the registry.
    ///
    /// Returns `false`, releasing the body, if the coroutine is gone.
    fn restore(&self, handle: &CoroHandle, body: Body) -> bool {
        let restored = self.registry.borrow_mut().restore_body(handle.id(), body);
        restored.is_ok()
    }

    /// Stores the body of a coroutine that yielded and queues it again if
    /// it was woken meanwhile; otherwise it stays parked.
    fn settle(&self, handle: CoroHandle, body: Body) {
        if !self.restore(&handle, body) {
            return;
        }

        if handle.header.settle() {
            self.queue.borrow_mut().push_back(handle);
        }
    }

    /// Removes an exited coroutine and releases its body.
    fn reap(&self, id: CoroId, body: Option<Body>) {
        let stored = self.registry.borrow_mut().remove(id);

        drop(stored);
        drop(body);

        trace!("coroutine {id} exited");
    }

    /// Takes back a record from the schedule-back channel.
    pub(crate) fn schedule_back(&self, record: Handback) {
        match record {
            Handback::Returned(coro) => {
                Counters::bump(&self.shared.counters.returned);

                let (handle, body) = coro.into_parts();
                handle.set_need_parallel(false);

                trace!("coroutine {} scheduled back", handle.id());

                if handle.header.is_exited() {
                    self.reap(handle.id(), Some(body));
                } else {
                    self.settle(handle, body);
                }
            }
            Handback::Woken(handle) => {
                let queueable = handle.status() == Status::Ready
                    && !handle.header.linked.load(Ordering::Acquire)
                    && self.registry.borrow().contains(handle.id());

                if queueable {
                    self.queue.borrow_mut().push_back(handle);
                }
            }
        }
    }

    /// Waits for readiness events and timers and wakes the coroutines
    /// they concern. Returns how many were woken.
    pub(crate) fn poll_events(&self, timeout: Option<Duration>) -> Result<usize> {
        let stopped = self.shared.events_stopped();

        let woken = self
            .events
            .borrow_mut()
            .poll(timeout, stopped)
            .map_err(Error::Poll)?;

        let count = woken.len();
        for waker in woken {
            waker.wake();
        }

        Ok(count)
    }

    /// Returns whether nothing is left to run or wait for.
    fn idle(&self) -> bool {
        self.exit_when_idle
            && self.queue.borrow().is_empty()
            && self.registry.borrow().live() == 0
    }
}

impl Driver for Master {
    fn drive(&self) -> Result<()> {
        info!("master scheduler started");

        loop {
            match self.next() {
                Next::Run(handle) => self.switch(handle),
                Next::Backoff => {
                    self.poll_events(Some(self.backoff))?;
                }
                Next::Empty => {
                    if self.shared.master_stopped() {
                        break;
                    }

                    if self.idle() {
                        warn!("no coroutines left, exiting master scheduler");
                        break;
                    }

                    self.poll_events(None)?;
                }
            }
        }

        info!("master scheduler stopped");
        Ok(())
    }
}
