use super::stats::Counters;
use crate::coroutine::CoroId;
use crate::error::{Error, Result};
use crate::event::poller::Waker as PollWaker;
use crate::sched::handoff::{Handback, Handoff};
use crate::sched::parallel::ParallelQueue;

use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::TrySendError;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// State shared between the master thread, the parallel worker and any
/// thread holding a [`StopHandle`](crate::StopHandle) or a waker.
pub(crate) struct Shared {
    /// Termination flag of the master scheduler.
    master_stop: AtomicBool,

    /// Termination flag of the event manager.
    events_stop: AtomicBool,

    /// Run queue of the parallel scheduler; carries its own stop flag.
    pub(crate) parallel: ParallelQueue,

    /// Sending side of the schedule-back channel.
    handoff: Handoff,

    /// Interrupts the master when it blocks in the event manager.
    poll_waker: Arc<PollWaker>,

    pub(crate) counters: Counters,

    stranded: Mutex<Vec<CoroId>>,

    /// Pause between two attempts on a full handoff channel.
    backoff: Duration,
}

impl Shared {
    pub(crate) fn new(
        parallel: ParallelQueue,
        handoff: Handoff,
        poll_waker: Arc<PollWaker>,
        backoff: Duration,
    ) -> Self {
        Self {
            master_stop: AtomicBool::new(false),
            events_stop: AtomicBool::new(false),
            parallel,
            handoff,
            poll_waker,
            counters: Counters::default(),
            stranded: Mutex::new(Vec::new()),
            backoff,
        }
    }

    /// Stops both schedulers and the event manager, and wakes whichever
    /// of them is sleeping.
    ///
    /// Idempotent; only the first call logs.
    pub(crate) fn stop(&self) {
        let first = !self.master_stop.swap(true, Ordering::AcqRel);

        self.events_stop.store(true, Ordering::Release);
        self.parallel.shutdown();
        self.poll_waker.wake();

        if first {
            info!("environment stop requested");
        }
    }

    pub(crate) fn master_stopped(&self) -> bool {
        self.master_stop.load(Ordering::Acquire)
    }

    pub(crate) fn events_stopped(&self) -> bool {
        self.events_stop.load(Ordering::Acquire)
    }

    /// Sends a record to the master through the schedule-back channel and
    /// rings the doorbell.
    ///
    /// A full channel is retried until it drains; a stopped environment or
    /// a closed channel gives up with [`Error::Stranded`].
    pub(crate) fn send_back(&self, record: Handback) -> Result<()> {
        let mut record = record;

        loop {
            match self.handoff.try_send(record) {
                Ok(()) => {
                    self.handoff.ring();
                    return Ok(());
                }
                Err(TrySendError::Full(back)) => {
                    if self.master_stopped() {
                        return Err(Error::Stranded(back.id()));
                    }
                    thread::sleep(self.backoff);
                    record = back;
                }
                Err(TrySendError::Disconnected(back)) => {
                    return Err(Error::Stranded(back.id()));
                }
            }
        }
    }

    /// Records a coroutine that could not be scheduled back.
    pub(crate) fn strand(&self, id: CoroId) {
        Counters::bump(&self.counters.stranded);
        self.stranded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    pub(crate) fn stranded(&self) -> Vec<CoroId> {
        self.stranded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
