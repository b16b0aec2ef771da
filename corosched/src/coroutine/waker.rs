use super::core::{CoroHandle, Wake};
use crate::env::context;
use crate::env::shared::Shared;
use crate::sched::handoff::Handback;

use log::error;
use std::mem;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Target of a coroutine waker.
///
/// Pairs the coroutine with the environment it belongs to, so a wake-up
/// fired on any thread can find the master scheduler again.
pub(crate) struct Waiter {
    handle: CoroHandle,
    shared: Arc<Shared>,
}

impl Waiter {
    /// Applies a wake-up to the coroutine and, if it was parked, routes it
    /// back to the master run queue.
    ///
    /// On the master thread the coroutine is queued directly. From any
    /// other thread its handle travels through the schedule-back channel.
    fn wake(&self) {
        if self.handle.header.notify() != Wake::Schedule {
            return;
        }

        let queued = context::with_master(|master| {
            if master.belongs_to(&self.shared) {
                master.make_ready(self.handle.clone());
                true
            } else {
                false
            }
        })
        .unwrap_or(false);

        if queued {
            return;
        }

        if let Err(e) = self.shared.send_back(Handback::Woken(self.handle.clone())) {
            error!("lost wake-up of coroutine {}: {e}", self.handle.id());
        }
    }
}

/// The vtable shared by every coroutine waker.
///
/// All functions uphold the invariants required by [`RawWaker`]: the data
/// pointer always comes from `Arc::<Waiter>::into_raw` and reference counts
/// are balanced.
static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates the [`Waker`] handed to a coroutine body during a switch.
pub(crate) fn make_waker(handle: CoroHandle, shared: Arc<Shared>) -> Waker {
    let waiter = Arc::new(Waiter { handle, shared });

    unsafe { Waker::from_raw(RawWaker::new(Arc::into_raw(waiter) as *const (), &VTABLE)) }
}

/// Clones the raw waker, incrementing the reference count.
fn clone_raw(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::<Waiter>::from_raw(ptr as *const Waiter) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

/// Wakes the coroutine and consumes the waker.
fn wake_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Waiter>::from_raw(ptr as *const Waiter) };
    arc.wake();
}

/// Wakes the coroutine without consuming the waker.
fn wake_by_ref_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Waiter>::from_raw(ptr as *const Waiter) };
    arc.wake();
    mem::forget(arc);
}

/// Drops the raw waker, decrementing the reference count.
fn drop_raw(ptr: *const ()) {
    unsafe { drop(Arc::<Waiter>::from_raw(ptr as *const Waiter)) };
}
