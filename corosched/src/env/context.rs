use super::shared::Shared;
use crate::coroutine::CoroHandle;
use crate::sched::master::Master;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

thread_local! {
    /// Master scheduler driving the current thread, if any.
    ///
    /// Set while the thread runs the master loop or a single step of it,
    /// so wakers, timers and readiness waits can reach the scheduler
    /// without explicit parameter passing.
    static CURRENT_MASTER: RefCell<Option<Rc<Master>>> = const { RefCell::new(None) };

    /// Coroutine being switched into on the current thread.
    static CURRENT_COROUTINE: RefCell<Option<CoroHandle>> = const { RefCell::new(None) };

    /// Environment served by the parallel worker running on this thread.
    static CURRENT_PARALLEL: RefCell<Option<Arc<Shared>>> = const { RefCell::new(None) };
}

/// Installs `master` as the current thread's scheduler for the duration
/// of `f`, then restores the previous one.
pub(crate) fn enter_master<R>(master: Rc<Master>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_MASTER.with(|m| m.replace(Some(master)));
    let out = f();
    CURRENT_MASTER.with(|m| m.replace(prev));

    out
}

/// Marks the current thread as the parallel worker of `shared` for the
/// duration of `f`.
pub(crate) fn enter_parallel<R>(shared: Arc<Shared>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_PARALLEL.with(|p| p.replace(Some(shared)));
    let out = f();
    CURRENT_PARALLEL.with(|p| p.replace(prev));

    out
}

/// Records `coroutine` as the one running on this thread during `f`.
pub(crate) fn enter_coroutine<R>(coroutine: CoroHandle, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_COROUTINE.with(|c| c.replace(Some(coroutine)));
    let out = f();
    CURRENT_COROUTINE.with(|c| c.replace(prev));

    out
}

/// Runs `f` against the current master scheduler.
///
/// Returns `None` on threads that are not driving a master, which
/// includes the parallel worker.
pub(crate) fn with_master<R>(f: impl FnOnce(&Master) -> R) -> Option<R> {
    // Clone out of the cell so `f` may re-enter this module.
    let master = CURRENT_MASTER.with(|m| m.borrow().clone())?;
    Some(f(&master))
}

/// Runs `f` against the coroutine currently running on this thread.
pub(crate) fn with_current<R>(f: impl FnOnce(&CoroHandle) -> R) -> Option<R> {
    let current = CURRENT_COROUTINE.with(|c| c.borrow().clone())?;
    Some(f(&current))
}

pub(crate) fn on_parallel() -> bool {
    CURRENT_PARALLEL.with(|p| p.borrow().is_some())
}

/// Returns the environment the current thread works for, on either side.
pub(crate) fn shared() -> Option<Arc<Shared>> {
    with_master(|master| master.shared().clone())
        .or_else(|| CURRENT_PARALLEL.with(|p| p.borrow().clone()))
}
