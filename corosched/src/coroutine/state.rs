/// Coroutine is parked and not scheduled.
///
/// Whoever holds its waker owns the next transition: waking it moves the
/// coroutine back to [`READY`] and onto the master's run queue.
pub(crate) const SUSPENDED: usize = 0;

/// Coroutine is ready to run.
///
/// It sits in exactly one run queue, or is being handed over between
/// schedulers.
pub(crate) const READY: usize = 1;

/// Coroutine is currently being executed by a scheduler.
///
/// At most one scheduler may observe this state at a time.
pub(crate) const RUNNING: usize = 2;

/// Coroutine body has returned.
///
/// The body will not be resumed again; the master releases it and drops
/// the registry entry.
pub(crate) const EXITED: usize = 3;

/// Coroutine has been woken while running.
///
/// This is how a yield is recorded: once the switch returns, the
/// scheduler re-queues the coroutine instead of parking it.
pub(crate) const NOTIFIED: usize = 4;
