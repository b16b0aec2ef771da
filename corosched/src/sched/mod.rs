//! Schedulers.
//!
//! Two schedulers share the work:
//! - the master, a cooperative loop on the thread that runs the
//!   environment, resuming one coroutine at a time,
//! - the parallel scheduler, on a dedicated worker thread, which runs the
//!   blocking segments of coroutines diverted to it.
//!
//! Coroutines travel from the master to the worker through the parallel
//! queue and come back through the schedule-back channel, where the
//! adapter coroutine picks them up.

pub(crate) mod adapter;
pub(crate) mod handoff;
pub(crate) mod master;
pub(crate) mod parallel;
pub(crate) mod queue;

use crate::coroutine::CoroId;
use crate::error::Result;

/// A scheduler's own driving loop.
///
/// Driving a scheduler hands the calling thread over to it until the
/// scheduler terminates.
pub(crate) trait Driver {
    fn drive(&self) -> Result<()>;
}

/// Outcome of a single master step, see [`Env::step`](crate::Env::step).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The coroutine was switched into and has yielded or exited.
    Ran(CoroId),

    /// Nothing to run: the queue is empty or the environment stopped.
    Idle,

    /// Only refused diverts were left: the coroutines are back at the tail
    /// of the queue and the caller should wait a little before stepping
    /// again.
    Backoff,
}
