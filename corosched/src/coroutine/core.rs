use super::state::{EXITED, NOTIFIED, READY, RUNNING, SUSPENDED};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Source of process-unique coroutine identifiers.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a coroutine.
///
/// Assigned once at creation and never reused while the process lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoroId(u64);

impl CoroId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CoroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling status of a coroutine, as observed by the schedulers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Waiting in a run queue, or being handed between schedulers.
    Ready,
    /// Executing on the master or on the parallel worker.
    Running,
    /// Parked until something wakes it.
    Suspended,
    /// Finished; awaiting or past cleanup.
    Exited,
}

/// Resumable execution context of a coroutine.
///
/// A scheduler switches into a coroutine by calling [`resume`](Self::resume)
/// once. The body runs until it either yields (`Poll::Pending`) or returns
/// (`Poll::Ready`). Bodies are moved between threads, never shared.
///
/// [`Direct`] is the implementation used for ordinary coroutines. The
/// schedulers' own loops are not bodies: the thread is handed over to them
/// instead of polling them.
pub trait Resume: Send {
    /// Runs the body until its next suspension point.
    fn resume(&mut self, cx: &mut Context<'_>) -> Poll<()>;
}

/// A coroutine body backed by a pinned future.
///
/// Every `.await` that returns `Pending` is a suspension point; the
/// future's own state machine plays the role of the saved stack.
pub struct Direct<F> {
    future: Pin<Box<F>>,
}

impl<F> Direct<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    /// Wraps a future into a resumable body.
    pub fn new(future: F) -> Self {
        Self {
            future: Box::pin(future),
        }
    }
}

impl<F> Resume for Direct<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    fn resume(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

/// Owned execution context of a coroutine.
pub(crate) type Body = Box<dyn Resume>;

/// Shared scheduling state of a coroutine.
///
/// The header is what crosses threads by reference: identity, status and
/// the diversion flag. The body never does; it is moved.
pub(crate) struct Header {
    pub(crate) id: CoroId,

    /// One of the constants in [`state`](super::state).
    state: AtomicUsize,

    /// Set from inside the coroutine to request the parallel scheduler.
    need_parallel: AtomicBool,

    /// Whether the coroutine is linked into a run queue.
    pub(crate) linked: AtomicBool,

    /// Daemon coroutines do not keep the master scheduler alive.
    pub(crate) daemon: bool,
}

/// Outcome of a wake-up, telling the waker what to do next.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The coroutine was parked and is now ready: the waker must queue it.
    Schedule,
    /// Nothing to do; the coroutine is queued, running or gone.
    Absorbed,
}

impl Header {
    fn new(daemon: bool) -> Self {
        Self {
            id: CoroId::next(),
            state: AtomicUsize::new(READY),
            need_parallel: AtomicBool::new(false),
            linked: AtomicBool::new(false),
            daemon,
        }
    }

    pub(crate) fn status(&self) -> Status {
        match self.state.load(Ordering::Acquire) {
            SUSPENDED => Status::Suspended,
            READY => Status::Ready,
            RUNNING | NOTIFIED => Status::Running,
            _ => Status::Exited,
        }
    }

    pub(crate) fn is_exited(&self) -> bool {
        self.state.load(Ordering::Acquire) == EXITED
    }

    pub(crate) fn need_parallel(&self) -> bool {
        self.need_parallel.load(Ordering::Acquire)
    }

    pub(crate) fn set_need_parallel(&self, value: bool) {
        self.need_parallel.store(value, Ordering::Release);
    }

    /// Marks the coroutine as running, right before a switch into it.
    pub(crate) fn begin(&self) {
        self.state.store(RUNNING, Ordering::Release);
    }

    /// Marks the coroutine as ready without scheduling it anywhere.
    pub(crate) fn ready(&self) {
        self.state.store(READY, Ordering::Release);
    }

    /// Marks the coroutine as finished.
    pub(crate) fn exit(&self) {
        self.state.store(EXITED, Ordering::Release);
    }

    /// Applies a wake-up.
    ///
    /// A parked coroutine becomes ready and must be queued by the caller;
    /// a running one is flagged so the scheduler re-queues it after the
    /// switch returns.
    pub(crate) fn notify(&self) -> Wake {
        loop {
            match self.state.load(Ordering::Acquire) {
                SUSPENDED => {
                    if self
                        .state
                        .compare_exchange(SUSPENDED, READY, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return Wake::Schedule;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return Wake::Absorbed;
                    }
                }
                _ => return Wake::Absorbed,
            }
        }
    }

    /// Settles the state after a switch returned `Pending`.
    ///
    /// Returns `true` when the coroutine was woken during the switch and
    /// must be re-queued, `false` when it is now parked.
    pub(crate) fn settle(&self) -> bool {
        if self
            .state
            .compare_exchange(RUNNING, SUSPENDED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return false;
        }

        if self
            .state
            .compare_exchange(NOTIFIED, READY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }

        false
    }
}

/// Cheap, clonable reference to a coroutine's scheduling state.
///
/// Handles are what the registry hands out and what run queues hold.
/// They expose identity and status, never the body.
#[derive(Clone)]
pub struct CoroHandle {
    pub(crate) header: Arc<Header>,
}

impl CoroHandle {
    /// Returns the coroutine identifier.
    pub fn id(&self) -> CoroId {
        self.header.id
    }

    /// Returns the current scheduling status.
    pub fn status(&self) -> Status {
        self.header.status()
    }

    /// Returns whether the coroutine asked to run on the parallel scheduler.
    pub fn need_parallel(&self) -> bool {
        self.header.need_parallel()
    }

    /// Requests (or withdraws a request for) the parallel scheduler.
    ///
    /// The master checks the flag each time it dequeues the coroutine.
    pub fn set_need_parallel(&self, value: bool) {
        self.header.set_need_parallel(value);
    }

    pub(crate) fn is_daemon(&self) -> bool {
        self.header.daemon
    }
}

impl fmt::Debug for CoroHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoroHandle")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("need_parallel", &self.need_parallel())
            .finish()
    }
}

/// An owned coroutine: its scheduling state plus its execution context.
///
/// Created by the application, then handed to
/// [`Env::register`](crate::Env::register).
pub struct Coroutine {
    pub(crate) handle: CoroHandle,
    pub(crate) body: Body,
}

impl Coroutine {
    /// Creates a coroutine whose body is the given future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::with_body(Direct::new(future))
    }

    /// Creates a coroutine from any resumable body.
    pub fn with_body<R>(body: R) -> Self
    where
        R: Resume + 'static,
    {
        Self::build(Box::new(body), false)
    }

    /// Creates an internal coroutine that does not keep the master alive.
    pub(crate) fn daemon<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::build(Box::new(Direct::new(future)), true)
    }

    fn build(body: Body, daemon: bool) -> Self {
        Self {
            handle: CoroHandle {
                header: Arc::new(Header::new(daemon)),
            },
            body,
        }
    }

    /// Returns the coroutine identifier.
    pub fn id(&self) -> CoroId {
        self.handle.id()
    }

    /// Returns a handle to this coroutine.
    pub fn handle(&self) -> CoroHandle {
        self.handle.clone()
    }

    /// Splits the coroutine into its handle and body.
    pub(crate) fn into_parts(self) -> (CoroHandle, Body) {
        (self.handle, self.body)
    }

    pub(crate) fn from_parts(handle: CoroHandle, body: Body) -> Self {
        Self { handle, body }
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Coroutine").field(&self.handle).finish()
    }
}
