//! Environment lifecycle.
//!
//! An [`Env`] owns everything the schedulers need: the master and its run
//! queue, the registry, the event manager, the parallel queue and the
//! schedule-back channel. It is created with [`Env::init`] or an
//! [`EnvBuilder`], driven with [`Env::run`] or [`Env::step`], and stopped
//! with [`Env::stop`] from the owning thread, a [`StopHandle`] on any other
//! thread, or [`stop`] from inside a coroutine.

mod builder;

pub(crate) mod context;
pub(crate) mod shared;
pub(crate) mod stats;

pub use builder::EnvBuilder;
pub use stats::Stats;

use crate::coroutine::{CoroHandle, CoroId, Coroutine};
use crate::error::{Error, Result};
use crate::event::EventManager;
use crate::sched::master::Master;
use crate::sched::parallel::{ParallelQueue, ParallelScheduler};
use crate::sched::{Driver, Step, adapter, handoff};
use shared::Shared;

use log::{debug, error, info};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A hybrid scheduling environment: one cooperative master scheduler on
/// the thread that runs it, plus one parallel worker thread.
///
/// The environment is bound to the thread that creates it; use a
/// [`StopHandle`] to control it from elsewhere. Dropping it stops both
/// schedulers and joins the worker.
///
/// # Examples
///
/// ```rust,ignore
/// let mut env = Env::init()?;
///
/// env.spawn(async {
///     corosched::yield_now().await;
///     let sum = corosched::offload(|| expensive()).await;
///     println!("{sum}");
/// })?;
///
/// env.run()?;
/// ```
pub struct Env {
    master: Rc<Master>,
    shared: Arc<Shared>,

    /// Longest single park of the worker on an empty queue.
    park_timeout: Duration,

    /// Parallel worker thread, once `run` started it.
    worker: Option<JoinHandle<()>>,
}

impl Env {
    /// Creates an environment with the default configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Channel`] if the schedule-back socket pair cannot be
    /// created, [`Error::Init`] if the event manager cannot.
    pub fn init() -> Result<Self> {
        EnvBuilder::new().build()
    }

    pub(crate) fn with_builder(builder: EnvBuilder) -> Result<Self> {
        let (handoff, inbox) = handoff::channel(builder.handoff_capacity)?;
        let events = EventManager::new(builder.event_capacity).map_err(Error::Init)?;

        let shared = Arc::new(Shared::new(
            ParallelQueue::new(builder.parallel_queue_capacity),
            handoff,
            events.waker(),
            builder.divert_backoff,
        ));

        let master = Rc::new(Master::new(
            shared.clone(),
            events,
            builder.event_capacity,
            builder.exit_when_idle,
            builder.divert_backoff,
        ));

        master.register(Coroutine::daemon(adapter::schedule_back(inbox)))?;

        debug!("environment initialized");

        Ok(Self {
            master,
            shared,
            park_timeout: builder.park_timeout,
            worker: None,
        })
    }

    /// Starts the parallel worker, if not started yet, then hands the
    /// calling thread over to the master scheduler.
    ///
    /// Returns once the master stops: after [`stop`](Self::stop), or when
    /// no application coroutine is left (unless disabled with
    /// [`EnvBuilder::exit_when_idle`]). May be called again afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::Spawn`] if the worker thread cannot be created,
    /// [`Error::Poll`] if waiting for events fails.
    pub fn run(&mut self) -> Result<()> {
        if self.worker.is_none() {
            let scheduler = ParallelScheduler::new(self.shared.clone(), self.park_timeout);

            let worker = thread::Builder::new()
                .name("corosched-parallel".into())
                .spawn(move || {
                    if let Err(e) = scheduler.drive() {
                        error!("parallel scheduler failed: {e}");
                    }
                })
                .map_err(Error::Spawn)?;

            info!("parallel worker thread started");
            self.worker = Some(worker);
        }

        info!("master environment started");

        let master = self.master.clone();
        context::enter_master(master.clone(), || master.drive())
    }

    /// Runs at most one coroutine on the calling thread.
    ///
    /// Coroutines flagged for the parallel scheduler are diverted on the
    /// way. They only make progress once [`run`](Self::run) started the
    /// worker.
    pub fn step(&self) -> Step {
        let master = self.master.clone();
        context::enter_master(master.clone(), || master.step())
    }

    /// Waits up to `timeout` (forever if `None`) for readiness events,
    /// timers and schedule-backs, and queues the coroutines they wake.
    ///
    /// Returns the number of coroutines woken. Never blocks once the
    /// environment is stopped.
    pub fn poll_events(&self, timeout: Option<Duration>) -> Result<usize> {
        let master = self.master.clone();
        context::enter_master(master.clone(), || master.poll_events(timeout))
    }

    /// Stops both schedulers and the event manager.
    ///
    /// Cooperative: the running coroutine finishes its current switch
    /// first. Idempotent, and valid before [`run`](Self::run).
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Returns a handle that stops this environment from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
        }
    }

    /// Registers a coroutine and queues it on the master.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] if a coroutine with the same id is
    /// registered.
    pub fn register(&self, coro: Coroutine) -> Result<CoroHandle> {
        self.master.register(coro)
    }

    /// Creates a coroutine from `future`, registers it and queues it.
    pub fn spawn<F>(&self, future: F) -> Result<CoroHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.register(Coroutine::new(future))
    }

    /// Looks a live coroutine up by id.
    pub fn get(&self, id: CoroId) -> Option<CoroHandle> {
        self.master.lookup(id)
    }

    /// Returns the coroutine the master is switched into, if any.
    pub fn current(&self) -> Option<CoroHandle> {
        self.master.current()
    }

    /// Returns a snapshot of the scheduler counters.
    pub fn stats(&self) -> Stats {
        self.shared.counters.snapshot()
    }

    /// Returns the coroutines the worker failed to schedule back.
    pub fn stranded(&self) -> Vec<CoroId> {
        self.shared.stranded()
    }
}

impl Drop for Env {
    /// Stops the schedulers, joins the worker and releases coroutines
    /// still waiting for it.
    fn drop(&mut self) {
        self.shared.stop();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("parallel worker thread panicked");
            }
        }

        let released = self.shared.parallel.clear();
        if released > 0 {
            debug!("released {released} coroutines left in the parallel queue");
        }
    }
}

/// Stops an [`Env`] from any thread.
///
/// Cheap to clone; stopping is idempotent.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Same as [`Env::stop`].
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Returns whether the environment was asked to stop.
    pub fn is_stopped(&self) -> bool {
        self.shared.master_stopped()
    }
}

/// Spawns a coroutine from inside the master scheduler.
///
/// Returns `None` when called anywhere else, including on the parallel
/// worker.
pub fn spawn<F>(future: F) -> Option<CoroHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    context::with_master(|master| master.register(Coroutine::new(future)).ok()).flatten()
}

/// Returns the id of the coroutine running on the current thread, on
/// either scheduler.
pub fn current() -> Option<CoroId> {
    context::with_current(|coro| coro.id())
}

/// Stops the environment the calling coroutine runs in.
///
/// Works on both schedulers; does nothing outside a scheduler.
pub fn stop() {
    if let Some(shared) = context::shared() {
        shared.stop();
    }
}
