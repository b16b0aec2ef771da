//! # corosched
//!
//! **corosched** is a hybrid user-space coroutine scheduler. A single
//! cooperative scheduler, the master, runs lightweight coroutines on the
//! thread that drives it. When a coroutine must block, it asks to be
//! diverted: the master hands it to a parallel scheduler on a dedicated
//! worker thread, which runs the blocking segment and sends the coroutine
//! back through a schedule-back channel.
//!
//! It offers:
//!
//! - **Cooperative switching** on the master, in FIFO order
//! - **Diversion** of blocking segments with [`parallel`] and [`offload`]
//! - **Readiness waits and timers** with [`readable`], [`writable`] and [`sleep`]
//! - **Cross-thread wake-ups** routed back to the master
//! - A **registry** of live coroutines, looked up by [`CoroId`]
//!
//! Coroutines are `Send` futures: every `.await` that suspends is a
//! switch point, and the body moves between threads as a whole.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use corosched::Env;
//!
//! fn main() -> corosched::Result<()> {
//!     let mut env = Env::init()?;
//!
//!     env.spawn(async {
//!         println!("on the master");
//!
//!         // Blocking work runs on the parallel worker.
//!         let data = corosched::offload(|| std::fs::read("big.bin")).await;
//!
//!         println!("back on the master: {:?}", data.map(|d| d.len()));
//!     })?;
//!
//!     env.run()
//! }
//! ```
//!
//! Platform support: Linux (`epoll`).

mod coroutine;
mod error;
mod event;
mod registry;
mod sched;
mod utils;

pub mod env;

pub use coroutine::yield_now::{offload, parallel, yield_now};
pub use coroutine::{CoroHandle, CoroId, Coroutine, Direct, Resume, Status};
pub use env::{Env, EnvBuilder, Stats, StopHandle, current, spawn, stop};
pub use error::{Error, Result};
pub use event::future::{Readiness, Sleep, readable, sleep, writable};
pub use sched::Step;
