//! Event manager.
//!
//! Tells the master scheduler when a parked coroutine can make progress:
//! - readiness of raw file descriptors (`epoll`),
//! - timer expiry,
//! - wake-ups from other threads, through the poller waker.
//!
//! The schedule-back adapter relies on it to sleep until the worker
//! rings the doorbell.

mod manager;
mod timer;

pub(crate) mod future;
pub(crate) mod poller;

pub(crate) use manager::EventManager;
