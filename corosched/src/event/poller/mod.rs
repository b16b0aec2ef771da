//! Platform-specific I/O poller abstraction.
//!
//! The poller is used by the event manager to:
//! - wait for I/O readiness events,
//! - be woken from another thread when the environment stops,
//! - bound its wait by the nearest timer deadline.
//!
//! Only the Linux `epoll` backend exists for now.

pub(crate) mod common;

pub(crate) use common::{Event, Interest, Waker};

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(not(target_os = "linux"))]
compile_error!("corosched only supports Linux (epoll) for now");

#[cfg(unix)]
pub(crate) mod unix;

#[cfg(unix)]
pub(crate) use unix as platform;
