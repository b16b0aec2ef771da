//! Coroutine primitives.
//!
//! This module defines the unit of scheduling and everything needed to
//! switch into it:
//! - identity, status and the diversion flag ([`CoroHandle`]),
//! - the owned execution context ([`Resume`], [`Direct`], [`Coroutine`]),
//! - the state machine shared by both schedulers,
//! - wakers that route a parked coroutine back to the master,
//! - cooperative helpers used from inside coroutine bodies.

pub(crate) mod state;
pub(crate) mod waker;
pub(crate) mod yield_now;

mod core;

pub(crate) use self::core::{Body, Header};
pub use self::core::{CoroHandle, CoroId, Coroutine, Direct, Resume, Status};
