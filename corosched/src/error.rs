//! Error types.

use crate::coroutine::CoroId;

use std::io;
use thiserror::Error;

/// Errors reported by the environment and its schedulers.
#[derive(Debug, Error)]
pub enum Error {
    /// The schedule-back socket pair could not be created.
    ///
    /// This is the resource exhaustion case of environment setup: the
    /// process ran out of descriptors or socket buffers.
    #[error("failed to create the schedule-back channel")]
    Channel(#[source] io::Error),

    /// The event manager could not be initialized.
    #[error("failed to initialize the event manager")]
    Init(#[source] io::Error),

    /// The parallel worker thread could not be spawned.
    #[error("failed to spawn the parallel worker thread")]
    Spawn(#[source] io::Error),

    /// Waiting for readiness events failed.
    #[error("event polling failed")]
    Poll(#[source] io::Error),

    /// A coroutine with the same identifier is already registered.
    #[error("coroutine {0} is already registered")]
    AlreadyRegistered(CoroId),

    /// A coroutine could not be handed back to the master scheduler.
    #[error("coroutine {0} could not be scheduled back to the master")]
    Stranded(CoroId),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
