//! Schedule-back channel.
//!
//! The parallel worker returns coroutines to the master through a bounded
//! typed channel. Each send is followed by a byte on a socket pair, the
//! doorbell, whose read end the master's event manager watches. The
//! channel carries whole coroutines, so a record is never torn.

use crate::coroutine::{CoroHandle, CoroId, Coroutine};
use crate::error::{Error, Result};
use crate::event::poller::platform::{sys_close, sys_read, sys_send, sys_socketpair};

use log::warn;
use std::io;
use std::os::fd::RawFd;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

/// A record travelling back to the master.
pub(crate) enum Handback {
    /// A diverted coroutine whose blocking segment ended, body included.
    Returned(Coroutine),

    /// A parked coroutine woken from a thread other than the master's.
    Woken(CoroHandle),
}

impl Handback {
    pub(crate) fn id(&self) -> CoroId {
        match self {
            Handback::Returned(coro) => coro.id(),
            Handback::Woken(handle) => handle.id(),
        }
    }
}

/// Sending side: usable from any thread.
pub(crate) struct Handoff {
    sender: SyncSender<Handback>,

    /// Write end of the doorbell.
    bell: RawFd,
}

/// Receiving side: owned by the schedule-back adapter.
pub(crate) struct Inbox {
    receiver: Receiver<Handback>,

    /// Read end of the doorbell.
    fd: RawFd,
}

/// Creates the channel and its doorbell.
///
/// Fails with [`Error::Channel`] if the socket pair cannot be created.
pub(crate) fn channel(capacity: usize) -> Result<(Handoff, Inbox)> {
    let (read_fd, write_fd) = sys_socketpair().map_err(Error::Channel)?;
    let (sender, receiver) = mpsc::sync_channel(capacity);

    Ok((
        Handoff {
            sender,
            bell: write_fd,
        },
        Inbox {
            receiver,
            fd: read_fd,
        },
    ))
}

impl Handoff {
    pub(crate) fn try_send(&self, record: Handback) -> std::result::Result<(), TrySendError<Handback>> {
        self.sender.try_send(record)
    }

    /// Makes the doorbell readable.
    ///
    /// A full socket buffer means the doorbell is already ringing, which
    /// is all the reader needs.
    pub(crate) fn ring(&self) {
        loop {
            if sys_send(self.bell, &[1]) >= 0 {
                return;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return,
                _ => {
                    warn!("failed to ring the schedule-back doorbell: {err}");
                    return;
                }
            }
        }
    }
}

impl Drop for Handoff {
    fn drop(&mut self) {
        sys_close(self.bell);
    }
}

impl Inbox {
    /// Read end of the doorbell, to register with the event manager.
    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    /// Consumes every pending doorbell byte.
    ///
    /// Interrupted reads are retried. A zero-length read means the write
    /// end is gone and is reported as [`io::ErrorKind::UnexpectedEof`].
    pub(crate) fn drain_doorbell(&self) -> io::Result<()> {
        let mut buffer = [0u8; 64];

        loop {
            let n = sys_read(self.fd, &mut buffer);

            if n > 0 {
                continue;
            }

            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "schedule-back doorbell closed",
                ));
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(()),
                _ => return Err(err),
            }
        }
    }

    /// Takes every record currently in the channel, without blocking.
    pub(crate) fn drain(&self) -> impl Iterator<Item = Handback> + '_ {
        self.receiver.try_iter()
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        sys_close(self.fd);
    }
}
