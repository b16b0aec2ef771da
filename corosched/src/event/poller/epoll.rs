//! Linux `epoll`-based poller implementation.
//!
//! Responsibilities:
//! - Register file descriptors with read/write interests
//! - Block waiting for I/O readiness
//! - Wake up when another thread asks the environment to stop
//! - Support timer-driven wakeups via poll timeouts

use super::common::{Event, Interest, Waker};
use super::platform::{sys_close, sys_read, sys_write};

use libc::{
    EFD_CLOEXEC, EFD_NONBLOCK, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD,
    EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
    eventfd,
};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Reserved token used internally for the wake-up event.
///
/// Registered descriptors use their own value as token, which is never
/// negative, so `u64::MAX` cannot collide.
const WAKE_TOKEN: u64 = u64::MAX;

/// Linux `epoll` poller.
///
/// This poller owns:
/// - an `epoll` instance,
/// - an internal `eventfd` used as a wake-up signal,
/// - a reusable event buffer.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,

    /// Waker wrapping the internal eventfd.
    waker: Arc<Waker>,
}

impl Waker {
    /// Wake the poller.
    ///
    /// This writes to the internal `eventfd`, causing `epoll_wait`
    /// to return immediately.
    pub(crate) fn wake(&self) {
        sys_write(self.0, &1u64.to_ne_bytes());
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        sys_close(self.0);
    }
}

impl EpollPoller {
    /// Create a new `EpollPoller` able to report `capacity` events per poll.
    ///
    /// This:
    /// - creates the epoll instance,
    /// - creates a non-blocking `eventfd`,
    /// - registers the eventfd into epoll as a persistent wake source.
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let wake_fd = unsafe { eventfd(0, EFD_NONBLOCK | EFD_CLOEXEC) };
        if wake_fd < 0 {
            let err = io::Error::last_os_error();
            sys_close(epoll);
            return Err(err);
        }

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        let rc = unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, wake_fd, &mut event) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            sys_close(wake_fd);
            sys_close(epoll);
            return Err(err);
        }

        Ok(Self {
            epoll,
            events: Vec::with_capacity(capacity.max(1)),
            waker: Arc::new(Waker(wake_fd)),
        })
    }

    /// Return the poller waker.
    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    /// Register a file descriptor with the poller.
    pub(crate) fn register(&self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_ADD, fd, interest)
    }

    /// Update interest flags for an already registered descriptor.
    pub(crate) fn reregister(&self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_MOD, fd, interest)
    }

    /// Remove a file descriptor from the poller.
    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn ctl(&self, op: i32, fd: RawFd, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: fd as u64,
        };

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Poll for I/O readiness events.
    ///
    /// Blocks until:
    /// - at least one file descriptor becomes ready,
    /// - the wake event is triggered,
    /// - or the optional timeout expires.
    ///
    /// An interrupted wait returns with no events.
    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        // Round up so a sub-millisecond deadline does not turn into a busy loop.
        let timeout_ms = timeout
            .map(|t| t.as_micros().div_ceil(1000).min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let token = ev.u64;
            let flags = ev.events;

            // Wake-up event
            if token == WAKE_TOKEN {
                let mut buf = [0u8; 8];
                sys_read(self.waker.0, &mut buf);
                continue;
            }

            let failed = flags & ((EPOLLERR | EPOLLHUP) as u32) != 0;
            let readable = failed || flags & (EPOLLIN as u32) != 0;
            let writable = failed || flags & (EPOLLOUT as u32) != 0;

            events.push(Event {
                token: token as RawFd,
                readable,
                writable,
            });
        }

        unsafe {
            self.events.set_len(0);
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        sys_close(self.epoll);
    }
}
