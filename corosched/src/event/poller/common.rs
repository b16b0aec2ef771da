use std::os::fd::RawFd;

/// Readiness conditions a wait is interested in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

impl Interest {
    pub(crate) const READ: Interest = Interest {
        read: true,
        write: false,
    };

    pub(crate) const WRITE: Interest = Interest {
        read: false,
        write: true,
    };

    pub(crate) fn union(self, other: Interest) -> Interest {
        Interest {
            read: self.read || other.read,
            write: self.write || other.write,
        }
    }

    pub(crate) fn is_empty(self) -> bool {
        !self.read && !self.write
    }
}

/// An I/O event reported by the poller.
///
/// The token is the registered file descriptor; the flags tell which
/// readiness conditions were observed. Errors and hang-ups are reported
/// as both readable and writable so every waiter gets to see them.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Event {
    pub(crate) token: RawFd,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

/// Cross-thread handle that interrupts a blocking poll.
pub(crate) struct Waker(pub(crate) RawFd);

unsafe impl Send for Waker {}
unsafe impl Sync for Waker {}
