use super::poller::Interest;
use crate::env::context;
use crate::utils::Key;

use std::future::Future;
use std::io;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

/// Waits until `fd` becomes readable.
///
/// The wait is registered with the master's event manager, and the
/// coroutine is parked until the descriptor is ready. It does not read
/// anything; use a non-blocking read afterwards.
///
/// # Errors
///
/// Fails with [`io::ErrorKind::Unsupported`] when awaited outside the
/// master scheduler, e.g. on the parallel worker, and with the poller's
/// error if the descriptor cannot be watched.
///
/// # Examples
///
/// ```rust,ignore
/// env.spawn(async move {
///     corosched::readable(stream.as_raw_fd()).await.unwrap();
///     let n = stream.read(&mut buf).unwrap();
/// });
/// ```
pub fn readable(fd: RawFd) -> Readiness {
    Readiness::new(fd, Interest::READ)
}

/// Waits until `fd` becomes writable.
///
/// See [`readable`] for the rules that apply.
pub fn writable(fd: RawFd) -> Readiness {
    Readiness::new(fd, Interest::WRITE)
}

/// A one-shot readiness wait on a raw file descriptor.
///
/// Errors and hang-ups on the descriptor complete the wait as well, so
/// the following I/O call gets to report them.
pub struct Readiness {
    fd: RawFd,
    interest: Interest,

    /// Registration with the event manager, once the first poll made it.
    key: Option<Key>,
}

impl Readiness {
    fn new(fd: RawFd, interest: Interest) -> Self {
        Self {
            fd,
            interest,
            key: None,
        }
    }
}

impl Future for Readiness {
    type Output = io::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let polled = context::with_master(|master| -> io::Result<bool> {
            let mut events = master.events();

            match this.key {
                None => {
                    let key = events.register(this.fd, this.interest, cx.waker().clone())?;
                    this.key = Some(key);
                    Ok(false)
                }
                Some(key) if events.is_registered(key) => {
                    events.update_waker(key, cx.waker());
                    Ok(false)
                }
                Some(_) => {
                    this.key = None;
                    Ok(true)
                }
            }
        });

        match polled {
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "readiness waits only run on the master scheduler",
            ))),
            Some(Err(e)) => Poll::Ready(Err(e)),
            Some(Ok(true)) => Poll::Ready(Ok(())),
            Some(Ok(false)) => Poll::Pending,
        }
    }
}

impl Drop for Readiness {
    /// Withdraws a wait that has not fired yet.
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            context::with_master(|master| master.events().remove(key));
        }
    }
}

/// Creates a future that completes after the given duration.
///
/// On the master, the coroutine is parked on a timer and the others keep
/// running. On the parallel worker, where blocking is the point, the
/// thread simply sleeps.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// corosched::sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::new(duration)
}

/// A future that completes once a specific deadline is reached.
///
/// The timer is registered on first poll and cancelled if the future is
/// dropped before completion.
pub struct Sleep {
    /// Absolute point in time when the sleep completes.
    deadline: Instant,

    /// Whether the timer has already been registered.
    registered: bool,

    /// Cancellation flag shared with the event manager.
    cancelled: Arc<AtomicBool>,
}

impl Sleep {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            registered: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let now = Instant::now();
        if now >= this.deadline {
            return Poll::Ready(());
        }

        if this.registered {
            return Poll::Pending;
        }

        let deadline = this.deadline;
        let cancelled = this.cancelled.clone();
        let armed = context::with_master(|master| {
            master
                .events()
                .add_timer(deadline, cx.waker().clone(), cancelled)
        })
        .is_some();

        if !armed {
            thread::sleep(deadline - now);
            return Poll::Ready(());
        }

        this.registered = true;
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
