use super::poller::{Event, Interest, Poller, Waker as PollWaker};
use super::timer::TimerEntry;
use crate::utils::{Key, Slab};

use log::debug;
use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;
use std::time::{Duration, Instant};

/// A one-shot readiness wait.
struct Waiting {
    fd: RawFd,
    interest: Interest,
    waker: Waker,
}

impl Waiting {
    fn fired_by(&self, event: &Event) -> bool {
        (self.interest.read && event.readable) || (self.interest.write && event.writable)
    }
}

/// Per-descriptor aggregation of waits.
///
/// The poller sees one registration per descriptor whose interest is the
/// union of every pending wait on it.
struct Source {
    interest: Interest,
    waits: Vec<Key>,
}

/// Notifies the master scheduler of I/O readiness and timer expiry.
///
/// Lives on the master thread. Waits are one-shot: a wait that fires is
/// removed before its waker runs, so the waiting coroutine finds it gone
/// when it is resumed. Only the poller waker crosses threads.
pub(crate) struct EventManager {
    poller: Poller,
    waits: Slab<Waiting>,
    sources: HashMap<RawFd, Source>,
    timers: BinaryHeap<TimerEntry>,
    events: Vec<Event>,
}

impl EventManager {
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poller: Poller::new(capacity)?,
            waits: Slab::new(capacity),
            sources: HashMap::new(),
            timers: BinaryHeap::new(),
            events: Vec::with_capacity(capacity),
        })
    }

    /// Returns the handle used to interrupt a blocking poll from any thread.
    pub(crate) fn waker(&self) -> Arc<PollWaker> {
        self.poller.waker()
    }

    /// Registers a wait for `interest` on `fd`.
    pub(crate) fn register(&mut self, fd: RawFd, interest: Interest, waker: Waker) -> io::Result<Key> {
        match self.sources.get_mut(&fd) {
            Some(source) => {
                let merged = source.interest.union(interest);
                if merged != source.interest {
                    self.poller.reregister(fd, merged)?;
                    source.interest = merged;
                }
            }
            None => {
                self.poller.register(fd, interest)?;
                self.sources.insert(
                    fd,
                    Source {
                        interest,
                        waits: Vec::new(),
                    },
                );
            }
        }

        let key = self.waits.insert(Waiting {
            fd,
            interest,
            waker,
        });

        if let Some(source) = self.sources.get_mut(&fd) {
            source.waits.push(key);
        }

        Ok(key)
    }

    /// Returns whether the wait is still pending.
    pub(crate) fn is_registered(&self, key: Key) -> bool {
        self.waits.get(key).is_some()
    }

    /// Replaces the waker of a pending wait.
    pub(crate) fn update_waker(&mut self, key: Key, waker: &Waker) {
        if let Some(wait) = self.waits.get_mut(key) {
            if !wait.waker.will_wake(waker) {
                wait.waker = waker.clone();
            }
        }
    }

    /// Removes a pending wait without waking it.
    ///
    /// Removing a wait that already fired is a no-op.
    pub(crate) fn remove(&mut self, key: Key) {
        if let Some(wait) = self.waits.remove(key) {
            self.detach(wait.fd, key);
        }
    }

    /// Unlinks a removed wait from its descriptor and narrows the poller
    /// registration to what the remaining waits need.
    fn detach(&mut self, fd: RawFd, key: Key) {
        let Some(source) = self.sources.get_mut(&fd) else {
            return;
        };

        source.waits.retain(|k| *k != key);

        if source.waits.is_empty() {
            self.sources.remove(&fd);
            // The descriptor may already be closed, which removes it from
            // the epoll set on its own.
            if let Err(e) = self.poller.deregister(fd) {
                debug!("deregister fd {fd}: {e}");
            }
            return;
        }

        let interest = source
            .waits
            .iter()
            .filter_map(|k| self.waits.get(*k))
            .fold(Interest::default(), |acc, wait| acc.union(wait.interest));

        if interest != source.interest && !interest.is_empty() {
            match self.poller.reregister(fd, interest) {
                Ok(()) => source.interest = interest,
                Err(e) => debug!("reregister fd {fd}: {e}"),
            }
        }
    }

    /// Schedules `waker` to be woken at `deadline`, unless `cancelled` is
    /// set by then.
    pub(crate) fn add_timer(&mut self, deadline: Instant, waker: Waker, cancelled: Arc<AtomicBool>) {
        self.timers.push(TimerEntry {
            deadline,
            waker,
            cancelled,
        });
    }

    fn prune_timers(&mut self) {
        while let Some(top) = self.timers.peek() {
            if !top.cancelled.load(Ordering::Acquire) {
                break;
            }
            self.timers.pop();
        }
    }

    /// Waits for readiness events and expired timers.
    ///
    /// Blocks until an event, the nearest timer, `timeout` or a wake from
    /// another thread, whichever comes first. A stopped manager never
    /// blocks. Returns the wakers of every wait and timer that fired; the
    /// caller wakes them once it no longer borrows the manager.
    pub(crate) fn poll(&mut self, timeout: Option<Duration>, stopped: bool) -> io::Result<Vec<Waker>> {
        self.prune_timers();

        let now = Instant::now();
        let next_timer = self
            .timers
            .peek()
            .map(|entry| entry.deadline.saturating_duration_since(now));

        let timeout = if stopped {
            Some(Duration::ZERO)
        } else {
            match (timeout, next_timer) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        };

        let mut events = std::mem::take(&mut self.events);
        let polled = self.poller.poll(&mut events, timeout);

        let mut woken = Vec::new();

        if polled.is_ok() {
            for event in &events {
                self.dispatch(event, &mut woken);
            }
        }

        self.events = events;
        polled?;

        let now = Instant::now();
        while let Some(top) = self.timers.peek() {
            if top.deadline > now {
                break;
            }

            if let Some(entry) = self.timers.pop() {
                if !entry.cancelled.load(Ordering::Acquire) {
                    woken.push(entry.waker);
                }
            }
        }

        Ok(woken)
    }

    /// Removes every wait on the event's descriptor that the event fires.
    fn dispatch(&mut self, event: &Event, woken: &mut Vec<Waker>) {
        let Some(source) = self.sources.get(&event.token) else {
            return;
        };

        let fired: Vec<Key> = source
            .waits
            .iter()
            .copied()
            .filter(|k| self.waits.get(*k).is_some_and(|wait| wait.fired_by(event)))
            .collect();

        for key in fired {
            if let Some(wait) = self.waits.remove(key) {
                self.detach(wait.fd, key);
                woken.push(wait.waker);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::poller::platform::{sys_close, sys_socketpair, sys_write};

    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    struct Counter(AtomicUsize);

    impl Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (Arc<Counter>, Waker) {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        (counter, waker)
    }

    #[test]
    fn readiness_wait_fires_once() {
        let mut manager = EventManager::new(8).unwrap();
        let (read_fd, write_fd) = sys_socketpair().unwrap();
        let (count, waker) = counter();

        let key = manager.register(read_fd, Interest::READ, waker).unwrap();
        assert!(manager.is_registered(key));

        assert_eq!(sys_write(write_fd, b"x"), 1);

        let woken = manager.poll(Some(Duration::from_millis(100)), false).unwrap();
        assert_eq!(woken.len(), 1);
        woken.into_iter().for_each(Waker::wake);

        assert_eq!(count.0.load(Ordering::SeqCst), 1);
        assert!(!manager.is_registered(key));
        assert!(manager.sources.is_empty());

        sys_close(read_fd);
        sys_close(write_fd);
    }

    #[test]
    fn waits_on_one_descriptor_share_a_registration() {
        let mut manager = EventManager::new(8).unwrap();
        let (read_fd, write_fd) = sys_socketpair().unwrap();
        let (_, first) = counter();
        let (_, second) = counter();

        let a = manager.register(read_fd, Interest::READ, first).unwrap();
        let b = manager.register(read_fd, Interest::WRITE, second).unwrap();

        // The socket is writable right away; only the write wait fires.
        let woken = manager.poll(Some(Duration::from_millis(100)), false).unwrap();
        assert_eq!(woken.len(), 1);
        assert!(manager.is_registered(a));
        assert!(!manager.is_registered(b));

        manager.remove(a);
        assert!(!manager.is_registered(a));
        assert!(manager.sources.is_empty());

        sys_close(read_fd);
        sys_close(write_fd);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut manager = EventManager::new(8).unwrap();
        let (late, late_waker) = counter();
        let (early, early_waker) = counter();

        let now = Instant::now();
        manager.add_timer(
            now + Duration::from_millis(200),
            late_waker,
            Arc::new(AtomicBool::new(false)),
        );
        manager.add_timer(
            now + Duration::from_millis(5),
            early_waker,
            Arc::new(AtomicBool::new(false)),
        );

        std::thread::sleep(Duration::from_millis(10));
        let woken = manager.poll(Some(Duration::ZERO), false).unwrap();
        assert_eq!(woken.len(), 1);
        woken.into_iter().for_each(Waker::wake);
        assert_eq!(early.0.load(Ordering::SeqCst), 1);
        assert_eq!(late.0.load(Ordering::SeqCst), 0);

        while late.0.load(Ordering::SeqCst) == 0 {
            let woken = manager.poll(None, false).unwrap();
            woken.into_iter().for_each(Waker::wake);
        }
        assert!(now.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut manager = EventManager::new(8).unwrap();
        let (count, waker) = counter();
        let cancelled = Arc::new(AtomicBool::new(false));

        manager.add_timer(Instant::now(), waker, cancelled.clone());
        cancelled.store(true, Ordering::Release);

        let woken = manager.poll(Some(Duration::ZERO), false).unwrap();
        assert!(woken.is_empty());
        assert_eq!(count.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stopped_manager_does_not_block() {
        let mut manager = EventManager::new(8).unwrap();
        let started = Instant::now();

        let woken = manager.poll(None, true).unwrap();

        assert!(woken.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
