use corosched::{Env, parallel, readable, sleep, writable};
use std::future::Future;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_sleep_waits_at_least_duration() {
    let mut env = Env::init().unwrap();
    let elapsed = Arc::new(Mutex::new(None));

    let elapsed_clone = elapsed.clone();
    env.spawn(async move {
        let start = Instant::now();
        sleep(Duration::from_millis(50)).await;
        *elapsed_clone.lock().unwrap() = Some(start.elapsed());
    })
    .unwrap();

    env.run().unwrap();

    let elapsed = elapsed.lock().unwrap().unwrap();
    assert!(
        elapsed >= Duration::from_millis(50),
        "Sleep should wait at least the specified duration"
    );
}

#[test]
fn test_sleepers_wake_in_deadline_order() {
    let mut env = Env::init().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (name, ms) in [("slow", 60), ("fast", 10), ("medium", 30)] {
        let order = order.clone();
        env.spawn(async move {
            sleep(Duration::from_millis(ms)).await;
            order.lock().unwrap().push(name);
        })
        .unwrap();
    }

    env.run().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["fast", "medium", "slow"]);
}

#[test]
fn test_sleep_on_worker_blocks_the_worker() {
    let mut env = Env::init().unwrap();
    let name = Arc::new(Mutex::new(None));

    let name_clone = name.clone();
    env.spawn(async move {
        parallel().await;
        let start = Instant::now();
        sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
        *name_clone.lock().unwrap() = thread::current().name().map(String::from);
    })
    .unwrap();

    env.run().unwrap();

    assert_eq!(name.lock().unwrap().as_deref(), Some("corosched-parallel"));
}

#[test]
fn test_readable_wakes_on_data() {
    let mut env = Env::init().unwrap();
    let (mut reader, mut writer) = UnixStream::pair().unwrap();
    reader.set_nonblocking(true).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));

    let received_clone = received.clone();
    env.spawn(async move {
        readable(reader.as_raw_fd()).await.unwrap();

        let mut buffer = [0u8; 16];
        let n = reader.read(&mut buffer).unwrap();
        received_clone.lock().unwrap().extend_from_slice(&buffer[..n]);
    })
    .unwrap();

    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        writer.write_all(b"ping").unwrap();
        writer
    });

    env.run().unwrap();

    assert_eq!(*received.lock().unwrap(), b"ping");
    drop(sender.join().unwrap());
}

#[test]
fn test_writable_completes_on_fresh_socket() {
    let mut env = Env::init().unwrap();
    let (a, _b) = UnixStream::pair().unwrap();
    let done = Arc::new(Mutex::new(false));

    let done_clone = done.clone();
    env.spawn(async move {
        writable(a.as_raw_fd()).await.unwrap();
        *done_clone.lock().unwrap() = true;
    })
    .unwrap();

    env.run().unwrap();

    assert!(*done.lock().unwrap());
}

#[test]
fn test_readiness_on_worker_is_unsupported() {
    let mut env = Env::init().unwrap();
    let (a, _b) = UnixStream::pair().unwrap();
    let kind = Arc::new(Mutex::new(None));

    let kind_clone = kind.clone();
    env.spawn(async move {
        parallel().await;
        let result = readable(a.as_raw_fd()).await;
        *kind_clone.lock().unwrap() = result.err().map(|e| e.kind());
    })
    .unwrap();

    env.run().unwrap();

    assert_eq!(*kind.lock().unwrap(), Some(io::ErrorKind::Unsupported));
}

#[test]
fn test_poll_events_times_out_without_events() {
    let env = Env::init().unwrap();

    let started = Instant::now();
    let woken = env.poll_events(Some(Duration::from_millis(10))).unwrap();

    assert_eq!(woken, 0);
    assert!(started.elapsed() >= Duration::from_millis(5));
}

/// A one-shot signal completed from a plain thread.
#[derive(Default)]
struct Signal {
    done: bool,
    waker: Option<Waker>,
}

struct WaitSignal(Arc<Mutex<Signal>>);

impl Future for WaitSignal {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut signal = self.0.lock().unwrap();

        if signal.done {
            return Poll::Ready(());
        }

        signal.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[test]
fn test_wake_from_foreign_thread() {
    let mut env = Env::init().unwrap();
    let signal = Arc::new(Mutex::new(Signal::default()));
    let resumed_on = Arc::new(Mutex::new(None));

    let (signal_clone, resumed_clone) = (signal.clone(), resumed_on.clone());
    let handle = env
        .spawn(async move {
            WaitSignal(signal_clone).await;
            *resumed_clone.lock().unwrap() = Some(thread::current().id());
        })
        .unwrap();

    let waker_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));

        let waker = {
            let mut signal = signal.lock().unwrap();
            signal.done = true;
            signal.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    });

    env.run().unwrap();
    waker_thread.join().unwrap();

    assert_eq!(*resumed_on.lock().unwrap(), Some(thread::current().id()));
    assert_eq!(handle.status(), corosched::Status::Exited);
    assert_eq!(env.stats().diverted, 0);
}
