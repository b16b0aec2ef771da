use corosched::{Env, EnvBuilder, StopHandle, Step, parallel, yield_now};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_stop_before_run_is_idempotent() {
    let mut env = Env::init().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let runs_clone = runs.clone();
    env.spawn(async move {
        runs_clone.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    env.stop();
    env.stop();
    env.stop_handle().stop();

    env.run().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(env.step(), Step::Idle);
}

#[test]
fn test_stop_from_coroutine() {
    let mut env = EnvBuilder::new().exit_when_idle(false).build().unwrap();
    let after = Arc::new(AtomicUsize::new(0));

    env.spawn(async {
        corosched::stop();
    })
    .unwrap();

    let after_clone = after.clone();
    env.spawn(async move {
        loop {
            after_clone.fetch_add(1, Ordering::SeqCst);
            yield_now().await;
        }
    })
    .unwrap();

    env.run().unwrap();

    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert!(env.stop_handle().is_stopped());
}

#[test]
fn test_stop_from_worker() {
    let mut env = EnvBuilder::new().exit_when_idle(false).build().unwrap();
    let stopped = Arc::new(AtomicBool::new(false));

    let stopped_clone = stopped.clone();
    env.spawn(async move {
        parallel().await;
        stopped_clone.store(true, Ordering::SeqCst);
        corosched::stop();
    })
    .unwrap();

    env.run().unwrap();

    assert!(stopped.load(Ordering::SeqCst));
}

#[test]
fn test_stop_handle_wakes_sleeping_master() {
    let mut env = EnvBuilder::new().exit_when_idle(false).build().unwrap();
    let handle = env.stop_handle();

    env.spawn(async {
        corosched::sleep(Duration::from_secs(30)).await;
    })
    .unwrap();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.stop();
        handle.stop();
    });

    let started = Instant::now();
    env.run().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    stopper.join().unwrap();
}

#[test]
fn test_idle_env_without_exit_waits_for_stop() {
    let mut env = EnvBuilder::new().exit_when_idle(false).build().unwrap();
    let handle = env.stop_handle();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.stop();
    });

    let started = Instant::now();
    env.run().unwrap();

    assert!(started.elapsed() >= Duration::from_millis(20));
    stopper.join().unwrap();
}

#[test]
fn test_stopped_poll_events_does_not_block() {
    let env = Env::init().unwrap();
    env.stop();

    let started = Instant::now();
    env.poll_events(None).unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_drop_after_run_joins_worker() {
    let mut env = Env::init().unwrap();

    env.spawn(async {
        parallel().await;
    })
    .unwrap();

    env.run().unwrap();
    drop(env);
}

#[test]
fn test_stop_handle_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync + Clone>() {}
    assert_send_sync::<StopHandle>();
}
