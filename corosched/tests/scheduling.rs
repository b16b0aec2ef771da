use corosched::{CoroId, Env, Status, Step, yield_now};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Steps until the master is idle and returns the coroutines it ran.
fn drain(env: &Env) -> Vec<CoroId> {
    let mut ran = Vec::new();

    while let Step::Ran(id) = env.step() {
        ran.push(id);
    }

    ran
}

#[test]
fn test_fifo_order() {
    let mut env = Env::init().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["A", "B", "C"] {
        let order = order.clone();
        env.spawn(async move {
            order.lock().unwrap().push(name);
        })
        .unwrap();
    }

    env.run().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
}

#[test]
fn test_step_resumes_each_once_in_order() {
    let env = Env::init().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let ids: Vec<_> = (0..3)
        .map(|_| {
            let runs = runs.clone();
            env.spawn(async move {
                runs.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
            .id()
        })
        .collect();

    let ran: Vec<_> = drain(&env).into_iter().filter(|id| ids.contains(id)).collect();

    assert_eq!(ran, ids);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[test]
fn test_empty_queue_step_is_idle() {
    let env = Env::init().unwrap();

    // Let the internal coroutines settle first.
    drain(&env);

    assert_eq!(env.step(), Step::Idle);
    assert!(env.current().is_none());
    assert_eq!(env.step(), Step::Idle);
}

#[test]
fn test_yield_interleaves() {
    let mut env = Env::init().unwrap();
    let trace = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b"] {
        let trace = trace.clone();
        env.spawn(async move {
            trace.lock().unwrap().push(format!("{name}1"));
            yield_now().await;
            trace.lock().unwrap().push(format!("{name}2"));
        })
        .unwrap();
    }

    env.run().unwrap();

    assert_eq!(*trace.lock().unwrap(), vec!["a1", "b1", "a2", "b2"]);
}

#[test]
fn test_yield_requeues_at_the_back() {
    let env = Env::init().unwrap();
    drain(&env);

    let a = env
        .spawn(async {
            yield_now().await;
        })
        .unwrap();
    let b = env.spawn(async {}).unwrap();

    assert_eq!(env.step(), Step::Ran(a.id()));
    assert_eq!(a.status(), Status::Ready);
    assert_eq!(env.step(), Step::Ran(b.id()));
    assert_eq!(env.step(), Step::Ran(a.id()));
    assert_eq!(a.status(), Status::Exited);
    assert_eq!(env.step(), Step::Idle);
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_exit_cleanup_exactly_once() {
    let mut env = Env::init().unwrap();
    let drops = Arc::new(AtomicUsize::new(0));

    let guard = DropCounter(drops.clone());
    let handle = env
        .spawn(async move {
            let _guard = guard;
            yield_now().await;
            yield_now().await;
        })
        .unwrap();
    let id = handle.id();

    assert!(env.get(id).is_some());

    env.run().unwrap();

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status(), Status::Exited);
    assert!(env.get(id).is_none());

    drop(env);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_current_inside_and_outside() {
    let mut env = Env::init().unwrap();
    let seen = Arc::new(Mutex::new(None));

    let seen_clone = seen.clone();
    let handle = env
        .spawn(async move {
            *seen_clone.lock().unwrap() = corosched::current();
        })
        .unwrap();

    assert!(corosched::current().is_none());
    env.run().unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(handle.id()));
    assert!(env.current().is_none());
}

#[test]
fn test_running_coroutine_sees_itself_running() {
    let mut env = Env::init().unwrap();
    let slot = Arc::new(Mutex::new(None));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let (slot_clone, observed_clone) = (slot.clone(), observed.clone());
    let handle = env
        .spawn(async move {
            let me: corosched::CoroHandle = slot_clone.lock().unwrap().clone().unwrap();
            observed_clone.lock().unwrap().push(me.status());
            yield_now().await;
            observed_clone.lock().unwrap().push(me.status());
        })
        .unwrap();
    *slot.lock().unwrap() = Some(handle.clone());

    assert_eq!(handle.status(), Status::Ready);
    env.run().unwrap();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![Status::Running, Status::Running]
    );
    assert_eq!(handle.status(), Status::Exited);
}

#[test]
fn test_spawn_inside_coroutine() {
    let mut env = Env::init().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let order_clone = order.clone();
    env.spawn(async move {
        order_clone.lock().unwrap().push("parent");

        let child_order = order_clone.clone();
        let child = corosched::spawn(async move {
            child_order.lock().unwrap().push("child");
        });
        assert!(child.is_some());

        yield_now().await;
        order_clone.lock().unwrap().push("parent again");
    })
    .unwrap();

    env.run().unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["parent", "child", "parent again"]
    );
}

#[test]
fn test_spawn_outside_scheduler_is_none() {
    assert!(corosched::spawn(async {}).is_none());
}

#[test]
fn test_many_coroutines() {
    let mut env = Env::init().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..100 {
        let counter = counter.clone();
        env.spawn(async move {
            yield_now().await;
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    env.run().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert_eq!(env.stats().switches, 1 + 200);
}
