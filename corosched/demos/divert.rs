//! Runs a few cooperative coroutines next to one that offloads blocking
//! work to the parallel worker.
//!
//! ```sh
//! RUST_LOG=corosched=trace cargo run --example divert
//! ```

use corosched::{Env, offload, sleep, yield_now};
use std::thread;
use std::time::Duration;

fn main() -> corosched::Result<()> {
    env_logger::init();

    let mut env = Env::init()?;

    for i in 0..3 {
        env.spawn(async move {
            for round in 0..3 {
                println!("[{}] ticker {i}, round {round}", thread_label());
                sleep(Duration::from_millis(20)).await;
            }
        })?;
    }

    env.spawn(async {
        println!("[{}] starting blocking job", thread_label());

        let checksum = offload(|| {
            println!("[{}] crunching", thread_label());
            thread::sleep(Duration::from_millis(100));
            (0u64..1_000_000).fold(0u64, |acc, n| acc.wrapping_add(n * n))
        })
        .await;

        yield_now().await;
        println!("[{}] checksum {checksum}", thread_label());
    })?;

    env.run()?;

    println!("{:?}", env.stats());
    Ok(())
}

fn thread_label() -> String {
    thread::current()
        .name()
        .unwrap_or("unnamed")
        .to_string()
}
