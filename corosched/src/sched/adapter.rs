//! Schedule-back adapter.
//!
//! A daemon coroutine on the master that owns the receiving side of the
//! schedule-back channel. Each round it empties the doorbell, hands every
//! pending record to the master, then parks until the doorbell rings
//! again.

use super::handoff::Inbox;
use crate::coroutine::yield_now::yield_now;
use crate::env::context;
use crate::event::future::readable;

use log::{debug, error};

/// Body of the adapter coroutine. Never returns.
pub(crate) async fn schedule_back(inbox: Inbox) {
    loop {
        if let Err(e) = inbox.drain_doorbell() {
            error!("recv schedule back coroutine failed: {e}");
        }

        for record in inbox.drain() {
            context::with_master(|master| master.schedule_back(record));
        }

        if let Err(e) = readable(inbox.fd()).await {
            debug!("waiting on the schedule-back doorbell failed: {e}");
            yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::handoff;

    use log::{Level, Log, Metadata, Record};
    use std::future::Future;
    use std::pin::pin;
    use std::sync::{Mutex, Once};
    use std::task::{Context, Waker};

    /// Keeps every record logged by the crate's unit tests.
    struct Capture(Mutex<Vec<(Level, String)>>);

    impl Log for Capture {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.0
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));
    static INSTALL: Once = Once::new();

    #[test]
    fn closed_doorbell_is_logged_as_error() {
        INSTALL.call_once(|| {
            log::set_logger(&CAPTURE).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });

        let (handoff, inbox) = handoff::channel(1).unwrap();
        drop(handoff);

        // Outside a master the readiness wait fails and the adapter yields.
        let mut adapter = pin!(schedule_back(inbox));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(adapter.as_mut().poll(&mut cx).is_pending());

        let records = CAPTURE.0.lock().unwrap();
        assert!(records.iter().any(|(level, message)| {
            *level == Level::Error && message.starts_with("recv schedule back coroutine failed")
        }));
    }
}
