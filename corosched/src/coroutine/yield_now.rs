use crate::env::context;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that yields execution back to the scheduler exactly once.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    /// On the first poll, the coroutine wakes itself and returns
    /// `Poll::Pending`, which the scheduler records as a yield.
    /// On the second poll, the future completes.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.0 {
            self.0 = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}

/// Yields execution back to the scheduler.
///
/// On the master, the coroutine goes to the back of the run queue so the
/// others make progress. On the parallel worker, a yield ends the blocking
/// segment and hands the coroutine back to the master.
///
/// # Examples
///
/// ```rust,ignore
/// env.spawn(async {
///     step_one();
///     corosched::yield_now().await;
///     step_two();
/// });
/// ```
pub async fn yield_now() {
    YieldOnce(false).await
}

/// A future that moves the current coroutine onto the parallel scheduler.
struct Divert(bool);

impl Future for Divert {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.0 || context::on_parallel() {
            return Poll::Ready(());
        }

        let flagged = context::with_current(|coro| coro.set_need_parallel(true)).is_some();
        if !flagged {
            // Not inside a scheduled coroutine: nothing to divert.
            return Poll::Ready(());
        }

        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Continues the current coroutine on the parallel worker thread.
///
/// Sets the coroutine's `need_parallel` flag and yields. The master
/// scheduler diverts it instead of resuming it, and the code after this
/// call runs on the worker until the next suspension point, after which
/// the coroutine is scheduled back to the master.
///
/// Does nothing when already running on the worker.
///
/// # Examples
///
/// ```rust,ignore
/// env.spawn(async {
///     corosched::parallel().await;
///     let data = std::fs::read("big.bin");  // blocking, off the master
///     corosched::yield_now().await;         // back to the master
///     consume(data);
/// });
/// ```
pub async fn parallel() {
    Divert(false).await
}

/// Runs a blocking closure on the parallel worker and returns its result
/// to the coroutine, back on the master.
///
/// This is [`parallel`] followed by the call and a [`yield_now`].
pub async fn offload<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    parallel().await;
    let value = f();
    yield_now().await;
    value
}
