use super::Env;
use crate::error::Result;

use std::time::Duration;

/// Builder for configuring and creating an environment.
///
/// # Examples
///
/// ```rust,ignore
/// let mut env = EnvBuilder::new()
///     .parallel_queue_capacity(64)
///     .exit_when_idle(false)
///     .build()?;
/// ```
pub struct EnvBuilder {
    /// Coroutines that may wait for the parallel worker at once.
    pub(crate) parallel_queue_capacity: usize,

    /// Records the schedule-back channel holds before senders back off.
    pub(crate) handoff_capacity: usize,

    /// Readiness events collected per poll; also sizes the registry.
    pub(crate) event_capacity: usize,

    /// Whether `run` returns once no application coroutine is alive.
    pub(crate) exit_when_idle: bool,

    /// Pause after a divert the parallel queue refused.
    pub(crate) divert_backoff: Duration,

    /// Longest single park of the worker on an empty queue.
    pub(crate) park_timeout: Duration,
}

impl EnvBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            parallel_queue_capacity: 1024,
            handoff_capacity: 1024,
            event_capacity: 64,
            exit_when_idle: true,
            divert_backoff: Duration::from_millis(1),
            park_timeout: Duration::from_millis(10),
        }
    }

    /// Sets how many coroutines may wait for the parallel worker.
    ///
    /// A divert beyond that is refused and retried after
    /// [`divert_backoff`](Self::divert_backoff).
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn parallel_queue_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "parallel_queue_capacity must be > 0");

        self.parallel_queue_capacity = n;
        self
    }

    /// Sets the capacity of the schedule-back channel.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn handoff_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "handoff_capacity must be > 0");

        self.handoff_capacity = n;
        self
    }

    /// Sets how many readiness events one poll can report.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "event_capacity must be > 0");

        self.event_capacity = n;
        self
    }

    /// Sets whether [`Env::run`] returns once no application coroutine is
    /// left. When disabled, only [`Env::stop`] ends the loop.
    pub fn exit_when_idle(mut self, enabled: bool) -> Self {
        self.exit_when_idle = enabled;
        self
    }

    /// Sets the pause after a refused divert.
    pub fn divert_backoff(mut self, backoff: Duration) -> Self {
        self.divert_backoff = backoff;
        self
    }

    /// Sets how long the idle worker parks before checking for a stop.
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is zero.
    pub fn park_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "park_timeout must be > 0");

        self.park_timeout = timeout;
        self
    }

    /// Builds the environment with the configured options.
    pub fn build(self) -> Result<Env> {
        Env::with_builder(self)
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = EnvBuilder::default();

        assert_eq!(builder.parallel_queue_capacity, 1024);
        assert_eq!(builder.handoff_capacity, 1024);
        assert_eq!(builder.event_capacity, 64);
        assert!(builder.exit_when_idle);
        assert_eq!(builder.divert_backoff, Duration::from_millis(1));
        assert_eq!(builder.park_timeout, Duration::from_millis(10));
    }

    #[test]
    #[should_panic(expected = "parallel_queue_capacity must be > 0")]
    fn zero_parallel_capacity_panics() {
        let _ = EnvBuilder::new().parallel_queue_capacity(0);
    }

    #[test]
    #[should_panic(expected = "handoff_capacity must be > 0")]
    fn zero_handoff_capacity_panics() {
        let _ = EnvBuilder::new().handoff_capacity(0);
    }
}
