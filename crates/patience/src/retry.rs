//! Retry engine: the single place where waiting happens.
//!
//! Every resolution, action, query and state search runs through
//! [`RetryEngine`]. The first attempt always runs before any sleep, elapsed
//! time is read from a monotonic [`Clock`], and only failures in the
//! retryable family are swallowed. Attempt counters and start times are local
//! to one call; the engine itself holds no mutable state.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::options::Options;
use crate::result::{PatienceError, PatienceResult};

/// Retries work until it succeeds, fails terminally, or the timeout elapses
#[derive(Debug, Clone)]
pub struct RetryEngine {
    clock: Arc<dyn Clock>,
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::system()
    }
}

impl RetryEngine {
    /// Create an engine reading time from `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Create an engine on the real monotonic clock
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }

    /// The clock this engine waits on
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn elapsed_since(&self, start: Duration) -> Duration {
        self.clock.now().saturating_sub(start)
    }

    /// Run `work` until it succeeds.
    ///
    /// Non-retryable failures propagate immediately. When the budget is
    /// exhausted the last retryable failure is returned.
    pub fn retry_until_timeout<T>(
        &self,
        mut work: impl FnMut() -> PatienceResult<T>,
        options: &Options,
    ) -> PatienceResult<T> {
        let start = self.clock.now();
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match work() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable(options) => return Err(err),
                Err(err) => {
                    let elapsed = self.elapsed_since(start);
                    if elapsed >= options.timeout() {
                        debug!(
                            attempt,
                            elapsed = ?elapsed,
                            kind = %err.kind(),
                            "retry budget exhausted"
                        );
                        return Err(err);
                    }
                    debug!(
                        attempt,
                        elapsed = ?elapsed,
                        kind = %err.kind(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    self.clock.sleep(options.retry_interval());
                }
            }
        }
    }

    /// Poll `run` until it yields `expected`.
    ///
    /// On timeout the last observed value is returned rather than an error.
    /// If no value was ever observed, the last retryable failure is returned.
    pub fn query<T: PartialEq>(
        &self,
        mut run: impl FnMut() -> PatienceResult<T>,
        expected: &T,
        options: &Options,
    ) -> PatienceResult<T> {
        let start = self.clock.now();
        let mut attempt: u32 = 0;
        let mut last_value: Option<T> = None;
        let mut last_error: Option<PatienceError> = None;
        loop {
            attempt = attempt.saturating_add(1);
            match run() {
                Ok(value) if value == *expected => return Ok(value),
                Ok(value) => last_value = Some(value),
                Err(err) if !err.is_retryable(options) => return Err(err),
                Err(err) => last_error = Some(err),
            }

            let elapsed = self.elapsed_since(start);
            if elapsed >= options.timeout() {
                debug!(
                    attempt,
                    elapsed = ?elapsed,
                    "query did not reach expected value"
                );
                return match (last_value, last_error) {
                    (Some(value), _) => Ok(value),
                    (None, Some(err)) => Err(err),
                    (None, None) => Err(PatienceError::condition_not_met(
                        "query produced no result",
                        Vec::new(),
                    )),
                };
            }
            self.clock.sleep(options.retry_interval());
        }
    }

    /// Perform `try_this`, then wait up to `wait_before_retry` for `until`.
    ///
    /// The pair repeats until `until` holds. Once the overall timeout has
    /// elapsed without it holding, fails with `ConditionNotMet`.
    pub fn try_until(
        &self,
        mut try_this: impl FnMut() -> PatienceResult<()>,
        mut until: impl FnMut() -> PatienceResult<bool>,
        wait_before_retry: Duration,
        options: &Options,
    ) -> PatienceResult<()> {
        let start = self.clock.now();
        let until_options = options.clone().with_timeout(wait_before_retry);
        let mut cycle: u32 = 0;
        loop {
            cycle = cycle.saturating_add(1);
            self.retry_until_timeout(&mut try_this, options)?;

            let satisfied = match self.query(&mut until, &true, &until_options) {
                Ok(satisfied) => satisfied,
                Err(err) if err.is_retryable(options) => false,
                Err(err) => return Err(err),
            };
            if satisfied {
                return Ok(());
            }

            let elapsed = self.elapsed_since(start);
            if elapsed >= options.timeout() {
                return Err(PatienceError::condition_not_met(
                    format!(
                        "expected condition not met after {cycle} tries in {}ms",
                        elapsed.as_millis()
                    ),
                    vec!["until".to_string()],
                ));
            }
            debug!(cycle, elapsed = ?elapsed, "condition not met, trying again");
        }
    }
}
