//! Session: the root scope over one driver.
//!
//! A session owns the driver, the retry engine, the base [`Options`] and the
//! stack of entered frame/window contexts. It is the document-level
//! [`DriverScope`]; every element scope borrows it.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::context::{ContextGuard, ContextKind, ScopeStack};
use crate::driver::{Driver, ElementHandle};
use crate::finder::ElementFinder;
use crate::locator::Locator;
use crate::options::{Options, Overrides};
use crate::result::{PatienceError, PatienceResult};
use crate::retry::RetryEngine;
use crate::scope::DriverScope;

/// Root scope bound to one driver
pub struct Session {
    driver: Arc<dyn Driver>,
    engine: RetryEngine,
    options: Options,
    stack: ScopeStack,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("options", &self.options)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session on the system clock
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, options: Options) -> Self {
        Self {
            driver,
            engine: RetryEngine::system(),
            options,
            stack: ScopeStack::new(),
        }
    }

    /// Create a session waiting on `clock`
    #[must_use]
    pub fn with_clock(driver: Arc<dyn Driver>, options: Options, clock: Arc<dyn Clock>) -> Self {
        Self {
            driver,
            engine: RetryEngine::new(clock),
            options,
            stack: ScopeStack::new(),
        }
    }

    /// Base options
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// The driver
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// The retry engine
    #[must_use]
    pub const fn engine(&self) -> &RetryEngine {
        &self.engine
    }

    /// Frame and window contexts currently entered
    #[must_use]
    pub const fn scope_stack(&self) -> &ScopeStack {
        &self.stack
    }

    /// Fail if any frame or window context is still entered
    pub fn assert_balanced(&self) -> PatienceResult<()> {
        self.stack.assert_balanced()
    }

    fn resolve(&self, locator: &Locator, options: &Options) -> PatienceResult<ElementHandle> {
        self.engine.retry_until_timeout(
            || ElementFinder::new(locator, options, None).find(self.driver()),
            options,
        )
    }

    fn enter(
        &self,
        kind: ContextKind,
        locator: Locator,
        overrides: &Overrides,
    ) -> PatienceResult<ContextGuard<'_>> {
        let options = self.options.merge(overrides);
        let target = self.resolve(&locator, &options)?;
        match kind {
            ContextKind::Frame => self.driver.enter_frame(&target)?,
            ContextKind::Window => self.driver.enter_window(&target)?,
        }
        let token = self.stack.push(kind, locator.description());
        debug!(%kind, locator = %locator, depth = self.stack.depth(), "entered context");
        Ok(ContextGuard::new(&self.stack, self.driver(), token, kind))
    }

    /// Switch into a frame; the guard switches back.
    ///
    /// `locator` usually comes from [`Locator::frame`] but any locator that
    /// resolves to a frame element works.
    pub fn enter_frame(
        &self,
        locator: Locator,
        overrides: &Overrides,
    ) -> PatienceResult<ContextGuard<'_>> {
        self.enter(ContextKind::Frame, locator, overrides)
    }

    /// Switch to a window found by name or title; the guard switches back
    pub fn enter_window(
        &self,
        name: &str,
        overrides: &Overrides,
    ) -> PatienceResult<ContextGuard<'_>> {
        self.enter(ContextKind::Window, Locator::window(name), overrides)
    }

    /// Run `body` inside a frame, releasing it on every exit path
    pub fn within_frame<R>(
        &self,
        locator: Locator,
        overrides: &Overrides,
        body: impl FnOnce(&Self) -> PatienceResult<R>,
    ) -> PatienceResult<R> {
        let guard = self.enter_frame(locator, overrides)?;
        self.run_within(guard, body)
    }

    /// Run `body` inside a window, releasing it on every exit path
    pub fn within_window<R>(
        &self,
        name: &str,
        overrides: &Overrides,
        body: impl FnOnce(&Self) -> PatienceResult<R>,
    ) -> PatienceResult<R> {
        let guard = self.enter_window(name, overrides)?;
        self.run_within(guard, body)
    }

    fn run_within<R>(
        &self,
        guard: ContextGuard<'_>,
        body: impl FnOnce(&Self) -> PatienceResult<R>,
    ) -> PatienceResult<R> {
        let token = guard.token();
        let outcome = body(self);
        let left = guard.leave();
        if matches!(left, Err(PatienceError::ContractViolation { .. })) {
            self.unwind_to(token);
        }
        finish(outcome, left)
    }

    /// Leave every context entered since (and including) `token`.
    ///
    /// Used when contexts entered inside a `within_*` body were never
    /// released; the session ends up where the `within_*` call started.
    fn unwind_to(&self, token: Uuid) {
        for record in self.stack.unwind_to(token) {
            let left = match record.kind {
                ContextKind::Frame => self.driver.leave_frame(),
                ContextKind::Window => self.driver.leave_window(),
            };
            match left {
                Ok(()) => warn!(
                    kind = %record.kind,
                    locator = %record.description,
                    "released context left open inside scope"
                ),
                Err(err) => warn!(
                    kind = %record.kind,
                    locator = %record.description,
                    error = %err,
                    "failed to release context left open inside scope"
                ),
            }
        }
    }
}

/// Combine a body's outcome with the outcome of leaving its context.
///
/// A contract violation on leave always wins. Otherwise the body's own
/// failure is reported first.
fn finish<R>(outcome: PatienceResult<R>, left: PatienceResult<()>) -> PatienceResult<R> {
    match (outcome, left) {
        (_, Err(violation @ PatienceError::ContractViolation { .. })) => Err(violation),
        (Err(err), Err(leave_err)) => {
            warn!(error = %leave_err, "leaving context failed after body failed");
            Err(err)
        }
        (Ok(_), Err(leave_err)) => Err(leave_err),
        (outcome, Ok(())) => outcome,
    }
}

impl DriverScope for Session {
    fn session(&self) -> &Session {
        self
    }

    fn scope_options(&self) -> &Options {
        &self.options
    }

    fn resolve_once(&self) -> PatienceResult<Option<ElementHandle>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "document".to_string()
    }
}
