//! Queries: a function paired with the value it is expected to return.
//!
//! [`RetryEngine::run_query`] polls a [`Query`] until it returns the
//! expected value or the timeout elapses, then hands back the last observed
//! value. Boolean queries built here settle retryable failures to `false`,
//! so they never fail merely because the page did not converge.
//!
//! Negative queries (`present == false`) poll until the negative condition
//! holds; they are not the negation of one positive evaluation.

use std::fmt;
use tracing::debug;

use crate::locator::{normalize_whitespace, TextFilter};
use crate::options::Options;
use crate::result::{settle, FailureKind, PatienceResult};
use crate::retry::RetryEngine;
use crate::scope::{DriverScope, ElementScope};

/// A pollable function with an expected result
pub trait Query<T> {
    /// Evaluate once
    fn run(&self) -> PatienceResult<T>;

    /// Value that ends polling
    fn expected(&self) -> &T;

    /// Timing and matching options for this query
    fn options(&self) -> &Options;

    /// Human-readable description for failures and logs
    fn description(&self) -> String {
        "query".to_string()
    }
}

impl RetryEngine {
    /// Poll `query` until it yields its expected value
    pub fn run_query<T: PartialEq>(&self, query: &dyn Query<T>) -> PatienceResult<T> {
        let result = self.query(|| query.run(), query.expected(), query.options());
        if !matches!(&result, Ok(value) if value == query.expected()) {
            debug!(query = %query.description(), "query settled without expected value");
        }
        result
    }
}

/// Query backed by a closure
pub struct FnQuery<'a, T> {
    run: Box<dyn Fn() -> PatienceResult<T> + 'a>,
    expected: T,
    options: Options,
    description: String,
}

impl<'a, T> FnQuery<'a, T> {
    /// Wrap `run`, expecting `expected`
    pub fn new(run: impl Fn() -> PatienceResult<T> + 'a, expected: T, options: Options) -> Self {
        Self {
            run: Box::new(run),
            expected,
            options,
            description: "query".to_string(),
        }
    }

    /// Attach a description
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl<T> fmt::Debug for FnQuery<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnQuery")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<T> Query<T> for FnQuery<'_, T> {
    fn run(&self) -> PatienceResult<T> {
        (self.run)()
    }

    fn expected(&self) -> &T {
        &self.expected
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Whether a scope's rendered text contains (or lacks) some content
pub struct ContentQuery<'s> {
    scope: &'s dyn DriverScope,
    filter: TextFilter,
    present: bool,
    options: Options,
}

impl<'s> ContentQuery<'s> {
    /// Poll until `filter` matches the text of `scope` (`present`) or does not
    #[must_use]
    pub fn new(
        scope: &'s dyn DriverScope,
        filter: TextFilter,
        present: bool,
        options: Options,
    ) -> Self {
        Self {
            scope,
            filter,
            present,
            options,
        }
    }

    fn contains(&self, text: &str) -> bool {
        match &self.filter {
            TextFilter::Text(expected) => {
                normalize_whitespace(text).contains(&normalize_whitespace(expected))
            }
            TextFilter::Pattern(regex) => regex.is_match(text),
        }
    }
}

impl fmt::Debug for ContentQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentQuery")
            .field("scope", &self.scope.describe())
            .field("filter", &self.filter)
            .field("present", &self.present)
            .finish_non_exhaustive()
    }
}

impl Query<bool> for ContentQuery<'_> {
    fn run(&self) -> PatienceResult<bool> {
        let attempt = self
            .scope
            .resolve_once()
            .and_then(|scope| self.scope.driver().page_text(scope.as_ref()))
            .map(|text| self.contains(&text) == self.present);
        settle(attempt, &self.options)
    }

    fn expected(&self) -> &bool {
        &true
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn description(&self) -> String {
        let verb = if self.present {
            "has content"
        } else {
            "has no content"
        };
        format!("{} {verb} {}", self.scope.describe(), self.filter)
    }
}

/// Whether a field's value equals (or differs from) some text
#[derive(Debug)]
pub struct ValueQuery<'e, 's> {
    element: &'e ElementScope<'s>,
    value: String,
    present: bool,
}

impl<'e, 's> ValueQuery<'e, 's> {
    /// Poll until the element's value equals `value` (`present`) or does not
    #[must_use]
    pub fn new(element: &'e ElementScope<'s>, value: impl Into<String>, present: bool) -> Self {
        Self {
            element,
            value: value.into(),
            present,
        }
    }
}

impl Query<bool> for ValueQuery<'_, '_> {
    fn run(&self) -> PatienceResult<bool> {
        let attempt = self
            .element
            .find_once()
            .and_then(|handle| self.element.driver().value(&handle))
            .map(|actual| (actual == self.value) == self.present);
        settle(attempt, self.element.options())
    }

    fn expected(&self) -> &bool {
        &true
    }

    fn options(&self) -> &Options {
        self.element.options()
    }

    fn description(&self) -> String {
        let verb = if self.present {
            "has value"
        } else {
            "has no value"
        };
        format!("{} {verb} '{}'", self.element.locator(), self.value)
    }
}

/// Whether an element exists (or is missing)
#[derive(Debug)]
pub struct PresenceQuery<'e, 's> {
    element: &'e ElementScope<'s>,
    present: bool,
}

impl<'e, 's> PresenceQuery<'e, 's> {
    /// Poll until the element exists (`present`) or is missing
    #[must_use]
    pub const fn new(element: &'e ElementScope<'s>, present: bool) -> Self {
        Self { element, present }
    }
}

impl Query<bool> for PresenceQuery<'_, '_> {
    fn run(&self) -> PatienceResult<bool> {
        // A missing ancestor means the element is missing too.
        let exists = match self.element.exists_once() {
            Ok(exists) => exists,
            Err(err) if err.kind() == FailureKind::NotFound => false,
            Err(err) => return settle(Err(err), self.element.options()),
        };
        Ok(exists == self.present)
    }

    fn expected(&self) -> &bool {
        &true
    }

    fn options(&self) -> &Options {
        self.element.options()
    }

    fn description(&self) -> String {
        let verb = if self.present { "exists" } else { "is missing" };
        format!("{} {verb}", self.element.locator())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};
    use crate::driver::{ElementHandle, MockDriver, MockFault};
    use crate::locator::Locator;
    use crate::options::Overrides;
    use crate::result::PatienceError;
    use crate::session::Session;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::time::Duration;

    fn session(driver: &Arc<MockDriver>) -> (Session, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new());
        let options = Options::default()
            .with_timeout(Duration::from_millis(200))
            .with_retry_interval(Duration::from_millis(50));
        (
            Session::with_clock(driver.clone(), options, clock.clone()),
            clock,
        )
    }

    fn none() -> Overrides {
        Overrides::none()
    }

    mod fn_query_tests {
        use super::*;

        #[test]
        fn test_fn_query_converges() {
            let engine = RetryEngine::new(Arc::new(FakeClock::new()));
            let calls = Cell::new(0);
            let query = FnQuery::new(
                || {
                    calls.set(calls.get() + 1);
                    Ok(calls.get() * 10)
                },
                30,
                Options::default(),
            )
            .described("counter reaches 30");
            assert_eq!(engine.run_query(&query).unwrap(), 30);
            assert_eq!(query.description(), "counter reaches 30");
        }

        #[test]
        fn test_fn_query_gives_last_value_on_timeout() {
            let engine = RetryEngine::new(Arc::new(FakeClock::new()));
            let query = FnQuery::new(
                || Ok("loading".to_string()),
                "ready".to_string(),
                Options::default().with_timeout(Duration::from_millis(100)),
            );
            assert_eq!(engine.run_query(&query).unwrap(), "loading");
        }
    }

    mod content_query_tests {
        use super::*;

        #[test]
        fn test_has_content_eventually() {
            let driver = Arc::new(MockDriver::new());
            driver
                .on_page_text("Loading")
                .on_page_text("Loading")
                .on_page_text("Welcome back, Ada");
            let (session, _clock) = session(&driver);
            assert!(session.has_content("Welcome back", &none()).unwrap());
            assert_eq!(driver.page_text_calls(), 3);
        }

        #[test]
        fn test_has_content_false_after_timeout() {
            let driver = Arc::new(MockDriver::new());
            driver.on_page_text("Nothing here");
            let (session, clock) = session(&driver);
            assert!(!session.has_content("Welcome", &none()).unwrap());
            assert!(clock.now() >= Duration::from_millis(200));
        }

        #[test]
        fn test_negative_convergence() {
            let driver = Arc::new(MockDriver::new());
            driver
                .on_page_text("Saving...")
                .on_page_text("Saving...")
                .on_page_text("Saved");
            let (session, _clock) = session(&driver);
            assert!(session.has_no_content("Saving", &none()).unwrap());
            assert_eq!(driver.page_text_calls(), 3);
        }

        #[test]
        fn test_has_no_content_false_when_content_stays() {
            let driver = Arc::new(MockDriver::new());
            driver.on_page_text("Error: retry");
            let (session, _clock) = session(&driver);
            assert!(!session.has_no_content("Error", &none()).unwrap());
        }

        #[test]
        fn test_has_content_match_regex() {
            let driver = Arc::new(MockDriver::new());
            driver.on_page_text("Basket: 3 items");
            let (session, _clock) = session(&driver);
            let pattern = regex::Regex::new(r"\d+ items").unwrap();
            assert!(session.has_content_match(pattern, &none()).unwrap());
        }

        #[test]
        fn test_content_inside_missing_scope_is_false() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            let panel = session.find_css("#panel", &none());
            assert!(!panel.has_content("anything", &none()).unwrap());
        }
    }

    mod element_query_tests {
        use super::*;

        #[test]
        fn test_has_value_waits_for_value() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::field("Email");
            driver.on_find(&locator, vec![ElementHandle::new("email", "input")]);
            driver.stub_value("email", "ada@example.com");
            let (session, _clock) = session(&driver);
            let field = session.find_field("Email", &none());
            assert!(field.has_value("ada@example.com").unwrap());
            assert!(!field.has_value("bob@example.com").unwrap());
            assert!(field.has_no_value("bob@example.com").unwrap());
        }

        #[test]
        fn test_missing_converges_when_element_goes_away() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::css(".spinner");
            driver
                .on_find(&locator, vec![ElementHandle::new("s", "div")])
                .on_find(&locator, vec![]);
            let (session, _clock) = session(&driver);
            let spinner = session.find_css(".spinner", &none());
            assert!(spinner.missing().unwrap());
            assert_eq!(driver.find_calls(&locator), 2);
        }

        #[test]
        fn test_exists_false_after_timeout() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            assert!(!session.find_id("ghost", &none()).exists().unwrap());
        }

        #[test]
        fn test_presence_propagates_fatal_driver_fault() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::css("#x");
            driver.on_find_fault(&locator, MockFault::Driver("socket closed".into()));
            let (session, _clock) = session(&driver);
            let overrides = none().retry_driver_faults(false);
            let err = session.find_css("#x", &overrides).exists().unwrap_err();
            assert!(matches!(err, PatienceError::Driver { .. }));
        }
    }
}
