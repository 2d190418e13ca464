//! States: named predicates for the pages a flow may land on.
//!
//! [`find_state`] evaluates every candidate once per pass, in input order,
//! and returns the first that holds. Input order only breaks ties within a
//! pass; no candidate is polled ahead of the others.

use std::fmt;

use crate::options::Options;
use crate::query::Query;
use crate::result::{settle, PatienceError, PatienceResult};
use crate::retry::RetryEngine;

/// A named boolean condition for one expected page state
pub struct State<'a> {
    name: String,
    check: Box<dyn Fn() -> PatienceResult<bool> + 'a>,
}

impl<'a> State<'a> {
    /// Create a state from a predicate
    pub fn new(name: impl Into<String>, check: impl Fn() -> PatienceResult<bool> + 'a) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }

    /// Create a state from a boolean query; each pass evaluates it once
    pub fn from_query(name: impl Into<String>, query: impl Query<bool> + 'a) -> Self {
        Self::new(name, move || query.run())
    }

    /// Name reported in failures
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate once
    pub fn check(&self) -> PatienceResult<bool> {
        (self.check)()
    }
}

impl fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for State<'_> {
    /// States are identities: equal only to themselves
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Wait for the first state whose predicate holds.
///
/// Fails with `ConditionNotMet` naming every candidate once the timeout
/// elapses. Non-retryable failures from a predicate propagate immediately.
pub fn find_state<'st, 'a>(
    engine: &RetryEngine,
    states: &'st [State<'a>],
    options: &Options,
) -> PatienceResult<&'st State<'a>> {
    let pass = || -> PatienceResult<&'st State<'a>> {
        for state in states {
            if settle(state.check(), options)? {
                return Ok(state);
            }
        }
        Err(PatienceError::not_found("any expected state"))
    };

    engine.retry_until_timeout(pass, options).map_err(|err| {
        if err.is_retryable(options) {
            PatienceError::condition_not_met(
                format!("none of {} states reached", states.len()),
                states.iter().map(|s| s.name().to_string()).collect(),
            )
        } else {
            err
        }
    })
}
