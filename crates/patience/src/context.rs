//! Frame and window contexts entered by a session.
//!
//! Entering a context pushes a record onto the session's [`ScopeStack`] and
//! hands back a [`ContextGuard`]. Records are released exactly once, in LIFO
//! order. Releasing anything other than the innermost record is a contract
//! violation and leaves the stack untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, warn};
use uuid::Uuid;

use crate::driver::Driver;
use crate::result::{PatienceError, PatienceResult};

/// What kind of document context was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    /// A frame or iframe
    Frame,
    /// A browser window
    Window,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame => write!(f, "frame"),
            Self::Window => write!(f, "window"),
        }
    }
}

/// An undo record for one entered context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Identity of this entry
    pub token: Uuid,
    /// Frame or window
    pub kind: ContextKind,
    /// Locator description the context was entered through
    pub description: String,
}

/// LIFO stack of entered contexts, owned by a session
#[derive(Debug, Default)]
pub struct ScopeStack {
    records: Mutex<Vec<ContextRecord>>,
}

impl ScopeStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<ContextRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a record and return its token
    pub fn push(&self, kind: ContextKind, description: impl Into<String>) -> Uuid {
        let token = Uuid::new_v4();
        self.records().push(ContextRecord {
            token,
            kind,
            description: description.into(),
        });
        token
    }

    /// Pop the record identified by `token`, which must be innermost
    pub fn pop(&self, token: Uuid) -> PatienceResult<ContextRecord> {
        let mut records = self.records();
        match records.last() {
            Some(top) if top.token == token => {}
            Some(top) => {
                warn!(
                    innermost = %top.description,
                    depth = records.len(),
                    "context released out of order"
                );
                let held = records.iter().find(|r| r.token == token);
                return Err(PatienceError::contract(match held {
                    Some(record) => format!(
                        "cannot leave {} '{}' while {} '{}' is still entered",
                        record.kind, record.description, top.kind, top.description
                    ),
                    None => format!("context {token} was already released"),
                }));
            }
            None => {
                warn!(%token, "context released with empty stack");
                return Err(PatienceError::contract(format!(
                    "context {token} released but no context is entered"
                )));
            }
        }
        records
            .pop()
            .ok_or_else(|| PatienceError::contract("scope stack was emptied"))
    }

    /// Pop every record down to and including `token`, innermost first.
    ///
    /// Returns nothing when `token` is not on the stack.
    pub(crate) fn unwind_to(&self, token: Uuid) -> Vec<ContextRecord> {
        let mut records = self.records();
        let Some(position) = records.iter().position(|r| r.token == token) else {
            return Vec::new();
        };
        let mut unwound = records.split_off(position);
        unwound.reverse();
        unwound
    }

    /// Number of entered contexts
    #[must_use]
    pub fn depth(&self) -> usize {
        self.records().len()
    }

    /// Whether no context is entered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Copy of the entered contexts, outermost first
    #[must_use]
    pub fn records_snapshot(&self) -> Vec<ContextRecord> {
        self.records().clone()
    }

    /// Fail if any context is still entered
    pub fn assert_balanced(&self) -> PatienceResult<()> {
        let records = self.records();
        if records.is_empty() {
            return Ok(());
        }
        let open: Vec<String> = records
            .iter()
            .map(|r| format!("{} '{}'", r.kind, r.description))
            .collect();
        Err(PatienceError::contract(format!(
            "contexts still entered: {}",
            open.join(", ")
        )))
    }
}

/// Undo handle for an entered frame or window.
///
/// Call [`ContextGuard::leave`] to release and observe failures. A guard that
/// is dropped without `leave` releases on a best-effort basis and logs any
/// failure.
#[must_use = "dropping the guard leaves the context immediately"]
pub struct ContextGuard<'s> {
    stack: &'s ScopeStack,
    driver: &'s dyn Driver,
    token: Uuid,
    kind: ContextKind,
    released: bool,
}

impl fmt::Debug for ContextGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<'s> ContextGuard<'s> {
    pub(crate) fn new(
        stack: &'s ScopeStack,
        driver: &'s dyn Driver,
        token: Uuid,
        kind: ContextKind,
    ) -> Self {
        Self {
            stack,
            driver,
            token,
            kind,
            released: false,
        }
    }

    /// Token of the record this guard releases
    #[must_use]
    pub const fn token(&self) -> Uuid {
        self.token
    }

    /// Frame or window
    #[must_use]
    pub const fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Release the context.
    ///
    /// Out-of-order release fails with `ContractViolation` and leaves both
    /// the stack and the driver context as they were.
    pub fn leave(mut self) -> PatienceResult<()> {
        self.released = true;
        release(self.stack, self.driver, self.token, self.kind)
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = release(self.stack, self.driver, self.token, self.kind) {
            error!(
                kind = %self.kind,
                token = %self.token,
                error = %err,
                "context release on drop failed"
            );
        }
    }
}

fn release(
    stack: &ScopeStack,
    driver: &dyn Driver,
    token: Uuid,
    kind: ContextKind,
) -> PatienceResult<()> {
    stack.pop(token)?;
    match kind {
        ContextKind::Frame => driver.leave_frame(),
        ContextKind::Window => driver.leave_window(),
    }
}
