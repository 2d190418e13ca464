//! Patience: wait-and-retry element resolution for browser documents.
//!
//! Pages change under a test while it runs. Patience never holds on to a
//! document node: locators are re-evaluated on every attempt, actions
//! re-resolve their target before acting, and every wait runs through one
//! retry engine bounded by a timeout.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PATIENCE Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   Session ─► ElementScope ─► ElementScope   (DriverScope chain) │
//! │      │             │ resolve + act, retried together            │
//! │      ▼             ▼                                            │
//! │   RetryEngine ◄── Query / State / try_until                     │
//! │      │                                                          │
//! │      ▼                                                          │
//! │   ElementFinder ─► filter ─► dedup ─► disambiguate              │
//! │      │                                                          │
//! │      ▼                                                          │
//! │   Driver (trait)   one synchronous round trip per call          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use patience::prelude::*;
//! use std::sync::Arc;
//!
//! let driver = Arc::new(MockDriver::new());
//! driver.on_find(
//!     &Locator::button("Sign in"),
//!     vec![ElementHandle::new("b1", "button").with_text("Sign in")],
//! );
//! driver.on_page_text("Signed in as ada");
//!
//! let session = Session::new(driver.clone(), Options::default());
//! session.click_button("Sign in", &Overrides::none())?;
//! assert!(session.has_content("Signed in as", &Overrides::none())?);
//! # Ok::<(), PatienceError>(())
//! ```

#![warn(missing_docs)]

mod clock;
mod config;
mod context;
mod driver;
mod finder;
mod locator;
pub mod logging;
mod options;
mod query;
mod result;
mod retry;
mod scope;
mod session;
mod snapshot;
mod state;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ENV_CONSIDER_INVISIBLE, ENV_RETRY_INTERVAL_MS, ENV_TIMEOUT_MS};
pub use context::{ContextGuard, ContextKind, ContextRecord, ScopeStack};
pub use driver::{Driver, ElementHandle, MockDriver, MockFault};
pub use finder::{disambiguate, filter_candidates, ElementFinder};
pub use locator::{normalize_whitespace, Locator, Selector, TextFilter};
pub use logging::init_logging;
pub use options::{
    Match, Options, Overrides, Preference, TextPrecision, DEFAULT_RETRY_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};
pub use query::{ContentQuery, FnQuery, PresenceQuery, Query, ValueQuery};
pub use result::{FailureKind, PatienceError, PatienceResult};
pub use retry::RetryEngine;
pub use scope::{AllPredicate, DriverScope, ElementScope, FillInWith, SelectFrom};
pub use session::Session;
pub use snapshot::SnapshotElementScope;
pub use state::{find_state, State};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::clock::*;
    pub use super::context::*;
    pub use super::driver::*;
    pub use super::finder::*;
    pub use super::locator::*;
    pub use super::options::*;
    pub use super::query::*;
    pub use super::result::*;
    pub use super::retry::*;
    pub use super::scope::*;
    pub use super::session::*;
    pub use super::snapshot::*;
    pub use super::state::*;
}
