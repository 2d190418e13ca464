//! Structured logging setup.
//!
//! The engine logs through `tracing`:
//!
//! - `debug` for every failed attempt that will be retried, with attempt
//!   number, elapsed time and failure kind;
//! - `trace` for every resolution round trip and performed action;
//! - `warn`/`error` when a frame or window context is released out of order.
//!
//! Nothing is printed unless a subscriber is installed. [`init_logging`]
//! installs a `fmt` subscriber for test runs and small tools.

use tracing_subscriber::EnvFilter;

use crate::result::{PatienceError, PatienceResult};

/// Default filter when neither an explicit filter nor `RUST_LOG` is given
pub const DEFAULT_FILTER: &str = "patience=info";

/// Install a global `fmt` subscriber.
///
/// `filter` takes precedence over `RUST_LOG`; with neither,
/// [`DEFAULT_FILTER`] is used. Returns `Ok(false)` when a global subscriber
/// was already installed, so calling this from every test is harmless.
pub fn init_logging(filter: Option<&str>, json: bool) -> PatienceResult<bool> {
    let env_filter = build_filter(filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}

fn build_filter(filter: Option<&str>) -> PatienceResult<EnvFilter> {
    let Some(directives) = filter else {
        let from_env = EnvFilter::try_from_default_env();
        return Ok(from_env.unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)));
    };
    EnvFilter::try_new(directives).map_err(|e| {
        let message = format!("invalid log filter {directives:?}: {e}");
        PatienceError::config(message)
    })
}
