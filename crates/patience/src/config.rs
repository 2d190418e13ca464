//! Loading [`Options`] from YAML, JSON and the environment.
//!
//! Files carry millisecond fields named like the struct; missing fields keep
//! their defaults. Environment variables are applied last and win over file
//! values:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PATIENCE_TIMEOUT_MS` | `timeout_ms` |
//! | `PATIENCE_RETRY_INTERVAL_MS` | `retry_interval_ms` |
//! | `PATIENCE_CONSIDER_INVISIBLE` | `consider_invisible_elements` |

use std::path::Path;

use crate::options::{Options, Overrides};
use crate::result::{PatienceError, PatienceResult};

/// Environment variable overriding the timeout
pub const ENV_TIMEOUT_MS: &str = "PATIENCE_TIMEOUT_MS";

/// Environment variable overriding the retry interval
pub const ENV_RETRY_INTERVAL_MS: &str = "PATIENCE_RETRY_INTERVAL_MS";

/// Environment variable overriding hidden element handling
pub const ENV_CONSIDER_INVISIBLE: &str = "PATIENCE_CONSIDER_INVISIBLE";

impl Options {
    /// Parse options from a YAML document
    pub fn from_yaml_str(yaml: &str) -> PatienceResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse options from a JSON document
    pub fn from_json_str(json: &str) -> PatienceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a file; `.json` is parsed as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> PatienceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Load from a file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> PatienceResult<Self> {
        let options = Self::from_file(path)?;
        Ok(options.merge(&Overrides::from_env()?))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> PatienceResult<Self> {
        Ok(Self::default().merge(&Overrides::from_env()?))
    }
}

impl Overrides {
    /// Overrides read from the process environment
    pub fn from_env() -> PatienceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overrides read through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PatienceResult<Self> {
        Ok(Self {
            timeout_ms: lookup(ENV_TIMEOUT_MS)
                .map(|raw| parse_millis(ENV_TIMEOUT_MS, &raw))
                .transpose()?,
            retry_interval_ms: lookup(ENV_RETRY_INTERVAL_MS)
                .map(|raw| parse_millis(ENV_RETRY_INTERVAL_MS, &raw))
                .transpose()?,
            consider_invisible_elements: lookup(ENV_CONSIDER_INVISIBLE)
                .map(|raw| parse_flag(ENV_CONSIDER_INVISIBLE, &raw))
                .transpose()?,
            ..Self::default()
        })
    }
}

fn parse_millis(key: &str, raw: &str) -> PatienceResult<u64> {
    let message = format!("{key} must be milliseconds, got {raw:?}");
    raw.trim()
        .parse()
        .map_err(|_| PatienceError::config(message))
}

fn parse_flag(key: &str, raw: &str) -> PatienceResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PatienceError::config(format!(
            "{key} must be a boolean, got {raw:?}"
        ))),
    }
}
