//! Options: the configuration bundle threaded through every operation.
//!
//! A [`crate::Session`] holds fully specified [`Options`]. Each call may pass
//! [`Overrides`], which are merged field by field into a new value. Nothing
//! is global and nothing is mutated in place.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for resolution and queries (1 second)
pub const DEFAULT_TIMEOUT_MS: u64 = 1_000;

/// Default interval between attempts (50ms)
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 50;

/// Whole milliseconds in `duration`, rounded up so a non-zero duration
/// never collapses to zero
const fn ceil_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    let rounded = if duration.subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    };
    if rounded > u64::MAX as u128 {
        u64::MAX
    } else {
        rounded as u64
    }
}

/// How a string text filter is compared against element text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPrecision {
    /// Whole normalized text must equal the filter
    Exact,
    /// Filter must occur somewhere in the text
    Substring,
    /// Substring matches are accepted, exact ones win ties
    #[default]
    PreferExact,
}

/// A tie-break rule applied when several elements match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// Prefer elements whose text equals the locator's text filter
    ExactText,
    /// Prefer visible elements
    Visible,
    /// Prefer elements that are not disabled
    Enabled,
    /// Prefer elements carrying `name="value"`
    Attribute {
        /// Attribute name
        name: String,
        /// Required attribute value
        value: String,
    },
}

/// Disambiguation strategy for locators matching more than one element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Match {
    /// Take the earliest match in document order
    First,
    /// Require exactly one match
    Single,
    /// Prefer exact text matches, then require one
    #[default]
    Smart,
    /// Apply the given preferences in order, then require one
    Prefer(Vec<Preference>),
}

impl Match {
    /// Tie-break rules this strategy applies before `Single` semantics
    #[must_use]
    pub fn preferences(&self) -> Vec<Preference> {
        match self {
            Self::First | Self::Single => Vec::new(),
            Self::Smart => vec![Preference::ExactText],
            Self::Prefer(order) => order.clone(),
        }
    }
}

/// Fully specified options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Total retry budget in milliseconds
    pub timeout_ms: u64,
    /// Pause between attempts in milliseconds
    pub retry_interval_ms: u64,
    /// Pause between resolving an element and clicking it, in milliseconds
    pub wait_before_click_ms: u64,
    /// Match hidden elements too
    pub consider_invisible_elements: bool,
    /// Text filter comparison mode
    pub text_precision: TextPrecision,
    /// Disambiguation strategy
    pub match_strategy: Match,
    /// Treat unclassified driver faults as retryable
    pub retry_driver_faults: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            wait_before_click_ms: 0,
            consider_invisible_elements: false,
            text_precision: TextPrecision::PreferExact,
            match_strategy: Match::Smart,
            retry_driver_faults: true,
        }
    }
}

impl Options {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = ceil_millis(timeout);
        self
    }

    /// Set retry interval
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = ceil_millis(interval);
        self
    }

    /// Set wait before click
    #[must_use]
    pub const fn with_wait_before_click(mut self, wait: Duration) -> Self {
        self.wait_before_click_ms = ceil_millis(wait);
        self
    }

    /// Set whether hidden elements are considered
    #[must_use]
    pub const fn with_consider_invisible(mut self, consider: bool) -> Self {
        self.consider_invisible_elements = consider;
        self
    }

    /// Set text precision
    #[must_use]
    pub const fn with_text_precision(mut self, precision: TextPrecision) -> Self {
        self.text_precision = precision;
        self
    }

    /// Set match strategy
    #[must_use]
    pub fn with_match(mut self, strategy: Match) -> Self {
        self.match_strategy = strategy;
        self
    }

    /// Set whether driver faults are retried
    #[must_use]
    pub const fn with_retry_driver_faults(mut self, retry: bool) -> Self {
        self.retry_driver_faults = retry;
        self
    }

    /// Timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry interval as Duration
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Wait before click as Duration
    #[must_use]
    pub const fn wait_before_click(&self) -> Duration {
        Duration::from_millis(self.wait_before_click_ms)
    }

    /// Merge call-site overrides over these options.
    ///
    /// Each field takes the override when present, else keeps the base.
    #[must_use]
    pub fn merge(&self, overrides: &Overrides) -> Self {
        Self {
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            retry_interval_ms: overrides
                .retry_interval_ms
                .unwrap_or(self.retry_interval_ms),
            wait_before_click_ms: overrides
                .wait_before_click_ms
                .unwrap_or(self.wait_before_click_ms),
            consider_invisible_elements: overrides
                .consider_invisible_elements
                .unwrap_or(self.consider_invisible_elements),
            text_precision: overrides.text_precision.unwrap_or(self.text_precision),
            match_strategy: overrides
                .match_strategy
                .clone()
                .unwrap_or_else(|| self.match_strategy.clone()),
            retry_driver_faults: overrides
                .retry_driver_faults
                .unwrap_or(self.retry_driver_faults),
        }
    }
}

/// Partial options supplied at a call site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    /// Timeout override in milliseconds
    pub timeout_ms: Option<u64>,
    /// Retry interval override in milliseconds
    pub retry_interval_ms: Option<u64>,
    /// Wait-before-click override in milliseconds
    pub wait_before_click_ms: Option<u64>,
    /// Hidden element override
    pub consider_invisible_elements: Option<bool>,
    /// Text precision override
    pub text_precision: Option<TextPrecision>,
    /// Match strategy override
    pub match_strategy: Option<Match>,
    /// Driver fault retry override
    pub retry_driver_faults: Option<bool>,
}

impl Overrides {
    /// No overrides
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Override timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(ceil_millis(timeout));
        self
    }

    /// Override retry interval
    #[must_use]
    pub const fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = Some(ceil_millis(interval));
        self
    }

    /// Override wait before click
    #[must_use]
    pub const fn wait_before_click(mut self, wait: Duration) -> Self {
        self.wait_before_click_ms = Some(ceil_millis(wait));
        self
    }

    /// Override hidden element handling
    #[must_use]
    pub const fn consider_invisible(mut self, consider: bool) -> Self {
        self.consider_invisible_elements = Some(consider);
        self
    }

    /// Override text precision
    #[must_use]
    pub const fn text_precision(mut self, precision: TextPrecision) -> Self {
        self.text_precision = Some(precision);
        self
    }

    /// Override match strategy
    #[must_use]
    pub fn match_strategy(mut self, strategy: Match) -> Self {
        self.match_strategy = Some(strategy);
        self
    }

    /// Override driver fault retry
    #[must_use]
    pub const fn retry_driver_faults(mut self, retry: bool) -> Self {
        self.retry_driver_faults = Some(retry);
        self
    }

    /// Whether no field is overridden
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
