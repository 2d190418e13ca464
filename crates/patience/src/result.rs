//! Result and error types for Patience.
//!
//! Every resolution attempt returns a [`PatienceResult`]. The retry engine
//! never catches anything: it inspects [`PatienceError::kind`] and decides
//! whether the failure belongs to the retryable family.

use thiserror::Error;

use crate::options::Options;

/// Result type for Patience operations
pub type PatienceResult<T> = Result<T, PatienceError>;

/// Coarse classification of a failure, used by the retry engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Locator matched nothing on this attempt
    NotFound,
    /// Locator matched several elements and policy could not pick one
    Ambiguous,
    /// A resolved handle is no longer attached to the document
    Stale,
    /// A polled predicate never became true within budget
    ConditionNotMet,
    /// Caller misuse, such as unbalanced scope enter/leave
    ContractViolation,
    /// Unclassified fault raised by the driver boundary
    Driver,
    /// Invalid configuration or unreadable configuration source
    Config,
}

impl FailureKind {
    /// Whether the engine may swallow this kind and try again.
    ///
    /// Driver faults are retryable only when `options.retry_driver_faults`
    /// is set (the default).
    #[must_use]
    pub const fn is_retryable(self, options: &Options) -> bool {
        match self {
            Self::NotFound | Self::Stale => true,
            Self::Driver => options.retry_driver_faults,
            Self::Ambiguous | Self::ConditionNotMet | Self::ContractViolation | Self::Config => {
                false
            }
        }
    }

    /// Get the kind name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Ambiguous => "ambiguous",
            Self::Stale => "stale",
            Self::ConditionNotMet => "condition_not_met",
            Self::ContractViolation => "contract_violation",
            Self::Driver => "driver",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur in Patience
#[derive(Debug, Error)]
pub enum PatienceError {
    /// Nothing matched the locator
    #[error("Unable to find {description}")]
    NotFound {
        /// What was being looked for
        description: String,
    },

    /// More than one element matched and the match strategy requires one
    #[error("Ambiguous match, found {count} elements matching {description}")]
    Ambiguous {
        /// What was being looked for
        description: String,
        /// Number of matches after filtering
        count: usize,
    },

    /// A handle went stale between resolution and use
    #[error("Stale element reference: {description}")]
    Stale {
        /// The element that went away
        description: String,
    },

    /// A polled condition was never met
    #[error("Condition never met: {message} (candidates: {names})", names = .candidates.join(", "))]
    ConditionNotMet {
        /// What was being waited for
        message: String,
        /// Candidate states or predicates that were polled
        candidates: Vec<String>,
    },

    /// Programming contract violated
    #[error("Contract violation: {message}")]
    ContractViolation {
        /// Error message
        message: String,
    },

    /// Driver boundary fault
    #[error("Driver fault: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PatienceError {
    /// Create a not-found error
    #[must_use]
    pub fn not_found(description: impl Into<String>) -> Self {
        Self::NotFound {
            description: description.into(),
        }
    }

    /// Create an ambiguity error
    #[must_use]
    pub fn ambiguous(description: impl Into<String>, count: usize) -> Self {
        Self::Ambiguous {
            description: description.into(),
            count,
        }
    }

    /// Create a stale-element error
    #[must_use]
    pub fn stale(description: impl Into<String>) -> Self {
        Self::Stale {
            description: description.into(),
        }
    }

    /// Create a condition-not-met error
    #[must_use]
    pub fn condition_not_met(message: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::ConditionNotMet {
            message: message.into(),
            candidates,
        }
    }

    /// Create a contract violation
    #[must_use]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Create a driver fault
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Ambiguous { .. } => FailureKind::Ambiguous,
            Self::Stale { .. } => FailureKind::Stale,
            Self::ConditionNotMet { .. } => FailureKind::ConditionNotMet,
            Self::ContractViolation { .. } => FailureKind::ContractViolation,
            Self::Driver { .. } => FailureKind::Driver,
            Self::Config { .. } | Self::Io(_) | Self::Yaml(_) | Self::Json(_) => {
                FailureKind::Config
            }
        }
    }

    /// Whether the retry engine may swallow this error under `options`
    #[must_use]
    pub const fn is_retryable(&self, options: &Options) -> bool {
        self.kind().is_retryable(options)
    }
}

/// Collapse a boolean check into a plain answer.
///
/// Retryable failures mean "not satisfied on this poll"; anything else is
/// propagated.
pub(crate) fn settle(result: PatienceResult<bool>, options: &Options) -> PatienceResult<bool> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable(options) => Ok(false),
        Err(err) => Err(err),
    }
}
