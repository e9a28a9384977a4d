//! Error types for the access-control engine.
//!
//! The taxonomy is deliberately small: permission denial on an existing,
//! identified record is reported as [`AccessError::NotFound`] so that the
//! record's existence is never disclosed to an unauthorized caller, while
//! denials on to-be-created records, bulk actions and non-overlapping write
//! field sets are reported as [`AccessError::Forbidden`]. Everything else is
//! a configuration mistake or a store failure passed through unchanged.

/// Errors produced by authorization decisions and engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Permission was denied on an identified record. Surfaced as "not
    /// found" so existence is not disclosed.
    #[error("Record not found: {resource_type}/{id}")]
    NotFound {
        /// The type of record that was requested.
        resource_type: String,
        /// The identifier the caller asked for.
        id: String,
    },

    /// Permission was denied in a way the caller is allowed to observe.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the denial.
        message: String,
    },

    /// The engine was configured with something it cannot honor, such as a
    /// negation strategy the backend dialect does not support or a
    /// field-selection value of an unknown shape.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A store callback failed. Passed through unchanged; the engine never
    /// retries.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccessError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is an authorization denial (as opposed
    /// to a configuration or store failure).
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Forbidden { .. })
    }
}

/// Errors crossing the store-callback boundary.
///
/// The engine performs no blocking work of its own; these only originate in
/// the fetch, query and mutation callbacks handed to the state machine.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend reported a failure.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The surrounding transport cancelled the operation mid-sequence.
    #[error("Operation cancelled: {message}")]
    Cancelled {
        /// Description of the cancellation.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `Cancelled` error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }
}

/// Type alias for results of authorization decisions.
pub type AccessResult<T> = Result<T, AccessError>;
