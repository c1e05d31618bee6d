use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the settle workspace.
///
/// Covers caller usage errors (granularity, filters), malformed collaborator
/// input, persistence failures and configuration validation.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettleError {
    /// The product granularity is not one the offset calculator understands.
    #[error("invalid granularity: {value} (expected one of Y, Q, M, W, D)")]
    InvalidGranularity {
        /// The offending granularity label.
        value: String,
    },

    /// Two filters that cannot be combined were supplied together.
    #[error("cannot filter by {first} and {second} at the same time")]
    ConflictingFilter {
        /// First conflicting filter name.
        first: String,
        /// Second conflicting filter name.
        second: String,
    },

    /// A filter value does not exist in the panel's key space.
    #[error(
        "key {key} not found in level '{dimension}' with available values {available:?}. \
         Key was found in levels {found_in:?}"
    )]
    FilterKeyNotFound {
        /// Dimension whose filter failed.
        dimension: String,
        /// Requested value, rendered as text.
        key: String,
        /// Values available for that dimension.
        available: Vec<String>,
        /// Other dimensions in which the requested value exists, if any.
        found_in: Vec<String>,
    },

    /// A collaborator handed over records without the required fields.
    #[error("could not find {missing:?} in provided records")]
    MissingColumns {
        /// Names of the absent fields.
        missing: Vec<String>,
    },

    /// The persistence collaborator refused or failed to store data.
    #[error("could not store data: {0}")]
    StoreData(String),

    /// Configuration failed validation.
    #[error("invalid configuration at {field}: {message}")]
    InvalidConfig {
        /// Path of the offending field (e.g. `[2].download_cfg.symbol`).
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// A panel violates a structural invariant (index order, column length, column kind).
    #[error("invalid panel: {0}")]
    InvalidPanel(String),

    /// A market data source failed.
    #[error("{market} failed: {msg}")]
    Source {
        /// Market name of the failing source.
        market: String,
        /// Human-readable error message.
        msg: String,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of missing resource, e.g. "sensor Omip".
        what: String,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl SettleError {
    /// Helper: build an `InvalidGranularity` error.
    pub fn invalid_granularity(value: impl Into<String>) -> Self {
        Self::InvalidGranularity {
            value: value.into(),
        }
    }

    /// Helper: build a `ConflictingFilter` error.
    pub fn conflicting_filter(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::ConflictingFilter {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Helper: build a `FilterKeyNotFound` error.
    pub fn filter_key_not_found(
        dimension: impl Into<String>,
        key: impl Into<String>,
        available: Vec<String>,
        found_in: Vec<String>,
    ) -> Self {
        Self::FilterKeyNotFound {
            dimension: dimension.into(),
            key: key.into(),
            available,
            found_in,
        }
    }

    /// Helper: build a `MissingColumns` error.
    #[must_use]
    pub fn missing_columns(mut missing: Vec<String>) -> Self {
        missing.sort();
        missing.dedup();
        Self::MissingColumns { missing }
    }

    /// Helper: build an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Helper: build a `Source` error with the market name and message.
    pub fn source_failed(market: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Source {
            market: market.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Returns true for errors caused by how the caller used the API.
    ///
    /// These are raised immediately and retrying them without changing the
    /// request cannot succeed.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidGranularity { .. }
                | Self::ConflictingFilter { .. }
                | Self::FilterKeyNotFound { .. }
                | Self::InvalidArg(_)
        )
    }
}
