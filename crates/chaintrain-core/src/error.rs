//! # Error Types — Structured Error Hierarchy
//!
//! Defines the foundational error types shared across the registry. All errors
//! use `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Validation errors name the offending field or value.
//! - Integrity errors carry the expected and observed digests.
//! - Downstream crates define their own enums and convert into
//!   [`ChainTrainError`] only where a single top-level type is useful.

use thiserror::Error;

/// Top-level error type for the registry core.
#[derive(Error, Debug)]
pub enum ChainTrainError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Input failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Content integrity violation.
    #[error("integrity error: expected {expected}, got {actual}")]
    Integrity {
        /// Digest the record claims.
        expected: String,
        /// Digest actually observed.
        actual: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use integer basis points: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Input validation failures for identifiers, digests and records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is empty, too long, or contains forbidden characters.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// Identifier kind (e.g. "dataset id").
        kind: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Digest string is malformed.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// Hex string is malformed.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A required field was missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field value is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_display_includes_both_digests() {
        let err = ChainTrainError::Integrity {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(err.to_string(), "integrity error: expected aa, got bb");
    }

    #[test]
    fn identifier_display() {
        let err = ValidationError::InvalidIdentifier {
            kind: "dataset id",
            reason: "empty".into(),
        };
        assert_eq!(err.to_string(), "invalid dataset id: empty");
    }

    #[test]
    fn validation_converts_into_top_level() {
        let err: ChainTrainError = ValidationError::MissingField("blob_id").into();
        assert!(err.to_string().contains("blob_id"));
    }

    #[test]
    fn float_rejected_display() {
        let err = CanonicalizationError::FloatRejected(0.25);
        assert!(err.to_string().contains("0.25"));
    }
}
