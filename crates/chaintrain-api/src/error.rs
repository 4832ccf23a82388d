//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps registry, blob store and ledger errors to HTTP status codes and
//! renders `{"error": {"code", "message"}}` bodies. Internal details are
//! logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chaintrain_blob::BlobError;
use chaintrain_ledger::LedgerError;
use chaintrain_registry::RegistryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request body exceeds the upload limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Stored data no longer matches its recorded digests (502).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A backend (blob store, ledger, catalog) is unreachable or refused (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Integrity(_) => (StatusCode::BAD_GATEWAY, "INTEGRITY_ERROR"),
            Self::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The message safe to show a client.
    pub(crate) fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match &err {
            BlobError::NotFound(_) => Self::NotFound(err.to_string()),
            BlobError::Integrity { .. } => Self::Integrity(err.to_string()),
            BlobError::Config(_) | BlobError::Storage(_) => Self::Internal(err.to_string()),
            _ => Self::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::Validation(_) => Self::Validation(err.to_string()),
            LedgerError::Rejected(_) => Self::Conflict(err.to_string()),
            LedgerError::UnknownTransaction(_) => Self::NotFound(err.to_string()),
            LedgerError::ChainBroken { .. } => Self::Integrity(err.to_string()),
            LedgerError::Unavailable { .. }
            | LedgerError::TransactionFailed { .. }
            | LedgerError::FinalityTimeout { .. }
            | LedgerError::Io(_) => Self::ServiceUnavailable(err.to_string()),
            LedgerError::Canonicalization(_) | LedgerError::Decode(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(e) => Self::Validation(e.to_string()),
            e @ RegistryError::NotFound { .. } => Self::NotFound(e.to_string()),
            RegistryError::Conflict(msg) => Self::Conflict(msg),
            RegistryError::Integrity(msg) => Self::Integrity(msg),
            RegistryError::Blob(e) => e.into(),
            RegistryError::Ledger(e) => e.into(),
            e @ RegistryError::Kv(_) => Self::ServiceUnavailable(e.to_string()),
            e @ RegistryError::State(_) => Self::Conflict(e.to_string()),
            e @ RegistryError::Cancelled => Self::ServiceUnavailable(e.to_string()),
            e @ (RegistryError::Crypto(_)
            | RegistryError::Proof(_)
            | RegistryError::Verify(_)
            | RegistryError::Canonicalization(_)
            | RegistryError::Internal(_)) => Self::Internal(e.to_string()),
        }
    }
}

impl From<chaintrain_core::ValidationError> for AppError {
    fn from(err: chaintrain_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::PayloadTooLarge("x".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
            ),
            (AppError::Integrity("x".into()), StatusCode::BAD_GATEWAY, "INTEGRITY_ERROR"),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[tokio::test]
    async fn internal_error_body_is_generic() {
        let response = AppError::Internal("db password is hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("hunter2"));
    }

    #[test]
    fn registry_errors_map_by_class() {
        let not_found: AppError = RegistryError::NotFound {
            kind: "dataset",
            id: "abc".into(),
        }
        .into();
        assert!(matches!(not_found, AppError::NotFound(ref m) if m.contains("abc")));

        let down: AppError =
            RegistryError::Blob(BlobError::Unavailable("maintenance".into())).into();
        assert!(matches!(down, AppError::ServiceUnavailable(_)));

        let missing_blob: AppError = RegistryError::Blob(BlobError::NotFound("b".into())).into();
        assert!(matches!(missing_blob, AppError::NotFound(_)));

        let timeout: AppError = RegistryError::Ledger(LedgerError::FinalityTimeout {
            tx: "t".into(),
            waited_ms: 10,
        })
        .into();
        assert!(matches!(timeout, AppError::ServiceUnavailable(_)));

        let tampered: AppError = RegistryError::Integrity("chunk 0".into()).into();
        assert!(matches!(tampered, AppError::Integrity(_)));

        let busy: AppError = RegistryError::Conflict("upload in progress".into()).into();
        assert!(matches!(busy, AppError::Conflict(ref m) if m == "upload in progress"));
    }
}
