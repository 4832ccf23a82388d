//! # Dataset Upload & Download
//!
//! `POST /upload-dataset` runs the full registration pipeline (chunk, store,
//! Merkle, prove, anchor) and answers with the registered dataset's storage
//! and ledger metadata. Failures are reported as `{success: false, error}`
//! with a status code matching the error class.
//!
//! `GET /download-dataset?blob_id=` reassembles a dataset from its chunk
//! blobs, checking every chunk against the manifest on the way.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chaintrain_core::{BlobId, UploadId};
use chaintrain_registry::{DatasetUpload, RegistrationOutcome};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::extractors::read_form;
use crate::state::AppState;

/// Storage resource backing the manifest blob.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StorageResponse {
    pub id: Option<String>,
    pub start_epoch: Option<u64>,
    pub end_epoch: Option<u64>,
    pub storage_size: Option<u64>,
}

/// Successful registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Always `true`.
    pub success: bool,
    pub dataset_id: String,
    /// Manifest blob id.
    pub blob_id: String,
    pub blob_object_id: Option<String>,
    /// 64 lowercase hex chars.
    pub merkle_root: String,
    pub chunks: u64,
    pub file_size: u64,
    pub storage: StorageResponse,
    pub registered_epoch: Option<u64>,
    pub encoding_type: Option<String>,
    pub cost: Option<u64>,
    pub encoded_length: Option<u64>,
    /// Ledger transaction digest.
    pub tx: Option<String>,
    pub filename: String,
    pub proof_id: Option<String>,
    /// The same bytes were already registered; nothing new was stored.
    pub deduplicated: bool,
    /// Pipeline run id, pollable at `/api/uploads/{id}`.
    pub upload_id: String,
}

impl From<RegistrationOutcome> for UploadResponse {
    fn from(outcome: RegistrationOutcome) -> Self {
        let d = outcome.dataset;
        Self {
            success: true,
            dataset_id: d.id.to_string(),
            blob_id: d.blob_id.to_string(),
            blob_object_id: d.storage.blob_object_id,
            merkle_root: d.merkle_root.to_hex(),
            chunks: d.chunks,
            file_size: d.size,
            storage: StorageResponse {
                id: d.storage.storage_id,
                start_epoch: d.storage.start_epoch,
                end_epoch: d.storage.end_epoch,
                storage_size: d.storage.storage_size,
            },
            registered_epoch: d.storage.registered_epoch,
            encoding_type: d.storage.encoding_type,
            cost: d.storage.cost,
            encoded_length: d.storage.encoded_length,
            tx: d.tx_digest.map(|tx| tx.to_string()),
            filename: d.filename,
            proof_id: d.proof_id.map(|p| p.to_string()),
            deduplicated: outcome.deduplicated,
            upload_id: outcome.upload_id.to_string(),
        }
    }
}

/// Failed registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadFailure {
    /// Always `false`.
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

fn upload_failure(err: AppError, upload_id: Option<&UploadId>) -> Response {
    let (status, _) = err.status_and_code();
    if status.is_server_error() {
        tracing::error!(error = %err, "dataset upload failed");
    }
    let body = UploadFailure {
        success: false,
        error: err.public_message(),
        upload_id: upload_id.map(|id| id.to_string()),
    };
    (status, Json(body)).into_response()
}

/// Multipart body of `/upload-dataset`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// Dataset file.
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Display name; defaults to the filename.
    name: Option<String>,
    /// Caller-chosen run id for progress polling.
    upload_id: Option<String>,
}

/// Query parameters for `/download-dataset`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Manifest blob id returned by the upload.
    pub blob_id: String,
}

/// Build the dataset upload/download router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload-dataset", post(upload_dataset))
        .route("/download-dataset", get(download_dataset))
}

/// POST /upload-dataset — Register a dataset file.
#[utoipa::path(
    post,
    path = "/upload-dataset",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Dataset registered", body = UploadResponse),
        (status = 409, description = "Upload id already running", body = UploadFailure),
        (status = 422, description = "Missing or empty file", body = UploadFailure),
        (status = 503, description = "Blob store or ledger unavailable", body = UploadFailure),
    ),
    tag = "datasets"
)]
pub(crate) async fn upload_dataset(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return upload_failure(e, None),
    };

    let upload_id = match form.text("upload_id") {
        Ok(Some(raw)) => match UploadId::new(raw) {
            Ok(id) => id,
            Err(e) => return upload_failure(e.into(), None),
        },
        Ok(None) => UploadId::generate(),
        Err(e) => return upload_failure(e, None),
    };
    let name = match form.text("name") {
        Ok(name) => name,
        Err(e) => return upload_failure(e, Some(&upload_id)),
    };
    let Some(file) = form.take("file") else {
        return upload_failure(
            AppError::Validation("missing multipart field `file`".into()),
            Some(&upload_id),
        );
    };

    let upload = DatasetUpload {
        bytes: file.bytes,
        filename: file.filename.unwrap_or_else(|| "dataset.bin".to_string()),
        name,
        upload_id: Some(upload_id.clone()),
    };

    // The pipeline runs as its own task so that a client disconnect cancels
    // it through the token instead of dropping it mid-write.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let registry = state.registry.clone();
    let task = tokio::spawn(async move { registry.register(upload, cancel).await });

    match task.await {
        Ok(Ok(outcome)) => Json(UploadResponse::from(outcome)).into_response(),
        Ok(Err(e)) => upload_failure(e.into(), Some(&upload_id)),
        Err(join) => upload_failure(
            AppError::Internal(format!("registration task failed: {join}")),
            Some(&upload_id),
        ),
    }
}

/// GET /download-dataset — Reassemble and return a dataset.
#[utoipa::path(
    get,
    path = "/download-dataset",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Dataset bytes as application/octet-stream"),
        (status = 404, description = "Unknown blob id", body = crate::error::ErrorBody),
        (status = 502, description = "Stored chunks failed integrity checks", body = crate::error::ErrorBody),
    ),
    tag = "datasets"
)]
pub(crate) async fn download_dataset(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let blob_id = BlobId::new(query.blob_id)?;
    let download = state.registry.download(&blob_id).await?;

    let disposition = HeaderValue::from_str(&content_disposition(&download.filename))
        .map_err(|e| AppError::Internal(format!("content-disposition header: {e}")))?;
    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name and, when the name
/// is not plain ASCII, an RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if fallback == filename {
        return format!("attachment; filename=\"{filename}\"");
    }
    let mut encoded = String::with_capacity(filename.len() * 3);
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            encoded.push(char::from(b));
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_filenames_pass_through() {
        assert_eq!(
            content_disposition("train set.csv"),
            "attachment; filename=\"train set.csv\""
        );
    }

    #[test]
    fn quotes_and_unicode_are_escaped() {
        let header = content_disposition("näive\"x.csv");
        assert!(header.starts_with("attachment; filename=\"n_ive_x.csv\""));
        assert!(header.ends_with("filename*=UTF-8''n%C3%A4ive%22x.csv"));
        assert!(HeaderValue::from_str(&header).is_ok());
    }
}
