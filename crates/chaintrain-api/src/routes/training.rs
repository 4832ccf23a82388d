//! # Training & Verification
//!
//! `POST /api/train` derives model weights from a dataset fingerprint and
//! signs the result. `POST /api/verify` re-derives the fingerprint of
//! supplied data and checks it against a stored training record. Both accept
//! the data as an uploaded `dataset` file or a `datasetPath` under
//! `DATASET_ROOT`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chaintrain_core::{RequestHash, TrainingRecord};
use chaintrain_registry::{load_dataset_path, DatasetSource, TrainingOutcome, VerificationResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::{read_form, Form};
use crate::state::AppState;

/// A signed training record as the dashboard shows it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecordResponse {
    pub request_hash: String,
    /// Ten weights in `[0, 1)`.
    pub model_weights: Vec<f64>,
    pub dataset_source: String,
    /// Merkle root of the training data.
    pub dataset_fingerprint: String,
    pub chunk_size: u64,
    pub model_id: String,
    /// Registered dataset with the same fingerprint, if any.
    pub dataset_id: Option<String>,
    /// Hex Ed25519 signature over the training intent.
    pub signature: String,
    pub public_key: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl From<TrainingRecord> for TrainingRecordResponse {
    fn from(r: TrainingRecord) -> Self {
        Self {
            request_hash: r.request_hash.to_string(),
            model_weights: r.model_weights(),
            dataset_source: r.dataset_source,
            dataset_fingerprint: r.dataset_fingerprint.to_hex(),
            chunk_size: r.chunk_size,
            model_id: r.model_id.to_string(),
            dataset_id: r.dataset_id.map(|d| d.to_string()),
            signature: r.signature,
            public_key: r.public_key,
            timestamp: r.timestamp.epoch_millis(),
        }
    }
}

/// Result of a training request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainResponse {
    #[serde(flatten)]
    pub record: TrainingRecordResponse,
    /// Commitment proof over the model statement.
    pub proof_id: Option<String>,
    /// The same data was trained on before; this is the earlier record.
    pub existing: bool,
}

impl From<TrainingOutcome> for TrainResponse {
    fn from(outcome: TrainingOutcome) -> Self {
        Self {
            proof_id: outcome.proof.map(|p| p.id.to_string()),
            existing: outcome.existing,
            record: outcome.record.into(),
        }
    }
}

/// `GET /api/training-history` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingHistoryResponse {
    /// Newest first.
    pub history: Vec<TrainingRecordResponse>,
}

/// Outcome of `POST /api/verify`. A mismatch is `isValid: false`, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    pub request_hash: String,
    pub message: String,
}

impl From<VerificationResult> for VerifyResponse {
    fn from(r: VerificationResult) -> Self {
        Self {
            is_valid: r.is_valid,
            request_hash: r.request_hash.to_string(),
            message: r.message,
        }
    }
}

/// Multipart body of `/api/train`; exactly one field is needed.
#[derive(Debug, ToSchema)]
#[schema(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct TrainForm {
    #[schema(value_type = Option<String>, format = Binary)]
    dataset: Option<Vec<u8>>,
    /// Path relative to `DATASET_ROOT`.
    dataset_path: Option<String>,
}

/// Multipart body of `/api/verify`.
#[derive(Debug, ToSchema)]
#[schema(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct VerifyForm {
    #[schema(value_type = Option<String>, format = Binary)]
    dataset: Option<Vec<u8>>,
    dataset_path: Option<String>,
    request_hash: String,
}

/// Build the training router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/train", post(train))
        .route("/api/training-history", get(training_history))
        .route("/api/verify", post(verify))
}

/// Pull the dataset out of a form: the uploaded `dataset` file wins over
/// `datasetPath`.
async fn dataset_source(state: &AppState, form: &mut Form) -> Result<DatasetSource, AppError> {
    if let Some(part) = form.take("dataset") {
        return Ok(DatasetSource {
            source: part.filename.unwrap_or_else(|| "upload".to_string()),
            bytes: part.bytes,
        });
    }
    match form.text("datasetPath")? {
        Some(path) => Ok(load_dataset_path(&state.config.dataset_root, &path).await?),
        None => Err(AppError::Validation(
            "provide either a `dataset` file or a `datasetPath`".into(),
        )),
    }
}

/// POST /api/train — Train on a dataset and sign the result.
#[utoipa::path(
    post,
    path = "/api/train",
    request_body(content = TrainForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Training record", body = TrainResponse),
        (status = 404, description = "datasetPath does not exist", body = crate::error::ErrorBody),
        (status = 422, description = "No dataset supplied, or path escapes DATASET_ROOT", body = crate::error::ErrorBody),
    ),
    tag = "training"
)]
pub(crate) async fn train(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TrainResponse>, AppError> {
    let mut form = read_form(multipart).await?;
    let source = dataset_source(&state, &mut form).await?;
    let outcome = state.registry.train(source).await?;
    Ok(Json(outcome.into()))
}

/// GET /api/training-history — Every training record, newest first.
#[utoipa::path(
    get,
    path = "/api/training-history",
    responses(
        (status = 200, description = "Training history", body = TrainingHistoryResponse),
    ),
    tag = "training"
)]
pub(crate) async fn training_history(
    State(state): State<AppState>,
) -> Json<TrainingHistoryResponse> {
    let history = state
        .registry
        .catalog()
        .training_history()
        .into_iter()
        .map(TrainingRecordResponse::from)
        .collect();
    Json(TrainingHistoryResponse { history })
}

/// POST /api/verify — Check data against a training record.
#[utoipa::path(
    post,
    path = "/api/verify",
    request_body(content = VerifyForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Verification outcome", body = VerifyResponse),
        (status = 404, description = "Unknown request hash", body = crate::error::ErrorBody),
        (status = 422, description = "Missing or malformed field", body = crate::error::ErrorBody),
    ),
    tag = "training"
)]
pub(crate) async fn verify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerifyResponse>, AppError> {
    let mut form = read_form(multipart).await?;
    let raw_hash = form
        .text("requestHash")?
        .ok_or_else(|| AppError::Validation("missing form field `requestHash`".into()))?;
    let request_hash = RequestHash::from_hex(raw_hash.trim_start_matches("0x"))?;
    let source = dataset_source(&state, &mut form).await?;
    let result = state
        .registry
        .verify_training_data(&request_hash, source.bytes)
        .await?;
    Ok(Json(result.into()))
}
