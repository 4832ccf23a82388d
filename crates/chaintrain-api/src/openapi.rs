//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented handlers into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ChainTrain Registry API",
        version = "0.1.0",
        description = "Verifiable dataset registration: chunked blob storage, Merkle roots, dataset proofs, ledger anchoring, training lineage."
    ),
    paths(
        // Datasets
        crate::routes::datasets::upload_dataset,
        crate::routes::datasets::download_dataset,
        crate::routes::catalog::upload_status,
        // Training
        crate::routes::training::train,
        crate::routes::training::training_history,
        crate::routes::training::verify,
        // Catalog
        crate::routes::catalog::list_datasets,
        crate::routes::catalog::get_dataset,
        crate::routes::catalog::verify_dataset,
        crate::routes::catalog::list_models,
        crate::routes::catalog::get_model,
        crate::routes::catalog::list_proofs,
        crate::routes::catalog::get_proof,
        crate::routes::catalog::verify_proof,
        // Governance
        crate::routes::catalog::lineage,
        crate::routes::catalog::governance,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::middleware::metrics::MetricsSnapshot,
        crate::routes::datasets::UploadForm,
        crate::routes::datasets::UploadResponse,
        crate::routes::datasets::UploadFailure,
        crate::routes::datasets::StorageResponse,
        crate::routes::training::TrainForm,
        crate::routes::training::VerifyForm,
        crate::routes::training::TrainResponse,
        crate::routes::training::TrainingRecordResponse,
        crate::routes::training::TrainingHistoryResponse,
        crate::routes::training::VerifyResponse,
    )),
    tags(
        (name = "datasets", description = "Dataset registration and retrieval"),
        (name = "training", description = "Training runs and training-data verification"),
        (name = "catalog", description = "Registered datasets, models and proofs"),
        (name = "governance", description = "Lineage and trust overview"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
