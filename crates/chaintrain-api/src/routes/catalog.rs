//! # Catalog Read Surface
//!
//! Registered datasets, models and proofs, the lineage graph, the governance
//! summary and pipeline run status. Records are returned in their catalog
//! form; lists are newest first.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chaintrain_core::{
    Dataset, DatasetId, LineageGraph, Model, ModelId, Proof, ProofId, UploadId,
};
use chaintrain_registry::{DatasetVerification, GovernanceSummary, ProofVerification};
use chaintrain_state::RegistrationRun;

use crate::error::AppError;
use crate::state::AppState;

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/datasets", get(list_datasets))
        .route("/api/datasets/{id}", get(get_dataset))
        .route("/api/datasets/{id}/verify", post(verify_dataset))
        .route("/api/models", get(list_models))
        .route("/api/models/{id}", get(get_model))
        .route("/api/proofs", get(list_proofs))
        .route("/api/proofs/{id}", get(get_proof))
        .route("/api/proofs/{id}/verify", post(verify_proof))
        .route("/api/lineage", get(lineage))
        .route("/api/governance", get(governance))
        .route("/api/uploads/{id}", get(upload_status))
}

/// GET /api/datasets — List registered datasets.
#[utoipa::path(
    get,
    path = "/api/datasets",
    responses((status = 200, description = "Datasets, newest first")),
    tag = "catalog"
)]
pub(crate) async fn list_datasets(State(state): State<AppState>) -> Json<Vec<Dataset>> {
    Json(state.registry.catalog().datasets())
}

/// GET /api/datasets/{id} — Fetch one dataset.
#[utoipa::path(
    get,
    path = "/api/datasets/{id}",
    params(("id" = String, Path, description = "Dataset id")),
    responses(
        (status = 200, description = "Dataset record"),
        (status = 404, description = "Unknown dataset", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
pub(crate) async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Dataset>, AppError> {
    let id = DatasetId::new(id)?;
    state
        .registry
        .catalog()
        .dataset(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("dataset {id}")))
}

/// POST /api/datasets/{id}/verify — Re-derive a dataset from storage.
///
/// Re-fetches every chunk, recomputes the Merkle root, checks the stored
/// proof and the ledger entry. Success marks the dataset verified.
#[utoipa::path(
    post,
    path = "/api/datasets/{id}/verify",
    params(("id" = String, Path, description = "Dataset id")),
    responses(
        (status = 200, description = "Verification outcome; `isValid` false on any mismatch"),
        (status = 404, description = "Unknown dataset", body = crate::error::ErrorBody),
        (status = 503, description = "Blob store or ledger unavailable", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
pub(crate) async fn verify_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DatasetVerification>, AppError> {
    let id = DatasetId::new(id)?;
    Ok(Json(state.registry.verify_dataset(&id).await?))
}

/// GET /api/models — List models.
#[utoipa::path(
    get,
    path = "/api/models",
    responses((status = 200, description = "Models, newest first")),
    tag = "catalog"
)]
pub(crate) async fn list_models(State(state): State<AppState>) -> Json<Vec<Model>> {
    Json(state.registry.catalog().models())
}

/// GET /api/models/{id} — Fetch one model.
#[utoipa::path(
    get,
    path = "/api/models/{id}",
    params(("id" = String, Path, description = "Model id")),
    responses(
        (status = 200, description = "Model record"),
        (status = 404, description = "Unknown model", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
pub(crate) async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Model>, AppError> {
    let id = ModelId::new(id)?;
    state
        .registry
        .catalog()
        .model(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("model {id}")))
}

/// GET /api/proofs — List proofs.
#[utoipa::path(
    get,
    path = "/api/proofs",
    responses((status = 200, description = "Proofs, newest first")),
    tag = "catalog"
)]
pub(crate) async fn list_proofs(State(state): State<AppState>) -> Json<Vec<Proof>> {
    Json(state.registry.catalog().proofs())
}

/// GET /api/proofs/{id} — Fetch one proof.
#[utoipa::path(
    get,
    path = "/api/proofs/{id}",
    params(("id" = String, Path, description = "Proof id")),
    responses(
        (status = 200, description = "Proof record"),
        (status = 404, description = "Unknown proof", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
pub(crate) async fn get_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Proof>, AppError> {
    let id = ProofId::new(id)?;
    state
        .registry
        .catalog()
        .proof(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("proof {id}")))
}

/// POST /api/proofs/{id}/verify — Re-check a proof against its subject.
#[utoipa::path(
    post,
    path = "/api/proofs/{id}/verify",
    params(("id" = String, Path, description = "Proof id")),
    responses(
        (status = 200, description = "Verification outcome"),
        (status = 404, description = "Unknown proof or subject", body = crate::error::ErrorBody),
    ),
    tag = "catalog"
)]
pub(crate) async fn verify_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProofVerification>, AppError> {
    let id = ProofId::new(id)?;
    Ok(Json(state.registry.verify_proof(&id).await?))
}

/// GET /api/lineage — Dataset → model graph with trust flags.
#[utoipa::path(
    get,
    path = "/api/lineage",
    responses((status = 200, description = "Lineage graph")),
    tag = "governance"
)]
pub(crate) async fn lineage(State(state): State<AppState>) -> Json<LineageGraph> {
    Json(state.registry.lineage())
}

/// GET /api/governance — Catalog and ledger health summary.
#[utoipa::path(
    get,
    path = "/api/governance",
    responses(
        (status = 200, description = "Governance summary"),
        (status = 503, description = "Ledger unavailable", body = crate::error::ErrorBody),
    ),
    tag = "governance"
)]
pub(crate) async fn governance(
    State(state): State<AppState>,
) -> Result<Json<GovernanceSummary>, AppError> {
    Ok(Json(state.registry.governance().await?))
}

/// GET /api/uploads/{id} — Pipeline state and progress events of an upload.
#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    params(("id" = String, Path, description = "Upload id")),
    responses(
        (status = 200, description = "Registration run"),
        (status = 404, description = "Unknown upload", body = crate::error::ErrorBody),
    ),
    tag = "datasets"
)]
pub(crate) async fn upload_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegistrationRun>, AppError> {
    let id = UploadId::new(id)?;
    state
        .registry
        .upload_run(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("upload {id}")))
}
