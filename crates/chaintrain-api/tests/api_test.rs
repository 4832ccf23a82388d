//! # Integration Tests for chaintrain-api
//!
//! Drives the full router with in-process backends: upload, download,
//! training, verification, the catalog read surface, auth, CORS and the
//! upload size limit.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chaintrain_api::config::AppConfig;
use chaintrain_api::state::AppState;
use chaintrain_blob::{BlobStoreConfig, MemoryBlobStore};
use chaintrain_crypto::Ed25519KeyPair;
use chaintrain_ledger::{FinalityOptions, JournalLedger};
use chaintrain_registry::{Catalog, Registry, RegistryConfig};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "chaintrain-test-boundary";

struct TestApp {
    router: Router,
    dataset_root: tempfile::TempDir,
}

fn build(vars: &[(&str, &str)]) -> TestApp {
    let dataset_root = tempfile::tempdir().unwrap();
    let mut env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    env.insert(
        "DATASET_ROOT".into(),
        dataset_root.path().display().to_string(),
    );
    let config = AppConfig::from_lookup(
        |k| env.get(k).cloned(),
        BlobStoreConfig::local_mock("http://127.0.0.1:9").unwrap(),
    )
    .unwrap();

    let registry = Registry::new(
        std::sync::Arc::new(MemoryBlobStore::new()),
        std::sync::Arc::new(JournalLedger::in_memory("api-test")),
        Catalog::in_memory(),
        Ed25519KeyPair::from_seed(&[3u8; 32]),
        RegistryConfig {
            chunk_size: 64,
            upload_concurrency: 2,
            proof_samples: 4,
            finality: FinalityOptions {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(5),
            },
        },
    );
    TestApp {
        router: chaintrain_api::app(AppState::new(registry, config)),
        dataset_root,
    }
}

fn test_app() -> TestApp {
    build(&[])
}

fn data(len: usize, salt: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(13).wrapping_add(salt) ^ (i / 256) as u8)
        .collect()
}

/// `(field name, filename, bytes)` parts as a multipart body.
fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_form(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn upload(app: &TestApp, bytes: &[u8], filename: &str) -> Value {
    let (status, body) = send(
        app,
        post_form("/upload-dataset", &[("file", Some(filename), bytes)]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    body
}

// -- Health & auth ------------------------------------------------------------

#[tokio::test]
async fn health_probes_bypass_auth() {
    let app = build(&[("AUTH_TOKEN", "s3cret")]);
    for (uri, expected) in [("/health/liveness", "ok"), ("/health/readiness", "ready")] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], expected.as_bytes());
    }
}

#[tokio::test]
async fn api_routes_require_the_token() {
    let app = build(&[("AUTH_TOKEN", "s3cret")]);
    let (status, body) = send(&app, get("/api/datasets")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/datasets")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

// -- Upload & download --------------------------------------------------------

#[tokio::test]
async fn upload_registers_a_dataset() {
    let app = test_app();
    let body = upload(&app, &data(200, 1), "train.csv").await;

    assert_eq!(body["chunks"], 4);
    assert_eq!(body["file_size"], 200);
    assert_eq!(body["filename"], "train.csv");
    assert_eq!(body["deduplicated"], false);
    assert_eq!(body["merkle_root"].as_str().unwrap().len(), 64);
    assert_eq!(body["dataset_id"].as_str().unwrap().len(), 32);
    assert!(body["tx"].is_string());
    assert!(body["proof_id"].is_string());
    assert!(body["storage"].is_object());

    let id = body["dataset_id"].as_str().unwrap();
    let (status, dataset) = send(&app, get(&format!("/api/datasets/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dataset["merkle_root"], body["merkle_root"]);
    assert_eq!(dataset["verified"], false);

    let (_, list) = send(&app, get("/api/datasets")).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let upload_id = body["upload_id"].as_str().unwrap();
    let (status, run) = send(&app, get(&format!("/api/uploads/{upload_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["state"], "complete");
    let events = run["events"].as_array().unwrap();
    assert!(events
        .iter()
        .any(|e| e["message"].as_str().unwrap().contains("chunk 4/4 stored")));
}

#[tokio::test]
async fn reupload_is_deduplicated() {
    let app = test_app();
    let bytes = data(150, 2);
    let first = upload(&app, &bytes, "a.csv").await;
    let second = upload(&app, &bytes, "a.csv").await;
    assert_eq!(second["deduplicated"], true);
    assert_eq!(second["dataset_id"], first["dataset_id"]);
    assert_eq!(second["merkle_root"], first["merkle_root"]);
}

#[tokio::test]
async fn upload_caller_chosen_id_is_pollable() {
    let app = test_app();
    let (status, body) = send(
        &app,
        post_form(
            "/upload-dataset",
            &[
                ("upload_id", None, b"run-42"),
                ("name", None, b"Sensor readings"),
                ("file", Some("s.bin"), &data(90, 3)),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upload_id"], "run-42");

    let (_, dataset) = send(
        &app,
        get(&format!("/api/datasets/{}", body["dataset_id"].as_str().unwrap())),
    )
    .await;
    assert_eq!(dataset["name"], "Sensor readings");

    let (_, run) = send(&app, get("/api/uploads/run-42")).await;
    assert_eq!(run["state"], "complete");
}

#[tokio::test]
async fn upload_failures_use_the_success_envelope() {
    let app = test_app();

    let (status, body) = send(
        &app,
        post_form("/upload-dataset", &[("name", None, b"no file")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("file"));

    let (status, body) = send(
        &app,
        post_form("/upload-dataset", &[("file", Some("empty.csv"), b"")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("empty"));

    let (_, list) = send(&app, get("/api/datasets")).await;
    assert_eq!(list, serde_json::json!([]));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = build(&[("MAX_UPLOAD_BYTES", "512")]);
    let (status, body) = send(
        &app,
        post_form("/upload-dataset", &[("file", Some("big.bin"), &data(4096, 4))]),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn download_returns_the_original_bytes() {
    let app = test_app();
    let bytes = data(230, 5);
    let body = upload(&app, &bytes, "weights.csv").await;
    let blob_id = body["blob_id"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/download-dataset?blob_id={blob_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"weights.csv\"");
    let downloaded = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&downloaded[..], &bytes[..]);
}

#[tokio::test]
async fn download_of_unknown_blob_is_404() {
    let app = test_app();
    let (status, body) = send(&app, get("/download-dataset?blob_id=nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, get("/download-dataset")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Training & verification --------------------------------------------------

#[tokio::test]
async fn train_then_verify() {
    let app = test_app();
    let bytes = data(300, 6);

    let (status, trained) = send(
        &app,
        post_form("/api/train", &[("dataset", Some("d.csv"), &bytes)]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{trained}");
    assert_eq!(trained["modelWeights"].as_array().unwrap().len(), 10);
    assert_eq!(trained["datasetSource"], "d.csv");
    assert_eq!(trained["existing"], false);
    let hash = trained["requestHash"].as_str().unwrap().to_string();
    assert_eq!(hash.len(), 64);

    let (_, again) = send(
        &app,
        post_form("/api/train", &[("dataset", Some("d.csv"), &bytes)]),
    )
    .await;
    assert_eq!(again["existing"], true);
    assert_eq!(again["requestHash"], trained["requestHash"]);

    let (_, history) = send(&app, get("/api/training-history")).await;
    assert_eq!(history["history"].as_array().unwrap().len(), 1);

    let (status, ok) = send(
        &app,
        post_form(
            "/api/verify",
            &[
                ("dataset", Some("d.csv"), &bytes),
                ("requestHash", None, hash.as_bytes()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ok["isValid"], true);
    assert_eq!(ok["requestHash"], hash.as_str());

    let (status, bad) = send(
        &app,
        post_form(
            "/api/verify",
            &[
                ("dataset", Some("d.csv"), &data(300, 7)),
                ("requestHash", None, hash.as_bytes()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bad["isValid"], false);
    assert!(!bad["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn verify_unknown_hash_is_404() {
    let app = test_app();
    let unknown = "ab".repeat(32);
    let (status, body) = send(
        &app,
        post_form(
            "/api/verify",
            &[
                ("dataset", Some("d.csv"), b"anything"),
                ("requestHash", None, unknown.as_bytes()),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        post_form("/api/verify", &[("dataset", Some("d.csv"), b"anything")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn train_from_dataset_path_is_confined() {
    let app = test_app();
    let bytes = data(120, 8);
    std::fs::write(app.dataset_root.path().join("local.csv"), &bytes).unwrap();

    let (status, trained) = send(
        &app,
        post_form("/api/train", &[("datasetPath", None, b"local.csv")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{trained}");

    let (status, _) = send(
        &app,
        post_form("/api/train", &[("datasetPath", None, b"../../etc/passwd")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        post_form("/api/train", &[("datasetPath", None, b"missing.csv")]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post_form("/api/train", &[])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Catalog, verification, lineage -------------------------------------------

#[tokio::test]
async fn dataset_verification_flips_verified() {
    let app = test_app();
    let body = upload(&app, &data(260, 9), "v.csv").await;
    let id = body["dataset_id"].as_str().unwrap();

    let (status, result) = send(&app, post(&format!("/api/datasets/{id}/verify"))).await;
    assert_eq!(status, StatusCode::OK, "{result}");
    assert_eq!(result["isValid"], true);
    assert_eq!(result["recomputedRoot"], body["merkle_root"]);

    let (_, dataset) = send(&app, get(&format!("/api/datasets/{id}"))).await;
    assert_eq!(dataset["verified"], true);

    let proof_id = body["proof_id"].as_str().unwrap();
    let (status, proof) = send(&app, get(&format!("/api/proofs/{proof_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proof["dataset_id"], id);

    let (status, reverified) = send(&app, post(&format!("/api/proofs/{proof_id}/verify"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reverified["isValid"], true);
}

#[tokio::test]
async fn lineage_and_governance_reflect_training() {
    let app = test_app();
    let bytes = data(180, 10);
    let registered = upload(&app, &bytes, "lin.csv").await;
    let (_, trained) = send(
        &app,
        post_form("/api/train", &[("dataset", Some("lin.csv"), &bytes)]),
    )
    .await;
    assert_eq!(trained["datasetId"], registered["dataset_id"]);

    let (status, models) = send(&app, get("/api/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models.as_array().unwrap().len(), 1);
    let model_id = trained["modelId"].as_str().unwrap();
    let (status, model) = send(&app, get(&format!("/api/models/{model_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(model["dataset_ids"][0], registered["dataset_id"]);

    let (status, graph) = send(&app, get("/api/lineage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 1);

    let (status, summary) = send(&app, get("/api/governance")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["datasets"], 1);
    assert_eq!(summary["models"], 1);
    assert_eq!(summary["ledger_entries"], 1);
    assert_eq!(summary["ledger_chain_valid"], true);
}

#[tokio::test]
async fn unknown_records_are_404() {
    let app = test_app();
    for uri in [
        "/api/datasets/0123456789abcdef0123456789abcdef",
        "/api/models/model-x",
        "/api/proofs/proof-x",
        "/api/uploads/run-x",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
    let (status, _) = send(
        &app,
        post("/api/datasets/0123456789abcdef0123456789abcdef/verify"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Surface ------------------------------------------------------------------

#[tokio::test]
async fn openapi_lists_the_routes() {
    let app = test_app();
    let (status, spec) = send(&app, get("/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    let paths = spec["paths"].as_object().unwrap();
    for path in [
        "/upload-dataset",
        "/download-dataset",
        "/api/train",
        "/api/verify",
        "/api/datasets/{id}/verify",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn cors_allows_dashboard_origin() {
    let app = test_app();
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/upload-dataset")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(preflight).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );

    let simple = Request::builder()
        .uri("/api/datasets")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(simple).await.unwrap();
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-disposition"));

    let foreign = Request::builder()
        .uri("/api/datasets")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(foreign).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn metrics_count_requests() {
    let app = test_app();
    send(&app, get("/api/datasets")).await;
    send(&app, get("/api/models/model-x")).await;
    let (status, metrics) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics["requests"].as_u64().unwrap() >= 2);
    assert_eq!(metrics["client_errors"], 1);
}
