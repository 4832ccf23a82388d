//! # Walrus HTTP Client
//!
//! Writes go to the publisher, reads to the aggregator:
//!
//! | Method | Path                          | Service    |
//! |--------|-------------------------------|------------|
//! | PUT    | `/v1/blobs?epochs={n}`        | publisher  |
//! | GET    | `/v1/blobs/{blob_id}`         | aggregator |
//!
//! A PUT answers either `newlyCreated` (with the on-chain blob object and
//! storage resource) or `alreadyCertified` (the same bytes were stored
//! before). Both yield a [`StoredBlob`].

use std::time::Duration;

use async_trait::async_trait;
use chaintrain_core::{BlobId, BlobStorageInfo};
use serde::Deserialize;
use url::Url;

use crate::config::BlobStoreConfig;
use crate::error::BlobError;
use crate::{BlobStore, StoredBlob};

// -- Wire types ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum PutResponse {
    NewlyCreated(NewlyCreated),
    AlreadyCertified(AlreadyCertified),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    #[serde(default)]
    blob_id: Option<String>,
    blob_object: BlobObject,
    #[serde(default)]
    resource_operation: Option<ResourceOperation>,
    #[serde(default)]
    cost: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    blob_id: Option<String>,
    #[serde(default)]
    registered_epoch: Option<u64>,
    #[serde(default)]
    encoding_type: Option<String>,
    #[serde(default)]
    storage: Option<StorageResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    start_epoch: Option<u64>,
    #[serde(default)]
    end_epoch: Option<u64>,
    #[serde(default)]
    storage_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceOperation {
    #[serde(default)]
    register_from_scratch: Option<RegisterFromScratch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterFromScratch {
    #[serde(default)]
    encoded_length: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
    #[serde(default)]
    end_epoch: Option<u64>,
}

impl PutResponse {
    fn into_stored(self, endpoint: &str) -> Result<StoredBlob, BlobError> {
        let unexpected = |reason: String| BlobError::UnexpectedResponse {
            endpoint: endpoint.to_string(),
            reason,
        };
        match self {
            PutResponse::NewlyCreated(created) => {
                let raw = created
                    .blob_object
                    .blob_id
                    .clone()
                    .or(created.blob_id.clone())
                    .ok_or_else(|| unexpected("blobId missing from newlyCreated".into()))?;
                let blob_id = BlobId::new(raw).map_err(|e| unexpected(e.to_string()))?;
                let object = created.blob_object;
                let storage = object.storage.unwrap_or(StorageResource {
                    id: None,
                    start_epoch: None,
                    end_epoch: None,
                    storage_size: None,
                });
                Ok(StoredBlob {
                    blob_id,
                    storage: BlobStorageInfo {
                        blob_object_id: object.id,
                        storage_id: storage.id,
                        start_epoch: storage.start_epoch,
                        end_epoch: storage.end_epoch,
                        storage_size: storage.storage_size,
                        registered_epoch: object.registered_epoch,
                        encoding_type: object.encoding_type,
                        cost: created.cost,
                        encoded_length: created
                            .resource_operation
                            .and_then(|op| op.register_from_scratch)
                            .and_then(|r| r.encoded_length),
                    },
                    already_certified: false,
                })
            }
            PutResponse::AlreadyCertified(certified) => Ok(StoredBlob {
                blob_id: BlobId::new(certified.blob_id).map_err(|e| unexpected(e.to_string()))?,
                storage: BlobStorageInfo {
                    end_epoch: certified.end_epoch,
                    ..BlobStorageInfo::default()
                },
                already_certified: true,
            }),
        }
    }
}

// -- Client -------------------------------------------------------------------

/// Client for a Walrus publisher/aggregator pair.
#[derive(Debug, Clone)]
pub struct WalrusClient {
    http: reqwest::Client,
    publisher_url: Url,
    aggregator_url: Url,
    epochs: u32,
}

impl WalrusClient {
    /// Create a client from configuration.
    pub fn new(config: &BlobStoreConfig) -> Result<Self, BlobError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.publisher_token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                    .map_err(|_| BlobError::UnexpectedResponse {
                        endpoint: "client_init".into(),
                        reason: "publisher token is not a valid header value".into(),
                    })?,
            );
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| BlobError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            publisher_url: config.publisher_url.clone(),
            aggregator_url: config.aggregator_url.clone(),
            epochs: config.epochs,
        })
    }

    fn blobs_url(base: &Url) -> String {
        format!("{}/v1/blobs", base.as_str().trim_end_matches('/'))
    }
}

#[async_trait]
impl BlobStore for WalrusClient {
    fn backend(&self) -> &'static str {
        "walrus"
    }

    /// Calls `PUT {publisher}/v1/blobs?epochs={n}`.
    async fn put(&self, bytes: &[u8]) -> Result<StoredBlob, BlobError> {
        let endpoint = "PUT /v1/blobs";
        let url = format!("{}?epochs={}", Self::blobs_url(&self.publisher_url), self.epochs);

        let resp = crate::retry::retry_send(endpoint, || self.http.put(&url).body(bytes.to_vec()).send())
            .await
            .map_err(|e| BlobError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BlobError::ApiError {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        let parsed: PutResponse = resp.json().await.map_err(|e| BlobError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;
        let stored = parsed.into_stored(endpoint)?;
        tracing::debug!(
            blob_id = %stored.blob_id,
            already_certified = stored.already_certified,
            size = bytes.len(),
            "blob stored"
        );
        Ok(stored)
    }

    /// Calls `GET {aggregator}/v1/blobs/{blob_id}`.
    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobError> {
        let endpoint = format!("GET /v1/blobs/{blob_id}");
        let url = format!("{}/{blob_id}", Self::blobs_url(&self.aggregator_url));

        let resp = crate::retry::retry_send(&endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| BlobError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(blob_id.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BlobError::ApiError {
                endpoint,
                status,
                body,
            });
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| BlobError::Http {
                endpoint,
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_newly_created() {
        let body = serde_json::json!({
            "newlyCreated": {
                "blobObject": {
                    "id": "0xobj",
                    "blobId": "M4hsZGQ1oCktdzegB6HnI6Mi28S2nqOPHxK-W7_4BUk",
                    "size": 17,
                    "registeredEpoch": 34,
                    "encodingType": "RS2",
                    "storage": {"id": "0xstor", "startEpoch": 34, "endEpoch": 35, "storageSize": 66034000}
                },
                "resourceOperation": {"registerFromScratch": {"encodedLength": 66034000, "epochsAhead": 1}},
                "cost": 132300
            }
        });
        let parsed: PutResponse = serde_json::from_value(body).unwrap();
        let stored = parsed.into_stored("PUT /v1/blobs").unwrap();
        assert_eq!(stored.blob_id.as_str(), "M4hsZGQ1oCktdzegB6HnI6Mi28S2nqOPHxK-W7_4BUk");
        assert!(!stored.already_certified);
        assert_eq!(stored.storage.blob_object_id.as_deref(), Some("0xobj"));
        assert_eq!(stored.storage.end_epoch, Some(35));
        assert_eq!(stored.storage.encoded_length, Some(66034000));
        assert_eq!(stored.storage.cost, Some(132300));
    }

    #[test]
    fn parses_already_certified() {
        let body = serde_json::json!({
            "alreadyCertified": {"blobId": "abc_DEF-1", "endEpoch": 40, "event": {"txDigest": "x"}}
        });
        let parsed: PutResponse = serde_json::from_value(body).unwrap();
        let stored = parsed.into_stored("PUT /v1/blobs").unwrap();
        assert!(stored.already_certified);
        assert_eq!(stored.blob_id.as_str(), "abc_DEF-1");
        assert_eq!(stored.storage.end_epoch, Some(40));
    }

    #[test]
    fn missing_blob_id_is_unexpected() {
        let body = serde_json::json!({"newlyCreated": {"blobObject": {"id": "0xobj"}}});
        let parsed: PutResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(
            parsed.into_stored("PUT /v1/blobs"),
            Err(BlobError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn url_building_tolerates_trailing_slash() {
        let a = Url::parse("http://host:1/").unwrap();
        let b = Url::parse("http://host:1").unwrap();
        assert_eq!(WalrusClient::blobs_url(&a), "http://host:1/v1/blobs");
        assert_eq!(WalrusClient::blobs_url(&b), "http://host:1/v1/blobs");
    }
}
