//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier the registry hands out or accepts.
//! You cannot pass a [`ModelId`] where a [`DatasetId`] is expected, and a
//! [`RequestHash`] is not interchangeable with a Merkle root even though both
//! are SHA-256 digests underneath.
//!
//! String identifiers are validated at construction and on deserialization:
//! they travel in URL paths and storage keys, so only URL-safe characters are
//! accepted.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::digest::ContentDigest;
use crate::error::ValidationError;

const MAX_ID_LEN: usize = 128;
const MAX_BLOB_ID_LEN: usize = 256;

fn validate_token(kind: &'static str, s: &str, max: usize) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::InvalidIdentifier {
            kind,
            reason: "empty".into(),
        });
    }
    if s.len() > max {
        return Err(ValidationError::InvalidIdentifier {
            kind,
            reason: format!("longer than {max} chars"),
        });
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ValidationError::InvalidIdentifier {
            kind,
            reason: format!("forbidden character {c:?}"),
        });
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier string.
            pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
                let s = s.into();
                validate_token($kind, &s, $max)?;
                Ok(Self(s))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_id!(
    /// Identifier of a registered dataset: 32 lowercase hex chars when minted
    /// by the registry.
    DatasetId,
    "dataset id",
    MAX_ID_LEN
);

string_id!(
    /// Identifier of a trained model.
    ModelId,
    "model id",
    MAX_ID_LEN
);

string_id!(
    /// Identifier of a stored proof.
    ProofId,
    "proof id",
    MAX_ID_LEN
);

string_id!(
    /// Identifier of an upload pipeline run, used to poll progress.
    UploadId,
    "upload id",
    MAX_ID_LEN
);

string_id!(
    /// Blob identifier assigned by the blob store. Walrus ids are URL-safe
    /// base64; local ids are hex digests.
    BlobId,
    "blob id",
    MAX_BLOB_ID_LEN
);

impl DatasetId {
    /// Mint a fresh dataset id from 16 random bytes.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl ModelId {
    /// Mint a fresh model id.
    pub fn generate() -> Self {
        Self(format!("model-{}", Uuid::new_v4().simple()))
    }
}

impl ProofId {
    /// Mint a fresh proof id.
    pub fn generate() -> Self {
        Self(format!("proof-{}", Uuid::new_v4().simple()))
    }
}

impl UploadId {
    /// Mint a fresh upload id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// SHA-256 of a training request payload; the lookup key for training records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestHash(pub ContentDigest);

/// Digest of a ledger transaction (a registry journal entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxDigest(pub ContentDigest);

impl RequestHash {
    /// Parse from hex, tolerating a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        ContentDigest::from_hex(s).map(Self)
    }
}

impl std::fmt::Display for RequestHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for TxDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_dataset_id_is_32_hex() {
        let id = DatasetId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(DatasetId::new("../etc").is_err());
        assert!(BlobId::new("a/b").is_err());
    }

    #[test]
    fn rejects_empty_and_overlong() {
        assert!(ModelId::new("").is_err());
        assert!(ModelId::new("a".repeat(129)).is_err());
        assert!(BlobId::new("a".repeat(256)).is_ok());
    }

    #[test]
    fn walrus_style_blob_id_accepted() {
        assert!(BlobId::new("M4hsZGQ1oCktdzegB6HnI6Mi28S2nqOPHxK-W7_4BUk").is_ok());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<ProofId, _> = serde_json::from_str("\"proof-1\"");
        assert!(ok.is_ok());
        let bad: Result<ProofId, _> = serde_json::from_str("\"bad id\"");
        assert!(bad.is_err());
    }

    #[test]
    fn request_hash_is_transparent_hex() {
        let h = RequestHash(ContentDigest::of(b"payload"));
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json.len(), 66);
        assert_eq!(RequestHash::from_hex(json.trim_matches('"')).unwrap(), h);
    }
}
