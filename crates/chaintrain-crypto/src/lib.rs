//! # chaintrain-crypto — Cryptographic Primitives for the Registry
//!
//! This crate provides the building blocks of the registration pipeline:
//!
//! - **Chunking** of dataset bytes into fixed-size chunks with a manifest of
//!   offsets and per-chunk SHA-256 digests.
//! - **Merkle trees** over chunk digests, with inclusion proofs. The root is
//!   the dataset fingerprint.
//! - **Ed25519** signing and verification of training records.
//! - **Content-Addressed Storage (CAS)** of raw blobs on the local
//!   filesystem, integrity-checked on every read.

pub mod cas;
pub mod chunker;
pub mod ed25519;
pub mod error;
pub mod merkle;

// Re-export primary types.
pub use cas::ContentAddressedStore;
pub use chunker::{ChunkManifest, ChunkRef, Chunker, DEFAULT_CHUNK_SIZE};
pub use ed25519::{
    verify_with_public_key, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature,
};
pub use error::CryptoError;
pub use merkle::{hash_leaf, hash_node, InclusionProof, MerkleTree};
