//! # Cryptographic Error Types
//!
//! Structured errors for all operations in `chaintrain-crypto`.

use thiserror::Error;

/// Errors from chunking, Merkle, signing and CAS operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Chunk size must be positive.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    /// Input contained no bytes; an empty dataset has no Merkle root.
    #[error("empty input: a dataset must contain at least one byte")]
    EmptyInput,

    /// Merkle operation error.
    #[error("Merkle error: {0}")]
    Merkle(String),

    /// Ed25519 signature verification failed.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// Invalid Ed25519 key material.
    #[error("invalid Ed25519 key: {0}")]
    InvalidKey(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// CAS operation error.
    #[error("CAS error: {0}")]
    Cas(String),

    /// I/O error (chunking readers, CAS filesystem operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
