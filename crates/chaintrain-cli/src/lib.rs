//! # chaintrain-cli — Command-Line Tool for ChainTrain
//!
//! Provides the `chaintrain` binary. Everything except `serve` works offline
//! against local files, using the same chunking and Merkle rules as the
//! registry, so a fingerprint computed here matches the one the server
//! anchors.
//!
//! ## Subcommands
//!
//! - `chaintrain dataset fingerprint` — Chunk manifest and Merkle root of a file.
//! - `chaintrain dataset prove` — Inclusion proof for one chunk.
//! - `chaintrain dataset verify` — Check a file against an expected root.
//! - `chaintrain keygen` — Fresh Ed25519 seed for `SIGNING_KEY_HEX`.
//! - `chaintrain journal check` — Verify the hash chain of a ledger journal.
//! - `chaintrain serve` — Run the HTTP API.
//!
//! ```bash
//! chaintrain dataset fingerprint data/train.csv --chunk-size 1048576
//! chaintrain dataset verify data/train.csv --root 3f1c…
//! chaintrain journal check ./data/ledger.jsonl
//! ```

pub mod dataset;
pub mod journal;
pub mod keys;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};

/// Exit code for a check that ran and failed.
pub const EXIT_MISMATCH: u8 = 2;

/// Read a whole input file with the path in the error.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_input_names_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        let err = read_input(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("absent.csv"));
    }
}
