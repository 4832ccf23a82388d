//! # Dataset Subcommand
//!
//! Offline fingerprinting: the chunk manifest, the Merkle root over chunk
//! digests, inclusion proofs for single chunks, and verification of a file
//! against a root published by the registry.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use chaintrain_core::ContentDigest;
use chaintrain_crypto::{ChunkManifest, Chunker, InclusionProof, MerkleTree, DEFAULT_CHUNK_SIZE};

use crate::{read_input, EXIT_MISMATCH};

/// Dataset subcommand arguments.
#[derive(Args, Debug)]
pub struct DatasetArgs {
    #[command(subcommand)]
    pub command: DatasetCommand,
}

/// Available dataset operations.
#[derive(Subcommand, Debug)]
pub enum DatasetCommand {
    /// Print the Merkle root, content digest and chunk count of a file.
    Fingerprint {
        /// Dataset file.
        path: PathBuf,

        /// Chunk size in bytes.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Print the full chunk manifest as JSON.
        #[arg(long)]
        manifest: bool,
    },

    /// Print the inclusion proof of one chunk as JSON.
    Prove {
        /// Dataset file.
        path: PathBuf,

        /// Zero-based chunk index.
        #[arg(long)]
        index: u64,

        /// Chunk size in bytes.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Recompute the Merkle root of a file and compare it to `--root`.
    ///
    /// Exits with status 2 on mismatch.
    Verify {
        /// Dataset file.
        path: PathBuf,

        /// Expected Merkle root (64 hex chars, optional `0x`).
        #[arg(long)]
        root: String,

        /// Chunk size the root was computed with.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

/// Fingerprint of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub merkle_root: ContentDigest,
    pub content_digest: ContentDigest,
    pub size: u64,
    pub chunk_size: u64,
    pub chunks: u64,
}

/// Inclusion proof together with the chunk and root it proves.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkProof {
    pub merkle_root: ContentDigest,
    pub chunk_digest: ContentDigest,
    pub offset: u64,
    pub len: u64,
    pub proof: InclusionProof,
}

/// Execute the dataset subcommand.
pub fn run_dataset(args: &DatasetArgs) -> Result<u8> {
    match &args.command {
        DatasetCommand::Fingerprint {
            path,
            chunk_size,
            manifest,
        } => run_fingerprint(path, *chunk_size, *manifest),
        DatasetCommand::Prove {
            path,
            index,
            chunk_size,
        } => run_prove(path, *index, *chunk_size),
        DatasetCommand::Verify {
            path,
            root,
            chunk_size,
        } => run_verify(path, root, *chunk_size),
    }
}

/// Chunk manifest of `data`; empty input is rejected.
pub fn manifest(data: &[u8], chunk_size: usize) -> Result<ChunkManifest> {
    anyhow::ensure!(!data.is_empty(), "dataset is empty");
    Ok(Chunker::new(chunk_size)?.manifest(data)?)
}

/// Fingerprint of `data` split at `chunk_size`.
pub fn fingerprint(data: &[u8], chunk_size: usize) -> Result<Fingerprint> {
    let manifest = manifest(data, chunk_size)?;
    let tree = MerkleTree::from_leaves(manifest.leaves())?;
    Ok(Fingerprint {
        merkle_root: tree.root(),
        content_digest: manifest.content_digest,
        size: manifest.total_size,
        chunk_size: manifest.chunk_size,
        chunks: manifest.chunk_count(),
    })
}

/// Inclusion proof for chunk `index` of `data`.
pub fn prove_chunk(data: &[u8], index: u64, chunk_size: usize) -> Result<ChunkProof> {
    let manifest = manifest(data, chunk_size)?;
    let tree = MerkleTree::from_leaves(manifest.leaves())?;
    let proof = tree.proof(index)?;
    let chunk = manifest
        .chunks
        .get(index as usize)
        .with_context(|| format!("chunk {index} out of range"))?;
    Ok(ChunkProof {
        merkle_root: tree.root(),
        chunk_digest: chunk.digest,
        offset: chunk.offset,
        len: chunk.len,
        proof,
    })
}

/// Parse a root given on the command line.
pub fn parse_root(raw: &str) -> Result<ContentDigest> {
    ContentDigest::from_hex(raw.trim()).with_context(|| format!("invalid Merkle root {raw:?}"))
}

fn run_fingerprint(path: &Path, chunk_size: usize, full: bool) -> Result<u8> {
    let data = read_input(path)?;
    if full {
        let manifest = manifest(&data, chunk_size)?;
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(0);
    }
    let fp = fingerprint(&data, chunk_size)?;
    tracing::debug!(path = %path.display(), chunks = fp.chunks, "fingerprinted");
    println!("  file:           {}", path.display());
    println!("  size:           {}", fp.size);
    println!("  chunk size:     {}", fp.chunk_size);
    println!("  chunks:         {}", fp.chunks);
    println!("  content digest: {}", fp.content_digest);
    println!("  merkle root:    {}", fp.merkle_root);
    Ok(0)
}

fn run_prove(path: &Path, index: u64, chunk_size: usize) -> Result<u8> {
    let data = read_input(path)?;
    let proof = prove_chunk(&data, index, chunk_size)?;
    println!("{}", serde_json::to_string_pretty(&proof)?);
    Ok(0)
}

fn run_verify(path: &Path, root: &str, chunk_size: usize) -> Result<u8> {
    let expected = parse_root(root)?;
    let data = read_input(path)?;
    let fp = fingerprint(&data, chunk_size)?;
    if fp.merkle_root == expected {
        println!("OK: {} matches {}", path.display(), expected);
        Ok(0)
    } else {
        println!(
            "MISMATCH: {} has root {}, expected {}",
            path.display(),
            fp.merkle_root,
            expected
        );
        Ok(EXIT_MISMATCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0..1000u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn fingerprint_counts_chunks() {
        let fp = fingerprint(&sample(), 256).unwrap();
        assert_eq!(fp.chunks, 4);
        assert_eq!(fp.size, 1000);
        assert_eq!(fp.content_digest, ContentDigest::of(&sample()));
    }

    #[test]
    fn fingerprint_depends_on_chunk_size() {
        let a = fingerprint(&sample(), 256).unwrap();
        let b = fingerprint(&sample(), 128).unwrap();
        assert_ne!(a.merkle_root, b.merkle_root);
        assert_eq!(a.content_digest, b.content_digest);
    }

    #[test]
    fn empty_input_rejected() {
        assert!(fingerprint(&[], 256).is_err());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(fingerprint(&sample(), 0).is_err());
    }

    #[test]
    fn chunk_proof_verifies_against_root() {
        let data = sample();
        let proof = prove_chunk(&data, 3, 256).unwrap();
        assert_eq!(proof.offset, 768);
        assert_eq!(proof.len, 232);
        assert!(proof
            .proof
            .verify_leaf(proof.chunk_digest.as_bytes(), &proof.merkle_root));
        assert!(prove_chunk(&data, 4, 256).is_err());
    }

    #[test]
    fn parse_root_accepts_prefix() {
        let root = fingerprint(&sample(), 256).unwrap().merkle_root;
        assert_eq!(parse_root(&format!("0x{root}")).unwrap(), root);
        assert_eq!(parse_root(&format!(" {root}\n")).unwrap(), root);
        assert!(parse_root("zz").is_err());
    }

    #[test]
    fn verify_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("d.bin");
        std::fs::write(&file, sample()).unwrap();
        let root = fingerprint(&sample(), 512).unwrap().merkle_root.to_hex();

        assert_eq!(run_verify(&file, &root, 512).unwrap(), 0);
        assert_eq!(run_verify(&file, &root, 256).unwrap(), EXIT_MISMATCH);
        assert!(run_verify(&dir.path().join("none"), &root, 512).is_err());
    }
}
