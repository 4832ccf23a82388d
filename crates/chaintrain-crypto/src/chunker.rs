//! # Fixed-Size Chunking
//!
//! Splits dataset bytes into chunks of `chunk_size` bytes; the last chunk may
//! be shorter. The resulting [`ChunkManifest`] lists each chunk's index,
//! offset, length and SHA-256 digest, plus the whole-file digest.
//!
//! Chunking is deterministic: the same bytes with the same chunk size always
//! yield the same manifest. Empty input is rejected.

use std::io::Read;

use chaintrain_core::{ContentDigest, Sha256Accumulator};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// One chunk's position and digest within a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Zero-based chunk index.
    pub index: u64,
    /// Byte offset in the original file.
    pub offset: u64,
    /// Chunk length in bytes.
    pub len: u64,
    /// SHA-256 of the chunk bytes; the Merkle leaf.
    pub digest: ContentDigest,
}

/// The ordered chunk list for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Chunk size used to split the file.
    pub chunk_size: u64,
    /// Total file size in bytes.
    pub total_size: u64,
    /// SHA-256 of the whole file.
    pub content_digest: ContentDigest,
    /// Chunks in file order.
    pub chunks: Vec<ChunkRef>,
}

impl ChunkManifest {
    /// Number of chunks.
    pub fn chunk_count(&self) -> u64 {
        self.chunks.len() as u64
    }

    /// Leaf hashes in chunk order.
    pub fn leaves(&self) -> Vec<[u8; 32]> {
        self.chunks.iter().map(|c| *c.digest.as_bytes()).collect()
    }
}

/// Splits bytes into fixed-size chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Chunker {
    /// Create a chunker. A zero chunk size is rejected.
    pub fn new(chunk_size: usize) -> Result<Self, CryptoError> {
        if chunk_size == 0 {
            return Err(CryptoError::InvalidChunkSize(chunk_size));
        }
        Ok(Self { chunk_size })
    }

    /// The configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Borrow the chunks of an in-memory buffer.
    pub fn split<'a>(&self, data: &'a [u8]) -> Result<Vec<&'a [u8]>, CryptoError> {
        if data.is_empty() {
            return Err(CryptoError::EmptyInput);
        }
        Ok(data.chunks(self.chunk_size).collect())
    }

    /// Build the manifest of an in-memory buffer.
    pub fn manifest(&self, data: &[u8]) -> Result<ChunkManifest, CryptoError> {
        let chunks = self.split(data)?;
        let mut offset = 0u64;
        let refs = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let r = ChunkRef {
                    index: i as u64,
                    offset,
                    len: chunk.len() as u64,
                    digest: ContentDigest::of(chunk),
                };
                offset += chunk.len() as u64;
                r
            })
            .collect();
        Ok(ChunkManifest {
            chunk_size: self.chunk_size as u64,
            total_size: data.len() as u64,
            content_digest: ContentDigest::of(data),
            chunks: refs,
        })
    }

    /// Build the manifest by streaming from a reader, holding at most one
    /// chunk in memory. `on_chunk` sees each chunk as it is read.
    pub fn manifest_from_reader<R: Read>(
        &self,
        mut reader: R,
        mut on_chunk: impl FnMut(&ChunkRef, &[u8]),
    ) -> Result<ChunkManifest, CryptoError> {
        let mut whole = Sha256Accumulator::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut chunks = Vec::new();
        let mut offset = 0u64;

        loop {
            let n = read_full(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            whole.update(chunk);
            let r = ChunkRef {
                index: chunks.len() as u64,
                offset,
                len: n as u64,
                digest: ContentDigest::of(chunk),
            };
            on_chunk(&r, chunk);
            offset += n as u64;
            chunks.push(r);
            if n < self.chunk_size {
                break;
            }
        }

        if chunks.is_empty() {
            return Err(CryptoError::EmptyInput);
        }
        Ok(ChunkManifest {
            chunk_size: self.chunk_size as u64,
            total_size: offset,
            content_digest: whole.finalize(),
            chunks,
        })
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read (0 at EOF).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
