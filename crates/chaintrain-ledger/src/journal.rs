//! # Journal Ledger
//!
//! An append-only, hash-chained journal of dataset registrations. Each entry
//! records the digest of its predecessor; [`verify_chain`] re-walks the
//! journal and rejects any gap, reordering, or edited entry.
//!
//! When opened with a path, every accepted entry is appended to a JSON-lines
//! file and synced before it becomes visible. Reopening replays and verifies
//! the file.
//!
//! Finality is simulated: an entry turns `finalized` once `finality_delay`
//! has passed since submission. Entries replayed from disk are final.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chaintrain_core::{ContentDigest, Timestamp, TxDigest};
use parking_lot::Mutex;

use crate::{FinalityStatus, Ledger, LedgerEntry, LedgerError, RegistrationRequest, Submission};

#[derive(Debug, Default)]
struct Journal {
    entries: Vec<LedgerEntry>,
    /// `None` once final.
    pending_since: Vec<Option<Instant>>,
    by_root: HashMap<ContentDigest, usize>,
    by_tx: HashMap<TxDigest, usize>,
}

impl Journal {
    fn push(&mut self, entry: LedgerEntry, pending_since: Option<Instant>) {
        let idx = self.entries.len();
        self.by_root.insert(entry.merkle_root, idx);
        self.by_tx.insert(entry.tx_digest, idx);
        self.entries.push(entry);
        self.pending_since.push(pending_since);
    }
}

/// In-process ledger with optional file persistence.
#[derive(Debug)]
pub struct JournalLedger {
    chain_id: String,
    journal: Mutex<Journal>,
    /// Serializes submissions across the file append, which runs without
    /// `journal` held.
    append_gate: tokio::sync::Mutex<()>,
    path: Option<PathBuf>,
    finality_delay: Duration,
    available: AtomicBool,
}

impl JournalLedger {
    /// A memory-only journal whose entries are final immediately.
    pub fn in_memory(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            journal: Mutex::new(Journal::default()),
            append_gate: tokio::sync::Mutex::new(()),
            path: None,
            finality_delay: Duration::ZERO,
            available: AtomicBool::new(true),
        }
    }

    /// Open (or create) a journal persisted at `path`, replaying and
    /// verifying existing entries.
    pub fn open(chain_id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let entries = replay(&path)?;
        verify_chain(&entries)?;

        let mut journal = Journal::default();
        for entry in entries {
            journal.push(entry, None);
        }
        tracing::info!(
            path = %path.display(),
            entries = journal.entries.len(),
            "ledger journal opened"
        );
        Ok(Self {
            chain_id: chain_id.into(),
            journal: Mutex::new(journal),
            append_gate: tokio::sync::Mutex::new(()),
            path: Some(path),
            finality_delay: Duration::ZERO,
            available: AtomicBool::new(true),
        })
    }

    /// Delay between submission and finality.
    pub fn with_finality_delay(mut self, delay: Duration) -> Self {
        self.finality_delay = delay;
        self
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`LedgerError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.journal.lock().entries.len()
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.journal.lock().entries.is_empty()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable {
                chain_id: self.chain_id.clone(),
            });
        }
        Ok(())
    }

    async fn persist(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        tokio::task::spawn_blocking(move || {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(&line)?;
            file.sync_data()
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }
}

/// Read every entry of a journal file. A missing file is an empty journal.
///
/// Bytes after the last newline are an append that never completed (the
/// newline is written and synced with the entry), so they are discarded and
/// the file is truncated back to its last whole entry.
fn replay(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let whole = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    let mut entries = Vec::new();
    for line in bytes[..whole].split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        entries.push(serde_json::from_slice::<LedgerEntry>(line)?);
    }

    if whole < bytes.len() {
        tracing::warn!(
            path = %path.display(),
            discarded_bytes = bytes.len() - whole,
            "journal ends in an incomplete entry, truncating"
        );
        OpenOptions::new().write(true).open(path)?.set_len(whole as u64)?;
    }
    Ok(entries)
}

#[async_trait]
impl Ledger for JournalLedger {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn submit(&self, request: RegistrationRequest) -> Result<Submission, LedgerError> {
        self.check_available()?;
        let (blob_id, root) = request.validate()?;

        let _gate = self.append_gate.lock().await;
        let entry = {
            let journal = self.journal.lock();
            if let Some(&idx) = journal.by_root.get(root) {
                let entry = journal.entries[idx].clone();
                tracing::info!(
                    merkle_root = %root,
                    tx = %entry.tx_digest,
                    "merkle root already registered"
                );
                return Ok(Submission {
                    entry,
                    already_registered: true,
                });
            }
            let mut entry = LedgerEntry {
                sequence: journal.entries.len() as u64,
                // Placeholder until the body digest is computed below.
                tx_digest: TxDigest(ContentDigest::from_bytes([0u8; 32])),
                prev_digest: journal.entries.last().map(|e| e.tx_digest),
                dataset_id: request.dataset_id.clone(),
                blob_id: blob_id.clone(),
                merkle_root: *root,
                proof_digest: request.proof_digest,
                size: request.size,
                chunks: request.chunks,
                submitted_at: Timestamp::now(),
            };
            entry.tx_digest = entry.compute_digest()?;
            entry
        };

        self.persist(&entry).await?;
        let pending = (!self.finality_delay.is_zero()).then(Instant::now);
        self.journal.lock().push(entry.clone(), pending);
        tracing::info!(
            sequence = entry.sequence,
            dataset_id = %entry.dataset_id,
            merkle_root = %entry.merkle_root,
            tx = %entry.tx_digest,
            "dataset registration appended"
        );
        Ok(Submission {
            entry,
            already_registered: false,
        })
    }

    async fn status(&self, tx: &TxDigest) -> Result<FinalityStatus, LedgerError> {
        self.check_available()?;
        let mut journal = self.journal.lock();
        let idx = *journal
            .by_tx
            .get(tx)
            .ok_or_else(|| LedgerError::UnknownTransaction(tx.to_string()))?;
        let pending = journal.pending_since[idx];
        match pending {
            None => Ok(FinalityStatus::Finalized),
            Some(since) if since.elapsed() >= self.finality_delay => {
                journal.pending_since[idx] = None;
                Ok(FinalityStatus::Finalized)
            }
            Some(_) => Ok(FinalityStatus::Pending),
        }
    }

    async fn entry(&self, tx: &TxDigest) -> Result<Option<LedgerEntry>, LedgerError> {
        self.check_available()?;
        let journal = self.journal.lock();
        Ok(journal.by_tx.get(tx).map(|&i| journal.entries[i].clone()))
    }

    async fn find_by_root(&self, root: &ContentDigest) -> Result<Option<LedgerEntry>, LedgerError> {
        self.check_available()?;
        let journal = self.journal.lock();
        Ok(journal.by_root.get(root).map(|&i| journal.entries[i].clone()))
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.check_available()?;
        Ok(self.journal.lock().entries.clone())
    }
}

/// Check sequence numbers, predecessor links and entry digests.
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<(), LedgerError> {
    let mut prev: Option<TxDigest> = None;
    for (i, entry) in entries.iter().enumerate() {
        let expected = i as u64;
        if entry.sequence != expected {
            return Err(LedgerError::ChainBroken {
                sequence: entry.sequence,
                reason: format!("expected sequence {expected}"),
            });
        }
        if entry.prev_digest != prev {
            return Err(LedgerError::ChainBroken {
                sequence: entry.sequence,
                reason: "predecessor digest mismatch".into(),
            });
        }
        if entry.compute_digest()? != entry.tx_digest {
            return Err(LedgerError::ChainBroken {
                sequence: entry.sequence,
                reason: "entry digest mismatch".into(),
            });
        }
        prev = Some(entry.tx_digest);
    }
    Ok(())
}
