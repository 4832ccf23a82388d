//! Finality polling.

use std::time::Duration;

use chaintrain_core::TxDigest;

use crate::{FinalityStatus, Ledger, LedgerEntry, LedgerError};

/// How long and how often to poll for finality.
#[derive(Debug, Clone, Copy)]
pub struct FinalityOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
}

impl Default for FinalityOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Poll `ledger` until `tx` is final, returning its entry.
///
/// # Errors
///
/// [`LedgerError::FinalityTimeout`] when the deadline passes,
/// [`LedgerError::TransactionFailed`] when the ledger drops the entry.
pub async fn await_finality(
    ledger: &dyn Ledger,
    tx: &TxDigest,
    options: FinalityOptions,
) -> Result<LedgerEntry, LedgerError> {
    let poll = async {
        loop {
            match ledger.status(tx).await? {
                FinalityStatus::Finalized => break,
                FinalityStatus::Failed => {
                    return Err(LedgerError::TransactionFailed {
                        tx: tx.to_string(),
                        reason: "dropped by ledger".into(),
                    })
                }
                FinalityStatus::Pending => {
                    tracing::debug!(tx = %tx, "awaiting finality");
                    tokio::time::sleep(options.poll_interval).await;
                }
            }
        }
        ledger
            .entry(tx)
            .await?
            .ok_or_else(|| LedgerError::UnknownTransaction(tx.to_string()))
    };

    match tokio::time::timeout(options.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::FinalityTimeout {
            tx: tx.to_string(),
            waited_ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JournalLedger, RegistrationRequest};
    use chaintrain_core::{BlobId, ContentDigest, DatasetId};

    fn request() -> RegistrationRequest {
        RegistrationRequest {
            dataset_id: DatasetId::new("d").unwrap(),
            blob_id: Some(BlobId::new("b").unwrap()),
            merkle_root: Some(ContentDigest::of(b"r")),
            proof_digest: ContentDigest::of(b"p"),
            size: 1,
            chunks: 1,
        }
    }

    fn fast(timeout_ms: u64) -> FinalityOptions {
        FinalityOptions {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn resolves_once_final() {
        let ledger = JournalLedger::in_memory("t").with_finality_delay(Duration::from_millis(20));
        let sub = ledger.submit(request()).await.unwrap();
        let entry = await_finality(&ledger, &sub.entry.tx_digest, fast(2_000))
            .await
            .unwrap();
        assert_eq!(entry, sub.entry);
    }

    #[tokio::test]
    async fn times_out_when_never_final() {
        let ledger = JournalLedger::in_memory("t").with_finality_delay(Duration::from_secs(3600));
        let sub = ledger.submit(request()).await.unwrap();
        let err = await_finality(&ledger, &sub.entry.tx_digest, fast(30))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FinalityTimeout { waited_ms: 30, .. }));
    }

    #[tokio::test]
    async fn unknown_tx_is_an_error() {
        let ledger = JournalLedger::in_memory("t");
        let tx = TxDigest(ContentDigest::of(b"x"));
        assert!(matches!(
            await_finality(&ledger, &tx, fast(100)).await,
            Err(LedgerError::UnknownTransaction(_))
        ));
    }
}
