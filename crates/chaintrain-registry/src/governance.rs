//! Lineage and the governance summary.

use chaintrain_core::{DatasetId, LineageGraph, ModelId, TxDigest};
use chaintrain_ledger::verify_chain;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::registry::Registry;

/// Registry-wide counts and trust status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceSummary {
    /// Registered datasets.
    pub datasets: usize,
    /// Datasets whose `verified` flag is set.
    pub verified_datasets: usize,
    /// Trained models.
    pub models: usize,
    /// Models the lineage graph trusts.
    pub trusted_models: usize,
    /// Stored proofs.
    pub proofs: usize,
    /// Proofs re-verified at least once.
    pub verified_proofs: usize,
    /// Training runs.
    pub training_runs: usize,
    /// Ledger identifier.
    pub ledger: String,
    /// Entries on the ledger.
    pub ledger_entries: usize,
    /// Whether the ledger's hash chain verifies end to end.
    pub ledger_chain_valid: bool,
    /// Catalogued datasets with no ledger entry for their root.
    pub unanchored_datasets: Vec<DatasetId>,
    /// Ledger registrations with no catalogued dataset, oldest first. A
    /// re-upload of the same bytes adopts them.
    pub orphaned_ledger_entries: Vec<TxDigest>,
    /// Models the lineage graph does not trust.
    pub untrusted_models: Vec<ModelId>,
}

impl Registry {
    /// The dataset → model graph with trust propagated along its edges.
    pub fn lineage(&self) -> LineageGraph {
        let datasets = self.catalog.datasets();
        let models = self.catalog.models();
        LineageGraph::build(&datasets, &models, |model| {
            self.catalog
                .training_record(&model.hash)
                .is_some_and(|record| self.signature_ok(&record))
        })
    }

    /// Summarize the catalog against the ledger.
    pub async fn governance(&self) -> Result<GovernanceSummary, RegistryError> {
        let entries = self.ledger.entries().await?;
        let ledger_chain_valid = match verify_chain(&entries) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "ledger chain verification failed");
                false
            }
        };

        let datasets = self.catalog.datasets();
        let unanchored_datasets = datasets
            .iter()
            .filter(|d| !entries.iter().any(|e| e.merkle_root == d.merkle_root))
            .map(|d| d.id.clone())
            .collect();
        let orphaned_ledger_entries = entries
            .iter()
            .filter(|e| !datasets.iter().any(|d| d.merkle_root == e.merkle_root))
            .map(|e| e.tx_digest)
            .collect();

        let graph = self.lineage();
        let models = self.catalog.models();
        let untrusted_models: Vec<ModelId> = models
            .iter()
            .filter(|m| !graph.node(m.id.as_str()).is_some_and(|n| n.trusted))
            .map(|m| m.id.clone())
            .collect();
        let proofs = self.catalog.proofs();

        Ok(GovernanceSummary {
            datasets: datasets.len(),
            verified_datasets: datasets.iter().filter(|d| d.verified).count(),
            models: models.len(),
            trusted_models: models.len() - untrusted_models.len(),
            proofs: proofs.len(),
            verified_proofs: proofs.iter().filter(|p| p.verified).count(),
            training_runs: self.catalog.training_history().len(),
            ledger: self.ledger.chain_id().to_string(),
            ledger_entries: entries.len(),
            ledger_chain_valid,
            unanchored_datasets,
            orphaned_ledger_entries,
            untrusted_models,
        })
    }
}
