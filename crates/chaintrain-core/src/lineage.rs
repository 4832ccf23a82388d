//! # Lineage Graph
//!
//! Datasets and models form a directed graph with edges dataset → model, one
//! per dataset a model was trained on. Trust flows along the edges: a model is
//! trusted only if its training signature verifies and every dataset it lists
//! is registered and verified. A model with no recorded datasets is never
//! trusted.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Dataset, Model};

/// Node kind in the lineage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A registered dataset.
    Dataset,
    /// A trained model.
    Model,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    /// Dataset or model id.
    pub id: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// The record's own `verified` flag.
    pub verified: bool,
    /// Whether the chain of trust holds up to and including this node.
    pub trusted: bool,
}

/// A dataset → model edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    /// Dataset id.
    pub from: String,
    /// Model id.
    pub to: String,
}

/// The full lineage graph, nodes sorted by kind then id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageGraph {
    /// All datasets and models.
    pub nodes: Vec<LineageNode>,
    /// Training edges.
    pub edges: Vec<LineageEdge>,
}

impl LineageGraph {
    /// Build the graph. `signature_ok` reports whether a model's training
    /// signature verifies.
    pub fn build(
        datasets: &[Dataset],
        models: &[Model],
        signature_ok: impl Fn(&Model) -> bool,
    ) -> Self {
        let verified: HashMap<&str, bool> = datasets
            .iter()
            .map(|d| (d.id.as_str(), d.verified))
            .collect();

        let mut nodes: BTreeMap<(u8, String), LineageNode> = BTreeMap::new();
        for d in datasets {
            nodes.insert(
                (0, d.id.to_string()),
                LineageNode {
                    id: d.id.to_string(),
                    kind: NodeKind::Dataset,
                    name: d.name.clone(),
                    verified: d.verified,
                    trusted: d.verified,
                },
            );
        }

        let mut edges = Vec::new();
        for m in models {
            let trusted = model_trusted(m, &verified, &signature_ok);
            for ds in &m.dataset_ids {
                edges.push(LineageEdge {
                    from: ds.to_string(),
                    to: m.id.to_string(),
                });
            }
            nodes.insert(
                (1, m.id.to_string()),
                LineageNode {
                    id: m.id.to_string(),
                    kind: NodeKind::Model,
                    name: m.name.clone(),
                    verified: m.verified,
                    trusted,
                },
            );
        }
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        Self {
            nodes: nodes.into_values().collect(),
            edges,
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&LineageNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

fn model_trusted(
    model: &Model,
    dataset_verified: &HashMap<&str, bool>,
    signature_ok: &impl Fn(&Model) -> bool,
) -> bool {
    !model.dataset_ids.is_empty()
        && model
            .dataset_ids
            .iter()
            .all(|d| dataset_verified.get(d.as_str()).copied().unwrap_or(false))
        && signature_ok(model)
}
