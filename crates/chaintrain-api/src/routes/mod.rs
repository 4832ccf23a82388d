//! # API Route Modules
//!
//! - `datasets` — dataset upload (the registration pipeline) and download.
//! - `training` — training runs, training history, training-data
//!   verification.
//! - `catalog` — read surface over datasets, models and proofs, plus
//!   re-verification, lineage, governance and upload progress.

pub mod catalog;
pub mod datasets;
pub mod training;
