use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use facetdb_core::types::DocId;

/// A document (or whole batch) that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub partition: String,
    /// `None` when a whole listing or fetch failed.
    pub document: Option<DocId>,
    pub category: Option<String>,
    pub error: String,
}

/// Outcome of one rebuild pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Registry generation the new snapshot was built against.
    pub generation: u64,
    pub partitions_scanned: usize,
    pub partitions_skipped: usize,
    pub documents_seen: usize,
    pub contained_skipped: usize,
    /// Records indexed per category id. Every registered category has an entry.
    pub indexed: BTreeMap<String, usize>,
    pub failures: Vec<DocumentFailure>,
    /// Sink keys that could not be written, with the error.
    pub persistence_failures: Vec<(String, String)>,
}

impl RebuildReport {
    pub fn total_indexed(&self) -> usize {
        self.indexed.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.persistence_failures.is_empty()
    }
}
