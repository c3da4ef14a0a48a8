use async_trait::async_trait;

use crate::document::{Partition, SourceDocument};
use crate::error::Result;
use crate::progress::ProgressUpdate;
use crate::query::SubQuery;
use crate::types::{DocId, NormalizedRecord};

/// Where documents come from. Implementations decide what a partition is
/// (a directory, a compendium pack, a table); the core only enumerates them.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn partitions(&self) -> Result<Vec<Partition>>;
    async fn list_entries(&self, partition: &Partition) -> Result<Vec<DocId>>;
    /// Fetches the given ids from one partition; unknown ids are left out.
    async fn fetch(&self, partition: &Partition, ids: &[DocId]) -> Result<Vec<SourceDocument>>;
    /// Resolves ids across all partitions; ids that no longer exist are left out.
    async fn resolve(&self, ids: &[DocId]) -> Result<Vec<SourceDocument>>;
}

/// Read side of a per-category text/facet index.
pub trait FacetIndex: Send + Sync {
    /// Ids matching one field-scoped sub-query, at most `limit` of them.
    /// `usize::MAX` asks for the complete set.
    fn search(&self, query: &SubQuery, limit: usize) -> Result<Vec<DocId>>;
    fn all_ids(&self) -> Result<Vec<DocId>>;
    fn record(&self, id: &str) -> Result<Option<NormalizedRecord>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opaque key/value sink receiving exported index chunks.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
    /// Removes a key; a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Receives indexing progress: a stable partition name, the rendered label
/// and the integer percentage.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate<'_>);
}
