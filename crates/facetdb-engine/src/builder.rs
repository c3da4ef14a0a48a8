//! Index builder: scans the document source, normalizes every document into
//! each matching category and swaps in the finished snapshot.

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use facetdb_core::config::Settings;
use facetdb_core::document::{Partition, SourceDocument};
use facetdb_core::error::{Error, Result};
use facetdb_core::normalize::normalize_record;
use facetdb_core::persist::chunk_key;
use facetdb_core::progress::{LogProgress, ProgressTracker};
use facetdb_core::registry::{Category, TabRegistry};
use facetdb_core::traits::{DocumentSource, FacetIndex, PersistenceSink, ProgressSink};
use facetdb_core::types::ExportChunk;
use facetdb_text::index::{SCHEMA_CHUNK, STORE_CHUNK_PREFIX};
use facetdb_text::TantivyFacetIndex;

use crate::report::{DocumentFailure, RebuildReport};
use crate::state::{BuildGuard, IndexState, Snapshot};

/// Which source partitions a rebuild scans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PartitionFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl PartitionFilter {
    pub fn includes(&self, partition_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(partition_id),
        }
    }
}

/// `*` selects everything; otherwise a comma-separated list of partition ids.
impl FromStr for PartitionFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::All);
        }
        let ids: BTreeSet<String> = s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect();
        if ids.is_empty() {
            return Err(Error::config("partition filter must be '*' or a list of partition ids"));
        }
        Ok(Self::Only(ids))
    }
}

pub struct IndexBuilder {
    pub(crate) registry: Arc<TabRegistry>,
    pub(crate) source: Arc<dyn DocumentSource>,
    sink: Arc<dyn PersistenceSink>,
    progress: Arc<dyn ProgressSink>,
    pub(crate) settings: Settings,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    building: AtomicBool,
}

impl IndexBuilder {
    pub fn new(
        registry: Arc<TabRegistry>,
        source: Arc<dyn DocumentSource>,
        sink: Arc<dyn PersistenceSink>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            source,
            sink,
            progress: Arc::new(LogProgress),
            settings,
            snapshot: RwLock::new(None),
            building: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &Arc<TabRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> IndexState {
        if self.building.load(Ordering::Acquire) {
            return IndexState::Building;
        }
        match self.snapshot() {
            None => IndexState::Empty,
            Some(s) if s.generation != self.registry.generation() => IndexState::Stale,
            Some(_) => IndexState::Ready,
        }
    }

    /// The last complete snapshot, whatever the current state.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn swap(&self, snapshot: Snapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
    }

    fn partition_enabled(&self, partition: &Partition) -> bool {
        let enabled = &self.settings.index.enabled_partitions;
        enabled.is_empty() || enabled.iter().any(|p| *p == partition.id)
    }

    /// Rebuilds every category index from the document source.
    ///
    /// Per-document mapping, normalization and insertion failures, as well
    /// as failed batch fetches, are logged and collected in the report; they
    /// never abort the pass. Export failures are reported too, after the new
    /// snapshot is already live.
    ///
    /// # Errors
    ///
    /// Returns `Error::RebuildInProgress` when another rebuild holds the
    /// builder, and source or index errors that leave no usable snapshot. The
    /// previous snapshot stays in place on error.
    pub async fn rebuild(&self, filter: &PartitionFilter) -> Result<RebuildReport> {
        let _guard = BuildGuard::acquire(&self.building)?;
        let generation = self.registry.generation();
        let categories = self.registry.categories();
        let mut report = RebuildReport { generation, ..RebuildReport::default() };
        info!(generation, categories = categories.len(), "starting index rebuild");

        let mut indexes = BTreeMap::new();
        for category in &categories {
            indexes.insert(category.id.clone(), TantivyFacetIndex::new(category.id.clone(), &category.schema)?);
            report.indexed.insert(category.id.clone(), 0);
        }

        for partition in self.source.partitions().await? {
            if !filter.includes(&partition.id) || !self.partition_enabled(&partition) {
                debug!(partition = %partition.id, "partition not selected");
                report.partitions_skipped += 1;
                continue;
            }
            let targets: Vec<&Arc<Category>> =
                categories.iter().filter(|c| c.document_type == partition.document_type).collect();
            if targets.is_empty() {
                debug!(
                    partition = %partition.id,
                    document_type = %partition.document_type,
                    "no category for partition"
                );
                report.partitions_skipped += 1;
                continue;
            }
            self.scan_partition(&partition, &targets, &indexes, &mut report).await;
            report.partitions_scanned += 1;
        }

        for index in indexes.values() {
            index.commit()?;
        }
        let indexes: BTreeMap<String, Arc<TantivyFacetIndex>> =
            indexes.into_iter().map(|(id, index)| (id, Arc::new(index))).collect();
        self.swap(Snapshot { generation, indexes: indexes.clone() });
        info!(
            generation,
            indexed = report.total_indexed(),
            failures = report.failures.len(),
            "index rebuild complete"
        );

        for (category_id, index) in &indexes {
            self.persist(category_id, index, &mut report).await;
        }
        Ok(report)
    }

    async fn scan_partition(
        &self,
        partition: &Partition,
        targets: &[&Arc<Category>],
        indexes: &BTreeMap<String, TantivyFacetIndex>,
        report: &mut RebuildReport,
    ) {
        let entries = match self.source.list_entries(partition).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(partition = %partition.id, error = %e, "failed to list partition");
                report.failures.push(DocumentFailure {
                    partition: partition.id.clone(),
                    document: None,
                    category: None,
                    error: e.to_string(),
                });
                return;
            }
        };
        let mut tracker = ProgressTracker::start(self.progress.as_ref(), partition.label.clone(), entries.len());
        for batch in entries.chunks(self.settings.index.batch_size.max(1)) {
            let docs = match self.source.fetch(partition, batch).await {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(partition = %partition.id, batch = batch.len(), error = %e, "failed to fetch batch");
                    report.failures.push(DocumentFailure {
                        partition: partition.id.clone(),
                        document: None,
                        category: None,
                        error: e.to_string(),
                    });
                    tracker.advance(batch.len());
                    continue;
                }
            };
            for doc in &docs {
                report.documents_seen += 1;
                if doc.is_contained() {
                    report.contained_skipped += 1;
                    continue;
                }
                for category in targets {
                    let Some(index) = indexes.get(&category.id) else { continue };
                    match index_document(category, index, doc) {
                        Ok(true) => *report.indexed.entry(category.id.clone()).or_default() += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(
                                partition = %partition.id,
                                document = %doc.id,
                                category = %category.id,
                                error = %e,
                                "skipping document"
                            );
                            report.failures.push(DocumentFailure {
                                partition: partition.id.clone(),
                                document: Some(doc.id.clone()),
                                category: Some(category.id.clone()),
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
            tracker.advance(batch.len());
        }
        tracker.finish();
    }

    /// Store chunks go out first under a fresh export id; the header naming
    /// that id is written only after every store chunk was accepted, and
    /// store chunks of earlier exports are removed last. A header on disk
    /// therefore always names a complete set of chunks.
    async fn persist(&self, category_id: &str, index: &TantivyFacetIndex, report: &mut RebuildReport) {
        let export_id = new_export_id();
        let chunks = match index.export(&export_id, self.settings.index.export_chunk_size) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(category = %category_id, error = %e, "failed to export index");
                report.persistence_failures.push((category_id.to_string(), e.to_string()));
                return;
            }
        };
        let (header, store): (Vec<ExportChunk>, Vec<ExportChunk>) =
            chunks.into_iter().partition(|c| c.chunk_id == SCHEMA_CHUNK);
        let written: BTreeSet<String> = store.iter().map(|c| chunk_key(category_id, &c.chunk_id)).collect();

        let writes = store.iter().map(|chunk| {
            let key = chunk_key(category_id, &chunk.chunk_id);
            async move {
                let outcome = self.sink.put(&key, &chunk.data).await;
                (key, outcome)
            }
        });
        let mut store_ok = true;
        for (key, outcome) in join_all(writes).await {
            if let Err(e) = outcome {
                warn!(key = %key, error = %e, "failed to persist index chunk");
                report.persistence_failures.push((key, e.to_string()));
                store_ok = false;
            }
        }
        if !store_ok {
            return;
        }
        for chunk in header {
            let key = chunk_key(category_id, &chunk.chunk_id);
            if let Err(e) = self.sink.put(&key, &chunk.data).await {
                warn!(key = %key, error = %e, "failed to persist index header");
                report.persistence_failures.push((key, e.to_string()));
                return;
            }
        }
        self.remove_stale_chunks(category_id, &written).await;
    }

    /// Deletion failures are only logged; import ignores chunks of other
    /// exports.
    async fn remove_stale_chunks(&self, category_id: &str, written: &BTreeSet<String>) {
        let prefix = chunk_key(category_id, STORE_CHUNK_PREFIX);
        let keys = match self.sink.keys(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(category = %category_id, error = %e, "failed to list persisted chunks");
                return;
            }
        };
        for key in keys.into_iter().filter(|k| !written.contains(k)) {
            match self.sink.delete(&key).await {
                Ok(()) => debug!(key = %key, "removed stale index chunk"),
                Err(e) => warn!(key = %key, error = %e, "failed to remove stale index chunk"),
            }
        }
    }

    /// Restores a snapshot from previously exported chunks without
    /// rescanning the source.
    ///
    /// # Errors
    ///
    /// Fails, leaving the current snapshot untouched, when any registered
    /// category has no usable export: missing chunks, a schema that no
    /// longer matches, or a sink error.
    pub async fn load_persisted(&self) -> Result<usize> {
        let _guard = BuildGuard::acquire(&self.building)?;
        let generation = self.registry.generation();
        let mut indexes = BTreeMap::new();
        let mut docs = 0;
        for category in self.registry.categories() {
            let prefix = chunk_key(&category.id, "");
            let keys = self.sink.keys(&prefix).await?;
            if keys.is_empty() {
                return Err(Error::NotFound(format!("no persisted index for category '{}'", category.id)));
            }
            let mut chunks = Vec::with_capacity(keys.len());
            for key in keys {
                let Some(data) = self.sink.get(&key).await? else { continue };
                let chunk_id = key.strip_prefix(&prefix).unwrap_or(&key).to_string();
                chunks.push(ExportChunk::new(chunk_id, data));
            }
            let index = TantivyFacetIndex::import(&category.id, &category.schema, chunks)
                .map_err(|e| Error::Persistence(format!("category '{}': {e}", category.id)))?;
            docs += index.len();
            indexes.insert(category.id.clone(), Arc::new(index));
        }
        self.swap(Snapshot { generation, indexes });
        info!(generation, docs, "loaded persisted indexes");
        Ok(docs)
    }
}

/// Time-based id distinguishing one export's store chunks from another's.
fn new_export_id() -> String {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{:x}", since_epoch.as_nanos())
}

/// Maps, normalizes and inserts one document. `Ok(false)` when the
/// category's mapper declines it.
fn index_document(category: &Category, index: &TantivyFacetIndex, doc: &SourceDocument) -> Result<bool> {
    let Some(mapped) = category.map(doc) else { return Ok(false) };
    let record = normalize_record(&doc.id, &category.schema, &mapped)?;
    index.insert(&record)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_filter_parses_star_and_lists() {
        assert_eq!("*".parse::<PartitionFilter>().unwrap(), PartitionFilter::All);
        let only: PartitionFilter = "spells, monsters,".parse().unwrap();
        assert!(only.includes("spells"));
        assert!(only.includes("monsters"));
        assert!(!only.includes("weapons"));
        assert!(" , ".parse::<PartitionFilter>().unwrap_err().is_configuration());
    }
}
