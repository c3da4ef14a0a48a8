//! Source documents and an in-memory document source.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::DocId;

/// One source partition (a "compendium"): a labelled collection of
/// documents sharing one document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: String,
    pub label: String,
    pub document_type: String,
}

impl Partition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self { id: id.into(), label: label.into(), document_type: document_type.into() }
    }
}

/// A document as delivered by a source. Only `id` and `container` mean
/// anything to the core; `data` is handed to mappers untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: DocId,
    pub document_type: String,
    pub name: Option<String>,
    /// Id of the document this one is nested inside, if any.
    pub container: Option<String>,
    pub data: Value,
}

impl SourceDocument {
    pub fn new(id: impl Into<DocId>, document_type: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), document_type: document_type.into(), name: None, container: None, data }
    }

    /// Builds a document from a JSON object carrying `id`, an optional
    /// `name` and an optional container reference (`container` or
    /// `system.container`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Source` when the value is not an object with a string `id`.
    pub fn from_json(document_type: &str, data: Value) -> Result<Self> {
        let id = data
            .get("id")
            .or_else(|| data.get("_id"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Source("document has no string 'id'".to_string()))?
            .to_string();
        let name = data.get("name").and_then(Value::as_str).map(str::to_string);
        let container = data
            .get("container")
            .or_else(|| data.pointer("/system/container"))
            .and_then(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            });
        Ok(Self { id, document_type: document_type.to_string(), name, container, data })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn inside(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Documents nested in a container are not indexed on their own.
    pub fn is_contained(&self) -> bool {
        self.container.is_some()
    }
}

/// A document source backed by plain vectors, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryDocumentSource {
    partitions: Vec<(Partition, Vec<SourceDocument>)>,
}

impl MemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_partition(mut self, partition: Partition, docs: Vec<SourceDocument>) -> Self {
        self.partitions.push((partition, docs));
        self
    }

    fn by_id(&self) -> HashMap<&str, &SourceDocument> {
        self.partitions.iter().flat_map(|(_, docs)| docs.iter()).map(|d| (d.id.as_str(), d)).collect()
    }

    /// Removes a document everywhere, as if it had been deleted at the source.
    pub fn remove(&mut self, id: &str) {
        for (_, docs) in &mut self.partitions {
            docs.retain(|d| d.id != id);
        }
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn partitions(&self) -> Result<Vec<Partition>> {
        Ok(self.partitions.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn list_entries(&self, partition: &Partition) -> Result<Vec<DocId>> {
        self.partitions
            .iter()
            .find(|(p, _)| p.id == partition.id)
            .map(|(_, docs)| docs.iter().map(|d| d.id.clone()).collect())
            .ok_or_else(|| Error::NotFound(format!("partition '{}'", partition.id)))
    }

    async fn fetch(&self, partition: &Partition, ids: &[DocId]) -> Result<Vec<SourceDocument>> {
        let Some((_, docs)) = self.partitions.iter().find(|(p, _)| p.id == partition.id) else {
            return Err(Error::NotFound(format!("partition '{}'", partition.id)));
        };
        Ok(ids.iter().filter_map(|id| docs.iter().find(|d| &d.id == id).cloned()).collect())
    }

    async fn resolve(&self, ids: &[DocId]) -> Result<Vec<SourceDocument>> {
        let index = self.by_id();
        Ok(ids.iter().filter_map(|id| index.get(id.as_str()).map(|d| (*d).clone())).collect())
    }
}
