//! A document source reading JSON files from a directory tree.
//!
//! Layout: every immediate subdirectory of the root is one partition and must
//! hold a `_partition.toml` naming its `document_type` (and optionally a
//! `label`). Every `*.json` file below it holds one document object or an
//! array of them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::document::{Partition, SourceDocument};
use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::DocId;

pub const PARTITION_MANIFEST: &str = "_partition.toml";

#[derive(Debug, Deserialize)]
struct PartitionManifest {
    document_type: String,
    label: Option<String>,
}

#[derive(Debug)]
struct LoadedPartition {
    partition: Partition,
    docs: Vec<SourceDocument>,
}

/// Loads the whole tree eagerly; partitions are sorted by id and documents
/// keep file order (files sorted by path, array order within a file).
#[derive(Debug)]
pub struct JsonDirSource {
    root: PathBuf,
    partitions: Vec<LoadedPartition>,
}

impl JsonDirSource {
    /// # Errors
    ///
    /// Returns `Error::Io` when the root cannot be read and `Error::Source`
    /// for a manifest or document that fails to parse.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut dirs: Vec<PathBuf> = fs::read_dir(&root)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut partitions = Vec::new();
        for dir in dirs {
            let manifest_path = dir.join(PARTITION_MANIFEST);
            if !manifest_path.is_file() {
                warn!(dir = %dir.display(), "skipping directory without {PARTITION_MANIFEST}");
                continue;
            }
            let manifest: PartitionManifest = toml::from_str(&fs::read_to_string(&manifest_path)?)
                .map_err(|e| Error::Source(format!("{}: {e}", manifest_path.display())))?;
            let id = partition_id(&root, &dir);
            let label = manifest.label.unwrap_or_else(|| id.clone());
            let partition = Partition::new(id, label, manifest.document_type);
            let docs = load_documents(&dir, &partition.document_type)?;
            debug!(partition = %partition.id, documents = docs.len(), "loaded partition");
            partitions.push(LoadedPartition { partition, docs });
        }
        Ok(Self { root, partitions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn loaded(&self, id: &str) -> Result<&LoadedPartition> {
        self.partitions
            .iter()
            .find(|p| p.partition.id == id)
            .ok_or_else(|| Error::NotFound(format!("partition '{id}'")))
    }
}

fn partition_id(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    relative.to_string_lossy().replace('\\', "/")
}

fn list_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}

fn load_documents(dir: &Path, document_type: &str) -> Result<Vec<SourceDocument>> {
    let mut docs = Vec::new();
    for file in list_json_files(dir) {
        let value: Value = serde_json::from_str(&fs::read_to_string(&file)?)
            .map_err(|e| Error::Source(format!("{}: {e}", file.display())))?;
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in items {
            let doc = SourceDocument::from_json(document_type, item)
                .map_err(|e| Error::Source(format!("{}: {e}", file.display())))?;
            docs.push(doc);
        }
    }
    Ok(docs)
}

#[async_trait]
impl DocumentSource for JsonDirSource {
    async fn partitions(&self) -> Result<Vec<Partition>> {
        Ok(self.partitions.iter().map(|p| p.partition.clone()).collect())
    }

    async fn list_entries(&self, partition: &Partition) -> Result<Vec<DocId>> {
        Ok(self.loaded(&partition.id)?.docs.iter().map(|d| d.id.clone()).collect())
    }

    async fn fetch(&self, partition: &Partition, ids: &[DocId]) -> Result<Vec<SourceDocument>> {
        let loaded = self.loaded(&partition.id)?;
        let by_id: HashMap<&str, &SourceDocument> = loaded.docs.iter().map(|d| (d.id.as_str(), d)).collect();
        Ok(ids.iter().filter_map(|id| by_id.get(id.as_str()).map(|d| (*d).clone())).collect())
    }

    async fn resolve(&self, ids: &[DocId]) -> Result<Vec<SourceDocument>> {
        let by_id: HashMap<&str, &SourceDocument> =
            self.partitions.iter().flat_map(|p| p.docs.iter()).map(|d| (d.id.as_str(), d)).collect();
        Ok(ids.iter().filter_map(|id| by_id.get(id.as_str()).map(|d| (*d).clone())).collect())
    }
}
