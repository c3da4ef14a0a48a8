//! Persistence sinks for exported index chunks.
//!
//! Keys are `"{category_id}-{chunk_id}"`. The file sink stores each blob as
//! `<dir>/<key>.json`; [`MirroredSink`] writes to a primary store and mirrors
//! every blob to a second one.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::PersistenceSink;

pub fn chunk_key(category_id: &str, chunk_id: &str) -> String {
    format!("{category_id}-{chunk_id}")
}

#[derive(Debug, Default)]
pub struct MemorySink {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.blobs.write().await.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.blobs.read().await.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::Persistence(format!("key '{key}' is not a valid file name")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl PersistenceSink for FileSink {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // readers never see a half-written chunk
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), bytes = blob.len(), "wrote index chunk");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = name.strip_suffix(".json") {
                if key.starts_with(prefix) {
                    out.push(key.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed index chunk");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes every blob to both stores; reads prefer the primary.
pub struct MirroredSink<P, M> {
    primary: P,
    mirror: M,
}

impl<P: PersistenceSink, M: PersistenceSink> MirroredSink<P, M> {
    pub fn new(primary: P, mirror: M) -> Self {
        Self { primary, mirror }
    }
}

#[async_trait]
impl<P: PersistenceSink, M: PersistenceSink> PersistenceSink for MirroredSink<P, M> {
    async fn put(&self, key: &str, blob: &[u8]) -> Result<()> {
        let primary = self.primary.put(key, blob).await;
        let mirror = self.mirror.put(key, blob).await;
        match (primary, mirror) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(Error::Persistence(format!("mirror write of '{key}' failed: {e}"))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.primary.get(key).await? {
            Some(blob) => Ok(Some(blob)),
            None => self.mirror.get(key).await,
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = self.primary.keys(prefix).await?;
        if keys.is_empty() {
            keys = self.mirror.keys(prefix).await?;
        }
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let primary = self.primary.delete(key).await;
        let mirror = self.mirror.delete(key).await;
        primary.and(mirror)
    }
}
