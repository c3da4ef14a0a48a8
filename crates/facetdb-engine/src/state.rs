use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use facetdb_core::error::{Error, Result};
use facetdb_text::TantivyFacetIndex;

/// Lifecycle of the searchable snapshot.
///
/// `Empty -> Building -> Ready`, and `Ready -> Stale` once the registry
/// changes. A rebuild from `Ready` or `Stale` passes through `Building`
/// again while the previous snapshot keeps answering queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Building,
    Ready,
    Stale,
}

impl IndexState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complete, immutable set of category indexes.
#[derive(Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub indexes: BTreeMap<String, Arc<TantivyFacetIndex>>,
}

impl Snapshot {
    pub fn get(&self, category_id: &str) -> Option<&Arc<TantivyFacetIndex>> {
        self.indexes.get(category_id)
    }

    pub fn category_ids(&self) -> BTreeSet<&str> {
        self.indexes.keys().map(String::as_str).collect()
    }
}

/// Holds the "building" flag for the lifetime of one rebuild or load.
pub(crate) struct BuildGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BuildGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RebuildInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let first = BuildGuard::acquire(&flag).unwrap();
        assert!(matches!(BuildGuard::acquire(&flag), Err(Error::RebuildInProgress)));
        drop(first);
        assert!(BuildGuard::acquire(&flag).is_ok());
    }
}
