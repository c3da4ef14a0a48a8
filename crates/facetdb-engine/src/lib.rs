//! facetdb-engine
//!
//! Builds per-category facet indexes from a document source, keeps the
//! current snapshot and answers facet queries against it.
pub mod builder;
pub mod report;
pub mod search;
pub mod state;

pub use builder::{IndexBuilder, PartitionFilter};
pub use report::{DocumentFailure, RebuildReport};
pub use search::{SearchHit, SortSpec};
pub use state::IndexState;
