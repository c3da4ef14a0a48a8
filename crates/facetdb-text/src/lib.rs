//! facetdb-text
//!
//! Tantivy-backed facet index: one in-memory index per category with
//! field-scoped token and term matching, stored records and chunked
//! export/import.
pub mod index;
pub mod tantivy_utils;

pub use index::TantivyFacetIndex;
