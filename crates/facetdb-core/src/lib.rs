//! Schema-driven faceted search core: field schemas, value normalization,
//! the category registry, query compilation, result reduction and sorting,
//! plus the collaborator traits the index builder drives.

#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod document;
pub mod error;
pub mod json_source;
pub mod normalize;
pub mod persist;
pub mod progress;
pub mod query;
pub mod reduce;
pub mod registry;
pub mod schema;
pub mod sort;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
