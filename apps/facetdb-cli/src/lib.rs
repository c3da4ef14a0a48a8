//! Pieces shared by the `facetdb` binary: the sample compendium categories,
//! terminal progress and facet argument parsing.

pub mod dnd5e;
pub mod progress;
pub mod selection;

pub use progress::BarProgress;
pub use selection::{parse_selection, render};
