use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use facetdb_core::document::SourceDocument;
use facetdb_core::error::{Error, Result};
use facetdb_core::query::{compile, FacetSelection};
use facetdb_core::reduce::reduce;
use facetdb_core::sort::{comparator, SortDirection, SortKind};
use facetdb_core::traits::FacetIndex;
use facetdb_core::types::{DocId, NormalizedRecord};

use crate::builder::IndexBuilder;
use crate::state::IndexState;

/// Field and direction to order results by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// A resolved result: the live source document and its stored record.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: SourceDocument,
    pub record: NormalizedRecord,
}

impl SearchHit {
    pub fn id(&self) -> &DocId {
        &self.document.id
    }
}

impl IndexBuilder {
    /// Runs a facet query against one category.
    ///
    /// Ids that no longer resolve in the document source are dropped
    /// silently. Without a sort the hits come back in id order.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown category, `IndexNotReady` when no snapshot
    /// covers it yet, and `Configuration` for a selection or sort field that
    /// does not fit the schema.
    pub async fn search(
        &self,
        category_id: &str,
        selection: &FacetSelection,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<SearchHit>> {
        let category = self
            .registry
            .get(category_id)
            .ok_or_else(|| Error::NotFound(format!("category '{category_id}'")))?;
        let snapshot = self
            .snapshot()
            .ok_or_else(|| Error::IndexNotReady(format!("no index has been built for '{category_id}'")))?;
        let index = snapshot
            .get(category_id)
            .cloned()
            .ok_or_else(|| {
                Error::IndexNotReady(format!("category '{category_id}' was registered after the last build"))
            })?;
        match self.state() {
            IndexState::Ready | IndexState::Empty => {}
            state => warn!(category = %category_id, %state, "serving query from previous snapshot"),
        }

        let sort = match sort {
            Some(spec) => {
                let descriptor = category.schema.get(&spec.field).ok_or_else(|| {
                    Error::config(format!("cannot sort '{category_id}' by unknown field '{}'", spec.field))
                })?;
                Some((spec, SortKind::for_descriptor(descriptor)))
            }
            None => None,
        };

        let compiled = compile(&category.schema, selection)?;
        let ids: Vec<DocId> =
            reduce(index.as_ref(), &compiled, self.settings.search.empty_query, self.settings.search.max_hits)?
                .into_iter()
                .collect();
        let documents = self.source.resolve(&ids).await?;

        let mut hits = Vec::with_capacity(documents.len());
        for document in documents {
            match index.record(&document.id)? {
                Some(record) => hits.push(SearchHit { document, record }),
                None => debug!(document = %document.id, "resolved document has no stored record"),
            }
        }
        if let Some((spec, kind)) = sort {
            let cmp = comparator(&spec.field, spec.direction, kind);
            hits.sort_by(|a, b| cmp(&a.record, &b.record));
        }
        debug!(category = %category_id, matched = ids.len(), returned = hits.len(), "search complete");
        Ok(hits)
    }
}
