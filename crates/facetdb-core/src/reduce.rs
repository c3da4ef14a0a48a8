//! Set algebra over sub-query results: union within a field, intersection across fields.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::Result;
use crate::query::CompiledQuery;
use crate::traits::FacetIndex;
use crate::types::DocId;

/// What a query with no constraints at all returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyQueryPolicy {
    #[default]
    MatchAll,
    MatchNone,
}

/// Runs each sub-query and combines the id sets.
///
/// Every sub-query contributes its complete match set; `limit` caps only the
/// reduced result, keeping the lowest ids.
///
/// Execution failures of a single sub-query are logged and leave that field
/// with no matches, which empties the overall result. Configuration errors
/// are returned as-is.
pub fn reduce<I>(index: &I, compiled: &CompiledQuery, policy: EmptyQueryPolicy, limit: usize) -> Result<BTreeSet<DocId>>
where
    I: FacetIndex + ?Sized,
{
    let sub_queries = match compiled {
        CompiledQuery::Unsatisfiable => return Ok(BTreeSet::new()),
        CompiledQuery::SubQueries(q) => q,
    };
    if sub_queries.is_empty() {
        return match policy {
            EmptyQueryPolicy::MatchAll => Ok(cap(index.all_ids()?.into_iter().collect(), limit)),
            EmptyQueryPolicy::MatchNone => Ok(BTreeSet::new()),
        };
    }

    let mut per_field: BTreeMap<&str, BTreeSet<DocId>> = BTreeMap::new();
    let mut failed = false;
    for sub in sub_queries {
        match index.search(sub, usize::MAX) {
            Ok(ids) => per_field.entry(sub.field.as_str()).or_default().extend(ids),
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                warn!(
                    field = %sub.field,
                    query = %sub.query,
                    error = %e,
                    "sub-query failed, treating field as unmatched"
                );
                failed = true;
            }
        }
    }
    if failed {
        return Ok(BTreeSet::new());
    }

    let mut sets = per_field.into_values();
    let Some(mut acc) = sets.next() else { return Ok(BTreeSet::new()) };
    for set in sets {
        acc.retain(|id| set.contains(id));
        if acc.is_empty() {
            break;
        }
    }
    debug!(sub_queries = sub_queries.len(), hits = acc.len(), "reduced query");
    Ok(cap(acc, limit))
}

fn cap(mut ids: BTreeSet<DocId>, limit: usize) -> BTreeSet<DocId> {
    if ids.len() > limit {
        warn!(hits = ids.len(), limit, "result exceeds search.max_hits, truncating");
        ids = ids.into_iter().take(limit).collect();
    }
    ids
}
