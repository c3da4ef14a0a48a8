//! Tab registry: the ordered set of search categories.
//!
//! Categories are registered once at startup and read-only afterwards. Every
//! registration bumps a generation counter; indexes remember the generation
//! they were built from and are stale once it moves on.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::types::MappedRecord;

/// Maps a source document to a category's field values.
///
/// Returning `None` means the document does not belong to the category.
pub trait Mapper: Send + Sync {
    fn map(&self, doc: &SourceDocument) -> Option<MappedRecord>;
}

impl<F> Mapper for F
where
    F: Fn(&SourceDocument) -> Option<MappedRecord> + Send + Sync,
{
    fn map(&self, doc: &SourceDocument) -> Option<MappedRecord> {
        self(doc)
    }
}

/// A named, schema-bound search partition over one document type.
#[derive(Clone)]
pub struct Category {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub document_type: String,
    pub schema: Schema,
    pub result_template: String,
    mapper: Arc<dyn Mapper>,
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Category")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("document_type", &self.document_type)
            .field("fields", &self.schema.len())
            .finish_non_exhaustive()
    }
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        document_type: impl Into<String>,
        schema: Schema,
        mapper: impl Mapper + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            icon: String::new(),
            document_type: document_type.into(),
            schema,
            result_template: String::new(),
            mapper: Arc::new(mapper),
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    #[must_use]
    pub fn with_result_template(mut self, template: impl Into<String>) -> Self {
        self.result_template = template.into();
        self
    }

    pub fn map(&self, doc: &SourceDocument) -> Option<MappedRecord> {
        self.mapper.map(doc)
    }
}

#[derive(Debug, Default)]
pub struct TabRegistry {
    categories: RwLock<Vec<Arc<Category>>>,
    generation: AtomicU64,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category after validating its id and schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an empty or duplicate id, or an
    /// invalid schema.
    pub fn register(&self, category: Category) -> Result<()> {
        if category.id.trim().is_empty() {
            return Err(Error::config("category id must not be empty"));
        }
        category
            .schema
            .validate()
            .map_err(|e| Error::config(format!("category '{}': {e}", category.id)))?;

        let mut categories = self.categories.write().unwrap_or_else(PoisonError::into_inner);
        if categories.iter().any(|c| c.id == category.id) {
            return Err(Error::config(format!("duplicate category id '{}'", category.id)));
        }
        info!(
            category = %category.id,
            document_type = %category.document_type,
            fields = category.schema.len(),
            "registered search category"
        );
        categories.push(Arc::new(category));
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Snapshot of all categories in registration order.
    pub fn categories(&self) -> Vec<Arc<Category>> {
        self.categories.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Category>> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn for_document_type(&self, document_type: &str) -> Vec<Arc<Category>> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.document_type == document_type)
            .cloned()
            .collect()
    }

    pub fn document_types(&self) -> BTreeSet<String> {
        self.categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.document_type.clone())
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.categories.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
