//! Records flowing between mappers, the normalizer and the indexes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{shadow_key, FieldType};

pub type DocId = String;

/// A raw value produced by a category mapper, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::Number(_) => FieldType::Number,
            Self::String(_) => FieldType::String,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FieldValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Output of a mapper: field key to raw value. `None` marks a field the
/// document has no value for; such fields are left out of the stored record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRecord {
    values: BTreeMap<String, Option<FieldValue>>,
}

impl MappedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(key.into(), Some(value.into()));
        self
    }

    #[must_use]
    pub fn with_opt<V: Into<FieldValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.values.insert(key.into(), value.map(Into::into));
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The canonical stored form of one document within one category.
///
/// - `id`: the document's globally unique identifier
/// - `values`: canonical matchable strings per field, plus `<field>$real`
///   shadow entries for values that were bucketed or substituted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: DocId,
    pub values: BTreeMap<String, String>,
}

impl NormalizedRecord {
    pub fn new(id: impl Into<DocId>) -> Self {
        Self { id: id.into(), values: BTreeMap::new() }
    }

    /// The matchable value of a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn shadow(&self, field: &str) -> Option<&str> {
        self.values.get(&shadow_key(field)).map(String::as_str)
    }

    /// The value to show or sort by: the shadow when present, else the matchable value.
    pub fn display_value(&self, field: &str) -> Option<&str> {
        self.shadow(field).or_else(|| self.get(field))
    }
}

/// One opaque blob of an exported index, stored under `<category>-<chunk_id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportChunk {
    pub chunk_id: String,
    pub data: Vec<u8>,
}

impl ExportChunk {
    pub fn new(chunk_id: impl Into<String>, data: Vec<u8>) -> Self {
        Self { chunk_id: chunk_id.into(), data }
    }
}
