use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::{debug, info};

use facetdb_core::error::{Error, Result};
use facetdb_core::query::SubQuery;
use facetdb_core::schema::{FieldKind, Schema};
use facetdb_core::traits::FacetIndex;
use facetdb_core::types::{DocId, ExportChunk, NormalizedRecord};

use crate::tantivy_utils::{build_schema, register_tokenizer, FieldMap};

/// Chunk id of the export header.
pub const SCHEMA_CHUNK: &str = "schema";
/// Prefix of chunks holding stored records.
pub const STORE_CHUNK_PREFIX: &str = "store.";

/// Chunk id of the `n`th store chunk of one export.
pub fn store_chunk_id(export_id: &str, n: usize) -> String {
	format!("{STORE_CHUNK_PREFIX}{export_id}.{n}")
}

fn parse_store_chunk_id(chunk_id: &str) -> Option<(&str, usize)> {
	let (export_id, n) = chunk_id.strip_prefix(STORE_CHUNK_PREFIX)?.rsplit_once('.')?;
	Some((export_id, n.parse().ok()?))
}

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn index_err(e: impl Display) -> Error {
	Error::Index(e.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportHeader {
	category_id: String,
	schema: Schema,
	/// Store chunks of other exports are ignored on import.
	export_id: String,
	records: usize,
	chunks: usize,
}

/// In-memory facet index of one category.
///
/// Inserts are buffered until [`commit`](Self::commit); searches only see
/// committed records.
pub struct TantivyFacetIndex {
	category_id: String,
	schema: Schema,
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	fields: FieldMap,
}

impl TantivyFacetIndex {
	pub fn new(category_id: impl Into<String>, schema: &Schema) -> Result<Self> {
		let (tantivy_schema, fields) = build_schema(schema);
		let index = Index::create_in_ram(tantivy_schema);
		register_tokenizer(&index);
		let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(index_err)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		Ok(Self {
			category_id: category_id.into(),
			schema: schema.clone(),
			index,
			reader,
			writer: Mutex::new(writer),
			fields,
		})
	}

	pub fn category_id(&self) -> &str {
		&self.category_id
	}

	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// Adds or replaces the record stored under `record.id`.
	pub fn insert(&self, record: &NormalizedRecord) -> Result<()> {
		let mut doc = TantivyDocument::default();
		doc.add_text(self.fields.id, &record.id);
		for (key, field) in &self.fields.fields {
			if let Some(value) = record.get(key) {
				doc.add_text(*field, value);
			}
		}
		doc.add_text(self.fields.record, serde_json::to_string(record)?);

		let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
		writer.delete_term(Term::from_field_text(self.fields.id, &record.id));
		writer.add_document(doc).map_err(index_err)?;
		Ok(())
	}

	/// Makes everything inserted so far visible to searches.
	pub fn commit(&self) -> Result<()> {
		let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
		writer.commit().map_err(index_err)?;
		self.reader.reload().map_err(index_err)?;
		debug!(category = %self.category_id, docs = self.len(), "committed facet index");
		Ok(())
	}

	fn field(&self, key: &str) -> Result<Field> {
		self.fields
			.fields
			.get(key)
			.copied()
			.ok_or_else(|| Error::config(format!("category '{}' has no field '{key}'", self.category_id)))
	}

	/// Every token of the text must prefix-match some token of the field.
	fn text_query(&self, field: Field, text: &str) -> Result<Option<Box<dyn Query>>> {
		let mut analyzer = self.index.tokenizer_for_field(field).map_err(index_err)?;
		let mut stream = analyzer.token_stream(text);
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		while stream.advance() {
			let term = Term::from_field_text(field, &stream.token().text);
			clauses.push((Occur::Must, Box::new(FuzzyTermQuery::new_prefix(term, 0, true))));
		}
		Ok(match clauses.len() {
			0 => None,
			1 => clauses.pop().map(|(_, q)| q),
			_ => Some(Box::new(BooleanQuery::new(clauses))),
		})
	}

	fn ids_of(&self, searcher: &Searcher, addresses: impl IntoIterator<Item = DocAddress>) -> Result<Vec<DocId>> {
		let mut ids = Vec::new();
		for address in addresses {
			let doc: TantivyDocument = searcher.doc(address).map_err(index_err)?;
			if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_str()) {
				ids.push(id.to_string());
			}
		}
		Ok(ids)
	}

	fn all_records(&self) -> Result<Vec<NormalizedRecord>> {
		let searcher = self.reader.searcher();
		let addresses = searcher.search(&AllQuery, &DocSetCollector).map_err(index_err)?;
		let mut records = Vec::with_capacity(addresses.len());
		for address in addresses {
			let doc: TantivyDocument = searcher.doc(address).map_err(index_err)?;
			if let Some(json) = doc.get_first(self.fields.record).and_then(|v| v.as_str()) {
				records.push(serde_json::from_str::<NormalizedRecord>(json)?);
			}
		}
		records.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(records)
	}

	/// Serializes the index as a header chunk plus `store.<export_id>.<n>`
	/// chunks of at most `chunk_size` records each.
	pub fn export(&self, export_id: &str, chunk_size: usize) -> Result<Vec<ExportChunk>> {
		let records = self.all_records()?;
		let store: Vec<&[NormalizedRecord]> = records.chunks(chunk_size.max(1)).collect();
		let header = ExportHeader {
			category_id: self.category_id.clone(),
			schema: self.schema.clone(),
			export_id: export_id.to_string(),
			records: records.len(),
			chunks: store.len(),
		};
		let mut chunks = vec![ExportChunk::new(SCHEMA_CHUNK, serde_json::to_vec(&header)?)];
		for (n, slice) in store.into_iter().enumerate() {
			chunks.push(ExportChunk::new(store_chunk_id(export_id, n), serde_json::to_vec(slice)?));
		}
		Ok(chunks)
	}

	/// Rebuilds an index from exported chunks.
	///
	/// # Errors
	///
	/// Returns `Error::Index` when the header is missing, was written for a
	/// different category or schema, or store chunks of the export it names
	/// or records are missing.
	pub fn import(category_id: &str, schema: &Schema, chunks: impl IntoIterator<Item = ExportChunk>) -> Result<Self> {
		let mut header: Option<ExportHeader> = None;
		let mut store = Vec::new();
		for chunk in chunks {
			if chunk.chunk_id == SCHEMA_CHUNK {
				header = Some(serde_json::from_slice(&chunk.data)?);
			} else if let Some((export_id, n)) = parse_store_chunk_id(&chunk.chunk_id) {
				let export_id = export_id.to_string();
				store.push((export_id, n, chunk));
			}
		}
		let header = header.ok_or_else(|| index_err(format!("export of '{category_id}' has no {SCHEMA_CHUNK} chunk")))?;
		if header.category_id != category_id || header.schema != *schema {
			return Err(index_err(format!("export of '{category_id}' was written for a different schema")));
		}
		// leftovers from other exports
		store.retain(|(export_id, n, _)| *export_id == header.export_id && *n < header.chunks);
		if store.len() != header.chunks {
			return Err(index_err(format!(
				"export of '{category_id}' is incomplete: {} of {} store chunks",
				store.len(),
				header.chunks
			)));
		}

		let index = Self::new(category_id, schema)?;
		for (_, _, chunk) in store {
			let records: Vec<NormalizedRecord> = serde_json::from_slice(&chunk.data)?;
			for record in &records {
				index.insert(record)?;
			}
		}
		index.commit()?;
		if index.len() != header.records {
			return Err(index_err(format!(
				"export of '{category_id}' declares {} records, found {}",
				header.records,
				index.len()
			)));
		}
		info!(category = %category_id, docs = index.len(), "imported facet index");
		Ok(index)
	}
}

impl FacetIndex for TantivyFacetIndex {
	fn search(&self, query: &SubQuery, limit: usize) -> Result<Vec<DocId>> {
		let descriptor = self
			.schema
			.get(&query.field)
			.ok_or_else(|| Error::config(format!("category '{}' has no field '{}'", self.category_id, query.field)))?;
		let field = self.field(&query.field)?;
		if limit == 0 {
			return Ok(Vec::new());
		}
		let q: Box<dyn Query> = match descriptor.kind() {
			FieldKind::Searchable => match self.text_query(field, &query.query)? {
				Some(q) => q,
				None => return Ok(Vec::new()),
			},
			FieldKind::Selectable | FieldKind::Range => {
				Box::new(TermQuery::new(Term::from_field_text(field, &query.query), IndexRecordOption::Basic))
			}
		};
		let searcher = self.reader.searcher();
		let addresses = searcher.search(q.as_ref(), &DocSetCollector).map_err(index_err)?;
		let mut ids = self.ids_of(&searcher, addresses)?;
		ids.sort();
		ids.truncate(limit);
		Ok(ids)
	}

	fn all_ids(&self) -> Result<Vec<DocId>> {
		let searcher = self.reader.searcher();
		let addresses = searcher.search(&AllQuery, &DocSetCollector).map_err(index_err)?;
		let ids: BTreeSet<DocId> = self.ids_of(&searcher, addresses)?.into_iter().collect();
		Ok(ids.into_iter().collect())
	}

	fn record(&self, id: &str) -> Result<Option<NormalizedRecord>> {
		let searcher = self.reader.searcher();
		let q = TermQuery::new(Term::from_field_text(self.fields.id, id), IndexRecordOption::Basic);
		let top_docs = searcher.search(&q, &TopDocs::with_limit(1)).map_err(index_err)?;
		let Some((_, address)) = top_docs.into_iter().next() else { return Ok(None) };
		let doc: TantivyDocument = searcher.doc(address).map_err(index_err)?;
		match doc.get_first(self.fields.record).and_then(|v| v.as_str()) {
			Some(json) => Ok(Some(serde_json::from_str(json)?)),
			None => Ok(None),
		}
	}

	#[allow(clippy::cast_possible_truncation)]
	fn len(&self) -> usize {
		self.reader.searcher().num_docs() as usize
	}
}

impl std::fmt::Debug for TantivyFacetIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TantivyFacetIndex")
			.field("category_id", &self.category_id)
			.field("docs", &self.len())
			.finish_non_exhaustive()
	}
}
