use std::collections::BTreeMap;

use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{AsciiFoldingFilter, LowerCaser, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

use facetdb_core::schema::{FieldKind, Schema as FacetSchema, ID_FIELD};

/// Analyzer for searchable fields. No stop words: short names like "Light"
/// or "Bolt" must stay matchable.
pub const FACET_TOKENIZER: &str = "facet_text";

/// Stored field carrying the whole normalized record as JSON. `$` never
/// appears in a declared field key.
pub const RECORD_FIELD: &str = "$record";

/// Tantivy field handles for one category index.
#[derive(Debug, Clone)]
pub struct FieldMap {
	pub id: Field,
	pub record: Field,
	pub fields: BTreeMap<String, Field>,
}

/// One tantivy field per declared key: tokenized text for searchable fields,
/// a raw untokenized term for everything else.
pub fn build_schema(facets: &FacetSchema) -> (Schema, FieldMap) {
	let mut schema_builder = Schema::builder();
	let id = schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	let record = schema_builder.add_text_field(RECORD_FIELD, STORED);
	let text_field_indexing = TextFieldIndexing::default()
		.set_tokenizer(FACET_TOKENIZER)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);

	let mut fields = BTreeMap::new();
	for (key, descriptor) in facets.iter() {
		let field = match descriptor.kind() {
			FieldKind::Searchable => schema_builder.add_text_field(key, text_options.clone()),
			FieldKind::Selectable | FieldKind::Range => schema_builder.add_text_field(key, STRING),
		};
		fields.insert(key.to_string(), field);
	}
	(schema_builder.build(), FieldMap { id, record, fields })
}

pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(AsciiFoldingFilter)
		.build();
	index.tokenizers().register(FACET_TOKENIZER, tokenizer);
}
