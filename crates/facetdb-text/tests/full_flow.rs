use std::collections::BTreeSet;

use facetdb_core::normalize::normalize_record;
use facetdb_core::query::{compile, FacetSelection, SubQuery};
use facetdb_core::reduce::{reduce, EmptyQueryPolicy};
use facetdb_core::schema::{FieldDescriptor, Schema};
use facetdb_core::traits::FacetIndex;
use facetdb_core::types::MappedRecord;
use facetdb_text::index::{store_chunk_id, SCHEMA_CHUNK, STORE_CHUNK_PREFIX};
use facetdb_text::TantivyFacetIndex;

fn schema() -> Schema {
    Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("tier", FieldDescriptor::selectable("Tier", [("a", "A"), ("b", "B"), ("c", "C")]).unwrap())
        .field("level", FieldDescriptor::range("Level", 0.0, 10.0, 1.0).unwrap())
}

fn build(schema: &Schema, docs: &[(&str, &str, &str, f64)]) -> TantivyFacetIndex {
    let index = TantivyFacetIndex::new("spells", schema).expect("index");
    for (id, name, tier, level) in docs {
        let mapped = MappedRecord::new().with("name", *name).with("tier", *tier).with("level", *level);
        index.insert(&normalize_record(id, schema, &mapped).unwrap()).unwrap();
    }
    index.commit().unwrap();
    index
}

fn run(index: &TantivyFacetIndex, schema: &Schema, selection: FacetSelection) -> Vec<String> {
    let compiled = compile(schema, &selection).unwrap();
    reduce(index, &compiled, EmptyQueryPolicy::MatchAll, 100).unwrap().into_iter().collect()
}

#[test]
fn facet_queries_combine_across_fields() {
    let schema = schema();
    let index = build(&schema, &[("X", "Fire Bolt", "a", 3.0), ("Y", "Fire Wall", "b", 7.0)]);
    assert_eq!(index.len(), 2);

    assert_eq!(run(&index, &schema, FacetSelection::new().text("name", "fire")), ["X", "Y"]);
    assert_eq!(run(&index, &schema, FacetSelection::new().text("name", "fire").select("tier", ["a"])), ["X"]);
    assert_eq!(run(&index, &schema, FacetSelection::new().range("level", 5.0, 9.0)), ["Y"]);
    assert!(run(&index, &schema, FacetSelection::new().select("tier", Vec::<String>::new())).is_empty());
    assert_eq!(run(&index, &schema, FacetSelection::new()), ["X", "Y"]);
}

#[test]
fn text_matches_token_prefixes_case_and_accent_insensitively() {
    let schema = schema();
    let index = build(&schema, &[("X", "Fire Bolt", "a", 3.0), ("Y", "Éclair de feu", "b", 7.0)]);
    let hits = |text: &str| index.search(&SubQuery::new("name", text), 10).unwrap();
    assert_eq!(hits("bol"), ["X"]);
    assert_eq!(hits("FIRE bolt"), ["X"]);
    assert_eq!(hits("eclair"), ["Y"]);
    assert!(hits("fire wall").is_empty());
    assert!(hits("!!").is_empty());
}

#[test]
fn hit_limit_caps_the_combined_result_not_each_field() {
    let schema = schema();
    let index = build(
        &schema,
        &[("A", "Fire Bolt", "a", 3.0), ("B", "Frost Ray", "b", 7.0), ("C", "Fire Wall", "a", 7.0)],
    );
    assert_eq!(index.search(&SubQuery::new("tier", "a"), 1).unwrap(), ["A"]);
    assert_eq!(index.search(&SubQuery::new("tier", "a"), usize::MAX).unwrap(), ["A", "C"]);

    let selection = FacetSelection::new().select("tier", ["a"]).range("level", 7.0, 7.0);
    let compiled = compile(&schema, &selection).unwrap();
    let hits: Vec<String> = reduce(&index, &compiled, EmptyQueryPolicy::MatchAll, 1).unwrap().into_iter().collect();
    assert_eq!(hits, ["C"]);
}

#[test]
fn strict_fields_match_whole_values_only() {
    let schema = schema();
    let index = build(&schema, &[("X", "Fire Bolt", "a", 3.0), ("Y", "Fire Wall", "b", 7.4)]);
    assert_eq!(index.search(&SubQuery::new("level", "7"), 10).unwrap(), ["Y"]);
    assert!(index.search(&SubQuery::new("level", "7.4"), 10).unwrap().is_empty());
    assert!(index.search(&SubQuery::new("tier", "A"), 10).unwrap().is_empty());
    assert!(index.search(&SubQuery::new("tier", "a"), 0).unwrap().is_empty());
    assert!(index.search(&SubQuery::new("colour", "red"), 10).unwrap_err().is_configuration());
}

#[test]
fn records_are_stored_with_shadows_and_replaced_on_reinsert() {
    let schema = schema();
    let index = build(&schema, &[("X", "Fire Bolt", "z", 2.6)]);
    let record = index.record("X").unwrap().expect("stored record");
    assert_eq!(record.get("tier"), Some("other"));
    assert_eq!(record.shadow("tier"), Some("z"));
    assert_eq!(record.get("level"), Some("3"));
    assert_eq!(record.display_value("level"), Some("2.6"));

    let mapped = MappedRecord::new().with("name", "Fire Bolt").with("tier", "c").with("level", 4.0);
    index.insert(&normalize_record("X", &schema, &mapped).unwrap()).unwrap();
    index.commit().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index.record("X").unwrap().unwrap().get("tier"), Some("c"));
    assert!(index.record("missing").unwrap().is_none());
}

#[test]
fn export_then_import_restores_the_same_answers() {
    let schema = schema();
    let docs: Vec<(String, String, &str, f64)> = (0..7)
        .map(|i| (format!("d{i}"), format!("Spell {i}"), if i % 2 == 0 { "a" } else { "b" }, f64::from(i)))
        .collect();
    let borrowed: Vec<(&str, &str, &str, f64)> =
        docs.iter().map(|(id, name, tier, level)| (id.as_str(), name.as_str(), *tier, *level)).collect();
    let index = build(&schema, &borrowed);

    let chunks = index.export("e1", 3).unwrap();
    let ids: BTreeSet<_> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
    assert!(ids.contains(SCHEMA_CHUNK));
    assert_eq!(ids.iter().filter(|id| id.starts_with(STORE_CHUNK_PREFIX)).count(), 3);

    let restored = TantivyFacetIndex::import("spells", &schema, chunks.clone()).unwrap();
    assert_eq!(restored.len(), 7);
    let selection = FacetSelection::new().text("name", "spell").select("tier", ["a"]).range("level", 2.0, 6.0);
    assert_eq!(run(&restored, &schema, selection.clone()), run(&index, &schema, selection));

    let other = Schema::new().field("name", FieldDescriptor::searchable("Name"));
    assert!(TantivyFacetIndex::import("spells", &other, chunks.clone()).is_err());
    let truncated: Vec<_> = chunks.into_iter().filter(|c| c.chunk_id != store_chunk_id("e1", 1)).collect();
    assert!(TantivyFacetIndex::import("spells", &schema, truncated).is_err());
}

#[test]
fn import_only_reads_chunks_of_the_export_its_header_names() {
    let schema = schema();
    let old = build(&schema, &[("A", "Acid Splash", "a", 1.0), ("B", "Bless", "b", 1.0)]);
    let new = build(&schema, &[("C", "Cure Wounds", "a", 1.0), ("D", "Darkness", "b", 2.0)]);
    let old_chunks = old.export("old", 1).unwrap();
    let new_chunks = new.export("new", 1).unwrap();
    assert!(new_chunks.iter().any(|c| c.chunk_id == store_chunk_id("new", 1)));

    // old header alongside both exports' store chunks
    let mixed: Vec<_> =
        old_chunks.iter().chain(new_chunks.iter().filter(|c| c.chunk_id != SCHEMA_CHUNK)).cloned().collect();
    let restored = TantivyFacetIndex::import("spells", &schema, mixed).unwrap();
    assert_eq!(run(&restored, &schema, FacetSelection::new()), ["A", "B"]);

    // old header with only the new store chunks left behind
    let orphaned: Vec<_> = old_chunks
        .iter()
        .filter(|c| c.chunk_id == SCHEMA_CHUNK)
        .chain(new_chunks.iter().filter(|c| c.chunk_id != SCHEMA_CHUNK))
        .cloned()
        .collect();
    assert!(TantivyFacetIndex::import("spells", &schema, orphaned).is_err());
}
