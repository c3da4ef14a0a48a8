use std::fs;
use tempfile::TempDir;

use facetdb_core::document::{Partition, SourceDocument};
use facetdb_core::json_source::{JsonDirSource, PARTITION_MANIFEST};
use facetdb_core::normalize::normalize_record;
use facetdb_core::query::{compile, FacetSelection};
use facetdb_core::registry::{Category, TabRegistry};
use facetdb_core::schema::{FieldDescriptor, Schema};
use facetdb_core::traits::DocumentSource;
use facetdb_core::types::MappedRecord;

fn write_partition(root: &std::path::Path, name: &str, manifest: &str, files: &[(&str, &str)]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(PARTITION_MANIFEST), manifest).unwrap();
    for (file, body) in files {
        fs::write(dir.join(file), body).unwrap();
    }
}

#[tokio::test]
async fn json_dir_source_reads_partitions_in_order() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_partition(
        root,
        "spells",
        "document_type = \"Item\"\nlabel = \"Spells (SRD)\"\n",
        &[
            ("b.json", r#"{"id": "s2", "name": "Fire Wall"}"#),
            (
                "a.json",
                r#"[{"id": "s1", "name": "Fire Bolt"},
                    {"id": "s3", "name": "Bag", "system": {"container": "s9"}}]"#,
            ),
        ],
    );
    write_partition(
        root,
        "monsters",
        "document_type = \"Actor\"\n",
        &[("m.json", r#"{"_id": "m1", "name": "Goblin"}"#)],
    );
    fs::create_dir_all(root.join("scratch")).unwrap();

    let source = JsonDirSource::open(root).unwrap();
    let partitions = source.partitions().await.unwrap();
    let ids: Vec<_> = partitions.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["monsters", "spells"], "directory without manifest is skipped");
    assert_eq!(partitions[0].label, "monsters");
    assert_eq!(partitions[1].label, "Spells (SRD)");

    let spells = &partitions[1];
    assert_eq!(source.list_entries(spells).await.unwrap(), ["s1", "s3", "s2"]);
    let fetched = source.fetch(spells, &["s3".to_string(), "nope".to_string()]).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert!(fetched[0].is_contained());

    let resolved = source.resolve(&["m1".to_string(), "s2".to_string(), "gone".to_string()]).await.unwrap();
    let names: Vec<_> = resolved.iter().filter_map(|d| d.name.as_deref()).collect();
    assert_eq!(names, ["Goblin", "Fire Wall"]);
}

#[tokio::test]
async fn unknown_partition_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let source = JsonDirSource::open(tmp.path()).unwrap();
    let missing = Partition::new("ghost", "Ghost", "Item");
    assert!(source.list_entries(&missing).await.is_err());
}

#[test]
fn malformed_document_is_a_source_error() {
    let tmp = TempDir::new().unwrap();
    write_partition(tmp.path(), "bad", "document_type = \"Item\"\n", &[("x.json", "{not json")]);
    assert!(JsonDirSource::open(tmp.path()).is_err());
}

#[test]
fn registered_schema_drives_normalization_and_compilation() {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("cr", FieldDescriptor::range("Challenge", 0.0, 20.0, 1.0).unwrap())
        .field(
            "type",
            FieldDescriptor::selectable("Type", [("beast", "Beast"), ("undead", "Undead"), ("custom", "Custom")])
                .unwrap(),
        );
    let registry = TabRegistry::new();
    registry
        .register(Category::new("monsters", "Monsters", "Actor", schema, |_: &SourceDocument| -> Option<MappedRecord> {
            None
        }))
        .unwrap();
    let category = registry.get("monsters").unwrap();

    let mapped = MappedRecord::new().with("name", "Wight").with("cr", 3.0).with("type", "fiend");
    let record = normalize_record("m1", &category.schema, &mapped).unwrap();
    assert_eq!(record.get("type"), Some("other"));
    assert_eq!(record.shadow("type"), Some("fiend"));
    assert_eq!(record.get("cr"), Some("3"));

    let compiled = compile(&category.schema, &FacetSelection::new().text("name", "wig").range("cr", 2.0, 4.0)).unwrap();
    assert_eq!(compiled.sub_queries().len(), 4);
    assert_eq!(compiled.constrained_fields(), ["name", "cr"]);
}
