use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use facetdb_cli::{dnd5e, parse_selection, render};
use facetdb_core::config::Settings;
use facetdb_core::json_source::JsonDirSource;
use facetdb_core::persist::FileSink;
use facetdb_core::progress::NoopProgress;
use facetdb_core::query::FacetSelection;
use facetdb_core::registry::TabRegistry;
use facetdb_core::sort::SortDirection;
use facetdb_engine::{IndexBuilder, PartitionFilter, SortSpec};

fn write_partition(root: &Path, id: &str, document_type: &str, docs: serde_json::Value) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("_partition.toml"), format!("document_type = \"{document_type}\"\n")).unwrap();
    fs::write(dir.join("docs.json"), serde_json::to_vec_pretty(&docs).unwrap()).unwrap();
}

fn seed(root: &Path) {
    write_partition(
        root,
        "items",
        "Item",
        json!([
            {"id": "fireball", "type": "spell", "name": "Fireball",
             "system": {"description": {"value": "A bright streak flashes."}, "school": "evo", "level": 3}},
            {"id": "shield-spell", "type": "spell", "name": "Shield",
             "system": {"description": {"value": "An invisible barrier."}, "school": "abj", "level": 1}},
            {"id": "wish", "type": "spell", "name": "Wish",
             "system": {"description": {"value": "The mightiest spell."}, "school": "con", "level": 9}},
            {"id": "longsword", "type": "weapon", "name": "Longsword",
             "system": {"description": {"value": "Versatile."}, "type": {"value": "martialM"}}},
            {"id": "plate", "type": "equipment", "name": "Plate Armor",
             "system": {"description": {"value": "Heavy."}, "armor": {"value": 18}, "type": {"value": "heavy"}}},
            {"id": "buckler", "type": "equipment", "name": "Shield",
             "system": {"description": {"value": "Strapped on."}, "armor": {"value": 2}, "type": {"value": "shield"}}},
            {"id": "amulet", "type": "equipment", "name": "Amulet",
             "system": {"description": {"value": "Trinket."}, "armor": {"value": 0}, "type": {"value": "trinket"}}},
            {"id": "scroll-fireball", "type": "spell", "name": "Fireball", "container": "scroll",
             "system": {"description": {"value": "Stored."}, "school": "evo", "level": 3}},
            {"id": "idol", "type": "loot", "name": "Gold Idol",
             "system": {"description": {"value": "Heavy and gleaming."}}},
            {"id": "healing", "type": "consumable", "name": "Potion of Healing",
             "system": {"description": {"value": "Regain hit points."}, "type": {"value": "potion"}}},
            {"id": "action-surge", "type": "feat", "name": "Action Surge",
             "system": {"description": {"value": "One additional action."}, "type": {"value": "class"}}},
            {"id": "fighter", "type": "class", "name": "Fighter",
             "system": {"description": {"value": "Masters of martial combat."}}}
        ]),
    );
    write_partition(
        root,
        "bestiary",
        "Actor",
        json!([
            {"id": "goblin", "type": "npc", "name": "Goblin",
             "system": {"details": {"biography": {"value": "Small and mean."},
                                    "type": {"value": "humanoid"}, "cr": 0.25}}},
            {"id": "dragon", "type": "npc", "name": "Ancient Red Dragon",
             "system": {"details": {"biography": {"value": "Greedy."},
                                    "type": {"value": "dragon"}, "cr": 24}}},
            {"id": "swarm", "type": "npc", "name": "Swarm of Bats",
             "system": {"details": {"biography": {"value": "Many wings."},
                                    "type": {"value": "swarm of beasts"}, "cr": 0.5}}},
            {"id": "hero", "type": "character", "name": "Player",
             "system": {"details": {"biography": {"value": ""}, "type": {"value": "humanoid"}, "cr": 1}}}
        ]),
    );
}

fn builder(root: &Path, index_dir: &Path) -> (Arc<TabRegistry>, IndexBuilder) {
    let registry = Arc::new(TabRegistry::new());
    dnd5e::register(&registry).unwrap();
    let source = Arc::new(JsonDirSource::open(root).unwrap());
    let sink = Arc::new(FileSink::new(index_dir));
    let builder = IndexBuilder::new(registry.clone(), source, sink, Settings::default())
        .with_progress(Arc::new(NoopProgress));
    (registry, builder)
}

fn ids(hits: &[facetdb_engine::SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.id().as_str()).collect()
}

#[tokio::test]
async fn sample_categories_index_and_query() {
    let docs = tempfile::tempdir().unwrap();
    let indexes = tempfile::tempdir().unwrap();
    seed(docs.path());
    let (_, builder) = builder(docs.path(), indexes.path());

    let report = builder.rebuild(&PartitionFilter::All).await.unwrap();
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.indexed["spells"], 3);
    assert_eq!(report.indexed["weapons"], 1);
    assert_eq!(report.indexed["armor"], 2);
    assert_eq!(report.indexed["equipment"], 4);
    assert_eq!(report.indexed["consumables"], 1);
    assert_eq!(report.indexed["features"], 1);
    assert_eq!(report.indexed["characters"], 1);
    assert_eq!(report.indexed["monsters"], 3);
    assert_eq!(report.contained_skipped, 1);

    let low_level = parse_selection(&[], &[], &[], &["level=0..3".to_string()]).unwrap();
    let hits = builder
        .search("spells", &low_level, Some(&SortSpec::new("level", SortDirection::Descending)))
        .await
        .unwrap();
    assert_eq!(ids(&hits), ["fireball", "shield-spell"]);

    let by_name = parse_selection(&["name=shie".to_string()], &[], &[], &[]).unwrap();
    assert_eq!(ids(&builder.search("spells", &by_name, None).await.unwrap()), ["shield-spell"]);
    assert_eq!(ids(&builder.search("armor", &by_name, None).await.unwrap()), ["buckler"]);

    let heavy = FacetSelection::new().select("type", ["heavy"]).range("ac", 15.0, 20.0);
    assert_eq!(ids(&builder.search("armor", &heavy, None).await.unwrap()), ["plate"]);

    let worn = FacetSelection::new().select("type", ["armor", "shield"]);
    assert_eq!(ids(&builder.search("equipment", &worn, None).await.unwrap()), ["buckler", "plate"]);
    let loot = FacetSelection::new().select("type", ["loot"]);
    assert_eq!(ids(&builder.search("equipment", &loot, None).await.unwrap()), ["idol"]);
    let classes = FacetSelection::new().select("category", ["class"]);
    assert_eq!(ids(&builder.search("characters", &classes, None).await.unwrap()), ["fighter"]);
    assert_eq!(ids(&builder.search("features", &classes, None).await.unwrap()), ["action-surge"]);
}

#[tokio::test]
async fn monsters_keep_exact_values_in_shadows() {
    let docs = tempfile::tempdir().unwrap();
    let indexes = tempfile::tempdir().unwrap();
    seed(docs.path());
    let (registry, builder) = builder(docs.path(), indexes.path());
    builder.rebuild(&PartitionFilter::All).await.unwrap();

    let others = FacetSelection::new().select("type", ["other"]);
    let hits = builder.search("monsters", &others, None).await.unwrap();
    assert_eq!(ids(&hits), ["swarm"]);
    assert_eq!(hits[0].record.shadow("type"), Some("swarm of beasts"));

    let top = FacetSelection::new().range("cr", 20.0, 20.0);
    let hits = builder.search("monsters", &top, None).await.unwrap();
    assert_eq!(ids(&hits), ["dragon"]);
    let template = registry.get("monsters").unwrap().result_template.clone();
    assert_eq!(render(&template, &hits[0].record), "Ancient Red Dragon (CR 24, dragon)");
    let beyond = FacetSelection::new().range("cr", 21.0, 30.0);
    assert_eq!(ids(&builder.search("monsters", &beyond, None).await.unwrap()), ["dragon"]);

    let by_cr = builder
        .search("monsters", &FacetSelection::new(), Some(&SortSpec::new("cr", SortDirection::Ascending)))
        .await
        .unwrap();
    assert_eq!(ids(&by_cr), ["goblin", "swarm", "dragon"]);
}

#[tokio::test]
async fn persisted_indexes_serve_a_fresh_process() {
    let docs = tempfile::tempdir().unwrap();
    let indexes = tempfile::tempdir().unwrap();
    seed(docs.path());
    {
        let (_, first) = builder(docs.path(), indexes.path());
        first.rebuild(&PartitionFilter::All).await.unwrap();
    }
    assert!(indexes.path().join("spells-schema.json").exists());

    let (_, second) = builder(docs.path(), indexes.path());
    let loaded = second.load_persisted().await.unwrap();
    assert_eq!(loaded, 16);
    let evocation = FacetSelection::new().select("school", ["evo"]);
    assert_eq!(ids(&second.search("spells", &evocation, None).await.unwrap()), ["fireball"]);
}
