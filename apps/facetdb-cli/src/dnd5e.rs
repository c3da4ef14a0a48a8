//! Sample categories for a tabletop-RPG (5th edition) compendium.
//!
//! Documents follow the usual export layout: a top-level `type` naming the
//! item or actor subtype and a `system` object with the game data. Each
//! mapper parses only the fields it needs and declines anything else.

use serde::Deserialize;

use facetdb_core::document::SourceDocument;
use facetdb_core::error::Result;
use facetdb_core::registry::{Category, TabRegistry};
use facetdb_core::schema::{FieldDescriptor, Schema};
use facetdb_core::types::MappedRecord;

const ARMOR_TYPES: [&str; 4] = ["light", "medium", "heavy", "shield"];
const GEAR_SUBTYPES: [&str; 4] = ["equipment", "container", "loot", "tool"];
const CHARACTER_SUBTYPES: [&str; 4] = ["class", "subclass", "race", "background"];

#[derive(Debug, Deserialize)]
struct Text {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Doc<S> {
    #[serde(rename = "type")]
    subtype: String,
    name: String,
    system: S,
}

impl<S: for<'de> Deserialize<'de>> Doc<S> {
    fn parse(doc: &SourceDocument, subtype: &str) -> Option<Self> {
        Self::parse_any(doc, &[subtype])
    }

    fn parse_any(doc: &SourceDocument, subtypes: &[&str]) -> Option<Self> {
        let parsed = Self::deserialize(&doc.data).ok()?;
        subtypes.contains(&parsed.subtype.as_str()).then_some(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct SpellSystem {
    description: Text,
    school: String,
    level: f64,
}

#[derive(Debug, Deserialize)]
struct NpcSystem {
    details: NpcDetails,
}

#[derive(Debug, Deserialize)]
struct NpcDetails {
    biography: Text,
    #[serde(rename = "type")]
    creature_type: Text,
    cr: f64,
}

#[derive(Debug, Deserialize)]
struct WeaponSystem {
    description: Text,
    #[serde(rename = "type")]
    weapon_type: Text,
}

#[derive(Debug, Deserialize)]
struct ArmorValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct EquipmentSystem {
    description: Text,
    armor: ArmorValue,
    #[serde(rename = "type")]
    equipment_type: Text,
}

#[derive(Debug, Deserialize)]
struct GearSystem {
    description: Text,
    #[serde(rename = "type", default)]
    gear_type: Option<Text>,
}

/// Items whose subtype is refined by `system.type.value`.
#[derive(Debug, Deserialize)]
struct TypedSystem {
    description: Text,
    #[serde(rename = "type")]
    kind: Text,
}

#[derive(Debug, Deserialize)]
struct DescribedSystem {
    description: Text,
}

pub fn spells() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field("level", FieldDescriptor::range("Level", 0.0, 9.0, 1.0)?)
        .field(
            "school",
            FieldDescriptor::selectable(
                "School",
                [
                    ("abj", "Abjuration"),
                    ("con", "Conjuration"),
                    ("div", "Divination"),
                    ("enc", "Enchantment"),
                    ("evo", "Evocation"),
                    ("ill", "Illusion"),
                    ("nec", "Necromancy"),
                    ("trs", "Transmutation"),
                ],
            )?,
        );
    Ok(Category::new("spells", "Spells", "Item", schema, |doc: &SourceDocument| {
        let spell = Doc::<SpellSystem>::parse(doc, "spell")?;
        Some(
            MappedRecord::new()
                .with("name", spell.name)
                .with("description", spell.system.description.value)
                .with("level", spell.system.level)
                .with("school", spell.system.school),
        )
    })
    .with_icon("fa-solid fa-wand-magic-sparkles")
    .with_result_template("{name} (level {level}, {school})"))
}

pub fn monsters() -> Result<Category> {
    let types = [
        ("aberration", "Aberration"),
        ("beast", "Beast"),
        ("celestial", "Celestial"),
        ("construct", "Construct"),
        ("dragon", "Dragon"),
        ("elemental", "Elemental"),
        ("fey", "Fey"),
        ("fiend", "Fiend"),
        ("giant", "Giant"),
        ("humanoid", "Humanoid"),
        ("monstrosity", "Monstrosity"),
        ("ooze", "Ooze"),
        ("plant", "Plant"),
        ("undead", "Undead"),
        ("custom", "Custom"),
        ("other", "Other"),
    ];
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("biography", FieldDescriptor::searchable("Biography"))
        .field("type", FieldDescriptor::selectable("Creature type", types)?)
        .field("cr", FieldDescriptor::range("Challenge rating", 0.0, 20.0, 1.0)?);
    Ok(Category::new("monsters", "Monsters", "Actor", schema, |doc: &SourceDocument| {
        let npc = Doc::<NpcSystem>::parse(doc, "npc")?;
        let details = npc.system.details;
        Some(
            MappedRecord::new()
                .with("name", npc.name)
                .with("biography", details.biography.value)
                .with("type", details.creature_type.value)
                .with("cr", details.cr),
        )
    })
    .with_icon("fa-solid fa-paw-claws")
    .with_result_template("{name} (CR {cr}, {type})"))
}

pub fn weapons() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field(
            "type",
            FieldDescriptor::selectable(
                "Weapon type",
                [
                    ("simpleM", "Simple melee"),
                    ("simpleR", "Simple ranged"),
                    ("martialM", "Martial melee"),
                    ("martialR", "Martial ranged"),
                    ("natural", "Natural"),
                ],
            )?,
        );
    Ok(Category::new("weapons", "Weapons", "Item", schema, |doc: &SourceDocument| {
        let weapon = Doc::<WeaponSystem>::parse(doc, "weapon")?;
        Some(
            MappedRecord::new()
                .with("name", weapon.name)
                .with("description", weapon.system.description.value)
                .with("type", weapon.system.weapon_type.value),
        )
    })
    .with_icon("fa-solid fa-sword")
    .with_result_template("{name} ({type})"))
}

pub fn armor() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field(
            "type",
            FieldDescriptor::selectable(
                "Armor type",
                [("light", "Light"), ("medium", "Medium"), ("heavy", "Heavy"), ("shield", "Shield")],
            )?,
        )
        .field("ac", FieldDescriptor::range("Armor class", 0.0, 20.0, 1.0)?);
    Ok(Category::new("armor", "Armor", "Item", schema, |doc: &SourceDocument| {
        let item = Doc::<EquipmentSystem>::parse(doc, "equipment")?;
        if !ARMOR_TYPES.contains(&item.system.equipment_type.value.as_str()) {
            return None;
        }
        Some(
            MappedRecord::new()
                .with("name", item.name)
                .with("description", item.system.description.value)
                .with("type", item.system.equipment_type.value)
                .with("ac", item.system.armor.value),
        )
    })
    .with_icon("fa-solid fa-shield")
    .with_result_template("{name} (AC {ac}, {type})"))
}

/// Everything carried that is not a weapon. Body armor collapses into one
/// `armor` option; the armor category keeps the finer split.
pub fn equipment() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field(
            "type",
            FieldDescriptor::selectable(
                "Equipment type",
                [
                    ("armor", "Armor"),
                    ("shield", "Shield"),
                    ("clothing", "Clothing"),
                    ("tool", "Tool"),
                    ("trinket", "Trinket"),
                    ("container", "Container"),
                    ("loot", "Loot"),
                    ("other", "Other"),
                ],
            )?,
        );
    Ok(Category::new("equipment", "Equipment", "Item", schema, |doc: &SourceDocument| {
        let item = Doc::<GearSystem>::parse_any(doc, &GEAR_SUBTYPES)?;
        let kind = match (item.subtype.as_str(), item.system.gear_type) {
            ("container" | "loot" | "tool", _) => item.subtype.clone(),
            (_, None) => "other".to_string(),
            (_, Some(t)) if ARMOR_TYPES[..3].contains(&t.value.as_str()) => "armor".to_string(),
            (_, Some(t)) => t.value,
        };
        Some(
            MappedRecord::new()
                .with("name", item.name)
                .with("description", item.system.description.value)
                .with("type", kind),
        )
    })
    .with_icon("fa-solid fa-hammer")
    .with_result_template("{name} ({type})"))
}

pub fn consumables() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field(
            "type",
            FieldDescriptor::selectable(
                "Consumable type",
                [
                    ("potion", "Potion"),
                    ("food", "Food"),
                    ("trinket", "Trinket"),
                    ("rod", "Rod"),
                    ("wand", "Wand"),
                    ("scroll", "Scroll"),
                    ("poison", "Poison"),
                    ("ammo", "Ammunition"),
                    ("other", "Other"),
                ],
            )?,
        );
    Ok(Category::new("consumables", "Consumables", "Item", schema, |doc: &SourceDocument| {
        let item = Doc::<TypedSystem>::parse(doc, "consumable")?;
        Some(
            MappedRecord::new()
                .with("name", item.name)
                .with("description", item.system.description.value)
                .with("type", item.system.kind.value),
        )
    })
    .with_icon("fa-solid fa-flask-round-potion")
    .with_result_template("{name} ({type})"))
}

pub fn features() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field(
            "category",
            FieldDescriptor::selectable(
                "Feature source",
                [
                    ("class", "Class feature"),
                    ("background", "Background feature"),
                    ("race", "Racial feature"),
                    ("enchantment", "Enchantment"),
                    ("monster", "Monster feature"),
                    ("other", "Other"),
                ],
            )?,
        );
    Ok(Category::new("features", "Features", "Item", schema, |doc: &SourceDocument| {
        let feat = Doc::<TypedSystem>::parse(doc, "feat")?;
        Some(
            MappedRecord::new()
                .with("name", feat.name)
                .with("description", feat.system.description.value)
                .with("category", feat.system.kind.value),
        )
    })
    .with_icon("fa-solid fa-dice-d20")
    .with_result_template("{name} ({category})"))
}

/// Character options: classes, subclasses, races and backgrounds, keyed by
/// the item subtype itself.
pub fn characters() -> Result<Category> {
    let schema = Schema::new()
        .field("name", FieldDescriptor::searchable("Name"))
        .field("description", FieldDescriptor::searchable("Description"))
        .field(
            "category",
            FieldDescriptor::selectable(
                "Option",
                [("class", "Class"), ("subclass", "Subclass"), ("race", "Race"), ("background", "Background")],
            )?,
        );
    Ok(Category::new("characters", "Character options", "Item", schema, |doc: &SourceDocument| {
        let option = Doc::<DescribedSystem>::parse_any(doc, &CHARACTER_SUBTYPES)?;
        Some(
            MappedRecord::new()
                .with("name", option.name)
                .with("description", option.system.description.value)
                .with("category", option.subtype),
        )
    })
    .with_icon("fa-solid fa-head-side")
    .with_result_template("{name} ({category})"))
}

/// Registers every sample category, in tab order.
pub fn register(registry: &TabRegistry) -> Result<()> {
    registry.register(spells()?)?;
    registry.register(weapons()?)?;
    registry.register(armor()?)?;
    registry.register(equipment()?)?;
    registry.register(consumables()?)?;
    registry.register(features()?)?;
    registry.register(characters()?)?;
    registry.register(monsters()?)?;
    Ok(())
}
