//! Raw record loading
//!
//! Reads the three inputs the catalog is built from: recipe blobs from the
//! on-disk recipe store, item metadata from a listing dump, and the
//! structure files that say which blueprints a structure can run. Malformed
//! entries are logged and counted, never fatal.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, build_catalog};
use crate::error::Result;
use crate::models::{BlueprintId, ItemId, UNKNOWN_NAME};

/// A recipe record as serialized in the recipe store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRecord {
    #[serde(rename = "blueprintTypeID")]
    pub blueprint_type_id: BlueprintId,
    #[serde(default)]
    pub max_production_limit: u32,
    #[serde(default)]
    pub activities: Option<Activities>,
}

impl RecipeRecord {
    pub fn manufacturing(&self) -> Option<&ManufacturingActivity> {
        self.activities.as_ref()?.manufacturing.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Activities {
    #[serde(default)]
    pub manufacturing: Option<ManufacturingActivity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ManufacturingActivity {
    #[serde(default)]
    pub materials: Vec<TypeQuantity>,
    #[serde(default)]
    pub products: Vec<TypeQuantity>,
    #[serde(default)]
    pub time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeQuantity {
    #[serde(rename = "typeID")]
    pub type_id: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
}

pub type ItemTypes = BTreeMap<ItemId, ItemMetadata>;

/// A structure and the blueprints it unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StructureRecord {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(rename = "includedTypeIDs", default)]
    pub included_type_ids: Vec<BlueprintId>,
}

fn unknown_name() -> String {
    UNKNOWN_NAME.to_string()
}

/// Structure records keyed by structure identifier.
pub type Structures = BTreeMap<u32, StructureRecord>;

/// Everything the catalog builder needs, already loaded.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub recipes: Vec<RecipeRecord>,
    pub item_types: ItemTypes,
    pub structures: Structures,
    pub stats: LoadStats,
}

impl RawInputs {
    pub fn build_catalog(&self) -> Catalog {
        build_catalog(
            &self.recipes,
            &self.item_types,
            &structure_map(&self.structures),
        )
    }
}

/// Read every recipe blob from the key-value table `cache(key, value)`.
pub fn load_recipe_store(conn: &Connection, stats: &mut LoadStats) -> Result<Vec<RecipeRecord>> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'cache')",
        [],
        |row| row.get(0),
    )?;
    if !exists {
        warn!("recipe store has no cache table");
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT key, value FROM cache")?;
    let rows = stmt.query_map([], |row| {
        let key = match row.get_ref(0)? {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            ValueRef::Integer(n) => n.to_string(),
            ValueRef::Real(r) => r.to_string(),
            ValueRef::Null => String::from("NULL"),
        };
        let blob = match row.get_ref(1)? {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
            _ => None,
        };
        Ok((key, blob))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (key, blob) = row?;
        let Some(blob) = blob else {
            warn!(%key, "skipping recipe row without a text or blob value");
            stats.malformed_recipes += 1;
            continue;
        };
        match serde_json::from_slice::<RecipeRecord>(&blob) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(%key, error = %e, "skipping malformed recipe blob");
                stats.malformed_recipes += 1;
            }
        }
    }
    stats.recipes += records.len();
    debug!(count = records.len(), "loaded recipe records");
    Ok(records)
}

/// Parse item metadata from either a listing page `{"data": [{id, name}]}`
/// or a map `{"<id>": {"name": ..}}`.
pub fn parse_item_types(json: &str, stats: &mut LoadStats) -> Result<ItemTypes> {
    let value: Value = serde_json::from_str(json)?;
    let mut items = ItemTypes::new();

    if let Some(entries) = value.get("data").and_then(Value::as_array) {
        for entry in entries {
            let id = entry.get("id").and_then(value_as_id);
            let name = entry.get("name").and_then(Value::as_str);
            match (id, name) {
                (Some(id), Some(name)) => {
                    items.insert(id, ItemMetadata { name: name.to_string() });
                }
                _ => {
                    warn!(%entry, "skipping item entry without id or name");
                    stats.malformed_items += 1;
                }
            }
        }
    } else if let Some(map) = value.as_object() {
        for (key, entry) in map {
            let id = key.parse::<ItemId>().ok();
            let name = entry.get("name").and_then(Value::as_str);
            match (id, name) {
                (Some(id), Some(name)) => {
                    items.insert(id, ItemMetadata { name: name.to_string() });
                }
                _ => {
                    warn!(%key, "skipping item entry without id or name");
                    stats.malformed_items += 1;
                }
            }
        }
    } else {
        warn!(kind = value_kind(&value), "item metadata is not an object");
    }

    stats.items += items.len();
    Ok(items)
}

pub fn load_item_types(path: &Path, stats: &mut LoadStats) -> Result<ItemTypes> {
    let content = fs::read_to_string(path)?;
    parse_item_types(&content, stats)
}

/// Join the structure type lists with their display names.
///
/// Entries that do not parse are skipped and counted; the rest of the file
/// still loads.
pub fn parse_structures(
    type_lists: &str,
    names: Option<&str>,
    stats: &mut LoadStats,
) -> Result<Structures> {
    let mut structures: Structures = parse_entries(type_lists, "structure", stats)?;
    let Some(names) = names else {
        return Ok(structures);
    };

    let names: BTreeMap<u32, NamedStructure> = parse_entries(names, "structure name", stats)?;
    for (id, structure) in &mut structures {
        match names.get(id) {
            Some(named) => structure.name.clone_from(&named.name),
            None if structure.name == UNKNOWN_NAME => {
                warn!(structure_id = *id, "structure has no display name");
            }
            None => {}
        }
    }
    Ok(structures)
}

/// Decode a `{"<id>": {..}}` map one entry at a time.
fn parse_entries<T: DeserializeOwned>(
    json: &str,
    kind: &'static str,
    stats: &mut LoadStats,
) -> Result<BTreeMap<u32, T>> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;
    let mut entries = BTreeMap::new();
    for (key, entry) in raw {
        let Ok(id) = key.parse::<u32>() else {
            warn!(kind, %key, "skipping entry with a non-numeric id");
            stats.malformed_structures += 1;
            continue;
        };
        match serde_json::from_value::<T>(entry) {
            Ok(parsed) => {
                entries.insert(id, parsed);
            }
            Err(e) => {
                warn!(kind, id, error = %e, "skipping malformed entry");
                stats.malformed_structures += 1;
            }
        }
    }
    Ok(entries)
}

#[derive(Deserialize)]
struct NamedStructure {
    name: String,
}

pub fn load_structures(
    type_lists: &Path,
    names: Option<&Path>,
    stats: &mut LoadStats,
) -> Result<Structures> {
    let type_lists = fs::read_to_string(type_lists)?;
    let names = names.map(fs::read_to_string).transpose()?;
    parse_structures(&type_lists, names.as_deref(), stats)
}

/// Map each blueprint to the names of the structures that can run it, in
/// structure-id order.
pub fn structure_map(structures: &Structures) -> HashMap<BlueprintId, Vec<String>> {
    let mut lookup: HashMap<BlueprintId, Vec<String>> = HashMap::new();
    for structure in structures.values() {
        for &blueprint_id in &structure.included_type_ids {
            lookup
                .entry(blueprint_id)
                .or_default()
                .push(structure.name.clone());
        }
    }
    lookup
}

/// Paths of the raw inputs on disk.
#[derive(Debug, Clone, Copy)]
pub struct InputPaths<'a> {
    pub recipe_store: &'a Path,
    pub item_types: &'a Path,
    pub structure_types: &'a Path,
    pub structure_names: Option<&'a Path>,
}

pub fn load_inputs(paths: InputPaths<'_>) -> Result<RawInputs> {
    let mut stats = LoadStats::default();

    let conn = Connection::open_with_flags(
        paths.recipe_store,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?;
    let recipes = load_recipe_store(&conn, &mut stats)?;
    let item_types = load_item_types(paths.item_types, &mut stats)?;
    let structures = load_structures(paths.structure_types, paths.structure_names, &mut stats)?;
    stats.structures = structures.len();

    info!(%stats, "raw inputs loaded");
    Ok(RawInputs {
        recipes,
        item_types,
        structures,
        stats,
    })
}

fn value_as_id(value: &Value) -> Option<ItemId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| ItemId::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub recipes: usize,
    pub items: usize,
    pub structures: usize,
    pub malformed_recipes: usize,
    pub malformed_items: usize,
    pub malformed_structures: usize,
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Loaded {} recipes, {} items, {} structures. Malformed: {} recipes, {} items, {} structures",
            self.recipes,
            self.items,
            self.structures,
            self.malformed_recipes,
            self.malformed_items,
            self.malformed_structures
        )
    }
}
