//! Built-in sample data for trying the tool without game data files.

use std::fs;
use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::extract::{self, LoadStats, RawInputs};

/// Recipe blobs in the recipe store format, keyed by blueprint id.
const RECIPES: &[(&str, &str)] = &[
    (
        "84181",
        r#"{"blueprintTypeID": 84181, "maxProductionLimit": 500,
            "activities": {"manufacturing": {
                "materials": [{"typeID": 77811, "quantity": 20}],
                "products": [{"typeID": 84180, "quantity": 10}],
                "time": 12}}}"#,
    ),
    (
        "84190",
        r#"{"blueprintTypeID": 84190, "maxProductionLimit": 200,
            "activities": {"manufacturing": {
                "materials": [{"typeID": 77811, "quantity": 100}],
                "products": [{"typeID": 84180, "quantity": 40}, {"typeID": 77800, "quantity": 10}],
                "time": 45}}}"#,
    ),
    (
        "88611",
        r#"{"blueprintTypeID": 88611, "maxProductionLimit": 100,
            "activities": {"manufacturing": {
                "materials": [{"typeID": 77811, "quantity": 728}],
                "products": [{"typeID": 88561, "quantity": 1}],
                "time": 30}}}"#,
    ),
    (
        "88612",
        r#"{"blueprintTypeID": 88612, "maxProductionLimit": 100,
            "activities": {"manufacturing": {
                "materials": [{"typeID": 84180, "quantity": 300}, {"typeID": 77800, "quantity": 50}],
                "products": [{"typeID": 88561, "quantity": 1}],
                "time": 40}}}"#,
    ),
    (
        "88620",
        r#"{"blueprintTypeID": 88620, "maxProductionLimit": 20,
            "activities": {"manufacturing": {
                "materials": [{"typeID": 88561, "quantity": 2}, {"typeID": 84180, "quantity": 10}],
                "products": [{"typeID": 88570, "quantity": 1}],
                "time": 120}}}"#,
    ),
    (
        "88700",
        r#"{"blueprintTypeID": 88700, "maxProductionLimit": 1, "activities": {}}"#,
    ),
];

const ITEM_TYPES: &str = r#"{"data": [
    {"id": 77800, "name": "Feldspar Crystals"},
    {"id": 77811, "name": "Carbonaceous Ore"},
    {"id": 84180, "name": "Hydrocarbon Residue"},
    {"id": 88561, "name": "Carbon Weave"},
    {"id": 88570, "name": "Thermal Composite"}
]}"#;

const STRUCTURE_TYPES: &str = r#"{
    "91001": {"includedTypeIDs": [84181, 88611]},
    "91002": {"includedTypeIDs": [88612, 88620]},
    "91003": {"includedTypeIDs": [84190]}
}"#;

const STRUCTURE_NAMES: &str = r#"{
    "91001": {"name": "Mini Printer"},
    "91002": {"name": "Assembler"},
    "91003": {"name": "Refinery"}
}"#;

/// Sample inputs parsed in memory.
pub fn sample_inputs() -> Result<RawInputs> {
    let conn = Connection::open_in_memory()?;
    create_recipe_store(&conn)?;

    let mut stats = LoadStats::default();
    let recipes = extract::load_recipe_store(&conn, &mut stats)?;
    let item_types = extract::parse_item_types(ITEM_TYPES, &mut stats)?;
    let structures = extract::parse_structures(STRUCTURE_TYPES, Some(STRUCTURE_NAMES), &mut stats)?;
    stats.structures = structures.len();

    Ok(RawInputs {
        recipes,
        item_types,
        structures,
        stats,
    })
}

/// Write the sample inputs to `dir` under their default file names.
pub fn write_sample_files(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let store = dir.join("blueprint.db");
    if store.exists() {
        fs::remove_file(&store)?;
    }
    create_recipe_store(&Connection::open(&store)?)?;
    fs::write(dir.join("types.json"), ITEM_TYPES)?;
    fs::write(dir.join("typelist.json"), STRUCTURE_TYPES)?;
    fs::write(dir.join("typelistSelection.json"), STRUCTURE_NAMES)?;
    Ok(())
}

fn create_recipe_store(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS cache (key TEXT PRIMARY KEY, value TEXT NOT NULL);")?;
    for &(key, blob) in RECIPES {
        conn.execute(
            "INSERT OR REPLACE INTO cache (key, value) VALUES (?1, ?2)",
            (key, blob),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Resolver;
    use crate::models::CARBON_ORE_ID;

    #[test]
    fn sample_catalog_resolves() {
        let inputs = sample_inputs().unwrap();
        assert_eq!(inputs.stats.recipes, 6);
        assert_eq!(inputs.stats.malformed_recipes, 0);

        let catalog = inputs.build_catalog();
        assert_eq!(catalog.products().collect::<Vec<_>>(), vec![77800, 84180, 88561, 88570]);

        let mut resolver = Resolver::new(&catalog);
        assert_eq!(resolver.resolve(CARBON_ORE_ID, 84180).unwrap(), 2.5);
        assert_eq!(resolver.resolve(CARBON_ORE_ID, 77800).unwrap(), 10.0);
        assert_eq!(resolver.resolve(CARBON_ORE_ID, 88561).unwrap(), 1250.0);
        assert_eq!(resolver.resolve(CARBON_ORE_ID, 88570).unwrap(), 2525.0);
    }

    #[test]
    fn sample_structures_attach_to_blueprints() {
        let catalog = sample_inputs().unwrap().build_catalog();
        let weave = catalog.find_variant(88561, 88611).unwrap();
        assert_eq!(weave.structures, vec!["Mini Printer"]);
        assert_eq!(weave.materials[0].name, "Carbonaceous Ore");
    }
}
