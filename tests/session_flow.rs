//! End-to-end tests: raw records through the catalog into crafting sessions.

use std::collections::HashMap;
use std::thread;

use frontier_crafter::config::InputSettings;
use frontier_crafter::extract::{self, Activities, ItemTypes, ManufacturingActivity, RecipeRecord, TypeQuantity};
use frontier_crafter::models::{CARBON_ORE_ID, CraftingIngredient, SessionState};
use frontier_crafter::{Catalog, CrafterError, Resolver, SessionStore, build_catalog, sample};

fn weave_catalog() -> Catalog {
    let record = RecipeRecord {
        blueprint_type_id: 88611,
        max_production_limit: 100,
        activities: Some(Activities {
            manufacturing: Some(ManufacturingActivity {
                materials: vec![TypeQuantity {
                    type_id: 77811,
                    quantity: 728,
                }],
                products: vec![TypeQuantity {
                    type_id: 88561,
                    quantity: 1,
                }],
                time: 30,
            }),
        }),
    };
    build_catalog(&[record], &ItemTypes::new(), &HashMap::new())
}

#[test]
fn session_lifecycle_snapshot_and_progress() {
    let catalog = weave_catalog();
    let mut store = SessionStore::open_in_memory().unwrap();

    let id = store.create_session().unwrap();
    assert_eq!(store.get_session(id).unwrap().state(), SessionState::Empty);

    let session = store.add_target(&catalog, id, 88561, 10, 88611).unwrap();
    assert_eq!(session.state(), SessionState::Active);
    let target = session.target(88561).unwrap();
    assert_eq!(target.needed_quantity, 10);
    assert_eq!(target.crafted_quantity, 0);
    assert_eq!(target.blueprint_id, 88611);
    assert_eq!(
        target.ingredients,
        vec![CraftingIngredient {
            item_id: 77811,
            needed_quantity: 728,
            crafted_quantity: 0,
        }]
    );

    let session = store.modify_ingredient_quantity(id, 88561, 77811, 100).unwrap();
    assert_eq!(session.targets[0].ingredients[0].crafted_quantity, 100);

    let ingredients = store.get_target_ingredients(id, 88561).unwrap();
    assert_eq!(ingredients[0].crafted_quantity, 100);
    assert_eq!(store.get_session(id).unwrap(), session);
}

#[test]
fn ingredient_snapshot_ignores_later_catalog() {
    let mut store = SessionStore::open_in_memory().unwrap();
    let id = store.create_session().unwrap();
    store.add_target(&weave_catalog(), id, 88561, 1, 88611).unwrap();

    // Rebuilt catalog without the blueprint: the stored target is unchanged.
    let empty = build_catalog(&[], &ItemTypes::new(), &HashMap::new());
    let session = store.get_session(id).unwrap();
    assert_eq!(session.targets[0].ingredients.len(), 1);
    assert!(matches!(
        store.add_target(&empty, id, 88561, 1, 88611),
        Err(CrafterError::NoSuchBlueprint { .. })
    ));
}

#[test]
fn concurrent_progress_updates_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");
    let catalog = weave_catalog();

    let mut store = SessionStore::open(&path).unwrap();
    let id = store.create_session().unwrap();
    store.add_target(&catalog, id, 88561, 1, 88611).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let mut store = SessionStore::open(&path).unwrap();
                for _ in 0..25 {
                    store.modify_ingredient_quantity(id, 88561, 77811, 1).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let ingredients = store.get_target_ingredients(id, 88561).unwrap();
    assert_eq!(ingredients[0].crafted_quantity, 100);
}

#[test]
fn sessions_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    let id = {
        let mut store = SessionStore::open(&path).unwrap();
        let id = store.create_session().unwrap();
        store.add_target(&weave_catalog(), id, 88561, 3, 88611).unwrap();
        id
    };

    let mut store = SessionStore::open(&path).unwrap();
    let session = store.get_session(id).unwrap();
    assert_eq!(session.targets.len(), 1);
    assert_eq!(session.targets[0].needed_quantity, 3);
}

#[test]
fn sample_files_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    sample::write_sample_files(dir.path()).unwrap();

    let inputs = InputSettings {
        recipe_store: dir.path().join("blueprint.db"),
        item_types: dir.path().join("types.json"),
        structure_types: dir.path().join("typelist.json"),
        structure_names: Some(dir.path().join("typelistSelection.json")),
    };
    let loaded = extract::load_inputs(inputs.paths()).unwrap();
    let in_memory = sample::sample_inputs().unwrap();
    assert_eq!(loaded.recipes, in_memory.recipes);
    assert_eq!(loaded.build_catalog(), in_memory.build_catalog());

    let catalog = loaded.build_catalog();
    let hits = catalog.search_items("carbon");
    // "Hydrocarbon Residue" matches too
    assert_eq!(hits.len(), 3);

    let mut resolver = Resolver::new(&catalog);
    let tree = resolver.breakdown(CARBON_ORE_ID, 88570, 1.0).unwrap();
    assert_eq!(tree.base_units, 2525.0);
}
