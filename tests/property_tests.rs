//! Property tests for catalog building and requirement resolution.

use std::collections::HashMap;

use frontier_crafter::extract::{Activities, ItemTypes, ManufacturingActivity, RecipeRecord, TypeQuantity};
use frontier_crafter::models::ItemId;
use frontier_crafter::{Catalog, Resolver, build_catalog};
use proptest::collection::vec;
use proptest::prelude::*;

const MAX_ITEM: ItemId = 16;

/// Recipes whose materials always have a higher id than their product, so
/// the production graph is acyclic.
fn recipes() -> impl Strategy<Value = Vec<RecipeRecord>> {
    vec(
        (1u32..8, vec((1u32..6, 1u32..20), 0..4), 1u32..5),
        1..12,
    )
    .prop_map(|rows| {
        rows
            .into_iter()
            .enumerate()
            .map(|(i, (product, materials, count))| RecipeRecord {
                blueprint_type_id: 1000 + i as u32,
                max_production_limit: 10,
                activities: Some(Activities {
                    manufacturing: Some(ManufacturingActivity {
                        materials: materials
                            .into_iter()
                            .map(|(offset, quantity)| TypeQuantity {
                                type_id: product + offset,
                                quantity,
                            })
                            .collect(),
                        products: vec![TypeQuantity {
                            type_id: product,
                            quantity: count,
                        }],
                        time: 1,
                    }),
                }),
            })
            .collect()
    })
}

fn catalog(records: &[RecipeRecord]) -> Catalog {
    build_catalog(records, &ItemTypes::new(), &HashMap::new())
}

proptest! {
    #[test]
    fn base_resource_always_costs_one(records in recipes(), base in 0..MAX_ITEM) {
        let cat = catalog(&records);
        let mut resolver = Resolver::new(&cat);
        prop_assert_eq!(resolver.resolve(base, base).unwrap(), 1.0);
    }

    #[test]
    fn items_without_blueprints_cost_nothing(records in recipes(), base in 0..MAX_ITEM, item in 0..MAX_ITEM) {
        let cat = catalog(&records);
        prop_assume!(item != base && cat.blueprints(item).is_none());
        let mut resolver = Resolver::new(&cat);
        prop_assert_eq!(resolver.resolve(base, item).unwrap(), 0.0);
    }

    #[test]
    fn raising_a_material_never_lowers_cost(
        records in recipes(),
        base in 2..MAX_ITEM,
        pick in any::<prop::sample::Index>(),
        extra in 1u32..50,
    ) {
        let mut bumped = records.clone();
        let record = pick.get_mut(&mut bumped);
        let materials = &mut record.activities.as_mut().unwrap().manufacturing.as_mut().unwrap().materials;
        prop_assume!(!materials.is_empty());
        materials[0].quantity += extra;

        let before = catalog(&records);
        let after = catalog(&bumped);
        let mut old = Resolver::new(&before);
        let mut new = Resolver::new(&after);
        for item in 0..MAX_ITEM {
            let a = old.resolve(base, item).unwrap();
            let b = new.resolve(base, item).unwrap();
            prop_assert!(b >= a - 1e-9 * a.abs(), "item {} went from {} to {}", item, a, b);
        }
    }

    #[test]
    fn building_twice_gives_equal_catalogs(records in recipes()) {
        prop_assert_eq!(catalog(&records), catalog(&records));
    }

    #[test]
    fn every_product_is_indexed(records in recipes()) {
        let cat = catalog(&records);
        for record in &records {
            let mfg = record.activities.as_ref().unwrap().manufacturing.as_ref().unwrap();
            for product in &mfg.products {
                let variants = cat.blueprints(product.type_id).unwrap();
                prop_assert!(variants.iter().any(|v| v.blueprint_id == record.blueprint_type_id));
            }
        }
    }
}
