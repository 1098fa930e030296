//! Blueprint catalog
//!
//! Normalizes raw recipe records into [`BlueprintVariant`]s and indexes them
//! by every item they produce. Building is pure: the same inputs always give
//! an equal catalog.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CrafterError, Result};
use crate::extract::{ItemTypes, RecipeRecord, TypeQuantity};
use crate::models::{
    BlueprintId, BlueprintVariant, Item, ItemId, Material, Product, UNKNOWN_NAME,
};

/// Product item id to the blueprints that can produce it, in record order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    by_product: BTreeMap<ItemId, Vec<Arc<BlueprintVariant>>>,
    item_names: BTreeMap<ItemId, String>,
}

/// Build the catalog from already-loaded raw records.
///
/// Records without a manufacturing activity are skipped. Missing item names
/// become "Unknown" and missing structure lists become empty; neither fails
/// the build.
pub fn build_catalog(
    records: &[RecipeRecord],
    item_types: &ItemTypes,
    structures: &HashMap<BlueprintId, Vec<String>>,
) -> Catalog {
    let mut by_product: BTreeMap<ItemId, Vec<Arc<BlueprintVariant>>> = BTreeMap::new();
    let mut unknown = 0usize;
    let mut skipped = 0usize;

    let mut name_of = |item_id: ItemId| match item_types.get(&item_id) {
        Some(meta) => meta.name.clone(),
        None => {
            debug!(item_id, "no metadata for item");
            unknown += 1;
            UNKNOWN_NAME.to_string()
        }
    };

    for record in records {
        let Some(mfg) = record.manufacturing() else {
            skipped += 1;
            continue;
        };
        if mfg.products.is_empty() {
            warn!(blueprint_id = record.blueprint_type_id, "manufacturing blueprint has no products");
        }

        let materials = mfg
            .materials
            .iter()
            .map(|m: &TypeQuantity| Material {
                quantity: m.quantity,
                item_id: m.type_id,
                name: name_of(m.type_id),
            })
            .collect();
        let products = mfg
            .products
            .iter()
            .map(|p| {
                if p.quantity == 0 {
                    warn!(
                        blueprint_id = record.blueprint_type_id,
                        item_id = p.type_id,
                        "product quantity is zero, treating as one per run"
                    );
                }
                Product {
                    quantity: p.quantity.max(1),
                    item_id: p.type_id,
                    name: name_of(p.type_id),
                }
            })
            .collect::<Vec<_>>();

        let variant = Arc::new(BlueprintVariant {
            blueprint_id: record.blueprint_type_id,
            structures: structures
                .get(&record.blueprint_type_id)
                .cloned()
                .unwrap_or_default(),
            materials,
            time: mfg.time,
            max_production: record.max_production_limit,
            products,
        });

        for product in &variant.products {
            let entry = by_product.entry(product.item_id).or_default();
            // A record listing the same product twice still appears once.
            if !entry.iter().any(|v| Arc::ptr_eq(v, &variant)) {
                entry.push(Arc::clone(&variant));
            }
        }
    }

    if unknown > 0 {
        warn!(count = unknown, "materials or products without item metadata");
    }
    debug!(
        products = by_product.len(),
        skipped, "built blueprint catalog"
    );

    Catalog {
        by_product,
        item_names: item_types
            .iter()
            .map(|(&id, meta)| (id, meta.name.clone()))
            .collect(),
    }
}

impl Catalog {
    /// Blueprints producing `item_id`, if any.
    pub fn blueprints(&self, item_id: ItemId) -> Option<&[Arc<BlueprintVariant>]> {
        self.by_product.get(&item_id).map(Vec::as_slice)
    }

    pub fn lookup_item_blueprints(&self, item_id: ItemId) -> Result<&[Arc<BlueprintVariant>]> {
        self.blueprints(item_id)
            .ok_or(CrafterError::ItemNotFound(item_id))
    }

    /// The blueprint `blueprint_id` if it produces `item_id`.
    pub fn find_variant(
        &self,
        item_id: ItemId,
        blueprint_id: BlueprintId,
    ) -> Option<&Arc<BlueprintVariant>> {
        self.blueprints(item_id)?
            .iter()
            .find(|v| v.blueprint_id == blueprint_id)
    }

    /// Case-insensitive substring search over item names, ordered by id.
    pub fn search_items(&self, needle: &str) -> Vec<Item> {
        let needle = needle.to_lowercase();
        self.item_names
            .iter()
            .filter(|(_, name)| name.to_lowercase().contains(&needle))
            .map(|(&id, name)| Item {
                id,
                name: name.clone(),
            })
            .collect()
    }

    pub fn item_name(&self, item_id: ItemId) -> &str {
        self.item_names
            .get(&item_id)
            .map_or(UNKNOWN_NAME, String::as_str)
    }

    /// Producible item ids in ascending order.
    pub fn products(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.by_product.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_product.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_product.is_empty()
    }

    /// Distinct blueprints across all products.
    pub fn blueprint_count(&self) -> usize {
        let mut seen: Vec<BlueprintId> = self
            .by_product
            .values()
            .flatten()
            .map(|v| v.blueprint_id)
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Activities, ItemMetadata, ManufacturingActivity};

    fn tq(type_id: ItemId, quantity: u32) -> TypeQuantity {
        TypeQuantity { type_id, quantity }
    }

    fn record(bp: BlueprintId, materials: Vec<TypeQuantity>, products: Vec<TypeQuantity>) -> RecipeRecord {
        RecipeRecord {
            blueprint_type_id: bp,
            max_production_limit: 50,
            activities: Some(Activities {
                manufacturing: Some(ManufacturingActivity {
                    materials,
                    products,
                    time: 12,
                }),
            }),
        }
    }

    fn items() -> ItemTypes {
        [(1, "Ore"), (2, "Plate"), (3, "Slag"), (4, "Frame")]
            .into_iter()
            .map(|(id, name)| (id, ItemMetadata { name: name.into() }))
            .collect()
    }

    #[test]
    fn indexes_every_product_with_a_shared_variant() {
        let records = vec![record(10, vec![tq(1, 5)], vec![tq(2, 1), tq(3, 2)])];
        let catalog = build_catalog(&records, &items(), &HashMap::new());

        assert_eq!(catalog.products().collect::<Vec<_>>(), vec![2, 3]);
        let plate = &catalog.blueprints(2).unwrap()[0];
        let slag = &catalog.blueprints(3).unwrap()[0];
        assert!(Arc::ptr_eq(plate, slag));
        assert_eq!(plate.product_count(3), 2);
        assert_eq!(plate.materials[0].name, "Ore");
    }

    #[test]
    fn skips_records_without_manufacturing() {
        let mut research = record(11, vec![], vec![tq(2, 1)]);
        research.activities = Some(Activities::default());
        let mut bare = record(12, vec![], vec![tq(2, 1)]);
        bare.activities = None;

        let catalog = build_catalog(&[research, bare], &items(), &HashMap::new());
        assert!(catalog.is_empty());
    }

    #[test]
    fn missing_metadata_degrades_to_unknown() {
        let records = vec![record(10, vec![tq(99, 1)], vec![tq(98, 1)])];
        let structures = HashMap::from([(10, vec!["Printer".to_string()])]);
        let catalog = build_catalog(&records, &ItemTypes::new(), &structures);

        let variant = &catalog.lookup_item_blueprints(98).unwrap()[0];
        assert_eq!(variant.materials[0].name, UNKNOWN_NAME);
        assert_eq!(variant.product_name(98), UNKNOWN_NAME);
        assert_eq!(variant.structures, vec!["Printer"]);
    }

    #[test]
    fn competing_blueprints_keep_record_order() {
        let records = vec![
            record(20, vec![tq(1, 5)], vec![tq(2, 1)]),
            record(21, vec![tq(1, 9)], vec![tq(2, 1)]),
        ];
        let catalog = build_catalog(&records, &items(), &HashMap::new());
        let ids: Vec<_> = catalog.blueprints(2).unwrap().iter().map(|v| v.blueprint_id).collect();
        assert_eq!(ids, vec![20, 21]);
        assert_eq!(catalog.blueprint_count(), 2);
        assert!(catalog.find_variant(2, 21).is_some());
        assert!(catalog.find_variant(2, 22).is_none());
        assert!(catalog.find_variant(1, 20).is_none());
    }

    #[test]
    fn lookup_of_unproducible_item_is_not_found() {
        let catalog = build_catalog(&[], &items(), &HashMap::new());
        let err = catalog.lookup_item_blueprints(1).unwrap_err();
        assert!(matches!(err, CrafterError::ItemNotFound(1)));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let catalog = build_catalog(&[], &items(), &HashMap::new());
        let hits: Vec<_> = catalog.search_items("LA").into_iter().map(|i| i.id).collect();
        assert_eq!(hits, vec![2, 3]);
        assert!(catalog.search_items("nothing here").is_empty());
        assert_eq!(catalog.search_items("").len(), 4);
        assert_eq!(catalog.item_name(4), "Frame");
        assert_eq!(catalog.item_name(40), UNKNOWN_NAME);
    }

    #[test]
    fn zero_product_quantity_counts_as_one() {
        let records = vec![record(10, vec![tq(1, 5)], vec![tq(2, 0)])];
        let catalog = build_catalog(&records, &items(), &HashMap::new());
        assert_eq!(catalog.blueprints(2).unwrap()[0].product_count(2), 1);
    }
}
