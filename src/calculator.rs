//! Base resource requirement calculator

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::error::{CrafterError, Result};
use crate::models::{BlueprintId, BlueprintVariant, ItemId};

/// Resolves how many units of a base resource one unit of an item costs.
///
/// When several blueprints produce an item, the most expensive one is used,
/// so a plan never under-estimates. Results are memoized per
/// `(base resource, item)` pair for the lifetime of the resolver; each
/// thread should own its own resolver.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    cache: HashMap<(ItemId, ItemId), f64>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            cache: HashMap::new(),
        }
    }

    /// Units of `base` needed per unit of `item`.
    ///
    /// # Errors
    ///
    /// Returns [`CrafterError::CyclicRecipe`] if `item` transitively requires
    /// itself.
    pub fn resolve(&mut self, base: ItemId, item: ItemId) -> Result<f64> {
        let mut path = Vec::new();
        self.resolve_on_path(base, item, &mut path)
    }

    /// Resolve several items against the same cache.
    pub fn resolve_all(&mut self, base: ItemId, items: &[ItemId]) -> Result<Vec<(ItemId, f64)>> {
        items
            .iter()
            .map(|&item| -> Result<(ItemId, f64)> { Ok((item, self.resolve(base, item)?)) })
            .collect()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn resolve_on_path(&mut self, base: ItemId, item: ItemId, path: &mut Vec<ItemId>) -> Result<f64> {
        if item == base {
            return Ok(1.0);
        }
        if let Some(&cached) = self.cache.get(&(base, item)) {
            return Ok(cached);
        }
        if let Some(start) = path.iter().position(|&p| p == item) {
            let mut cycle = path[start..].to_vec();
            cycle.push(item);
            return Err(CrafterError::CyclicRecipe { cycle });
        }

        let catalog = self.catalog;
        let Some(variants) = catalog.blueprints(item) else {
            self.cache.insert((base, item), 0.0);
            return Ok(0.0);
        };

        path.push(item);
        let mut worst = 0.0_f64;
        for variant in variants {
            let cost = self.variant_cost(base, item, variant, path)?;
            trace!(item, blueprint_id = variant.blueprint_id, cost, "blueprint cost");
            worst = worst.max(cost);
        }
        path.pop();

        self.cache.insert((base, item), worst);
        Ok(worst)
    }

    fn variant_cost(
        &mut self,
        base: ItemId,
        item: ItemId,
        variant: &BlueprintVariant,
        path: &mut Vec<ItemId>,
    ) -> Result<f64> {
        let mut total = 0.0;
        for material in &variant.materials {
            total += self.resolve_on_path(base, material.item_id, path)? * f64::from(material.quantity);
        }
        Ok(total / f64::from(variant.product_count(item)))
    }

    /// Requirement tree for `quantity` units of `item`, following the blueprint
    /// the resolver costs each item against.
    pub fn breakdown(&mut self, base: ItemId, item: ItemId, quantity: f64) -> Result<RequirementNode> {
        // Rejects cycles before the tree walk below.
        self.resolve(base, item)?;
        let node = self.build_node(base, item, quantity)?;
        debug!(item, base, base_units = node.base_units, "built requirement breakdown");
        Ok(node)
    }

    fn build_node(&mut self, base: ItemId, item: ItemId, quantity: f64) -> Result<RequirementNode> {
        let per_unit = self.resolve(base, item)?;
        let mut node = RequirementNode {
            item_id: item,
            name: self.catalog.item_name(item).to_string(),
            quantity,
            base_units: per_unit * quantity,
            blueprint_id: None,
            inputs: Vec::new(),
        };
        if item == base {
            return Ok(node);
        }
        let catalog = self.catalog;
        let Some(variants) = catalog.blueprints(item) else {
            return Ok(node);
        };

        // First blueprint reaching the resolved cost; ties keep record order.
        let mut chosen = &variants[0];
        for variant in variants {
            let mut path = Vec::new();
            if self.variant_cost(base, item, variant, &mut path)? >= per_unit {
                chosen = variant;
                break;
            }
        }

        let runs = quantity / f64::from(chosen.product_count(item));
        node.blueprint_id = Some(chosen.blueprint_id);
        for material in &chosen.materials {
            let input = self.build_node(base, material.item_id, runs * f64::from(material.quantity))?;
            node.inputs.push(input);
        }
        Ok(node)
    }
}

/// One item in a requirement breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementNode {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: f64,
    /// Base resource units needed for `quantity` of this item.
    pub base_units: f64,
    /// `None` for the base resource and for raw inputs.
    pub blueprint_id: Option<BlueprintId>,
    pub inputs: Vec<RequirementNode>,
}

impl RequirementNode {
    /// Totals of every leaf (base resource or raw input) in the tree.
    pub fn raw_inputs(&self) -> BTreeMap<ItemId, f64> {
        let mut totals = BTreeMap::new();
        self.collect_raw(&mut totals);
        totals
    }

    fn collect_raw(&self, totals: &mut BTreeMap<ItemId, f64>) {
        if self.blueprint_id.is_none() {
            *totals.entry(self.item_id).or_default() += self.quantity;
            return;
        }
        for input in &self.inputs {
            input.collect_raw(totals);
        }
    }
}

/// Format a requirement breakdown as an indented tree
pub fn format_breakdown(node: &RequirementNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    match node.blueprint_id {
        Some(bp) => output.push_str(&format!(
            "{}{:.2}x {} ({}) via blueprint {} = {:.2} base\n",
            prefix, node.quantity, node.name, node.item_id, bp, node.base_units
        )),
        None => output.push_str(&format!(
            "{}{:.2}x {} ({}) raw = {:.2} base\n",
            prefix, node.quantity, node.name, node.item_id, node.base_units
        )),
    }
    for input in &node.inputs {
        output.push_str(&format_breakdown(input, indent + 1));
    }
    output
}
