//! Data models for blueprints and crafting sessions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ItemId = u32;
pub type BlueprintId = u32;

/// Carbonaceous ore, the default base resource.
pub const CARBON_ORE_ID: ItemId = 77811;

/// Display name used when item metadata has no entry for an identifier.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
}

/// One input line of a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Material {
    pub quantity: u32,
    #[serde(rename = "typeID")]
    pub item_id: ItemId,
    pub name: String,
}

/// One output line of a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub quantity: u32,
    #[serde(rename = "typeID")]
    pub item_id: ItemId,
    pub name: String,
}

/// A manufacturing recipe. Stored once and shared by every product it lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlueprintVariant {
    pub blueprint_id: BlueprintId,
    /// Structures able to run this blueprint.
    pub structures: Vec<String>,
    pub materials: Vec<Material>,
    pub products: Vec<Product>,
    /// Production time of one run, in seconds.
    pub time: u32,
    pub max_production: u32,
}

impl BlueprintVariant {
    pub fn product(&self, item_id: ItemId) -> Option<&Product> {
        self.products.iter().find(|p| p.item_id == item_id)
    }

    /// Units of `item_id` delivered by one run. Never zero.
    pub fn product_count(&self, item_id: ItemId) -> u32 {
        self.product(item_id).map_or(1, |p| p.quantity.max(1))
    }

    pub fn product_name(&self, item_id: ItemId) -> &str {
        self.product(item_id).map_or(UNKNOWN_NAME, |p| p.name.as_str())
    }
}

/// How a target's needed quantity turns into ingredient quantities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientScaling {
    /// Snapshot the material quantity of a single run.
    #[default]
    PerRun,
    /// Multiply by the number of runs needed to cover the target quantity.
    ByRuns,
}

impl IngredientScaling {
    pub fn ingredient_quantity(
        self,
        material_quantity: u32,
        needed_quantity: u32,
        product_count: u32,
    ) -> u32 {
        match self {
            Self::PerRun => material_quantity,
            Self::ByRuns => {
                let runs = u64::from(needed_quantity).div_ceil(u64::from(product_count.max(1)));
                u32::try_from(runs * u64::from(material_quantity)).unwrap_or(u32::MAX)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Empty,
    Active,
}

/// A crafting plan: the targets a user wants to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CraftingSession {
    pub session_id: Uuid,
    pub targets: Vec<CraftingTarget>,
}

impl CraftingSession {
    pub fn state(&self) -> SessionState {
        if self.targets.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active
        }
    }

    /// First target for `item_id`, in insertion order.
    pub fn target(&self, item_id: ItemId) -> Option<&CraftingTarget> {
        self.targets.iter().find(|t| t.item_id == item_id)
    }

    pub fn progress(&self) -> Vec<TargetProgress> {
        self.targets.iter().map(CraftingTarget::progress).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CraftingTarget {
    /// Store-assigned identifier, unique across sessions.
    pub id: i64,
    pub item_id: ItemId,
    pub needed_quantity: u32,
    pub crafted_quantity: u32,
    pub blueprint_id: BlueprintId,
    pub ingredients: Vec<CraftingIngredient>,
}

impl CraftingTarget {
    pub fn ingredient(&self, item_id: ItemId) -> Option<&CraftingIngredient> {
        self.ingredients.iter().find(|i| i.item_id == item_id)
    }

    pub fn progress(&self) -> TargetProgress {
        let (needed, crafted) = self.ingredients.iter().fold((0u64, 0u64), |(n, c), i| {
            (
                n + u64::from(i.needed_quantity),
                c + u64::from(i.crafted_quantity.min(i.needed_quantity)),
            )
        });
        TargetProgress {
            item_id: self.item_id,
            needed_quantity: self.needed_quantity,
            crafted_quantity: self.crafted_quantity,
            ingredients_needed: needed,
            ingredients_crafted: crafted,
            complete: self.crafted_quantity >= self.needed_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CraftingIngredient {
    pub item_id: ItemId,
    pub needed_quantity: u32,
    pub crafted_quantity: u32,
}

impl CraftingIngredient {
    /// Units crafted beyond the needed quantity.
    pub fn surplus(&self) -> u32 {
        self.crafted_quantity.saturating_sub(self.needed_quantity)
    }
}

/// Progress totals for one target. Ingredient surplus is not counted
/// towards `ingredients_crafted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetProgress {
    pub item_id: ItemId,
    pub needed_quantity: u32,
    pub crafted_quantity: u32,
    pub ingredients_needed: u64,
    pub ingredients_crafted: u64,
    pub complete: bool,
}

impl std::fmt::Display for TargetProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "item {}: {}/{} crafted, ingredients {}/{}{}",
            self.item_id,
            self.crafted_quantity,
            self.needed_quantity,
            self.ingredients_crafted,
            self.ingredients_needed,
            if self.complete { " (done)" } else { "" }
        )
    }
}
