//! Configuration file support.
//!
//! Settings come from an optional TOML file (`crafter.toml` in the working
//! directory unless `--config` names another). Every field has a default, so
//! an empty or missing file is valid. Command-line flags override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::db::RetryPolicy;
use crate::error::Result;
use crate::extract::InputPaths;
use crate::models::{CARBON_ORE_ID, IngredientScaling, ItemId};

pub const DEFAULT_CONFIG_FILE: &str = "crafter.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding crafting sessions.
    pub database: PathBuf,
    pub inputs: InputSettings,
    /// Resource costed by `resolve` when none is given.
    pub base_resource: ItemId,
    pub ingredient_scaling: IngredientScaling,
    pub store: StoreSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("crafting_tool.db"),
            inputs: InputSettings::default(),
            base_resource: CARBON_ORE_ID,
            ingredient_scaling: IngredientScaling::default(),
            store: StoreSettings::default(),
        }
    }
}

/// Locations of the raw catalog inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Key-value SQLite store of recipe blobs.
    pub recipe_store: PathBuf,
    /// Item metadata dump.
    pub item_types: PathBuf,
    /// Structure id to the blueprint ids it unlocks.
    pub structure_types: PathBuf,
    /// Structure id to display name.
    pub structure_names: Option<PathBuf>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            recipe_store: PathBuf::from("blueprint.db"),
            item_types: PathBuf::from("types.json"),
            structure_types: PathBuf::from("typelist.json"),
            structure_names: Some(PathBuf::from("typelistSelection.json")),
        }
    }
}

impl InputSettings {
    pub fn paths(&self) -> InputPaths<'_> {
        InputPaths {
            recipe_store: &self.recipe_store,
            item_types: &self.item_types,
            structure_types: &self.structure_types,
            structure_names: self.structure_names.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            backoff_ms: u64::try_from(retry.backoff.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl StoreSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path`, or the default config file when it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        debug!(path = %path.display(), "loading settings");
        Self::from_toml(&fs::read_to_string(path)?)
    }
}
