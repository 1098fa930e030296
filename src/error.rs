//! Error types for the crafting engine.

use uuid::Uuid;

use crate::models::{BlueprintId, ItemId};

/// Errors raised by catalog lookups, requirement resolution and the
/// session store.
#[derive(Debug, thiserror::Error)]
pub enum CrafterError {
    /// No catalog entry produces this item.
    #[error("item {0} has no blueprints")]
    ItemNotFound(ItemId),

    /// No session with this identifier exists.
    #[error("crafting session {0} not found")]
    SessionNotFound(Uuid),

    /// The session has no target for this item.
    #[error("session {session} has no target for item {item_id}")]
    TargetNotFound { session: Uuid, item_id: ItemId },

    /// The target has no ingredient for this item.
    #[error("target {target_item_id} in session {session} has no ingredient {ingredient_item_id}")]
    IngredientNotFound {
        session: Uuid,
        target_item_id: ItemId,
        ingredient_item_id: ItemId,
    },

    /// The blueprint does not produce the requested item.
    #[error("blueprint {blueprint_id} does not produce item {item_id}")]
    NoSuchBlueprint {
        item_id: ItemId,
        blueprint_id: BlueprintId,
    },

    /// An item transitively requires itself. `cycle` starts and ends with
    /// the same item.
    #[error("production cycle detected: {}", format_cycle(.cycle))]
    CyclicRecipe { cycle: Vec<ItemId> },

    /// Needed quantities must be positive.
    #[error("needed quantity must be at least 1")]
    InvalidQuantity,

    /// The store stayed busy after every retry.
    #[error("{operation} failed after {attempts} attempts: store is busy")]
    Transient {
        operation: &'static str,
        attempts: u32,
    },

    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrafterError {
    /// True for the lookup failures a caller reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ItemNotFound(_)
                | Self::SessionNotFound(_)
                | Self::TargetNotFound { .. }
                | Self::IngredientNotFound { .. }
        )
    }

    /// True when SQLite reported lock contention.
    pub(crate) fn is_busy(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

fn format_cycle(cycle: &[ItemId]) -> String {
    cycle
        .iter()
        .map(ItemId::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T, E = CrafterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_names_every_item() {
        let err = CrafterError::CyclicRecipe {
            cycle: vec![1, 2, 1],
        };
        assert_eq!(err.to_string(), "production cycle detected: 1 -> 2 -> 1");
    }

    #[test]
    fn not_found_classification() {
        assert!(CrafterError::ItemNotFound(5).is_not_found());
        assert!(CrafterError::SessionNotFound(Uuid::nil()).is_not_found());
        assert!(
            !CrafterError::NoSuchBlueprint {
                item_id: 1,
                blueprint_id: 2
            }
            .is_not_found()
        );
    }

    #[test]
    fn busy_failures_are_detected() {
        let err = CrafterError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(err.is_busy());
        assert!(!CrafterError::InvalidQuantity.is_busy());
    }
}
