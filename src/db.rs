//! Crafting session store
//!
//! Sessions, targets and ingredients live in three SQLite tables linked by
//! foreign keys. Every public operation runs in one `BEGIN IMMEDIATE`
//! transaction, so a read-modify-write on a session never interleaves with a
//! writer on another connection. Lock contention is retried a bounded number
//! of times before surfacing as [`CrafterError::Transient`].

use std::path::Path;
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::error::{CrafterError, Result};
use crate::models::{
    BlueprintId, CraftingIngredient, CraftingSession, CraftingTarget, IngredientScaling, ItemId,
};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_uuid TEXT NOT NULL UNIQUE
        );

        -- What a session wants to build
        CREATE TABLE IF NOT EXISTS targets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            item_id INTEGER NOT NULL,
            needed_quantity INTEGER NOT NULL CHECK (needed_quantity > 0),
            crafted_quantity INTEGER NOT NULL DEFAULT 0 CHECK (crafted_quantity >= 0),
            blueprint_id INTEGER NOT NULL
        );

        -- Materials snapshotted from the target's blueprint
        CREATE TABLE IF NOT EXISTS ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
            item_id INTEGER NOT NULL,
            needed_quantity INTEGER NOT NULL,
            crafted_quantity INTEGER NOT NULL DEFAULT 0 CHECK (crafted_quantity >= 0)
        );

        CREATE INDEX IF NOT EXISTS idx_targets_session ON targets(session_id, item_id);
        CREATE INDEX IF NOT EXISTS idx_ingredients_target ON ingredients(target_id, item_id);
        "#,
    )?;
    Ok(())
}

/// How often a busy store is retried before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(20),
        }
    }
}

pub struct SessionStore {
    conn: Connection,
    retry: RetryPolicy,
    scaling: IngredientScaling,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened session store");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn,
            retry: RetryPolicy::default(),
            scaling: IngredientScaling::default(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_scaling(mut self, scaling: IngredientScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Allocate a new, empty session.
    pub fn create_session(&mut self) -> Result<Uuid> {
        let session_id = Uuid::new_v4();
        self.in_transaction("create_session", |tx| {
            tx.execute(
                "INSERT INTO sessions (session_uuid) VALUES (?1)",
                [session_id.to_string()],
            )?;
            Ok(())
        })?;
        info!(%session_id, "created crafting session");
        Ok(session_id)
    }

    /// Session ids in creation order.
    pub fn list_sessions(&mut self) -> Result<Vec<Uuid>> {
        self.in_transaction("list_sessions", |tx| {
            let mut stmt = tx.prepare("SELECT session_uuid FROM sessions ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut results = Vec::new();
            for row in rows {
                let raw = row?;
                match Uuid::parse_str(&raw) {
                    Ok(id) => results.push(id),
                    Err(e) => warn!(session_uuid = %raw, error = %e, "skipping unparseable session id"),
                }
            }
            Ok(results)
        })
    }

    pub fn get_session(&mut self, session_id: Uuid) -> Result<CraftingSession> {
        self.in_transaction("get_session", |tx| load_session(tx, session_id))
    }

    /// Add a target and snapshot the materials of `blueprint_id` as its
    /// ingredients.
    ///
    /// # Errors
    ///
    /// [`CrafterError::SessionNotFound`] for an unknown session,
    /// [`CrafterError::NoSuchBlueprint`] when the blueprint does not produce
    /// `item_id`. Nothing is written on failure.
    pub fn add_target(
        &mut self,
        catalog: &Catalog,
        session_id: Uuid,
        item_id: ItemId,
        needed_quantity: u32,
        blueprint_id: BlueprintId,
    ) -> Result<CraftingSession> {
        let scaling = self.scaling;
        self.in_transaction("add_target", |tx| {
            let session_row = session_row(tx, session_id)?;
            if needed_quantity == 0 {
                return Err(CrafterError::InvalidQuantity);
            }
            let variant = catalog.find_variant(item_id, blueprint_id).ok_or(
                CrafterError::NoSuchBlueprint {
                    item_id,
                    blueprint_id,
                },
            )?;

            tx.execute(
                "INSERT INTO targets (session_id, item_id, needed_quantity, blueprint_id)
                 VALUES (?1, ?2, ?3, ?4)",
                (session_row, item_id, needed_quantity, blueprint_id),
            )?;
            let target_row = tx.last_insert_rowid();

            let product_count = variant.product_count(item_id);
            for material in &variant.materials {
                let needed = scaling.ingredient_quantity(
                    material.quantity,
                    needed_quantity,
                    product_count,
                );
                tx.execute(
                    "INSERT INTO ingredients (target_id, item_id, needed_quantity)
                     VALUES (?1, ?2, ?3)",
                    (target_row, material.item_id, needed),
                )?;
            }
            debug!(
                %session_id,
                item_id,
                blueprint_id,
                ingredients = variant.materials.len(),
                "added crafting target"
            );
            load_session(tx, session_id)
        })
    }

    /// Ingredients of the first target for `target_item_id`.
    pub fn get_target_ingredients(
        &mut self,
        session_id: Uuid,
        target_item_id: ItemId,
    ) -> Result<Vec<CraftingIngredient>> {
        self.in_transaction("get_target_ingredients", |tx| {
            let session_row = session_row(tx, session_id)?;
            let target_row = first_target_row(tx, session_row, session_id, target_item_id)?;
            load_ingredients(tx, target_row)
        })
    }

    /// Add a signed `delta` to an ingredient's crafted quantity.
    ///
    /// Crafting beyond the needed quantity is kept as surplus; the crafted
    /// quantity never drops below zero.
    pub fn modify_ingredient_quantity(
        &mut self,
        session_id: Uuid,
        target_item_id: ItemId,
        ingredient_item_id: ItemId,
        delta: i64,
    ) -> Result<CraftingSession> {
        self.in_transaction("modify_ingredient_quantity", |tx| {
            let session_row = session_row(tx, session_id)?;
            let target_row = first_target_row(tx, session_row, session_id, target_item_id)?;
            let ingredient: Option<(i64, u32)> = tx
                .query_row(
                    "SELECT id, crafted_quantity FROM ingredients
                     WHERE target_id = ?1 AND item_id = ?2 ORDER BY id LIMIT 1",
                    (target_row, ingredient_item_id),
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((ingredient_row, crafted)) = ingredient else {
                return Err(CrafterError::IngredientNotFound {
                    session: session_id,
                    target_item_id,
                    ingredient_item_id,
                });
            };

            let updated = apply_delta(crafted, delta);
            tx.execute(
                "UPDATE ingredients SET crafted_quantity = ?1 WHERE id = ?2",
                (updated, ingredient_row),
            )?;
            debug!(
                %session_id,
                target_item_id,
                ingredient_item_id,
                from = crafted,
                to = updated,
                "updated ingredient progress"
            );
            load_session(tx, session_id)
        })
    }

    /// Add a signed `delta` to the crafted quantity of the first target for
    /// `target_item_id`, with the same bounds as ingredients.
    pub fn modify_target_quantity(
        &mut self,
        session_id: Uuid,
        target_item_id: ItemId,
        delta: i64,
    ) -> Result<CraftingSession> {
        self.in_transaction("modify_target_quantity", |tx| {
            let session_row = session_row(tx, session_id)?;
            let target_row = first_target_row(tx, session_row, session_id, target_item_id)?;
            let crafted: u32 = tx.query_row(
                "SELECT crafted_quantity FROM targets WHERE id = ?1",
                [target_row],
                |row| row.get(0),
            )?;
            let updated = apply_delta(crafted, delta);
            tx.execute(
                "UPDATE targets SET crafted_quantity = ?1 WHERE id = ?2",
                (updated, target_row),
            )?;
            debug!(%session_id, target_item_id, from = crafted, to = updated, "updated target progress");
            load_session(tx, session_id)
        })
    }

    fn in_transaction<T>(
        &mut self,
        operation: &'static str,
        op: impl Fn(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match run_once(&mut self.conn, &op) {
                Err(e) if e.is_busy() && attempt < self.retry.max_attempts => {
                    warn!(operation, attempt, "session store busy, retrying");
                    thread::sleep(self.retry.backoff * attempt);
                }
                Err(e) if e.is_busy() => {
                    return Err(CrafterError::Transient {
                        operation,
                        attempts: attempt,
                    });
                }
                result => return result,
            }
        }
    }
}

fn run_once<T>(
    conn: &mut Connection,
    op: &impl Fn(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Crafted quantities may exceed what is needed but never go negative.
fn apply_delta(crafted: u32, delta: i64) -> u32 {
    let updated = i64::from(crafted).saturating_add(delta);
    u32::try_from(updated.max(0)).unwrap_or(u32::MAX)
}

fn session_row(tx: &Transaction<'_>, session_id: Uuid) -> Result<i64> {
    tx.query_row(
        "SELECT id FROM sessions WHERE session_uuid = ?1",
        [session_id.to_string()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(CrafterError::SessionNotFound(session_id))
}

fn first_target_row(
    tx: &Transaction<'_>,
    session_row: i64,
    session_id: Uuid,
    item_id: ItemId,
) -> Result<i64> {
    tx.query_row(
        "SELECT id FROM targets WHERE session_id = ?1 AND item_id = ?2 ORDER BY id LIMIT 1",
        (session_row, item_id),
        |row| row.get(0),
    )
    .optional()?
    .ok_or(CrafterError::TargetNotFound {
        session: session_id,
        item_id,
    })
}

fn load_session(tx: &Transaction<'_>, session_id: Uuid) -> Result<CraftingSession> {
    let session_row = session_row(tx, session_id)?;

    let mut stmt = tx.prepare(
        "SELECT id, item_id, needed_quantity, crafted_quantity, blueprint_id
         FROM targets WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([session_row], |row| {
        Ok(CraftingTarget {
            id: row.get(0)?,
            item_id: row.get(1)?,
            needed_quantity: row.get(2)?,
            crafted_quantity: row.get(3)?,
            blueprint_id: row.get(4)?,
            ingredients: Vec::new(),
        })
    })?;

    let mut targets = Vec::new();
    for row in rows {
        let mut target = row?;
        target.ingredients = load_ingredients(tx, target.id)?;
        targets.push(target);
    }

    Ok(CraftingSession {
        session_id,
        targets,
    })
}

fn load_ingredients(tx: &Transaction<'_>, target_row: i64) -> Result<Vec<CraftingIngredient>> {
    let mut stmt = tx.prepare_cached(
        "SELECT item_id, needed_quantity, crafted_quantity
         FROM ingredients WHERE target_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([target_row], |row| {
        Ok(CraftingIngredient {
            item_id: row.get(0)?,
            needed_quantity: row.get(1)?,
            crafted_quantity: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}
