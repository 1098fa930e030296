//! Frontier Crafter
//!
//! Blueprint catalog, base resource requirement calculator and crafting
//! session planner for EVE Frontier manufacturing.

pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod sample;

pub use calculator::{RequirementNode, Resolver};
pub use catalog::{Catalog, build_catalog};
pub use db::SessionStore;
pub use error::{CrafterError, Result};
