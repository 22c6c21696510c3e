//! # Ingredient Reconciliation Engine
//!
//! Pure domain logic for a meal-planning application: recipe coverage by the
//! pantry, meal-plan requirement aggregation across units, and grocery list
//! regeneration that keeps the user's checked and manual items.

pub mod aggregator;
pub mod catalog;
pub mod categorizer;
pub mod coverage;
pub mod engine;
pub mod engine_config;
pub mod engine_errors;
pub mod export;
pub mod grocery_list;
pub mod ingredient_model;
pub mod pantry;
pub mod quantity_normalizer;
pub mod unit_table;

pub use engine::ReconciliationEngine;
pub use engine_config::EngineConfig;
pub use engine_errors::{EngineError, EngineResult};
