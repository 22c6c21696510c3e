//! # Engine Configuration Module
//!
//! This module defines configuration structures for the reconciliation engine:
//! ranking-score adjustments, the policy for unknown unit symbols, display
//! rounding and grocery category ordering. Configuration is loaded from an
//! optional TOML file; every field falls back to its default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Constants for engine configuration
pub const DEFAULT_EXPIRATION_WINDOW_DAYS: i64 = 3;
pub const DEFAULT_EXPIRATION_BOOST: i64 = 10;
pub const DEFAULT_MAX_MISSING_REQUIRED: usize = 2;
pub const DEFAULT_MISSING_PENALTY: i64 = 15;
pub const DEFAULT_DECIMAL_PLACES: u32 = 2;
pub const DEFAULT_CONFIG_FILE: &str = "reconciler.toml";
pub const OTHER_CATEGORY: &str = "Other";

/// Ranking-score adjustments applied by the coverage scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Pantry items expiring within this many days of now boost a recipe
    #[serde(default = "default_expiration_window_days")]
    pub expiration_window_days: i64,
    /// Points added to the ranking score when a near-expiry item is used
    #[serde(default = "default_expiration_boost")]
    pub expiration_boost: Decimal,
    /// Recipes missing more required ingredients than this are penalized
    #[serde(default = "default_max_missing_required")]
    pub max_missing_required: usize,
    /// Points subtracted from the ranking score for such recipes
    #[serde(default = "default_missing_penalty")]
    pub missing_penalty: Decimal,
}

/// What to do with a unit symbol the conversion table does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownUnitPolicy {
    /// The symbol becomes its own single-member count family
    #[default]
    TreatAsCount,
    /// Aggregation fails with an unrecognized-unit error
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UnitsConfig {
    #[serde(default)]
    pub unknown_unit_policy: UnknownUnitPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Decimal places kept when a quantity is shown to the user
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryConfig {
    /// Order of category sections on the grocery list
    #[serde(default = "default_category_order")]
    pub category_order: Vec<String>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub grocery: GroceryConfig,
}

impl EngineConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load from `path` (or the default path); a missing file yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed creating config directory: {}", parent.display())
                })?;
            }
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let template = r#"[scoring]
# pantry items expiring within this many days boost recipes that use them
expiration_window_days = 3
expiration_boost = 10
# recipes missing more required ingredients than this get a penalty
max_missing_required = 2
missing_penalty = 15

[units]
# "treat_as_count" or "reject"
unknown_unit_policy = "treat_as_count"

[display]
decimal_places = 2

[grocery]
category_order = ["Produce", "Meat", "Seafood", "Dairy", "Bakery", "Frozen", "Pantry", "Spices", "Beverages", "Other"]
"#;
        template.to_string()
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            expiration_window_days: default_expiration_window_days(),
            expiration_boost: default_expiration_boost(),
            max_missing_required: default_max_missing_required(),
            missing_penalty: default_missing_penalty(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            decimal_places: default_decimal_places(),
        }
    }
}

impl Default for GroceryConfig {
    fn default() -> Self {
        Self {
            category_order: default_category_order(),
        }
    }
}

fn default_expiration_window_days() -> i64 {
    DEFAULT_EXPIRATION_WINDOW_DAYS
}

fn default_expiration_boost() -> Decimal {
    Decimal::from(DEFAULT_EXPIRATION_BOOST)
}

fn default_max_missing_required() -> usize {
    DEFAULT_MAX_MISSING_REQUIRED
}

fn default_missing_penalty() -> Decimal {
    Decimal::from(DEFAULT_MISSING_PENALTY)
}

fn default_decimal_places() -> u32 {
    DEFAULT_DECIMAL_PLACES
}

fn default_category_order() -> Vec<String> {
    [
        "Produce",
        "Meat",
        "Seafood",
        "Dairy",
        "Bakery",
        "Frozen",
        "Pantry",
        "Spices",
        "Beverages",
        OTHER_CATEGORY,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}
