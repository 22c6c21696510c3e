//! # Unit Conversion Table Module
//!
//! Static knowledge of convertible unit families and their linear conversion
//! factors. Each unit carries a factor to its family's canonical unit (the
//! smallest member: `ml` for volume, `g` for weight), so the factor between any
//! two members is a single division.
//!
//! Count units form single-member families: `clove` only converts to `clove`.
//!
//! A table is built once and never mutated afterwards. The engine receives it
//! by reference, so tests can inject alternate tables.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Canonical symbol of the volume family
pub const VOLUME_BASE: &str = "ml";
/// Canonical symbol of the weight family
pub const WEIGHT_BASE: &str = "g";
/// Symbol used for bare counts ("3 eggs")
pub const ITEM: &str = "item";

/// A group of mutually convertible units
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitFamily {
    Volume,
    Weight,
    /// Single-member family named by its unit symbol
    Count(String),
}

impl UnitFamily {
    /// Unit all quantities of this family are summed in
    pub fn canonical_unit(&self) -> &str {
        match self {
            UnitFamily::Volume => VOLUME_BASE,
            UnitFamily::Weight => WEIGHT_BASE,
            UnitFamily::Count(symbol) => symbol,
        }
    }

    /// Stable string key, used to match grocery lines across regenerations
    pub fn key(&self) -> String {
        match self {
            UnitFamily::Volume => "volume".to_string(),
            UnitFamily::Weight => "weight".to_string(),
            UnitFamily::Count(symbol) => format!("count:{}", symbol),
        }
    }
}

impl fmt::Display for UnitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One known unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefinition {
    /// Canonical spelling (e.g., "tbsp", "fl oz", "L")
    pub symbol: String,
    pub family: UnitFamily,
    /// Multiply by this to get the family's canonical unit
    pub to_base: Decimal,
}

/// Outcome of looking up a conversion between two symbols
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// Same family; multiply a value in the first unit by this factor
    Factor(Decimal),
    /// Both known, different families
    Incompatible { from: UnitFamily, to: UnitFamily },
    /// The given symbol is not in the table
    Unrecognized(String),
    /// Same family, but the factor cannot be represented (zero or extreme `to_base`)
    OutOfRange,
}

/// Read-only table of units and aliases
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    units: HashMap<String, UnitDefinition>,
    aliases: HashMap<String, String>,
}

/// Lower-case, drop periods, collapse whitespace: "Fl. Oz" -> "fl oz"
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .replace('.', " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

impl UnitTable {
    /// A table with no units at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard kitchen table: US customary volume and weight plus common count units
    pub fn standard() -> Self {
        Self::empty()
            // Volume, canonical ml
            .with_unit("ml", UnitFamily::Volume, Decimal::ONE, &["milliliter", "milliliters", "millilitre", "millilitres", "cc"])
            .with_unit("tsp", UnitFamily::Volume, Decimal::new(492892159375, 11), &["teaspoon", "teaspoons", "tsps"])
            .with_unit("tbsp", UnitFamily::Volume, Decimal::new(1478676478125, 11), &["tablespoon", "tablespoons", "tbsps", "tbs", "tbl"])
            .with_unit("fl oz", UnitFamily::Volume, Decimal::new(295735295625, 10), &["floz", "fluid ounce", "fluid ounces", "fl ozs"])
            .with_unit("cup", UnitFamily::Volume, Decimal::new(2365882365, 7), &["cups"])
            .with_unit("pint", UnitFamily::Volume, Decimal::new(473176473, 6), &["pints", "pt"])
            .with_unit("quart", UnitFamily::Volume, Decimal::new(946352946, 6), &["quarts", "qt"])
            .with_unit("gallon", UnitFamily::Volume, Decimal::new(3785411784, 6), &["gallons", "gal"])
            .with_unit("L", UnitFamily::Volume, Decimal::from(1000), &["liter", "liters", "litre", "litres"])
            // Weight, canonical g
            .with_unit("g", UnitFamily::Weight, Decimal::ONE, &["gram", "grams", "gramme", "grammes", "gr"])
            .with_unit("oz", UnitFamily::Weight, Decimal::new(28349523125, 9), &["ounce", "ounces", "ozs"])
            .with_unit("lb", UnitFamily::Weight, Decimal::new(45359237, 5), &["lbs", "pound", "pounds"])
            .with_unit("kg", UnitFamily::Weight, Decimal::from(1000), &["kilogram", "kilograms", "kilogramme", "kilogrammes", "kgs"])
            // Count units, each its own family
            .with_count_unit(ITEM, &["", "items", "piece", "pieces", "pc", "pcs", "whole", "each", "ea"])
            .with_count_unit("clove", &["cloves"])
            .with_count_unit("can", &["cans", "tin", "tins"])
            .with_count_unit("slice", &["slices"])
            .with_count_unit("bunch", &["bunches"])
            .with_count_unit("package", &["packages", "pkg", "packet", "packets"])
            .with_count_unit("bottle", &["bottles"])
            .with_count_unit("stick", &["sticks"])
            .with_count_unit("pinch", &["pinches"])
            .with_count_unit("dash", &["dashes"])
            .with_count_unit("sprig", &["sprigs"])
            .with_count_unit("head", &["heads"])
    }

    /// Add a unit and its alternative spellings
    pub fn with_unit(mut self, symbol: &str, family: UnitFamily, to_base: Decimal, aliases: &[&str]) -> Self {
        let key = normalize_symbol(symbol);
        for alias in aliases {
            self.aliases.insert(normalize_symbol(alias), key.clone());
        }
        self.aliases.insert(key.clone(), key.clone());
        self.units.insert(
            key,
            UnitDefinition {
                symbol: symbol.to_string(),
                family,
                to_base,
            },
        );
        self
    }

    /// Add a single-member count family
    pub fn with_count_unit(self, symbol: &str, aliases: &[&str]) -> Self {
        let family = UnitFamily::Count(symbol.to_string());
        self.with_unit(symbol, family, Decimal::ONE, aliases)
    }

    /// Look up a unit by any of its spellings
    pub fn resolve(&self, symbol: &str) -> Option<&UnitDefinition> {
        let key = normalize_symbol(symbol);
        let found = self.aliases.get(&key).and_then(|canonical| self.units.get(canonical));
        trace!("Resolving unit '{}' -> {:?}", symbol, found.map(|u| &u.symbol));
        found
    }

    pub fn family_of(&self, symbol: &str) -> Option<&UnitFamily> {
        self.resolve(symbol).map(|u| &u.family)
    }

    /// Whether both symbols are known and belong to the same family
    pub fn same_family(&self, a: &str, b: &str) -> bool {
        matches!(self.conversion(a, b), Conversion::Factor(_))
    }

    /// Factor converting a value in `from` into `to`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ingredient_reconciler::unit_table::{Conversion, UnitTable};
    /// use rust_decimal::Decimal;
    ///
    /// let table = UnitTable::standard();
    /// assert_eq!(table.conversion("tbsp", "tsp"), Conversion::Factor(Decimal::from(3)));
    /// assert!(matches!(table.conversion("cup", "g"), Conversion::Incompatible { .. }));
    /// assert!(matches!(table.conversion("smidgen", "g"), Conversion::Unrecognized(_)));
    /// ```
    pub fn conversion(&self, from: &str, to: &str) -> Conversion {
        let Some(from_def) = self.resolve(from) else {
            return Conversion::Unrecognized(from.to_string());
        };
        let Some(to_def) = self.resolve(to) else {
            return Conversion::Unrecognized(to.to_string());
        };
        if from_def.family != to_def.family {
            return Conversion::Incompatible {
                from: from_def.family.clone(),
                to: to_def.family.clone(),
            };
        }
        match from_def.to_base.checked_div(to_def.to_base) {
            Some(factor) => Conversion::Factor(factor),
            None => Conversion::OutOfRange,
        }
    }

    /// Number of distinct units (aliases excluded)
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
