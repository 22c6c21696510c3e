//! # Quantity Normalizer Module
//!
//! Converts (value, unit) pairs within a unit family. Quantities are never
//! converted across families: "1 cup diced" and "200 g whole" stay apart and
//! the caller surfaces them for manual reconciliation.
//!
//! Values stay exact `Decimal`s through every conversion; rounding happens
//! only in [`QuantityNormalizer::for_display`].

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::engine_config::UnknownUnitPolicy;
use crate::ingredient_model::Quantity;
use crate::unit_table::{normalize_symbol, UnitDefinition, UnitFamily, UnitTable};

/// Result of converting a quantity to a target unit
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Converted(Quantity),
    /// Units belong to different families
    Incompatible { from: String, to: String },
    /// One of the units is unknown and the policy rejects unknown units
    Unrecognized(String),
    /// The converted value does not fit in a `Decimal`
    Overflow,
}

/// A conversion produced a value outside the `Decimal` range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOverflow;

/// A value expressed in its family's canonical unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalQuantity {
    pub family: UnitFamily,
    pub value: Decimal,
}

/// Table-backed converter honouring the unknown-unit policy
#[derive(Debug, Clone, Copy)]
pub struct QuantityNormalizer<'a> {
    table: &'a UnitTable,
    policy: UnknownUnitPolicy,
}

impl<'a> QuantityNormalizer<'a> {
    pub fn new(table: &'a UnitTable, policy: UnknownUnitPolicy) -> Self {
        Self { table, policy }
    }

    pub fn policy(&self) -> UnknownUnitPolicy {
        self.policy
    }

    /// Definition for `unit`, synthesizing a count family for unknown symbols
    /// when the policy allows it
    pub fn definition(&self, unit: &str) -> Option<UnitDefinition> {
        if let Some(found) = self.table.resolve(unit) {
            return Some(found.clone());
        }
        match self.policy {
            UnknownUnitPolicy::TreatAsCount => {
                let symbol = normalize_symbol(unit);
                debug!("Treating unknown unit '{}' as count unit '{}'", unit, symbol);
                Some(UnitDefinition {
                    symbol: symbol.clone(),
                    family: UnitFamily::Count(symbol),
                    to_base: Decimal::ONE,
                })
            }
            UnknownUnitPolicy::Reject => None,
        }
    }

    /// Convert `quantity` into `target_unit`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ingredient_reconciler::engine_config::UnknownUnitPolicy;
    /// use ingredient_reconciler::ingredient_model::Quantity;
    /// use ingredient_reconciler::quantity_normalizer::{Normalized, QuantityNormalizer};
    /// use ingredient_reconciler::unit_table::UnitTable;
    /// use rust_decimal::Decimal;
    ///
    /// let table = UnitTable::standard();
    /// let normalizer = QuantityNormalizer::new(&table, UnknownUnitPolicy::TreatAsCount);
    ///
    /// let two_tbsp = Quantity::new(Decimal::from(2), "tbsp");
    /// assert_eq!(
    ///     normalizer.normalize(&two_tbsp, "tsp"),
    ///     Normalized::Converted(Quantity::new(Decimal::from(6), "tsp"))
    /// );
    /// assert!(matches!(normalizer.normalize(&two_tbsp, "g"), Normalized::Incompatible { .. }));
    /// ```
    pub fn normalize(&self, quantity: &Quantity, target_unit: &str) -> Normalized {
        let Some(from) = self.definition(&quantity.unit) else {
            return Normalized::Unrecognized(quantity.unit.clone());
        };
        let Some(to) = self.definition(target_unit) else {
            return Normalized::Unrecognized(target_unit.to_string());
        };
        if from.family != to.family {
            return Normalized::Incompatible {
                from: from.symbol,
                to: to.symbol,
            };
        }
        match quantity
            .value
            .checked_mul(from.to_base)
            .and_then(|v| v.checked_div(to.to_base))
        {
            Some(value) => Normalized::Converted(Quantity::new(value, &to.symbol)),
            None => Normalized::Overflow,
        }
    }

    /// Express `quantity` in its family's canonical unit
    ///
    /// `Ok(None)` when the unit is unknown under the `reject` policy.
    pub fn to_canonical(&self, quantity: &Quantity) -> Result<Option<CanonicalQuantity>, ConversionOverflow> {
        let Some(def) = self.definition(&quantity.unit) else {
            return Ok(None);
        };
        let value = quantity.value.checked_mul(def.to_base).ok_or(ConversionOverflow)?;
        Ok(Some(CanonicalQuantity {
            value,
            family: def.family,
        }))
    }

    /// Canonical value of `quantity` if it belongs to `family`
    pub fn canonical_in(&self, quantity: &Quantity, family: &UnitFamily) -> Result<Option<Decimal>, ConversionOverflow> {
        Ok(self
            .to_canonical(quantity)?
            .filter(|c| &c.family == family)
            .map(|c| c.value))
    }

    /// Convert a canonical value back into `unit` (same family required)
    pub fn from_canonical(&self, value: Decimal, family: &UnitFamily, unit: &str) -> Option<Quantity> {
        let def = self.definition(unit)?;
        if &def.family != family {
            return None;
        }
        let converted = value.checked_div(def.to_base)?;
        Some(Quantity::new(converted, &def.symbol))
    }

    /// Round a quantity for presentation only
    pub fn for_display(quantity: &Quantity, decimal_places: u32) -> Quantity {
        Quantity::new(round_for_display(quantity.value, decimal_places), &quantity.unit)
    }
}

/// Half-away-from-zero rounding with trailing zeros stripped
pub fn round_for_display(value: Decimal, decimal_places: u32) -> Decimal {
    value
        .round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}
