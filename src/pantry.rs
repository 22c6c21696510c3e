//! # Pantry Snapshot Module
//!
//! A consistent, read-only snapshot of one user's pantry. The matching logic
//! assumes at most one item per ingredient; [`PantrySnapshot::consolidate`]
//! pre-sums duplicate rows for callers whose storage allows them.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::engine_errors::{EngineError, EngineResult};
use crate::ingredient_model::{IngredientId, PantryItem};
use crate::quantity_normalizer::{Normalized, QuantityNormalizer};
use crate::unit_table::UnitFamily;

#[derive(Debug, Clone, Default)]
pub struct PantrySnapshot {
    items: HashMap<IngredientId, PantryItem>,
}

impl PantrySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting negative quantities and duplicate ingredients
    pub fn new(items: Vec<PantryItem>) -> EngineResult<Self> {
        let mut by_ingredient = HashMap::with_capacity(items.len());
        for item in items {
            check_non_negative(&item)?;
            if by_ingredient.contains_key(&item.ingredient) {
                return Err(EngineError::DuplicatePantryItem {
                    ingredient: item.ingredient,
                });
            }
            by_ingredient.insert(item.ingredient.clone(), item);
        }
        Ok(Self {
            items: by_ingredient,
        })
    }

    /// Build a snapshot, summing duplicate rows whose units are compatible
    ///
    /// The merged row keeps the first row's unit and the earliest expiration
    /// date. Rows in incompatible units cannot be summed and are an error.
    pub fn consolidate(items: Vec<PantryItem>, normalizer: &QuantityNormalizer) -> EngineResult<Self> {
        let mut by_ingredient: HashMap<IngredientId, PantryItem> = HashMap::with_capacity(items.len());
        for item in items {
            check_non_negative(&item)?;
            let Some(existing) = by_ingredient.get_mut(&item.ingredient) else {
                by_ingredient.insert(item.ingredient.clone(), item);
                continue;
            };
            let overflow = || EngineError::QuantityOverflow {
                recipe: None,
                ingredient: item.ingredient.clone(),
            };
            match normalizer.normalize(&item.quantity, &existing.quantity.unit) {
                Normalized::Converted(converted) => {
                    debug!(
                        "Consolidating pantry rows for {}: {} + {}",
                        item.ingredient, existing.quantity, item.quantity
                    );
                    existing.quantity.value = existing
                        .quantity
                        .value
                        .checked_add(converted.value)
                        .ok_or_else(overflow)?;
                    existing.expires_on = earliest(existing.expires_on, item.expires_on);
                }
                Normalized::Overflow => return Err(overflow()),
                _ => {
                    return Err(EngineError::DuplicatePantryItem {
                        ingredient: item.ingredient,
                    })
                }
            }
        }
        Ok(Self {
            items: by_ingredient,
        })
    }

    pub fn get(&self, ingredient: &IngredientId) -> Option<&PantryItem> {
        self.items.get(ingredient)
    }

    /// Amount on hand for `ingredient` in the canonical unit of `family`
    ///
    /// Absent items and items stored in another family count as zero. A
    /// stock too large to express in the canonical unit is an error.
    pub fn available(
        &self,
        ingredient: &IngredientId,
        family: &UnitFamily,
        normalizer: &QuantityNormalizer,
    ) -> EngineResult<Decimal> {
        let Some(item) = self.items.get(ingredient) else {
            return Ok(Decimal::ZERO);
        };
        let canonical = normalizer
            .canonical_in(&item.quantity, family)
            .map_err(|_| EngineError::QuantityOverflow {
                recipe: None,
                ingredient: ingredient.clone(),
            })?;
        match canonical {
            Some(value) => Ok(value),
            None => {
                warn!(
                    "Pantry unit '{}' for {} does not match required family {}",
                    item.quantity.unit, ingredient, family
                );
                Ok(Decimal::ZERO)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PantryItem> {
        self.items.values()
    }
}

fn check_non_negative(item: &PantryItem) -> EngineResult<()> {
    if item.quantity.is_negative() {
        return Err(EngineError::NegativeQuantity {
            recipe: None,
            ingredient: item.ingredient.clone(),
            value: item.quantity.value,
        });
    }
    Ok(())
}

fn earliest(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
