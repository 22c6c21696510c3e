//! # Ingredient Requirement Aggregator Module
//!
//! Turns a set of (recipe, target servings) pairs into one aggregated
//! requirement per ingredient.
//!
//! ## Algorithm
//!
//! - Each recipe is scaled linearly by `target_servings / base_servings`
//! - Quantities of one ingredient are summed per unit family, in the family's
//!   canonical unit (`ml`, `g`, or the count unit itself)
//! - Incompatible families for the same ingredient stay in separate buckets and
//!   the requirement is flagged for manual reconciliation
//! - Optional quantities accumulate separately from required ones
//! - Output order is the order in which ingredients were first encountered

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine_errors::{EngineError, EngineResult};
use crate::ingredient_model::{IngredientId, Quantity, Recipe, RecipeId};
use crate::quantity_normalizer::QuantityNormalizer;
use crate::unit_table::UnitFamily;

/// One recipe to aggregate, at the servings the plan asks for
#[derive(Debug, Clone, Copy)]
pub struct PlannedRecipe<'a> {
    pub recipe: &'a Recipe,
    pub target_servings: Decimal,
}

impl<'a> PlannedRecipe<'a> {
    pub fn new(recipe: &'a Recipe, target_servings: Decimal) -> Self {
        Self {
            recipe,
            target_servings,
        }
    }

    /// The recipe at its own base servings
    pub fn at_base(recipe: &'a Recipe) -> Self {
        Self::new(recipe, recipe.base_servings)
    }
}

/// Totals for one ingredient within one unit family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitBucket {
    pub family: UnitFamily,
    /// First unit a recipe used for this bucket; quantities are shown in it
    pub display_unit: String,
    /// Required total, in the family's canonical unit
    pub required: Decimal,
    /// Optional total, in the family's canonical unit
    pub optional: Decimal,
}

impl UnitBucket {
    fn new(family: UnitFamily, display_unit: &str) -> Self {
        Self {
            family,
            display_unit: display_unit.to_string(),
            required: Decimal::ZERO,
            optional: Decimal::ZERO,
        }
    }

    /// Express a canonical value of this bucket in its display unit
    pub fn in_display_unit(&self, canonical: Decimal, normalizer: &QuantityNormalizer) -> Quantity {
        normalizer
            .from_canonical(canonical, &self.family, &self.display_unit)
            .unwrap_or_else(|| Quantity::new(canonical, self.family.canonical_unit()))
    }

    pub fn required_quantity(&self, normalizer: &QuantityNormalizer) -> Quantity {
        self.in_display_unit(self.required, normalizer)
    }

    pub fn optional_quantity(&self, normalizer: &QuantityNormalizer) -> Quantity {
        self.in_display_unit(self.optional, normalizer)
    }

    /// Add a canonical amount to the required or optional total
    fn add(&mut self, canonical: Decimal, optional: bool) -> Option<()> {
        let total = if optional {
            &mut self.optional
        } else {
            &mut self.required
        };
        *total = total.checked_add(canonical)?;
        Some(())
    }
}

/// Everything the plan needs of one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRequirement {
    pub ingredient: IngredientId,
    /// One bucket per incompatible unit family, in first-seen order
    pub buckets: Vec<UnitBucket>,
    pub contributing_recipes: Vec<RecipeId>,
}

impl AggregatedRequirement {
    fn new(ingredient: &IngredientId) -> Self {
        Self {
            ingredient: ingredient.clone(),
            buckets: Vec::new(),
            contributing_recipes: Vec::new(),
        }
    }

    /// The same ingredient is needed in units that cannot be summed
    pub fn needs_manual_reconciliation(&self) -> bool {
        self.buckets.len() > 1
    }

    pub fn bucket(&self, family: &UnitFamily) -> Option<&UnitBucket> {
        self.buckets.iter().find(|b| &b.family == family)
    }

    pub fn has_required(&self) -> bool {
        self.buckets.iter().any(|b| b.required > Decimal::ZERO)
    }

    pub fn has_optional(&self) -> bool {
        self.buckets.iter().any(|b| b.optional > Decimal::ZERO)
    }

    fn bucket_mut(&mut self, family: &UnitFamily, display_unit: &str) -> &mut UnitBucket {
        let index = match self.buckets.iter().position(|b| &b.family == family) {
            Some(index) => index,
            None => {
                self.buckets.push(UnitBucket::new(family.clone(), display_unit));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index]
    }

    fn add_recipe(&mut self, recipe: &RecipeId) {
        if !self.contributing_recipes.contains(recipe) {
            self.contributing_recipes.push(recipe.clone());
        }
    }

    fn absorb(&mut self, other: AggregatedRequirement) -> EngineResult<()> {
        for bucket in other.buckets {
            let target = self.bucket_mut(&bucket.family, &bucket.display_unit);
            target
                .add(bucket.required, false)
                .and_then(|_| target.add(bucket.optional, true))
                .ok_or_else(|| EngineError::QuantityOverflow {
                    recipe: None,
                    ingredient: other.ingredient.clone(),
                })?;
        }
        for recipe in &other.contributing_recipes {
            self.add_recipe(recipe);
        }
        Ok(())
    }
}

/// Aggregated requirements of a whole meal plan, at most one per ingredient
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MealPlanAggregate {
    requirements: Vec<AggregatedRequirement>,
}

impl MealPlanAggregate {
    pub fn requirements(&self) -> &[AggregatedRequirement] {
        &self.requirements
    }

    pub fn get(&self, ingredient: &IngredientId) -> Option<&AggregatedRequirement> {
        self.requirements.iter().find(|r| &r.ingredient == ingredient)
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregatedRequirement> {
        self.requirements.iter()
    }

    /// Requirements whose units could not be combined
    pub fn manual_reconciliation_cases(&self) -> impl Iterator<Item = &AggregatedRequirement> {
        self.requirements.iter().filter(|r| r.needs_manual_reconciliation())
    }

    /// Combine two partial aggregates
    ///
    /// Merging the aggregates of two disjoint sets of assignments gives the same
    /// result as aggregating their union in the same order. In any other order
    /// the per-family totals are equal, while ingredient order and display
    /// units follow whichever side saw them first.
    pub fn merge(mut self, other: MealPlanAggregate) -> EngineResult<MealPlanAggregate> {
        for requirement in other.requirements {
            match self
                .requirements
                .iter_mut()
                .find(|r| r.ingredient == requirement.ingredient)
            {
                Some(existing) => existing.absorb(requirement)?,
                None => self.requirements.push(requirement),
            }
        }
        Ok(self)
    }
}

/// Aggregate the requirements of every planned recipe
///
/// Fails on the first non-positive servings value, negative quantity,
/// duplicate ingredient within a recipe, quantity too large for `Decimal`, or
/// (under the `reject` policy) unknown unit. No partial aggregate is ever
/// returned.
pub fn aggregate(planned: &[PlannedRecipe], normalizer: &QuantityNormalizer) -> EngineResult<MealPlanAggregate> {
    if planned.is_empty() {
        warn!("Aggregating an empty meal plan; returning an empty aggregate");
        return Ok(MealPlanAggregate::default());
    }

    let mut requirements: Vec<AggregatedRequirement> = Vec::new();
    let mut index: HashMap<IngredientId, usize> = HashMap::new();

    for entry in planned {
        let recipe = entry.recipe;
        check_servings(recipe, entry.target_servings)?;
        debug!(
            "Aggregating recipe {} ({} requirements) at {} of {} servings",
            recipe.id,
            recipe.requirements.len(),
            entry.target_servings,
            recipe.base_servings
        );
        if recipe.requirements.is_empty() {
            warn!("Recipe {} has no requirements", recipe.id);
        }

        let mut seen: HashSet<&IngredientId> = HashSet::new();
        for requirement in &recipe.requirements {
            if !seen.insert(&requirement.ingredient) {
                return Err(EngineError::DuplicateRequirement {
                    recipe: recipe.id.clone(),
                    ingredient: requirement.ingredient.clone(),
                });
            }
            if requirement.quantity.is_negative() {
                return Err(EngineError::NegativeQuantity {
                    recipe: Some(recipe.id.clone()),
                    ingredient: requirement.ingredient.clone(),
                    value: requirement.quantity.value,
                });
            }
            let Some(unit) = normalizer.definition(&requirement.quantity.unit) else {
                return Err(EngineError::UnrecognizedUnit {
                    unit: requirement.quantity.unit.clone(),
                    recipe: recipe.id.clone(),
                    ingredient: requirement.ingredient.clone(),
                });
            };
            let overflow = || EngineError::QuantityOverflow {
                recipe: Some(recipe.id.clone()),
                ingredient: requirement.ingredient.clone(),
            };

            let canonical = scaled_canonical(
                requirement.quantity.value,
                entry.target_servings,
                recipe.base_servings,
                unit.to_base,
            )
            .ok_or_else(overflow)?;
            let slot = *index.entry(requirement.ingredient.clone()).or_insert_with(|| {
                requirements.push(AggregatedRequirement::new(&requirement.ingredient));
                requirements.len() - 1
            });
            let aggregated = &mut requirements[slot];
            aggregated.add_recipe(&recipe.id);
            aggregated
                .bucket_mut(&unit.family, &unit.symbol)
                .add(canonical, requirement.optional)
                .ok_or_else(overflow)?;
        }
    }

    for case in requirements.iter().filter(|r| r.needs_manual_reconciliation()) {
        debug!(
            "Ingredient {} needed in {} incompatible unit families; flagged for manual reconciliation",
            case.ingredient,
            case.buckets.len()
        );
    }
    info!(
        "Aggregated {} recipes into {} ingredient requirements",
        planned.len(),
        requirements.len()
    );

    Ok(MealPlanAggregate { requirements })
}

fn check_servings(recipe: &Recipe, target_servings: Decimal) -> EngineResult<()> {
    if recipe.base_servings <= Decimal::ZERO {
        return Err(EngineError::InvalidServings {
            recipe: recipe.id.clone(),
            servings: recipe.base_servings,
        });
    }
    if target_servings <= Decimal::ZERO {
        return Err(EngineError::InvalidServings {
            recipe: recipe.id.clone(),
            servings: target_servings,
        });
    }
    Ok(())
}

/// `value * target / base`, expressed in the canonical unit
fn scaled_canonical(value: Decimal, target: Decimal, base: Decimal, to_base: Decimal) -> Option<Decimal> {
    value
        .checked_mul(target)?
        .checked_div(base)?
        .checked_mul(to_base)
}
