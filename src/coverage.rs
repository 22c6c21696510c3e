//! # Coverage Scorer Module
//!
//! Scores how well a pantry covers one recipe ("What Can I Cook?").
//!
//! The displayed coverage percentage reflects only quantities on hand. The
//! separate ranking score adds a boost when the recipe would use pantry items
//! close to expiry and subtracts a penalty when too many required ingredients
//! are missing, so ordering can favour near-expiry food without misreporting
//! coverage.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::{MealPlanAggregate, UnitBucket};
use crate::engine_config::ScoringConfig;
use crate::engine_errors::{EngineError, EngineResult};
use crate::ingredient_model::{IngredientId, Quantity, RecipeId};
use crate::pantry::PantrySnapshot;
use crate::quantity_normalizer::QuantityNormalizer;

/// An ingredient the pantry does not fully cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingIngredient {
    pub ingredient: IngredientId,
    /// What the recipe needs, in the recipe's unit
    pub needed: Quantity,
    /// How much of that the pantry holds
    pub available: Quantity,
    /// `needed - available`
    pub shortfall: Quantity,
}

/// Coverage of one recipe by one pantry snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub recipe: RecipeId,
    /// Share of required quantities on hand, 0..=100
    pub coverage_percent: u8,
    pub missing_required: Vec<MissingIngredient>,
    pub missing_optional: Vec<MissingIngredient>,
    /// A pantry item the recipe uses expires within the configured window
    pub expiration_boosted: bool,
    pub expiring_ingredients: Vec<IngredientId>,
    /// Missing more required ingredients than the configured limit
    pub penalized: bool,
    /// Score used only for ordering recipes
    pub ranking_score: Decimal,
}

impl CoverageResult {
    pub fn can_cook(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Scores recipes against a pantry snapshot
#[derive(Debug, Clone, Copy)]
pub struct CoverageScorer<'a> {
    normalizer: QuantityNormalizer<'a>,
    config: &'a ScoringConfig,
}

impl<'a> CoverageScorer<'a> {
    pub fn new(normalizer: QuantityNormalizer<'a>, config: &'a ScoringConfig) -> Self {
        Self { normalizer, config }
    }

    /// Score one recipe given its aggregated requirements
    ///
    /// `requirements` must already be identity-resolved; the scorer does not
    /// consult the catalog.
    ///
    /// Coverage is `sum(have) / sum(required)` over every bucket, each value in
    /// its own family's canonical unit. Millilitres, grams and counts are
    /// added as plain numbers, so a large weight or volume outweighs a few
    /// missing counted items: 500 g of flour on hand with 3 eggs missing is
    /// 99%. `missing_required` is the per-ingredient view.
    pub fn score(
        &self,
        recipe: &RecipeId,
        requirements: &MealPlanAggregate,
        pantry: &PantrySnapshot,
        now: DateTime<Utc>,
    ) -> EngineResult<CoverageResult> {
        let mut total_required = Decimal::ZERO;
        let mut total_have = Decimal::ZERO;
        let mut missing_required = Vec::new();
        let mut missing_optional = Vec::new();
        let mut consumed: Vec<&IngredientId> = Vec::new();

        for requirement in requirements.iter() {
            let ingredient = &requirement.ingredient;
            for bucket in &requirement.buckets {
                let available = pantry.available(ingredient, &bucket.family, &self.normalizer)?;

                let have = available.min(bucket.required);
                let overflow = || EngineError::QuantityOverflow {
                    recipe: Some(recipe.clone()),
                    ingredient: ingredient.clone(),
                };
                total_required = total_required.checked_add(bucket.required).ok_or_else(overflow)?;
                total_have = total_have.checked_add(have).ok_or_else(overflow)?;
                if available < bucket.required {
                    missing_required.push(self.missing(ingredient, bucket, bucket.required, available));
                }

                // Optional needs are served from whatever the required part leaves over
                let left_over = (available - have).max(Decimal::ZERO);
                if bucket.optional > Decimal::ZERO && left_over < bucket.optional {
                    missing_optional.push(self.missing(ingredient, bucket, bucket.optional, left_over));
                }

                let used = have + left_over.min(bucket.optional);
                if used > Decimal::ZERO && !consumed.contains(&ingredient) {
                    consumed.push(ingredient);
                }
            }
        }

        let coverage_percent = coverage_percent(total_have, total_required);
        let expiring_ingredients = self.expiring(&consumed, pantry, now);
        let expiration_boosted = !expiring_ingredients.is_empty();
        let penalized = missing_required.len() > self.config.max_missing_required;

        let mut ranking_score = Decimal::from(coverage_percent);
        if expiration_boosted {
            ranking_score = ranking_score.saturating_add(self.config.expiration_boost);
        }
        if penalized {
            ranking_score = ranking_score.saturating_sub(self.config.missing_penalty);
        }

        debug!(
            "Recipe {} coverage {}% ({} missing required, {} missing optional, boosted={}, penalized={}, score={})",
            recipe,
            coverage_percent,
            missing_required.len(),
            missing_optional.len(),
            expiration_boosted,
            penalized,
            ranking_score
        );

        Ok(CoverageResult {
            recipe: recipe.clone(),
            coverage_percent,
            missing_required,
            missing_optional,
            expiration_boosted,
            expiring_ingredients,
            penalized,
            ranking_score,
        })
    }

    fn missing(
        &self,
        ingredient: &IngredientId,
        bucket: &UnitBucket,
        needed: Decimal,
        available: Decimal,
    ) -> MissingIngredient {
        MissingIngredient {
            ingredient: ingredient.clone(),
            needed: bucket.in_display_unit(needed, &self.normalizer),
            available: bucket.in_display_unit(available, &self.normalizer),
            shortfall: bucket.in_display_unit(needed - available, &self.normalizer),
        }
    }

    fn expiring(
        &self,
        consumed: &[&IngredientId],
        pantry: &PantrySnapshot,
        now: DateTime<Utc>,
    ) -> Vec<IngredientId> {
        let today = now.date_naive();
        consumed
            .iter()
            .filter(|ingredient| {
                pantry
                    .get(ingredient)
                    .and_then(|item| item.expires_on)
                    .map(|expires_on| {
                        let days_left = (expires_on - today).num_days();
                        (0..=self.config.expiration_window_days).contains(&days_left)
                    })
                    .unwrap_or(false)
            })
            .map(|ingredient| (*ingredient).clone())
            .collect()
    }
}

/// `round(100 * have / required)`, clamped to 0..=100; a recipe with nothing
/// required is fully covered
///
/// Both totals are plain sums of canonical values and may mix families (ml,
/// g and counts); see [`CoverageScorer::score`].
pub fn coverage_percent(have: Decimal, required: Decimal) -> u8 {
    if required <= Decimal::ZERO {
        return 100;
    }
    let percent = match have
        .checked_div(required)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
    {
        Some(percent) => percent
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
        None if have > Decimal::ZERO => Decimal::ONE_HUNDRED,
        None => Decimal::ZERO,
    };
    percent.to_u8().unwrap_or(0)
}

/// Ranking order: ranking score, then raw coverage, then fewer missing
/// required ingredients, then recipe id
pub fn compare_for_ranking(a: &CoverageResult, b: &CoverageResult) -> Ordering {
    b.ranking_score
        .cmp(&a.ranking_score)
        .then_with(|| b.coverage_percent.cmp(&a.coverage_percent))
        .then_with(|| a.missing_required.len().cmp(&b.missing_required.len()))
        .then_with(|| a.recipe.cmp(&b.recipe))
}

/// Sort results best first, keeping those at or above `min_coverage`
pub fn rank_results(mut results: Vec<CoverageResult>, min_coverage: u8) -> Vec<CoverageResult> {
    results.retain(|r| r.coverage_percent >= min_coverage);
    results.sort_by(compare_for_ranking);
    results
}
