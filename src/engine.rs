//! # Reconciliation Engine Module
//!
//! The three pure operations the application layer calls:
//!
//! - [`ReconciliationEngine::compute_coverage`] for recipe browsing
//! - [`ReconciliationEngine::aggregate_meal_plan`] before grocery generation and export
//! - [`ReconciliationEngine::reconcile_grocery_list`] for "generate / regenerate list"
//!
//! The engine owns its reference data (unit table, catalog, category map) and
//! never mutates it, so one instance can serve concurrent requests for
//! different users without locking. Callers supply one consistent pantry and
//! plan snapshot per call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::aggregator::{aggregate, MealPlanAggregate, PlannedRecipe};
use crate::catalog::IngredientCatalog;
use crate::categorizer::Categorizer;
use crate::coverage::{rank_results, CoverageResult, CoverageScorer};
use crate::engine_config::EngineConfig;
use crate::engine_errors::{EngineError, EngineResult};
use crate::grocery_list::{GroceryList, GroceryReconciler, ReconcileMode};
use crate::ingredient_model::{MealPlanAssignment, PantryItem, Recipe, RecipeId};
use crate::pantry::PantrySnapshot;
use crate::quantity_normalizer::QuantityNormalizer;
use crate::unit_table::UnitTable;

/// Read-only engine over injected reference data
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    units: UnitTable,
    catalog: IngredientCatalog,
    categorizer: Categorizer,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(units: UnitTable, catalog: IngredientCatalog, config: EngineConfig) -> Self {
        let categorizer = Categorizer::new(&catalog, &config.grocery.category_order);
        info!(
            "Engine ready: {} units, {} catalog ingredients, unknown units {:?}",
            units.len(),
            catalog.len(),
            config.units.unknown_unit_policy
        );
        Self {
            units,
            catalog,
            categorizer,
            config,
        }
    }

    /// Engine over the standard kitchen unit table
    pub fn with_standard_units(catalog: IngredientCatalog, config: EngineConfig) -> Self {
        Self::new(UnitTable::standard(), catalog, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &IngredientCatalog {
        &self.catalog
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    pub fn normalizer(&self) -> QuantityNormalizer<'_> {
        QuantityNormalizer::new(&self.units, self.config.units.unknown_unit_policy)
    }

    fn scorer(&self) -> CoverageScorer<'_> {
        CoverageScorer::new(self.normalizer(), &self.config.scoring)
    }

    /// Build a pantry snapshot, summing duplicate rows with compatible units
    pub fn consolidate_pantry(&self, items: Vec<PantryItem>) -> EngineResult<PantrySnapshot> {
        PantrySnapshot::consolidate(items, &self.normalizer())
    }

    /// Coverage of `recipe` at its base servings by `pantry`
    pub fn compute_coverage(
        &self,
        recipe: &Recipe,
        pantry: &PantrySnapshot,
        now: DateTime<Utc>,
    ) -> EngineResult<CoverageResult> {
        self.catalog.resolve_recipe(recipe)?;
        let requirements = aggregate(&[PlannedRecipe::at_base(recipe)], &self.normalizer())?;
        self.scorer().score(&recipe.id, &requirements, pantry, now)
    }

    /// Score every recipe and order them best first ("What Can I Cook?")
    ///
    /// Any recipe failing validation aborts the whole ranking.
    pub fn rank_recipes(
        &self,
        recipes: &[Recipe],
        pantry: &PantrySnapshot,
        now: DateTime<Utc>,
        min_coverage: u8,
    ) -> EngineResult<Vec<CoverageResult>> {
        let results = recipes
            .iter()
            .map(|recipe| self.compute_coverage(recipe, pantry, now))
            .collect::<EngineResult<Vec<_>>>()?;
        let ranked = rank_results(results, min_coverage);
        info!(
            "Ranked {} of {} recipes at or above {}% coverage",
            ranked.len(),
            recipes.len(),
            min_coverage
        );
        Ok(ranked)
    }

    /// Aggregate the requirements of every assignment in a meal plan
    pub fn aggregate_meal_plan(
        &self,
        assignments: &[MealPlanAssignment],
        recipes: &[Recipe],
    ) -> EngineResult<MealPlanAggregate> {
        if assignments.is_empty() {
            warn!("Meal plan has no assignments");
            return Ok(MealPlanAggregate::default());
        }

        let by_id: HashMap<&RecipeId, &Recipe> = recipes.iter().map(|r| (&r.id, r)).collect();
        let mut planned = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let recipe = by_id
                .get(&assignment.recipe)
                .copied()
                .ok_or_else(|| EngineError::UnknownRecipe {
                    recipe: assignment.recipe.clone(),
                })?;
            self.catalog.resolve_recipe(recipe)?;
            planned.push(PlannedRecipe::new(recipe, assignment.servings));
        }

        aggregate(&planned, &self.normalizer())
    }

    /// Regenerate a grocery list, preserving checked and manual state
    pub fn reconcile_grocery_list(
        &self,
        previous: &GroceryList,
        aggregate: &MealPlanAggregate,
        pantry: &PantrySnapshot,
    ) -> EngineResult<GroceryList> {
        self.reconcile_grocery_list_with_mode(previous, aggregate, pantry, ReconcileMode::Preserve)
    }

    /// Regenerate a grocery list under an explicit mode
    pub fn reconcile_grocery_list_with_mode(
        &self,
        previous: &GroceryList,
        aggregate: &MealPlanAggregate,
        pantry: &PantrySnapshot,
        mode: ReconcileMode,
    ) -> EngineResult<GroceryList> {
        GroceryReconciler::new(
            self.normalizer(),
            &self.catalog,
            &self.categorizer,
            self.config.display.decimal_places,
        )
        .reconcile(previous, aggregate, pantry, mode)
    }
}
