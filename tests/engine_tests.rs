//! # Engine Integration Tests
//!
//! End-to-end tests of coverage scoring, recipe ranking and meal-plan
//! aggregation through the public `ReconciliationEngine` API.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ingredient_reconciler::aggregator::MealPlanAggregate;
use ingredient_reconciler::catalog::IngredientCatalog;
use ingredient_reconciler::engine_config::UnknownUnitPolicy;
use ingredient_reconciler::ingredient_model::{
    Ingredient, IngredientId, MealPlanAssignment, MealType, PantryItem, Quantity, Recipe,
    RecipeId, RecipeRequirement,
};
use ingredient_reconciler::pantry::PantrySnapshot;
use ingredient_reconciler::unit_table::UnitFamily;
use ingredient_reconciler::{EngineConfig, EngineError, ReconciliationEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn catalog() -> IngredientCatalog {
    IngredientCatalog::new(vec![
        Ingredient::new("flour", "all-purpose flour").with_category("Pantry"),
        Ingredient::new("chicken", "chicken breast").with_category("Meat"),
        Ingredient::new("lime", "lime").with_category("Produce"),
        Ingredient::new("rice", "jasmine rice").with_category("Pantry"),
        Ingredient::new("milk", "whole milk").with_category("Dairy"),
        Ingredient::new("eggs", "eggs").with_category("Dairy"),
        Ingredient::new("garlic", "garlic").with_category("Produce"),
    ])
}

fn engine() -> ReconciliationEngine {
    ReconciliationEngine::with_standard_units(catalog(), EngineConfig::default())
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn chicken_with_lime() -> Recipe {
    Recipe::new("lime-chicken", "Lime Chicken", dec!(4))
        .with_requirement(RecipeRequirement::required("chicken", Quantity::new(dec!(3), "lb")))
        .with_requirement(RecipeRequirement::optional("lime", Quantity::new(dec!(1), "item")))
}

fn pancakes() -> Recipe {
    Recipe::new("pancakes", "Pancakes", dec!(4))
        .with_requirement(RecipeRequirement::required("flour", Quantity::new(dec!(2), "cups")))
        .with_requirement(RecipeRequirement::required("milk", Quantity::new(dec!(1.5), "cup")))
        .with_requirement(RecipeRequirement::required("eggs", Quantity::new(dec!(2), "item")))
}

#[test]
fn test_flour_in_millilitres_covers_cups() {
    let recipe = Recipe::new("bread", "Bread", dec!(1))
        .with_requirement(RecipeRequirement::required("flour", Quantity::new(dec!(2), "cups")));
    let pantry = PantrySnapshot::new(vec![PantryItem::new("flour", Quantity::new(dec!(500), "ml"))]).unwrap();

    let result = engine().compute_coverage(&recipe, &pantry, now()).unwrap();
    assert_eq!(result.coverage_percent, 100);
    assert!(result.missing_required.is_empty());
    assert!(result.can_cook());
}

#[test]
fn test_chicken_partial_and_missing_optional_lime() {
    let pantry = PantrySnapshot::new(vec![PantryItem::new("chicken", Quantity::new(dec!(1), "lb"))]).unwrap();

    let result = engine().compute_coverage(&chicken_with_lime(), &pantry, now()).unwrap();
    assert_eq!(result.coverage_percent, 33);
    assert_eq!(result.missing_required.len(), 1);
    let chicken = &result.missing_required[0];
    assert_eq!(chicken.ingredient, IngredientId::new("chicken"));
    assert_eq!(chicken.shortfall, Quantity::new(dec!(2), "lb"));
    assert_eq!(result.missing_optional.len(), 1);
    assert_eq!(result.missing_optional[0].ingredient, IngredientId::new("lime"));
}

#[test]
fn test_zero_required_is_full_coverage() {
    let garnish = Recipe::new("garnish", "Lime Garnish", dec!(1))
        .with_requirement(RecipeRequirement::optional("lime", Quantity::new(dec!(2), "item")));
    let empty = Recipe::new("water", "Glass of Water", dec!(1));

    let pantries = vec![
        PantrySnapshot::empty(),
        PantrySnapshot::new(vec![PantryItem::new("lime", Quantity::new(dec!(5), "item"))]).unwrap(),
    ];
    for pantry in &pantries {
        for recipe in [&garnish, &empty] {
            let result = engine().compute_coverage(recipe, pantry, now()).unwrap();
            assert_eq!(result.coverage_percent, 100, "recipe {}", recipe.id);
        }
    }
}

#[test]
fn test_coverage_bounded_for_any_pantry() {
    let pantries = vec![
        vec![],
        vec![PantryItem::new("flour", Quantity::new(dec!(10), "kg"))],
        vec![
            PantryItem::new("flour", Quantity::new(dec!(0.25), "cup")),
            PantryItem::new("milk", Quantity::new(dec!(4), "gallon")),
            PantryItem::new("eggs", Quantity::new(dec!(12), "item")),
        ],
        vec![
            PantryItem::new("flour", Quantity::new(dec!(1000), "ml")),
            PantryItem::new("milk", Quantity::new(dec!(0), "ml")),
            PantryItem::new("eggs", Quantity::new(dec!(1), "item")),
        ],
    ];
    for items in pantries {
        let pantry = PantrySnapshot::new(items).unwrap();
        let result = engine().compute_coverage(&pancakes(), &pantry, now()).unwrap();
        assert!(result.coverage_percent <= 100);
    }
}

#[test]
fn test_pantry_in_incompatible_unit_counts_as_missing() {
    // flour stocked by weight, recipe measures by volume
    let pantry = PantrySnapshot::new(vec![PantryItem::new("flour", Quantity::new(dec!(2), "kg"))]).unwrap();
    let recipe = Recipe::new("bread", "Bread", dec!(1))
        .with_requirement(RecipeRequirement::required("flour", Quantity::new(dec!(2), "cup")));

    let result = engine().compute_coverage(&recipe, &pantry, now()).unwrap();
    assert_eq!(result.coverage_percent, 0);
    assert_eq!(result.missing_required.len(), 1);
}

#[test]
fn test_expiring_pantry_item_boosts_ranking() {
    let pantry = PantrySnapshot::new(vec![
        PantryItem::new("chicken", Quantity::new(dec!(3), "lb")).expiring_on(day(12)),
        PantryItem::new("flour", Quantity::new(dec!(5), "cup")),
        PantryItem::new("milk", Quantity::new(dec!(2), "cup")),
        PantryItem::new("eggs", Quantity::new(dec!(6), "item")),
    ])
    .unwrap();

    let engine = engine();
    let chicken = engine.compute_coverage(&chicken_with_lime(), &pantry, now()).unwrap();
    assert!(chicken.expiration_boosted);
    assert_eq!(chicken.ranking_score, dec!(110));

    let ranked = engine
        .rank_recipes(&[pancakes(), chicken_with_lime()], &pantry, now(), 0)
        .unwrap();
    assert_eq!(ranked[0].recipe, RecipeId::new("lime-chicken"));
    assert_eq!(ranked[1].recipe, RecipeId::new("pancakes"));
}

#[test]
fn test_rank_filters_by_min_coverage_and_penalizes() {
    let pantry = PantrySnapshot::new(vec![PantryItem::new("chicken", Quantity::new(dec!(1), "lb"))]).unwrap();
    let engine = engine();

    let ranked = engine
        .rank_recipes(&[pancakes(), chicken_with_lime()], &pantry, now(), 0)
        .unwrap();
    assert_eq!(ranked.len(), 2);
    let pancakes_result = ranked.iter().find(|r| r.recipe == RecipeId::new("pancakes")).unwrap();
    // three required ingredients missing, limit is two
    assert!(pancakes_result.penalized);
    assert_eq!(pancakes_result.ranking_score, dec!(-15));
    assert_eq!(ranked[0].recipe, RecipeId::new("lime-chicken"));

    let filtered = engine
        .rank_recipes(&[pancakes(), chicken_with_lime()], &pantry, now(), 30)
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

#[test]
fn test_plan_scales_rice_to_target_servings() {
    let recipe_x = Recipe::new("recipe-x", "Recipe X", dec!(4))
        .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(2), "cups")));
    let plan = vec![MealPlanAssignment::new("recipe-x", dec!(6), day(11), MealType::Dinner)];

    let engine = engine();
    let aggregate = engine.aggregate_meal_plan(&plan, &[recipe_x]).unwrap();
    let rice = aggregate.get(&IngredientId::new("rice")).unwrap();
    assert!(!rice.needs_manual_reconciliation());
    assert_eq!(
        rice.buckets[0].required_quantity(&engine.normalizer()),
        Quantity::new(dec!(3), "cup")
    );
}

#[test]
fn test_aggregation_merge_matches_direct() {
    let stir_fry = Recipe::new("stir-fry", "Stir Fry", dec!(2))
        .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(1), "cup")))
        .with_requirement(RecipeRequirement::required("garlic", Quantity::new(dec!(3), "clove")))
        .with_requirement(RecipeRequirement::required("chicken", Quantity::new(dec!(12), "oz")));
    let recipes = vec![pancakes(), chicken_with_lime(), stir_fry];

    let a = MealPlanAssignment::new("pancakes", dec!(2), day(9), MealType::Breakfast);
    let b = MealPlanAssignment::new("stir-fry", dec!(3), day(9), MealType::Dinner);
    let c = MealPlanAssignment::new("lime-chicken", dec!(8), day(10), MealType::Dinner);

    let engine = engine();
    let partial = engine
        .aggregate_meal_plan(&[a.clone(), b.clone()], &recipes)
        .unwrap()
        .merge(engine.aggregate_meal_plan(&[c.clone()], &recipes).unwrap())
        .unwrap();
    let direct = engine.aggregate_meal_plan(&[a, b, c], &recipes).unwrap();
    assert_eq!(partial, direct);

    let chicken = direct.get(&IngredientId::new("chicken")).unwrap();
    assert_eq!(
        chicken.buckets[0].required_quantity(&engine.normalizer()),
        Quantity::new(dec!(114), "oz")
    );
}

/// (ingredient, unit family) -> (required, optional) in canonical units
fn canonical_totals(aggregate: &MealPlanAggregate) -> BTreeMap<(String, String), (Decimal, Decimal)> {
    aggregate
        .iter()
        .flat_map(|requirement| {
            requirement.buckets.iter().map(move |bucket| {
                (
                    (requirement.ingredient.to_string(), bucket.family.key()),
                    (bucket.required, bucket.optional),
                )
            })
        })
        .collect()
}

#[test]
fn test_merge_order_does_not_change_totals() {
    let stir_fry = Recipe::new("stir-fry", "Stir Fry", dec!(2))
        .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(1), "cup")))
        .with_requirement(RecipeRequirement::required("garlic", Quantity::new(dec!(3), "clove")))
        .with_requirement(RecipeRequirement::required("chicken", Quantity::new(dec!(12), "oz")));
    let recipes = vec![pancakes(), chicken_with_lime(), stir_fry];

    let a = MealPlanAssignment::new("pancakes", dec!(2), day(9), MealType::Breakfast);
    let b = MealPlanAssignment::new("stir-fry", dec!(3), day(9), MealType::Dinner);
    let c = MealPlanAssignment::new("lime-chicken", dec!(8), day(10), MealType::Dinner);

    let engine = engine();
    let c_first = engine
        .aggregate_meal_plan(&[c.clone()], &recipes)
        .unwrap()
        .merge(engine.aggregate_meal_plan(&[a.clone(), b.clone()], &recipes).unwrap())
        .unwrap();
    let direct = engine.aggregate_meal_plan(&[a, b, c], &recipes).unwrap();

    assert_eq!(canonical_totals(&c_first), canonical_totals(&direct));
    assert_eq!(c_first.len(), direct.len());
    for requirement in direct.iter() {
        let mut expected: Vec<&RecipeId> = requirement.contributing_recipes.iter().collect();
        let mut actual: Vec<&RecipeId> = c_first
            .get(&requirement.ingredient)
            .unwrap()
            .contributing_recipes
            .iter()
            .collect();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }

    // first-seen order and display units follow the merge order
    let chicken = c_first.get(&IngredientId::new("chicken")).unwrap();
    assert_eq!(chicken.buckets[0].display_unit, "lb");
    assert_eq!(direct.get(&IngredientId::new("chicken")).unwrap().buckets[0].display_unit, "oz");
}

#[test]
fn test_mixed_units_flagged_for_manual_reconciliation() {
    let garlic_bread = Recipe::new("garlic-bread", "Garlic Bread", dec!(1))
        .with_requirement(RecipeRequirement::required("garlic", Quantity::new(dec!(4), "cloves")));
    let aioli = Recipe::new("aioli", "Aioli", dec!(1))
        .with_requirement(RecipeRequirement::required("garlic", Quantity::new(dec!(1), "tbsp")));
    let plan = vec![
        MealPlanAssignment::new("garlic-bread", dec!(1), day(12), MealType::Dinner),
        MealPlanAssignment::new("aioli", dec!(1), day(12), MealType::Snack),
    ];

    let aggregate = engine().aggregate_meal_plan(&plan, &[garlic_bread, aioli]).unwrap();
    let garlic = aggregate.get(&IngredientId::new("garlic")).unwrap();
    assert!(garlic.needs_manual_reconciliation());
    assert!(garlic.bucket(&UnitFamily::Volume).is_some());
    assert!(garlic.bucket(&UnitFamily::Count("clove".to_string())).is_some());
    assert_eq!(aggregate.manual_reconciliation_cases().count(), 1);
}

#[test]
fn test_data_integrity_errors() {
    let engine = engine();
    let zero = Recipe::new("broken", "Broken", Decimal::ZERO)
        .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(1), "cup")));
    let err = engine.compute_coverage(&zero, &PantrySnapshot::empty(), now()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidServings { .. }));

    let negative = Recipe::new("negative", "Negative", dec!(2))
        .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(-1), "cup")));
    let err = engine.compute_coverage(&negative, &PantrySnapshot::empty(), now()).unwrap_err();
    assert!(matches!(err, EngineError::NegativeQuantity { .. }));
    assert_eq!(err.recipe(), Some(&RecipeId::new("negative")));
    assert_eq!(err.ingredient(), Some(&IngredientId::new("rice")));

    let plan = vec![MealPlanAssignment::new("pancakes", dec!(0), day(9), MealType::Breakfast)];
    let err = engine.aggregate_meal_plan(&plan, &[pancakes()]).unwrap_err();
    assert_eq!(err.recipe(), Some(&RecipeId::new("pancakes")));
}

#[test]
fn test_reject_policy_fails_on_unknown_unit() {
    let mut config = EngineConfig::default();
    config.units.unknown_unit_policy = UnknownUnitPolicy::Reject;
    let strict = ReconciliationEngine::with_standard_units(catalog(), config);
    let recipe = Recipe::new("odd", "Odd Measures", dec!(1))
        .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(1), "handful")));

    let err = strict.compute_coverage(&recipe, &PantrySnapshot::empty(), now()).unwrap_err();
    assert!(matches!(err, EngineError::UnrecognizedUnit { ref unit, .. } if unit == "handful"));
    assert_eq!(err.recipe(), Some(&RecipeId::new("odd")));
    assert_eq!(err.ingredient(), Some(&IngredientId::new("rice")));

    // the default policy treats the symbol as its own count unit
    let result = engine()
        .compute_coverage(&recipe, &PantrySnapshot::empty(), now())
        .unwrap();
    assert_eq!(result.coverage_percent, 0);
}

#[test]
fn test_consolidated_pantry_sums_compatible_rows() {
    let engine = engine();
    let pantry = engine
        .consolidate_pantry(vec![
            PantryItem::new("flour", Quantity::new(dec!(1), "cup")),
            PantryItem::new("flour", Quantity::new(dec!(250), "ml")),
        ])
        .unwrap();
    let recipe = Recipe::new("bread", "Bread", dec!(1))
        .with_requirement(RecipeRequirement::required("flour", Quantity::new(dec!(2), "cups")));

    let result = engine.compute_coverage(&recipe, &pantry, now()).unwrap();
    assert_eq!(result.coverage_percent, 100);
}

#[test]
fn test_oversized_requirement_is_an_error_not_a_panic() {
    let tonnage = Decimal::from_i128_with_scale(10i128.pow(26), 0);
    let recipe = Recipe::new("silo", "Silo Bread", dec!(1))
        .with_requirement(RecipeRequirement::required("flour", Quantity::new(tonnage, "kg")));

    let err = engine()
        .compute_coverage(&recipe, &PantrySnapshot::empty(), now())
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::QuantityOverflow {
            recipe: Some(RecipeId::new("silo")),
            ingredient: IngredientId::new("flour"),
        }
    );
}
