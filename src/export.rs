//! # Export Module
//!
//! Serializes grocery lists and aggregated requirements for the export
//! collaborator: CSV for spreadsheets, JSON for everything else.

use anyhow::Result;
use serde::Serialize;

use crate::aggregator::MealPlanAggregate;
use crate::catalog::IngredientCatalog;
use crate::grocery_list::GroceryList;
use crate::quantity_normalizer::{round_for_display, QuantityNormalizer};

/// Grocery list as CSV, one row per item in category order
pub fn grocery_list_to_csv(list: &GroceryList, category_order: &[String]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "category",
        "item",
        "quantity",
        "unit",
        "checked",
        "origin",
        "needs_review",
    ])?;
    for section in list.grouped(category_order) {
        for item in section.items {
            writer.write_record([
                item.category.clone(),
                item.label.clone(),
                item.quantity.map(|q| q.normalize().to_string()).unwrap_or_default(),
                item.unit.clone().unwrap_or_default(),
                item.checked.to_string(),
                item.origin.to_string(),
                item.needs_review.to_string(),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

/// Aggregated requirements as CSV, one row per ingredient and unit family
pub fn aggregate_to_csv(
    aggregate: &MealPlanAggregate,
    catalog: &IngredientCatalog,
    normalizer: &QuantityNormalizer,
    decimal_places: u32,
) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "ingredient",
        "required",
        "optional",
        "unit",
        "recipes",
        "needs_review",
    ])?;
    for requirement in aggregate.iter() {
        for bucket in &requirement.buckets {
            let required = bucket.required_quantity(normalizer);
            let optional = bucket.optional_quantity(normalizer);
            writer.write_record([
                catalog.display_name(&requirement.ingredient),
                round_for_display(required.value, decimal_places).to_string(),
                round_for_display(optional.value, decimal_places).to_string(),
                required.unit,
                requirement
                    .contributing_recipes
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(";"),
                requirement.needs_manual_reconciliation().to_string(),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn render_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{aggregate, PlannedRecipe};
    use crate::engine_config::{GroceryConfig, UnknownUnitPolicy};
    use crate::ingredient_model::{
        GroceryListItem, Ingredient, IngredientId, Quantity, Recipe, RecipeRequirement,
    };
    use crate::unit_table::UnitTable;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grocery_csv_in_category_order() {
        let list = GroceryList::new(vec![
            GroceryListItem::manual("paper towels", "Other"),
            GroceryListItem::generated(&IngredientId::new("milk"), "milk", "Dairy")
                .with_quantity(dec!(1.50), "gallon")
                .checked(),
        ]);
        let csv = grocery_list_to_csv(&list, &GroceryConfig::default().category_order).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "category,item,quantity,unit,checked,origin,needs_review");
        assert_eq!(lines[1], "Dairy,milk,1.5,gallon,true,generated,false");
        assert_eq!(lines[2], "Other,paper towels,,,false,manual,false");
    }

    #[test]
    fn test_aggregate_csv_rows() {
        let table = UnitTable::standard();
        let normalizer = QuantityNormalizer::new(&table, UnknownUnitPolicy::TreatAsCount);
        let catalog = IngredientCatalog::new(vec![Ingredient::new("rice", "jasmine rice")]);
        let recipe = Recipe::new("x", "Recipe X", dec!(4))
            .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(2), "cups")));
        let aggregate = aggregate(&[PlannedRecipe::new(&recipe, dec!(6))], &normalizer).unwrap();

        let csv = aggregate_to_csv(&aggregate, &catalog, &normalizer, 2).unwrap();
        assert_eq!(csv.lines().nth(1), Some("jasmine rice,3,0,cup,x,false"));
    }

    #[test]
    fn test_render_json() {
        let list = GroceryList::new(vec![GroceryListItem::manual("candles", "Other")]);
        let json = render_json(&list).unwrap();
        assert!(json.contains("\"label\": \"candles\""));
    }
}
