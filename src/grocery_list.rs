//! # Grocery List Reconciler Module
//!
//! Regenerates a grocery list from a fresh meal-plan aggregate without
//! destroying what the user has done to the previous list.
//!
//! ## Regeneration policy
//!
//! - Pantry stock is subtracted first; fully covered ingredients get no line,
//!   and neither do remainders that round to zero at display precision
//! - Manual items are carried forward untouched, always
//! - A generated line that is still needed keeps its checked flag and only has
//!   its quantity updated. Lines are matched by ingredient and unit family;
//!   the family comes from the stored unit group, or from the unit when a
//!   persisted list dropped the group
//! - A generated line that is no longer needed is removed, unless it is checked:
//!   confirmed purchases are retained as they were
//! - [`ReconcileMode::FullReset`] is the only way checked state is cleared
//!
//! Reconciling twice with the same inputs yields the same list.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::MealPlanAggregate;
use crate::catalog::IngredientCatalog;
use crate::categorizer::{category_rank, Categorizer};
use crate::engine_errors::EngineResult;
use crate::ingredient_model::{GroceryListItem, IngredientId, ItemOrigin, Quantity};
use crate::pantry::PantrySnapshot;
use crate::quantity_normalizer::{round_for_display, QuantityNormalizer};
use crate::unit_table::UnitFamily;

/// How much of the previous list's state regeneration keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Keep checked flags and retain checked lines that are no longer needed
    #[default]
    Preserve,
    /// Rebuild every generated line unchecked; manual items still survive
    FullReset,
}

/// An ordered grocery list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroceryList {
    pub items: Vec<GroceryListItem>,
}

/// Items of one category, in list order
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySection<'a> {
    pub category: String,
    pub items: Vec<&'a GroceryListItem>,
}

impl GroceryList {
    pub fn new(items: Vec<GroceryListItem>) -> Self {
        Self { items }
    }

    pub fn generated(&self) -> impl Iterator<Item = &GroceryListItem> {
        self.items.iter().filter(|i| i.origin == ItemOrigin::Generated)
    }

    pub fn manual(&self) -> impl Iterator<Item = &GroceryListItem> {
        self.items.iter().filter(|i| i.origin == ItemOrigin::Manual)
    }

    /// First generated line for `ingredient`
    pub fn find_generated(&self, ingredient: &IngredientId) -> Option<&GroceryListItem> {
        self.generated().find(|i| i.ingredient.as_ref() == Some(ingredient))
    }

    /// Sections in `order`; categories missing from `order` follow alphabetically
    pub fn grouped(&self, order: &[String]) -> Vec<CategorySection<'_>> {
        let mut sections: Vec<CategorySection<'_>> = Vec::new();
        for item in &self.items {
            match sections.iter_mut().find(|s| s.category == item.category) {
                Some(section) => section.items.push(item),
                None => sections.push(CategorySection {
                    category: item.category.clone(),
                    items: vec![item],
                }),
            }
        }
        sections.sort_by(|a, b| {
            category_rank(&a.category, order)
                .cmp(&category_rank(&b.category, order))
                .then_with(|| a.category.cmp(&b.category))
        });
        sections
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What still has to be bought of one ingredient in one unit family
#[derive(Debug, Clone, PartialEq)]
pub struct NeededLine {
    pub ingredient: IngredientId,
    pub family: UnitFamily,
    /// Exact amount, in the bucket's display unit
    pub quantity: Quantity,
    pub needs_review: bool,
}

/// `max(0, required - pantry)` per ingredient and unit family
///
/// Optional quantities are not shopped for. Lines fully covered by the pantry
/// are dropped.
pub fn pantry_adjusted(
    aggregate: &MealPlanAggregate,
    pantry: &PantrySnapshot,
    normalizer: &QuantityNormalizer,
) -> EngineResult<Vec<NeededLine>> {
    let mut needed = Vec::new();
    for requirement in aggregate.iter() {
        for bucket in requirement.buckets.iter().filter(|b| b.required > Decimal::ZERO) {
            let available = pantry.available(&requirement.ingredient, &bucket.family, normalizer)?;
            let remaining = (bucket.required - available).max(Decimal::ZERO);
            if remaining.is_zero() {
                debug!("{} ({}) fully covered by pantry", requirement.ingredient, bucket.family);
                continue;
            }
            needed.push(NeededLine {
                ingredient: requirement.ingredient.clone(),
                family: bucket.family.clone(),
                quantity: bucket.in_display_unit(remaining, normalizer),
                needs_review: requirement.needs_manual_reconciliation(),
            });
        }
    }
    Ok(needed)
}

type LineKey = (IngredientId, String);

/// Merges fresh requirements into a previous grocery list
#[derive(Debug, Clone, Copy)]
pub struct GroceryReconciler<'a> {
    normalizer: QuantityNormalizer<'a>,
    catalog: &'a IngredientCatalog,
    categorizer: &'a Categorizer,
    decimal_places: u32,
}

impl<'a> GroceryReconciler<'a> {
    pub fn new(
        normalizer: QuantityNormalizer<'a>,
        catalog: &'a IngredientCatalog,
        categorizer: &'a Categorizer,
        decimal_places: u32,
    ) -> Self {
        Self {
            normalizer,
            catalog,
            categorizer,
            decimal_places,
        }
    }

    /// Produce the new list from the previous one and a fresh aggregate
    pub fn reconcile(
        &self,
        previous: &GroceryList,
        aggregate: &MealPlanAggregate,
        pantry: &PantrySnapshot,
        mode: ReconcileMode,
    ) -> EngineResult<GroceryList> {
        let needed = pantry_adjusted(aggregate, pantry, &self.normalizer)?;

        // previous generated lines by (ingredient, unit group) -> index into previous.items
        let mut previous_generated: HashMap<LineKey, usize> = HashMap::new();
        if mode == ReconcileMode::Preserve {
            for (index, item) in previous.items.iter().enumerate() {
                if item.origin != ItemOrigin::Generated {
                    continue;
                }
                if let Some(key) = self.line_key(item) {
                    previous_generated.entry(key).or_insert(index);
                }
            }
        }

        let mut matched: HashSet<usize> = HashSet::new();
        let mut items = Vec::with_capacity(needed.len() + previous.len());
        let (mut added, mut updated) = (0usize, 0usize);

        for line in &needed {
            if round_for_display(line.quantity.value, self.decimal_places).is_zero() {
                debug!(
                    "Skipping {} {}: below display precision",
                    line.ingredient, line.quantity
                );
                continue;
            }
            let key = (line.ingredient.clone(), line.family.key());
            let item = match previous_generated.get(&key) {
                Some(&index) => {
                    matched.insert(index);
                    updated += 1;
                    self.refresh(&previous.items[index], line)
                }
                None => {
                    added += 1;
                    self.fresh(line)
                }
            };
            items.push(item);
        }

        let (mut retained, mut removed) = (0usize, 0usize);
        for (index, item) in previous.items.iter().enumerate() {
            if item.origin != ItemOrigin::Generated || matched.contains(&index) {
                continue;
            }
            if mode == ReconcileMode::Preserve && item.checked {
                debug!("Retaining checked item '{}' as already bought", item.label);
                retained += 1;
                items.push(item.clone());
            } else {
                removed += 1;
            }
        }

        items.extend(previous.manual().cloned());

        info!(
            "Reconciled grocery list ({:?}): {} added, {} updated, {} retained, {} removed, {} manual",
            mode,
            added,
            updated,
            retained,
            removed,
            previous.manual().count()
        );
        Ok(GroceryList { items })
    }

    /// Matching key of a previous generated line
    fn line_key(&self, item: &GroceryListItem) -> Option<LineKey> {
        let ingredient = item.ingredient.clone()?;
        let group = match &item.unit_group {
            Some(group) => group.clone(),
            None => self.normalizer.definition(item.unit.as_deref()?)?.family.key(),
        };
        Some((ingredient, group))
    }

    fn fresh(&self, line: &NeededLine) -> GroceryListItem {
        let label = self.catalog.display_name(&line.ingredient);
        let category = self.categorizer.categorize(&line.ingredient);
        let mut item = GroceryListItem::generated(&line.ingredient, &label, &category);
        self.apply_quantity(&mut item, line);
        item
    }

    fn refresh(&self, existing: &GroceryListItem, line: &NeededLine) -> GroceryListItem {
        let mut item = existing.clone();
        self.apply_quantity(&mut item, line);
        item
    }

    fn apply_quantity(&self, item: &mut GroceryListItem, line: &NeededLine) {
        item.quantity = Some(round_for_display(line.quantity.value, self.decimal_places));
        item.unit = Some(line.quantity.unit.clone());
        item.unit_group = Some(line.family.key());
        item.needs_review = line.needs_review;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{aggregate, PlannedRecipe};
    use crate::engine_config::{GroceryConfig, UnknownUnitPolicy};
    use crate::ingredient_model::{Ingredient, PantryItem, Recipe, RecipeRequirement};
    use crate::unit_table::UnitTable;
    use rust_decimal_macros::dec;

    struct Fixture {
        table: UnitTable,
        catalog: IngredientCatalog,
        categorizer: Categorizer,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = IngredientCatalog::new(vec![
                Ingredient::new("milk", "milk").with_category("Dairy"),
                Ingredient::new("rice", "rice").with_category("Pantry"),
                Ingredient::new("onion", "onion").with_category("Produce"),
            ]);
            let categorizer = Categorizer::new(&catalog, &GroceryConfig::default().category_order);
            Self {
                table: UnitTable::standard(),
                catalog,
                categorizer,
            }
        }

        fn normalizer(&self) -> QuantityNormalizer<'_> {
            QuantityNormalizer::new(&self.table, UnknownUnitPolicy::TreatAsCount)
        }

        fn reconciler(&self) -> GroceryReconciler<'_> {
            GroceryReconciler::new(self.normalizer(), &self.catalog, &self.categorizer, 2)
        }

        fn aggregate(&self, recipes: &[Recipe]) -> MealPlanAggregate {
            let planned: Vec<PlannedRecipe> = recipes.iter().map(PlannedRecipe::at_base).collect();
            aggregate(&planned, &self.normalizer()).unwrap()
        }
    }

    fn latte(gallons: Decimal) -> Recipe {
        Recipe::new("latte", "Latte", dec!(1))
            .with_requirement(RecipeRequirement::required("milk", Quantity::new(gallons, "gallon")))
    }

    fn pilaf() -> Recipe {
        Recipe::new("pilaf", "Pilaf", dec!(4))
            .with_requirement(RecipeRequirement::required("rice", Quantity::new(dec!(2), "cup")))
            .with_requirement(RecipeRequirement::required("onion", Quantity::new(dec!(1), "item")))
    }

    #[test]
    fn test_pantry_subtraction_drops_covered_lines() {
        let fx = Fixture::new();
        let aggregate = fx.aggregate(&[pilaf()]);
        let pantry = PantrySnapshot::new(vec![
            PantryItem::new("onion", Quantity::new(dec!(3), "item")),
            PantryItem::new("rice", Quantity::new(dec!(1), "cup")),
        ])
        .unwrap();

        let needed = pantry_adjusted(&aggregate, &pantry, &fx.normalizer()).unwrap();
        assert_eq!(needed.len(), 1);
        assert_eq!(needed[0].ingredient, IngredientId::new("rice"));
        assert_eq!(needed[0].quantity, Quantity::new(dec!(1), "cup"));
    }

    #[test]
    fn test_new_lines_start_unchecked() {
        let fx = Fixture::new();
        let list = fx.reconciler().reconcile(
            &GroceryList::default(),
            &fx.aggregate(&[pilaf()]),
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.items.iter().all(|i| !i.checked));
        let rice = list.find_generated(&IngredientId::new("rice")).unwrap();
        assert_eq!(rice.quantity, Some(dec!(2)));
        assert_eq!(rice.unit.as_deref(), Some("cup"));
        assert_eq!(rice.category, "Pantry");
        assert_eq!(rice.unit_group.as_deref(), Some("volume"));
    }

    #[test]
    fn test_checked_flag_and_manual_items_survive() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let first = reconciler.reconcile(
            &GroceryList::default(),
            &fx.aggregate(&[latte(dec!(1))]),
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        let mut edited = first.clone();
        edited.items[0].checked = true;
        edited.items.push(GroceryListItem::manual("paper towels", "Other"));

        let second = reconciler.reconcile(
            &edited,
            &fx.aggregate(&[latte(dec!(2))]),
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        let milk = second.find_generated(&IngredientId::new("milk")).unwrap();
        assert!(milk.checked);
        assert_eq!(milk.quantity, Some(dec!(2)));
        assert_eq!(second.manual().count(), 1);
        assert_eq!(second.manual().next().unwrap().label, "paper towels");
    }

    #[test]
    fn test_previous_line_without_unit_group_matches_by_unit() {
        let fx = Fixture::new();
        let previous: GroceryList = serde_json::from_str(
            r#"{"items": [
                {"ingredient": "milk", "label": "milk", "quantity": "1", "unit": "gallon",
                 "category": "Dairy", "checked": true, "origin": "generated"},
                {"label": "paper towels", "category": "Other", "origin": "manual"}
            ]}"#,
        )
        .unwrap();
        assert!(previous.items[0].unit_group.is_none());

        let list = fx
            .reconciler()
            .reconcile(
                &previous,
                &fx.aggregate(&[latte(dec!(2))]),
                &PantrySnapshot::empty(),
                ReconcileMode::Preserve,
            )
            .unwrap();
        let milk: Vec<(Option<Decimal>, bool)> = list.generated().map(|i| (i.quantity, i.checked)).collect();
        assert_eq!(milk, vec![(Some(dec!(2)), true)]);
        assert_eq!(list.items[0].unit_group.as_deref(), Some("volume"));
        assert_eq!(list.manual().count(), 1);
    }

    #[test]
    fn test_remainder_below_display_precision_gets_no_line() {
        let fx = Fixture::new();
        let aggregate = fx.aggregate(&[latte(dec!(1))]);
        // 0.001784 ml short of a gallon
        let pantry = PantrySnapshot::new(vec![PantryItem::new("milk", Quantity::new(dec!(3785.41), "ml"))]).unwrap();
        assert_eq!(pantry_adjusted(&aggregate, &pantry, &fx.normalizer()).unwrap().len(), 1);

        let previous = GroceryList::new(vec![GroceryListItem::generated(&IngredientId::new("milk"), "milk", "Dairy")
            .with_quantity(dec!(1), "gallon")
            .with_unit_group("volume")]);
        let list = fx
            .reconciler()
            .reconcile(&previous, &aggregate, &pantry, ReconcileMode::Preserve)
            .unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_unneeded_lines_removed_unless_checked() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let mut previous = reconciler.reconcile(
            &GroceryList::default(),
            &fx.aggregate(&[pilaf()]),
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        // user bought the rice, then the pilaf left the plan
        for item in previous.items.iter_mut() {
            if item.ingredient == Some(IngredientId::new("rice")) {
                item.checked = true;
            }
        }

        let next = reconciler.reconcile(
            &previous,
            &MealPlanAggregate::default(),
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next.items[0].ingredient, Some(IngredientId::new("rice")));
        assert!(next.items[0].checked);
    }

    #[test]
    fn test_full_reset_clears_checks_but_keeps_manual() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let aggregate = fx.aggregate(&[latte(dec!(1))]);
        let mut previous = reconciler.reconcile(
            &GroceryList::default(),
            &aggregate,
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        previous.items[0].checked = true;
        previous.items.push(GroceryListItem::manual("candles", "Other").checked());

        let reset = reconciler.reconcile(&previous, &aggregate, &PantrySnapshot::empty(), ReconcileMode::FullReset).unwrap();
        assert!(!reset.find_generated(&IngredientId::new("milk")).unwrap().checked);
        assert!(reset.manual().next().unwrap().checked);
    }

    #[test]
    fn test_idempotent_under_no_change() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler();
        let aggregate = fx.aggregate(&[pilaf(), latte(dec!(0.5))]);
        let pantry = PantrySnapshot::new(vec![PantryItem::new("rice", Quantity::new(dec!(100), "ml"))]).unwrap();

        let mut start = GroceryList::new(vec![
            GroceryListItem::manual("paper towels", "Other"),
            GroceryListItem::generated(&IngredientId::new("onion"), "onion", "Produce")
                .with_quantity(dec!(5), "item")
                .with_unit_group("count:item")
                .checked(),
            GroceryListItem::generated(&IngredientId::new("leeks"), "leeks", "Produce")
                .with_quantity(dec!(2), "item")
                .with_unit_group("count:item")
                .checked(),
        ]);
        start.items[0].checked = true;

        let once = reconciler.reconcile(&start, &aggregate, &pantry, ReconcileMode::Preserve).unwrap();
        let twice = reconciler.reconcile(&once, &aggregate, &pantry, ReconcileMode::Preserve).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_incompatible_units_become_review_lines() {
        let fx = Fixture::new();
        let soup = Recipe::new("soup", "Soup", dec!(2))
            .with_requirement(RecipeRequirement::required("onion", Quantity::new(dec!(1), "cup")));
        let list = fx.reconciler().reconcile(
            &GroceryList::default(),
            &fx.aggregate(&[pilaf(), soup]),
            &PantrySnapshot::empty(),
            ReconcileMode::Preserve,
        )
        .unwrap();
        let onions: Vec<&GroceryListItem> = list
            .generated()
            .filter(|i| i.ingredient == Some(IngredientId::new("onion")))
            .collect();
        assert_eq!(onions.len(), 2);
        assert!(onions.iter().all(|i| i.needs_review));
    }

    #[test]
    fn test_grouped_by_category_order() {
        let list = GroceryList::new(vec![
            GroceryListItem::manual("paper towels", "Other"),
            GroceryListItem::manual("kombu", "Asian Grocery"),
            GroceryListItem::manual("milk", "Dairy"),
            GroceryListItem::manual("lime", "Produce"),
            GroceryListItem::manual("cheese", "Dairy"),
        ]);
        let sections = list.grouped(&GroceryConfig::default().category_order);
        let names: Vec<&str> = sections.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["Produce", "Dairy", "Other", "Asian Grocery"]);
        assert_eq!(sections[1].items.len(), 2);
    }
}
