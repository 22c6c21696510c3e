//! # Ingredient and Quantity Data Model
//!
//! This module defines the value types the reconciliation engine consumes and
//! produces: catalog ingredients, recipes with their requirements, pantry items,
//! meal-plan assignments and grocery list items.
//!
//! ## Core Concepts
//!
//! - **Ingredient**: catalog reference data with a stable id and a display category
//! - **Quantity**: a non-negative decimal value paired with a unit symbol
//! - **RecipeRequirement**: one ingredient a recipe needs, required or optional
//! - **PantryItem**: what a user has on hand, with an optional expiration date
//! - **GroceryListItem**: a line on the shopping list, generated or manual
//!
//! ## Usage
//!
//! ```rust
//! use ingredient_reconciler::ingredient_model::{Quantity, Recipe, RecipeRequirement};
//! use rust_decimal::Decimal;
//!
//! let pancakes = Recipe::new("pancakes", "Pancakes", Decimal::from(4))
//!     .with_requirement(RecipeRequirement::required("flour", Quantity::new(Decimal::from(2), "cup")))
//!     .with_requirement(RecipeRequirement::optional("blueberries", Quantity::new(Decimal::from(100), "g")));
//!
//! assert_eq!(pancakes.requirements.len(), 2);
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a catalog ingredient
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientId(String);

/// Stable identity of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(IngredientId);
string_id!(RecipeId);

/// Catalog reference data for one ingredient
///
/// Created and edited by the catalog collaborator; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    /// Display name (e.g., "all-purpose flour")
    pub name: String,
    /// Grocery category label (e.g., "Produce"); empty when uncategorized
    #[serde(default)]
    pub category: String,
    /// Units this ingredient is usually measured in
    #[serde(default)]
    pub common_units: Vec<String>,
}

/// A measured amount: non-negative value plus unit symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: String,
}

/// One ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequirement {
    pub ingredient: IngredientId,
    pub quantity: Quantity,
    /// Optional ingredients never count toward missing-required or coverage
    #[serde(default)]
    pub optional: bool,
}

/// A recipe with its base servings and ordered requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub base_servings: Decimal,
    #[serde(default)]
    pub requirements: Vec<RecipeRequirement>,
}

/// What a user has on hand for one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    pub ingredient: IngredientId,
    pub quantity: Quantity,
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
}

/// Meal slot within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// A recipe scheduled in the weekly plan at some number of servings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlanAssignment {
    pub recipe: RecipeId,
    /// Target servings; must be positive, need not equal the recipe's base servings
    pub servings: Decimal,
    pub date: NaiveDate,
    pub meal_type: MealType,
}

/// Where a grocery list item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrigin {
    /// Produced by reconciliation from the meal plan
    Generated,
    /// Added by the user; never touched by regeneration
    Manual,
}

/// One line of a grocery list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryListItem {
    /// Ingredient reference; `None` for free-text manual items
    #[serde(default)]
    pub ingredient: Option<IngredientId>,
    /// Display label (ingredient name or the user's free text)
    pub label: String,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
    pub category: String,
    #[serde(default)]
    pub checked: bool,
    pub origin: ItemOrigin,
    /// Unit family this generated line covers (see `UnitFamily::key`)
    #[serde(default)]
    pub unit_group: Option<String>,
    /// Set when the same ingredient is needed in incompatible units
    #[serde(default)]
    pub needs_review: bool,
}

impl Ingredient {
    /// Create a catalog ingredient with no category and no common units
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: IngredientId::new(id),
            name: name.to_string(),
            category: String::new(),
            common_units: Vec::new(),
        }
    }

    /// Attach a grocery category
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    /// Attach the units this ingredient is usually measured in
    pub fn with_units(mut self, units: &[&str]) -> Self {
        self.common_units = units.iter().map(|u| u.to_string()).collect();
        self
    }
}

impl Quantity {
    pub fn new(value: Decimal, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Multiply the value, keeping the unit; `None` when the product overflows
    pub fn scaled(&self, factor: Decimal) -> Option<Self> {
        Some(Self {
            value: self.value.checked_mul(factor)?,
            unit: self.unit.clone(),
        })
    }
}

impl RecipeRequirement {
    pub fn required(ingredient: &str, quantity: Quantity) -> Self {
        Self {
            ingredient: IngredientId::new(ingredient),
            quantity,
            optional: false,
        }
    }

    pub fn optional(ingredient: &str, quantity: Quantity) -> Self {
        Self {
            ingredient: IngredientId::new(ingredient),
            quantity,
            optional: true,
        }
    }
}

impl Recipe {
    pub fn new(id: &str, name: &str, base_servings: Decimal) -> Self {
        Self {
            id: RecipeId::new(id),
            name: name.to_string(),
            base_servings,
            requirements: Vec::new(),
        }
    }

    /// Append a requirement, keeping declaration order
    pub fn with_requirement(mut self, requirement: RecipeRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Requirements that count toward coverage
    pub fn required(&self) -> impl Iterator<Item = &RecipeRequirement> {
        self.requirements.iter().filter(|r| !r.optional)
    }
}

impl PantryItem {
    pub fn new(ingredient: &str, quantity: Quantity) -> Self {
        Self {
            ingredient: IngredientId::new(ingredient),
            quantity,
            expires_on: None,
        }
    }

    pub fn expiring_on(mut self, date: NaiveDate) -> Self {
        self.expires_on = Some(date);
        self
    }
}

impl MealPlanAssignment {
    pub fn new(recipe: &str, servings: Decimal, date: NaiveDate, meal_type: MealType) -> Self {
        Self {
            recipe: RecipeId::new(recipe),
            servings,
            date,
            meal_type,
        }
    }
}

impl GroceryListItem {
    /// A free-text item the user added by hand
    pub fn manual(label: &str, category: &str) -> Self {
        Self {
            ingredient: None,
            label: label.to_string(),
            quantity: None,
            unit: None,
            category: category.to_string(),
            checked: false,
            origin: ItemOrigin::Manual,
            unit_group: None,
            needs_review: false,
        }
    }

    /// A line produced from the meal plan
    pub fn generated(ingredient: &IngredientId, label: &str, category: &str) -> Self {
        Self {
            ingredient: Some(ingredient.clone()),
            label: label.to_string(),
            quantity: None,
            unit: None,
            category: category.to_string(),
            checked: false,
            origin: ItemOrigin::Generated,
            unit_group: None,
            needs_review: false,
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal, unit: &str) -> Self {
        self.quantity = Some(quantity);
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_unit_group(mut self, group: &str) -> Self {
        self.unit_group = Some(group.to_string());
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn is_manual(&self) -> bool {
        self.origin == ItemOrigin::Manual
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value.normalize(), self.unit)
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for ItemOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOrigin::Generated => write!(f, "generated"),
            ItemOrigin::Manual => write!(f, "manual"),
        }
    }
}

impl fmt::Display for GroceryListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", if self.checked { "x" } else { " " })?;
        match (&self.quantity, &self.unit) {
            (Some(quantity), Some(unit)) => {
                write!(f, "{} {} {}", quantity.normalize(), unit, self.label)?
            }
            (Some(quantity), None) => write!(f, "{} {}", quantity.normalize(), self.label)?,
            _ => write!(f, "{}", self.label)?,
        }
        if self.needs_review {
            write!(f, " (check units)")?;
        }
        Ok(())
    }
}
