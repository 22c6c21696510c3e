//! # Engine Error Types Module
//!
//! This module defines the error types surfaced by the reconciliation engine.
//! Every variant is a data-integrity failure: the computation that raised it is
//! aborted and no partial result is returned. Unit incompatibility is *not*
//! represented here; it is a normal outcome reported on aggregated requirements.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ingredient_model::{IngredientId, RecipeId};

/// Errors raised by engine operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A requirement references an ingredient the catalog does not know
    #[error("recipe {recipe} references unknown ingredient {ingredient}")]
    UnknownIngredient {
        recipe: RecipeId,
        ingredient: IngredientId,
    },
    /// A meal-plan assignment points at a recipe that was not supplied
    #[error("meal plan references unknown recipe {recipe}")]
    UnknownRecipe { recipe: RecipeId },
    /// Base or target servings is zero or negative
    #[error("recipe {recipe} has non-positive servings value {servings}")]
    InvalidServings { recipe: RecipeId, servings: Decimal },
    /// A quantity below zero reached the engine; pantry rows carry no recipe
    #[error("negative quantity {value} for ingredient {ingredient}{}", in_recipe(.recipe))]
    NegativeQuantity {
        recipe: Option<RecipeId>,
        ingredient: IngredientId,
        value: Decimal,
    },
    /// The same ingredient appears twice in one recipe
    #[error("recipe {recipe} lists ingredient {ingredient} more than once")]
    DuplicateRequirement {
        recipe: RecipeId,
        ingredient: IngredientId,
    },
    /// Two pantry rows for one ingredient that cannot be summed
    #[error("pantry holds incompatible duplicate rows for ingredient {ingredient}")]
    DuplicatePantryItem { ingredient: IngredientId },
    /// Unit symbol missing from the conversion table under the `reject` policy
    #[error("unrecognized unit '{unit}' for ingredient {ingredient} in recipe {recipe}")]
    UnrecognizedUnit {
        unit: String,
        recipe: RecipeId,
        ingredient: IngredientId,
    },
    /// Scaling, converting or summing a quantity left the `Decimal` range
    #[error("quantity of ingredient {ingredient}{} is too large to compute", in_recipe(.recipe))]
    QuantityOverflow {
        recipe: Option<RecipeId>,
        ingredient: IngredientId,
    },
}

impl EngineError {
    /// Recipe the error refers to, when there is one
    pub fn recipe(&self) -> Option<&RecipeId> {
        match self {
            EngineError::UnknownIngredient { recipe, .. }
            | EngineError::UnknownRecipe { recipe }
            | EngineError::InvalidServings { recipe, .. }
            | EngineError::DuplicateRequirement { recipe, .. }
            | EngineError::UnrecognizedUnit { recipe, .. } => Some(recipe),
            EngineError::NegativeQuantity { recipe, .. }
            | EngineError::QuantityOverflow { recipe, .. } => recipe.as_ref(),
            EngineError::DuplicatePantryItem { .. } => None,
        }
    }

    /// Ingredient the error refers to, when there is one
    pub fn ingredient(&self) -> Option<&IngredientId> {
        match self {
            EngineError::UnknownIngredient { ingredient, .. }
            | EngineError::DuplicateRequirement { ingredient, .. }
            | EngineError::DuplicatePantryItem { ingredient }
            | EngineError::NegativeQuantity { ingredient, .. }
            | EngineError::UnrecognizedUnit { ingredient, .. }
            | EngineError::QuantityOverflow { ingredient, .. } => Some(ingredient),
            EngineError::UnknownRecipe { .. } | EngineError::InvalidServings { .. } => None,
        }
    }
}

fn in_recipe(recipe: &Option<RecipeId>) -> String {
    recipe
        .as_ref()
        .map(|r| format!(" in recipe {r}"))
        .unwrap_or_default()
}

/// Result alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;
