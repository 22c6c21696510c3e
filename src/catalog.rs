//! # Ingredient Catalog Module
//!
//! Read-only view of the ingredient reference data. The engine resolves every
//! requirement against this catalog before computing anything, so an unknown
//! ingredient id surfaces as a data-integrity error instead of being dropped.

use std::collections::HashMap;

use crate::engine_errors::{EngineError, EngineResult};
use crate::ingredient_model::{Ingredient, IngredientId, Recipe};

/// Ingredient reference data keyed by identity
#[derive(Debug, Clone, Default)]
pub struct IngredientCatalog {
    ingredients: HashMap<IngredientId, Ingredient>,
}

impl IngredientCatalog {
    /// Build a catalog; a later entry with the same id replaces an earlier one
    pub fn new(ingredients: Vec<Ingredient>) -> Self {
        Self {
            ingredients: ingredients.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    pub fn get(&self, id: &IngredientId) -> Option<&Ingredient> {
        self.ingredients.get(id)
    }

    pub fn contains(&self, id: &IngredientId) -> bool {
        self.ingredients.contains_key(id)
    }

    /// Display name for `id`, falling back to the raw id
    pub fn display_name(&self, id: &IngredientId) -> String {
        self.get(id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Check that every requirement of `recipe` names a known ingredient
    pub fn resolve_recipe(&self, recipe: &Recipe) -> EngineResult<()> {
        match recipe.requirements.iter().find(|r| !self.contains(&r.ingredient)) {
            Some(unknown) => Err(EngineError::UnknownIngredient {
                recipe: recipe.id.clone(),
                ingredient: unknown.ingredient.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.values()
    }

    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}
