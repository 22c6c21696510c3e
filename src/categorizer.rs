//! # Categorizer Module
//!
//! Maps ingredient identities to grocery display categories using the category
//! attached to each catalog ingredient. Unknown or uncategorized ingredients
//! land in "Other".

use std::collections::HashMap;

use crate::catalog::IngredientCatalog;
use crate::engine_config::OTHER_CATEGORY;
use crate::ingredient_model::IngredientId;

/// Read-only ingredient -> category map with a display order
#[derive(Debug, Clone)]
pub struct Categorizer {
    by_ingredient: HashMap<IngredientId, String>,
    order: Vec<String>,
}

impl Categorizer {
    /// Build from catalog data; labels matching `order` case-insensitively take
    /// the spelling from `order`
    pub fn new(catalog: &IngredientCatalog, order: &[String]) -> Self {
        let by_ingredient = catalog
            .iter()
            .map(|ingredient| {
                (
                    ingredient.id.clone(),
                    canonical_label(&ingredient.category, order),
                )
            })
            .collect();
        Self {
            by_ingredient,
            order: order.to_vec(),
        }
    }

    /// Category label for `ingredient`, "Other" when unknown
    pub fn categorize(&self, ingredient: &IngredientId) -> String {
        self.by_ingredient
            .get(ingredient)
            .cloned()
            .unwrap_or_else(|| OTHER_CATEGORY.to_string())
    }

    /// Position of `category` in the display order; unlisted categories sort last
    pub fn rank(&self, category: &str) -> usize {
        category_rank(category, &self.order)
    }
}

/// Position of `category` in `order`, or `order.len()` when unlisted
pub fn category_rank(category: &str, order: &[String]) -> usize {
    order
        .iter()
        .position(|c| c.eq_ignore_ascii_case(category.trim()))
        .unwrap_or(order.len())
}

fn canonical_label(raw: &str, order: &[String]) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return OTHER_CATEGORY.to_string();
    }
    order
        .iter()
        .find(|c| c.eq_ignore_ascii_case(trimmed))
        .cloned()
        .unwrap_or_else(|| trimmed.to_string())
}
