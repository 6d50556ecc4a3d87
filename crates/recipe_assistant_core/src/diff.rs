//! crates/recipe_assistant_core/src/diff.rs
//!
//! Structural comparison of two recipe snapshots, used to summarize what a
//! modification changed. The result is meant for display, not for rebuilding
//! one recipe from the other.

use crate::domain::{Ingredient, MeasurementUnit, RecipeBody};
use serde::{Deserialize, Serialize};

/// An ingredient whose quantity or unit changed. `index` is its position in the
/// current recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedIngredient {
    pub index: usize,
    pub name: String,
    pub quantity: f64,
    pub unit: MeasurementUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedIngredient {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStep {
    pub step: String,
    pub is_new: bool,
}

/// What changed between a current and a proposed recipe.
///
/// The `new_*` scalars are `Some` only when the field changed. `new_steps` lists
/// every proposed step; steps dropped from the current recipe do not appear.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecipeDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_servings: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_total_time_minutes: Option<i32>,
    pub added_ingredients: Vec<Ingredient>,
    pub modified_ingredients: Vec<ModifiedIngredient>,
    pub removed_ingredients: Vec<RemovedIngredient>,
    pub new_steps: Vec<DiffStep>,
}

fn changed<T: PartialEq + Clone>(current: &T, proposed: &T) -> Option<T> {
    (current != proposed).then(|| proposed.clone())
}

/// Compares `current` against `proposed`.
///
/// Ingredients are matched by name: each current ingredient claims the first
/// unclaimed proposed ingredient with the same name. Steps are compared by
/// membership, so reordering steps marks none of them as new.
pub fn diff(current: &RecipeBody, proposed: &RecipeBody) -> RecipeDiff {
    let mut result = RecipeDiff {
        new_title: changed(&current.title, &proposed.title),
        new_description: changed(&current.description, &proposed.description),
        new_servings: changed(&current.servings, &proposed.servings),
        new_total_time_minutes: changed(&current.total_time_minutes, &proposed.total_time_minutes),
        ..RecipeDiff::default()
    };

    let mut matched = vec![false; proposed.ingredients.len()];
    for (index, ingredient) in current.ingredients.iter().enumerate() {
        let candidate = proposed
            .ingredients
            .iter()
            .enumerate()
            .find(|(j, p)| !matched[*j] && p.name == ingredient.name);

        match candidate {
            Some((j, p)) => {
                matched[j] = true;
                if p.quantity != ingredient.quantity || p.unit != ingredient.unit {
                    result.modified_ingredients.push(ModifiedIngredient {
                        index,
                        name: p.name.clone(),
                        quantity: p.quantity,
                        unit: p.unit,
                    });
                }
            }
            None => result.removed_ingredients.push(RemovedIngredient { index }),
        }
    }

    result.added_ingredients = proposed
        .ingredients
        .iter()
        .zip(&matched)
        .filter(|(_, claimed)| !**claimed)
        .map(|(ingredient, _)| ingredient.clone())
        .collect();

    result.new_steps = proposed
        .steps
        .iter()
        .map(|step| DiffStep {
            step: step.clone(),
            is_new: !current.steps.contains(step),
        })
        .collect();

    result
}
