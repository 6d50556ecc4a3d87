//! crates/recipe_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database; serde derives only describe
//! the JSON shape used in event payloads and generation requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Recipe Content
//=========================================================================================

/// The closed set of units an ingredient quantity can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "ml")]
    Milliliter,
    #[serde(rename = "tsp")]
    Teaspoon,
    #[serde(rename = "tbsp")]
    Tablespoon,
    Cup,
    #[serde(rename = "oz")]
    Ounce,
    #[serde(rename = "lb")]
    Pound,
    Count,
}

impl MeasurementUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementUnit::Gram => "g",
            MeasurementUnit::Milliliter => "ml",
            MeasurementUnit::Teaspoon => "tsp",
            MeasurementUnit::Tablespoon => "tbsp",
            MeasurementUnit::Cup => "cup",
            MeasurementUnit::Ounce => "oz",
            MeasurementUnit::Pound => "lb",
            MeasurementUnit::Count => "count",
        }
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    pub unit: MeasurementUnit,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: f64, unit: MeasurementUnit) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit,
        }
    }
}

/// The contents of a recipe. Treated as an immutable value everywhere; a change
/// to a recipe is always a whole new `RecipeBody`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeBody {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    pub servings: i32,
    pub total_time_minutes: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

//=========================================================================================
// Recipe Versioning
//=========================================================================================

/// An immutable snapshot in a user recipe's edit history.
///
/// `parent_id` is a non-owning back-reference to the previous snapshot; the
/// first version of a recipe has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeVersion {
    pub id: Uuid,
    pub user_recipe_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: RecipeBody,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's personal copy of a recipe. `body` is a denormalized copy of the
/// version `latest_version_id` points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub thread_id: Option<Uuid>,
    pub latest_version_id: Uuid,
    pub body: RecipeBody,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// User Profile
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Chef,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Beginner => "beginner",
            Skill::Intermediate => "intermediate",
            Skill::Advanced => "advanced",
            Skill::Chef => "chef",
        }
    }
}

impl FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Skill::Beginner),
            "intermediate" => Ok(Skill::Intermediate),
            "advanced" => Ok(Skill::Advanced),
            "chef" => Ok(Skill::Chef),
            other => Err(format!("unknown skill level '{}'", other)),
        }
    }
}

/// The cooking preferences sent along with every generation request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub skill: Skill,
    pub cuisines: Vec<String>,
    pub diets: Vec<String>,
    pub equipment: Vec<String>,
    pub allergies: Vec<String>,
}

//=========================================================================================
// Threads
//=========================================================================================

/// A single generated-recipe candidate, derived by the reducer from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSuggestion {
    pub id: String,
    pub thread_id: Uuid,
    pub recipe: RecipeBody,
    pub response_text: String,
    pub accepted: bool,
    pub rejected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSource {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub source: ChatSource,
    pub message: String,
}

/// The current view of a thread, folded from its event log.
///
/// Timestamps are absent until an event has been folded: `updated_at` is the
/// timestamp of the last folded event, `created_at` that of the `PromptSet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub id: Uuid,
    pub original_prompt: String,
    pub current_prompt: String,
    pub suggestions: Vec<RecipeSuggestion>,
    pub current_recipe: Option<RecipeBody>,
    pub modified_recipe: Option<RecipeBody>,
    pub chat_history: Vec<ChatMessage>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ThreadState {
    /// The state of a thread before any event has been folded.
    pub fn empty(id: Uuid) -> Self {
        Self {
            id,
            original_prompt: String::new(),
            current_prompt: String::new(),
            suggestions: Vec::new(),
            current_recipe: None,
            modified_recipe: None,
            chat_history: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn suggestion(&self, suggestion_id: &str) -> Option<&RecipeSuggestion> {
        self.suggestions.iter().find(|s| s.id == suggestion_id)
    }

    /// Titles of every suggestion offered so far, in generation order.
    pub fn suggestion_titles(&self) -> Vec<String> {
        self.suggestions
            .iter()
            .map(|s| s.recipe.title.clone())
            .collect()
    }
}
