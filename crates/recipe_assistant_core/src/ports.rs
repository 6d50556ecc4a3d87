//! crates/recipe_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{Profile, RecipeBody, RecipeVersion, UserRecipe};
use crate::events::ThreadEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A compare-and-append was refused because the log moved on.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence
//=========================================================================================

/// A thread as the store holds it: metadata plus the ordered event log.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipe_id: Option<Uuid>,
    pub events: Vec<ThreadEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait StoreService: Send + Sync {
    /// Opens a transaction scope. Every write the core performs goes through one.
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>>;
}

/// A unit of work against the store.
///
/// Writes become visible only after `commit`. Dropping the transaction without
/// committing, including while unwinding from a panic, rolls every write back.
#[async_trait]
pub trait StoreTransaction: Send {
    // --- Profiles ---
    async fn get_profile(&mut self, user_id: Uuid) -> PortResult<Profile>;

    /// Creates or replaces the profile of `user_id`.
    async fn upsert_profile(&mut self, user_id: Uuid, profile: &Profile) -> PortResult<()>;

    // --- Threads ---
    async fn create_thread(&mut self, user_id: Uuid, thread_id: Uuid, events: &[ThreadEvent]) -> PortResult<()>;

    /// Appends `events` only if the thread currently holds exactly `expected_len`
    /// events, failing with `PortError::Conflict` otherwise.
    async fn append_to_thread(
        &mut self,
        thread_id: Uuid,
        expected_len: usize,
        events: &[ThreadEvent],
    ) -> PortResult<()>;

    async fn get_thread(&mut self, thread_id: Uuid) -> PortResult<ThreadRecord>;

    async fn associate_thread_with_recipe(&mut self, thread_id: Uuid, recipe_id: Uuid) -> PortResult<()>;

    // --- Recipes ---
    async fn create_user_recipe(&mut self, recipe: &UserRecipe) -> PortResult<()>;

    async fn get_user_recipe(&mut self, user_id: Uuid, recipe_id: Uuid) -> PortResult<UserRecipe>;

    /// Every recipe owned by `user_id`, oldest first.
    async fn list_user_recipes(&mut self, user_id: Uuid) -> PortResult<Vec<UserRecipe>>;

    /// Removes a recipe together with its whole version chain and detaches any
    /// thread that pointed at it.
    async fn delete_user_recipe(&mut self, user_id: Uuid, recipe_id: Uuid) -> PortResult<()>;

    /// Points the user recipe at `version` and refreshes its denormalized body.
    async fn update_user_recipe_version(
        &mut self,
        user_id: Uuid,
        recipe_id: Uuid,
        version: &RecipeVersion,
    ) -> PortResult<()>;

    async fn create_recipe_version(&mut self, version: &RecipeVersion) -> PortResult<()>;

    async fn get_recipe_version(&mut self, version_id: Uuid) -> PortResult<RecipeVersion>;

    async fn commit(self: Box<Self>) -> PortResult<()>;
}

//=========================================================================================
// Recipe Generation
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub message: String,
    pub profile: Profile,
    /// Titles already offered in this thread, so they are not repeated.
    pub history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSuggestion {
    pub response_text: String,
    pub recipe: RecipeBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub message: String,
    pub recipe: RecipeBody,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyResponse {
    pub response_text: String,
    pub new_recipe: RecipeBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    pub recipe: RecipeBody,
    pub profile: Profile,
}

#[async_trait]
pub trait RecipeGenerationService: Send + Sync {
    /// Proposes one or more recipes for the request.
    async fn suggest(&self, request: &SuggestRequest) -> PortResult<Vec<GeneratedSuggestion>>;

    /// Rewrites a recipe following a free-text instruction.
    async fn modify(&self, request: &ModifyRequest) -> PortResult<ModifyResponse>;

    /// Answers a cooking question about a recipe.
    async fn answer(&self, request: &AnswerRequest) -> PortResult<String>;
}
