//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StoreService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries are built at runtime with `query_as` and `bind`, so building the crate
//! does not need a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recipe_assistant_core::domain::{Profile, RecipeBody, RecipeVersion, Skill, UserRecipe};
use recipe_assistant_core::events::ThreadEvent;
use recipe_assistant_core::ports::{
    PortError, PortResult, StoreService, StoreTransaction, ThreadRecord,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StoreService` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// A single open PostgreSQL transaction. `sqlx` rolls it back when dropped
/// without a commit.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    name: String,
    skill: String,
    cuisines: Json<Vec<String>>,
    diets: Json<Vec<String>>,
    equipment: Json<Vec<String>>,
    allergies: Json<Vec<String>>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        let skill = self.skill.parse::<Skill>().map_err(PortError::Unexpected)?;
        Ok(Profile {
            name: self.name,
            skill,
            cuisines: self.cuisines.0,
            diets: self.diets.0,
            equipment: self.equipment.0,
            allergies: self.allergies.0,
        })
    }
}

#[derive(FromRow)]
struct ThreadRow {
    id: Uuid,
    user_id: Uuid,
    recipe_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ThreadRow {
    fn to_domain(self, events: Vec<ThreadEvent>) -> ThreadRecord {
        ThreadRecord {
            id: self.id,
            user_id: self.user_id,
            recipe_id: self.recipe_id,
            events,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct EventRecord {
    event_type: String,
    payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
}
impl EventRecord {
    fn to_domain(self) -> ThreadEvent {
        ThreadEvent {
            event_type: self.event_type,
            payload: self.payload,
            timestamp: self.occurred_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecipeRecord {
    id: Uuid,
    user_id: Uuid,
    thread_id: Option<Uuid>,
    latest_version_id: Uuid,
    body: Json<RecipeBody>,
    is_favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecipeRecord {
    fn to_domain(self) -> UserRecipe {
        UserRecipe {
            id: self.id,
            user_id: self.user_id,
            thread_id: self.thread_id,
            latest_version_id: self.latest_version_id,
            body: self.body.0,
            is_favorite: self.is_favorite,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct RecipeVersionRecord {
    id: Uuid,
    user_recipe_id: Uuid,
    parent_id: Option<Uuid>,
    body: Json<RecipeBody>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}
impl RecipeVersionRecord {
    fn to_domain(self) -> RecipeVersion {
        RecipeVersion {
            id: self.id,
            user_recipe_id: self.user_recipe_id,
            parent_id: self.parent_id,
            body: self.body.0,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `StoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoreService for PgStore {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(unexpected)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

impl PgTransaction {
    /// Writes `events` at consecutive log positions starting at `start`. The primary
    /// key on `(thread_id, event_index)` turns a lost race into a `Conflict`.
    async fn insert_events(&mut self, thread_id: Uuid, start: usize, events: &[ThreadEvent]) -> PortResult<()> {
        for (offset, event) in events.iter().enumerate() {
            sqlx::query(
                "INSERT INTO thread_events (thread_id, event_index, event_type, payload, occurred_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(thread_id)
            .bind((start + offset) as i32)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.timestamp)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(format!(
                    "Event {} of thread {} was already written",
                    start + offset,
                    thread_id
                )),
                other => unexpected(other),
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn get_profile(&mut self, user_id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT name, skill, cuisines, diets, equipment, allergies FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(not_found_or_unexpected(format!("Profile for user {}", user_id)))?;
        record.to_domain()
    }

    async fn upsert_profile(&mut self, user_id: Uuid, profile: &Profile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, name, skill, cuisines, diets, equipment, allergies)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                name = EXCLUDED.name,
                skill = EXCLUDED.skill,
                cuisines = EXCLUDED.cuisines,
                diets = EXCLUDED.diets,
                equipment = EXCLUDED.equipment,
                allergies = EXCLUDED.allergies,
                updated_at = NOW()",
        )
        .bind(user_id)
        .bind(&profile.name)
        .bind(profile.skill.as_str())
        .bind(Json(&profile.cuisines))
        .bind(Json(&profile.diets))
        .bind(Json(&profile.equipment))
        .bind(Json(&profile.allergies))
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn create_thread(&mut self, user_id: Uuid, thread_id: Uuid, events: &[ThreadEvent]) -> PortResult<()> {
        sqlx::query("INSERT INTO threads (id, user_id) VALUES ($1, $2)")
            .bind(thread_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        self.insert_events(thread_id, 0, events).await
    }

    async fn append_to_thread(
        &mut self,
        thread_id: Uuid,
        expected_len: usize,
        events: &[ThreadEvent],
    ) -> PortResult<()> {
        // Lock the thread row so concurrent appenders queue up behind this one.
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM threads WHERE id = $1 FOR UPDATE")
            .bind(thread_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(not_found_or_unexpected(format!("Thread {}", thread_id)))?;

        let current_len = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM thread_events WHERE thread_id = $1")
            .bind(thread_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        if current_len != expected_len as i64 {
            return Err(PortError::Conflict(format!(
                "Thread {} has {} events, expected {}",
                thread_id, current_len, expected_len
            )));
        }

        self.insert_events(thread_id, expected_len, events).await?;
        sqlx::query("UPDATE threads SET updated_at = NOW() WHERE id = $1")
            .bind(thread_id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        debug!(%thread_id, from = expected_len, count = events.len(), "appended thread events");
        Ok(())
    }

    async fn get_thread(&mut self, thread_id: Uuid) -> PortResult<ThreadRecord> {
        let row = sqlx::query_as::<_, ThreadRow>(
            "SELECT id, user_id, recipe_id, created_at, updated_at FROM threads WHERE id = $1",
        )
        .bind(thread_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(not_found_or_unexpected(format!("Thread {}", thread_id)))?;

        let events = sqlx::query_as::<_, EventRecord>(
            "SELECT event_type, payload, occurred_at FROM thread_events WHERE thread_id = $1 ORDER BY event_index ASC",
        )
        .bind(thread_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(unexpected)?;

        Ok(row.to_domain(events.into_iter().map(|e| e.to_domain()).collect()))
    }

    async fn associate_thread_with_recipe(&mut self, thread_id: Uuid, recipe_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE threads SET recipe_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(recipe_id)
            .bind(thread_id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Thread {} not found", thread_id)));
        }
        Ok(())
    }

    async fn create_user_recipe(&mut self, recipe: &UserRecipe) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_recipes (id, user_id, thread_id, latest_version_id, body, is_favorite, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(recipe.id)
        .bind(recipe.user_id)
        .bind(recipe.thread_id)
        .bind(recipe.latest_version_id)
        .bind(Json(&recipe.body))
        .bind(recipe.is_favorite)
        .bind(recipe.created_at)
        .bind(recipe.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_user_recipe(&mut self, user_id: Uuid, recipe_id: Uuid) -> PortResult<UserRecipe> {
        let record = sqlx::query_as::<_, UserRecipeRecord>(
            "SELECT id, user_id, thread_id, latest_version_id, body, is_favorite, created_at, updated_at
             FROM user_recipes WHERE id = $1 AND user_id = $2",
        )
        .bind(recipe_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(not_found_or_unexpected(format!("Recipe {}", recipe_id)))?;
        Ok(record.to_domain())
    }

    async fn list_user_recipes(&mut self, user_id: Uuid) -> PortResult<Vec<UserRecipe>> {
        let records = sqlx::query_as::<_, UserRecipeRecord>(
            "SELECT id, user_id, thread_id, latest_version_id, body, is_favorite, created_at, updated_at
             FROM user_recipes WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(UserRecipeRecord::to_domain).collect())
    }

    async fn delete_user_recipe(&mut self, user_id: Uuid, recipe_id: Uuid) -> PortResult<()> {
        // Versions go with the recipe through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM user_recipes WHERE id = $1 AND user_id = $2")
            .bind(recipe_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Recipe {} not found", recipe_id)));
        }
        sqlx::query("UPDATE threads SET recipe_id = NULL, updated_at = NOW() WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn update_user_recipe_version(
        &mut self,
        user_id: Uuid,
        recipe_id: Uuid,
        version: &RecipeVersion,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_recipes SET latest_version_id = $1, body = $2, updated_at = NOW()
             WHERE id = $3 AND user_id = $4",
        )
        .bind(version.id)
        .bind(Json(&version.body))
        .bind(recipe_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Recipe {} not found", recipe_id)));
        }
        Ok(())
    }

    async fn create_recipe_version(&mut self, version: &RecipeVersion) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO recipe_versions (id, user_recipe_id, parent_id, body, notes, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(version.id)
        .bind(version.user_recipe_id)
        .bind(version.parent_id)
        .bind(Json(&version.body))
        .bind(&version.notes)
        .bind(version.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_recipe_version(&mut self, version_id: Uuid) -> PortResult<RecipeVersion> {
        let record = sqlx::query_as::<_, RecipeVersionRecord>(
            "SELECT id, user_recipe_id, parent_id, body, notes, created_at FROM recipe_versions WHERE id = $1",
        )
        .bind(version_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(not_found_or_unexpected(format!("Recipe version {}", version_id)))?;
        Ok(record.to_domain())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let PgTransaction { tx } = *self;
        tx.commit().await.map_err(unexpected)
    }
}
