//! crates/recipe_assistant_core/src/versioning.rs
//!
//! Maintains the append-only chain of immutable recipe snapshots behind each
//! user recipe. The only thing that ever moves is `latest_version_id`.

use crate::diff::{diff, RecipeDiff};
use crate::domain::{RecipeBody, RecipeVersion, UserRecipe};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{PortError, StoreService, StoreTransaction};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument, Span};
use uuid::Uuid;

#[derive(Clone)]
pub struct RecipeVersioning {
    store: Arc<dyn StoreService>,
    span: Span,
}

fn recipe_lookup(recipe_id: Uuid, context: &'static str) -> impl FnOnce(PortError) -> ServiceError {
    move |e| match e {
        PortError::NotFound(_) => ServiceError::RecipeNotFound(recipe_id),
        other => ServiceError::Store {
            context,
            source: other,
        },
    }
}

fn version_lookup(version_id: Uuid) -> impl FnOnce(PortError) -> ServiceError {
    move |e| match e {
        PortError::NotFound(_) => ServiceError::RecipeVersionNotFound(version_id),
        other => ServiceError::Store {
            context: "get recipe version",
            source: other,
        },
    }
}

impl RecipeVersioning {
    pub fn new(store: Arc<dyn StoreService>, span: Span) -> Self {
        Self { store, span }
    }

    /// Creates a user recipe and its root version in one transaction.
    pub async fn create_recipe(
        &self,
        user_id: Uuid,
        thread_id: Option<Uuid>,
        body: RecipeBody,
    ) -> ServiceResult<UserRecipe> {
        let span = info_span!(parent: &self.span, "create_recipe", %user_id);
        async {
            let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
            let recipe = Self::create_recipe_in(tx.as_mut(), user_id, thread_id, body).await?;
            tx.commit().await.map_err(ServiceError::store("commit new recipe"))?;
            Ok(recipe)
        }
        .instrument(span)
        .await
    }

    /// Records a new version whose parent is the current latest one, then moves the
    /// recipe's pointer to it, in one transaction.
    pub async fn update_recipe(
        &self,
        user_id: Uuid,
        recipe_id: Uuid,
        body: RecipeBody,
    ) -> ServiceResult<RecipeVersion> {
        let span = info_span!(parent: &self.span, "update_recipe", %user_id, %recipe_id);
        async {
            let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
            let version = Self::update_recipe_in(tx.as_mut(), user_id, recipe_id, body, None).await?;
            tx.commit().await.map_err(ServiceError::store("commit recipe update"))?;
            Ok(version)
        }
        .instrument(span)
        .await
    }

    /// `create_recipe` inside a transaction owned by the caller.
    pub async fn create_recipe_in(
        tx: &mut dyn StoreTransaction,
        user_id: Uuid,
        thread_id: Option<Uuid>,
        body: RecipeBody,
    ) -> ServiceResult<UserRecipe> {
        let now = Utc::now();
        let recipe = UserRecipe {
            id: Uuid::new_v4(),
            user_id,
            thread_id,
            latest_version_id: Uuid::new_v4(),
            body: body.clone(),
            is_favorite: false,
            created_at: now,
            updated_at: now,
        };
        let root = RecipeVersion {
            id: recipe.latest_version_id,
            user_recipe_id: recipe.id,
            parent_id: None,
            body,
            notes: None,
            created_at: now,
        };

        tx.create_user_recipe(&recipe)
            .await
            .map_err(ServiceError::store("save user recipe"))?;
        tx.create_recipe_version(&root)
            .await
            .map_err(ServiceError::store("add recipe version"))?;
        debug!(recipe_id = %recipe.id, version_id = %root.id, "created recipe with root version");

        Ok(recipe)
    }

    /// `update_recipe` inside a transaction owned by the caller.
    pub async fn update_recipe_in(
        tx: &mut dyn StoreTransaction,
        user_id: Uuid,
        recipe_id: Uuid,
        body: RecipeBody,
        notes: Option<String>,
    ) -> ServiceResult<RecipeVersion> {
        let current = tx
            .get_user_recipe(user_id, recipe_id)
            .await
            .map_err(recipe_lookup(recipe_id, "get user recipe"))?;

        let version = RecipeVersion {
            id: Uuid::new_v4(),
            user_recipe_id: recipe_id,
            parent_id: Some(current.latest_version_id),
            body,
            notes,
            created_at: Utc::now(),
        };

        tx.create_recipe_version(&version)
            .await
            .map_err(ServiceError::store("add recipe version"))?;
        tx.update_user_recipe_version(user_id, recipe_id, &version)
            .await
            .map_err(recipe_lookup(recipe_id, "update user recipe version"))?;
        debug!(%recipe_id, version_id = %version.id, parent_id = %current.latest_version_id, "added recipe version");

        Ok(version)
    }

    pub async fn get_recipe(&self, user_id: Uuid, recipe_id: Uuid) -> ServiceResult<UserRecipe> {
        let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
        tx.get_user_recipe(user_id, recipe_id)
            .await
            .map_err(recipe_lookup(recipe_id, "get user recipe"))
    }

    /// Every recipe owned by `user_id`, oldest first.
    pub async fn list_recipes(&self, user_id: Uuid) -> ServiceResult<Vec<UserRecipe>> {
        let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
        tx.list_user_recipes(user_id)
            .await
            .map_err(ServiceError::store("list user recipes"))
    }

    /// Deletes a recipe and its version chain. Threads that produced it stay, but
    /// no longer point at a recipe.
    pub async fn delete_recipe(&self, user_id: Uuid, recipe_id: Uuid) -> ServiceResult<()> {
        let span = info_span!(parent: &self.span, "delete_recipe", %user_id, %recipe_id);
        async {
            let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
            tx.delete_user_recipe(user_id, recipe_id)
                .await
                .map_err(recipe_lookup(recipe_id, "delete user recipe"))?;
            tx.commit().await.map_err(ServiceError::store("commit recipe deletion"))?;
            debug!("deleted recipe");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// A version of one of `user_id`'s recipes. Versions of other users' recipes
    /// are reported as not found.
    pub async fn get_version(&self, user_id: Uuid, version_id: Uuid) -> ServiceResult<RecipeVersion> {
        let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
        Self::owned_version(tx.as_mut(), user_id, version_id).await
    }

    async fn owned_version(
        tx: &mut dyn StoreTransaction,
        user_id: Uuid,
        version_id: Uuid,
    ) -> ServiceResult<RecipeVersion> {
        let version = tx
            .get_recipe_version(version_id)
            .await
            .map_err(version_lookup(version_id))?;
        tx.get_user_recipe(user_id, version.user_recipe_id)
            .await
            .map_err(version_lookup(version_id))?;
        Ok(version)
    }

    /// The version chain of a recipe, latest first, ending at the root version.
    ///
    /// Each step re-queries the store for the parent; versions only ever point
    /// backwards.
    pub async fn history(&self, user_id: Uuid, recipe_id: Uuid) -> ServiceResult<Vec<RecipeVersion>> {
        let span = info_span!(parent: &self.span, "recipe_history", %user_id, %recipe_id);
        async {
            let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
            let recipe = tx
                .get_user_recipe(user_id, recipe_id)
                .await
                .map_err(recipe_lookup(recipe_id, "get user recipe"))?;

            let mut chain = Vec::new();
            let mut next = Some(recipe.latest_version_id);
            while let Some(version_id) = next {
                let version = tx
                    .get_recipe_version(version_id)
                    .await
                    .map_err(version_lookup(version_id))?;
                next = version.parent_id;
                chain.push(version);
            }
            debug!(length = chain.len(), "walked recipe version chain");
            Ok(chain)
        }
        .instrument(span)
        .await
    }

    /// Diff between two of `user_id`'s stored versions, `from` being treated as
    /// the current one.
    pub async fn diff_versions(&self, user_id: Uuid, from: Uuid, to: Uuid) -> ServiceResult<RecipeDiff> {
        let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
        let from = Self::owned_version(tx.as_mut(), user_id, from).await?;
        let to = Self::owned_version(tx.as_mut(), user_id, to).await?;
        Ok(diff(&from.body, &to.body))
    }
}
