//! crates/recipe_assistant_core/src/profiles.rs
//!
//! Reads and writes the cooking profile every generation request is built from.

use crate::domain::Profile;
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{PortError, StoreService, StoreTransaction};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument, Span};
use uuid::Uuid;

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn StoreService>,
    span: Span,
}

/// Reads the profile of `user_id` inside a transaction owned by the caller.
pub(crate) async fn load_profile(tx: &mut dyn StoreTransaction, user_id: Uuid) -> ServiceResult<Profile> {
    tx.get_profile(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => ServiceError::ProfileNotFound(user_id),
        other => ServiceError::Store {
            context: "get profile",
            source: other,
        },
    })
}

impl ProfileService {
    pub fn new(store: Arc<dyn StoreService>, span: Span) -> Self {
        Self { store, span }
    }

    pub async fn get(&self, user_id: Uuid) -> ServiceResult<Profile> {
        let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
        load_profile(tx.as_mut(), user_id).await
    }

    pub async fn save(&self, user_id: Uuid, profile: Profile) -> ServiceResult<Profile> {
        let span = info_span!(parent: &self.span, "save_profile", %user_id);
        async {
            let mut tx = self.store.begin().await.map_err(ServiceError::store("begin transaction"))?;
            tx.upsert_profile(user_id, &profile)
                .await
                .map_err(ServiceError::store("save profile"))?;
            tx.commit().await.map_err(ServiceError::store("commit profile"))?;
            debug!(skill = profile.skill.as_str(), "saved profile");
            Ok(profile)
        }
        .instrument(span)
        .await
    }
}
