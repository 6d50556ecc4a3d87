mod support;

use recipe_assistant_core::{ProfileService, ServiceError, Skill, StoreService};
use std::sync::Arc;
use support::{profile, InMemoryStore};
use tracing::Span;
use uuid::Uuid;

fn profiles() -> (InMemoryStore, ProfileService) {
    let store = InMemoryStore::new();
    let shared: Arc<dyn StoreService> = Arc::new(store.clone());
    (store, ProfileService::new(shared, Span::none()))
}

#[tokio::test]
async fn saved_profile_reads_back() {
    let (store, profiles) = profiles();
    let user_id = Uuid::new_v4();

    let saved = profiles.save(user_id, profile()).await.unwrap();

    assert_eq!(saved, profile());
    assert_eq!(profiles.get(user_id).await.unwrap(), profile());
    assert_eq!(store.stored_profile(user_id), Some(profile()));
}

#[tokio::test]
async fn saving_again_replaces_the_profile() {
    let (_, profiles) = profiles();
    let user_id = Uuid::new_v4();
    profiles.save(user_id, profile()).await.unwrap();

    let mut expert = profile();
    expert.skill = Skill::Advanced;
    expert.allergies.clear();
    profiles.save(user_id, expert.clone()).await.unwrap();

    assert_eq!(profiles.get(user_id).await.unwrap(), expert);
}

#[tokio::test]
async fn unknown_user_has_no_profile() {
    let (_, profiles) = profiles();
    let user_id = Uuid::new_v4();

    let err = profiles.get(user_id).await.unwrap_err();

    assert!(matches!(err, ServiceError::ProfileNotFound(id) if id == user_id));
}
