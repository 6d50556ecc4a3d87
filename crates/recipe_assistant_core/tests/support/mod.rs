//! Shared test doubles: an in-memory store with real transaction semantics and a
//! scripted generation service.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use recipe_assistant_core::ports::{
    AnswerRequest, GeneratedSuggestion, ModifyRequest, ModifyResponse, PortError, PortResult,
    RecipeGenerationService, StoreService, StoreTransaction, SuggestRequest, ThreadRecord,
};
use recipe_assistant_core::{
    Ingredient, MeasurementUnit, Profile, RecipeBody, RecipeVersion, Skill, ThreadEvent, UserRecipe,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

//=========================================================================================
// In-memory store
//=========================================================================================

#[derive(Default, Clone)]
struct Data {
    profiles: HashMap<Uuid, Profile>,
    threads: HashMap<Uuid, ThreadRecord>,
    recipes: HashMap<Uuid, UserRecipe>,
    versions: HashMap<Uuid, RecipeVersion>,
}

/// Transactions work on a private copy of the data and publish the entries they
/// touched on commit. Appends are checked against the committed log as well as
/// the transaction's own view, so a writer that committed in between is detected.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<Data>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, user_id: Uuid, profile: Profile) -> Self {
        self.data.lock().unwrap().profiles.insert(user_id, profile);
        self
    }

    pub fn thread(&self, thread_id: Uuid) -> Option<ThreadRecord> {
        self.data.lock().unwrap().threads.get(&thread_id).cloned()
    }

    pub fn stored_profile(&self, user_id: Uuid) -> Option<Profile> {
        self.data.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn thread_count(&self) -> usize {
        self.data.lock().unwrap().threads.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.data.lock().unwrap().recipes.len()
    }

    pub fn version_count(&self) -> usize {
        self.data.lock().unwrap().versions.len()
    }

    /// Appends an event to a thread outside of any service call, as a concurrent
    /// writer would.
    pub fn append_directly(&self, thread_id: Uuid, event: ThreadEvent) {
        let mut data = self.data.lock().unwrap();
        let thread = data.threads.get_mut(&thread_id).expect("thread exists");
        thread.events.push(event);
    }
}

pub struct InMemoryTransaction {
    shared: Arc<Mutex<Data>>,
    working: Data,
    appended: HashMap<Uuid, usize>,
    dirty_profiles: HashSet<Uuid>,
    dirty_threads: HashSet<Uuid>,
    dirty_recipes: HashSet<Uuid>,
    dirty_versions: HashSet<Uuid>,
    deleted_recipes: HashSet<Uuid>,
    deleted_versions: HashSet<Uuid>,
}

#[async_trait]
impl StoreService for InMemoryStore {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let working = self.data.lock().unwrap().clone();
        Ok(Box::new(InMemoryTransaction {
            shared: self.data.clone(),
            working,
            appended: HashMap::new(),
            dirty_profiles: HashSet::new(),
            dirty_threads: HashSet::new(),
            dirty_recipes: HashSet::new(),
            dirty_versions: HashSet::new(),
            deleted_recipes: HashSet::new(),
            deleted_versions: HashSet::new(),
        }))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get_profile(&mut self, user_id: Uuid) -> PortResult<Profile> {
        self.working
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile for user {} not found", user_id)))
    }

    async fn upsert_profile(&mut self, user_id: Uuid, profile: &Profile) -> PortResult<()> {
        self.working.profiles.insert(user_id, profile.clone());
        self.dirty_profiles.insert(user_id);
        Ok(())
    }

    async fn create_thread(&mut self, user_id: Uuid, thread_id: Uuid, events: &[ThreadEvent]) -> PortResult<()> {
        let now = Utc::now();
        self.working.threads.insert(
            thread_id,
            ThreadRecord {
                id: thread_id,
                user_id,
                recipe_id: None,
                events: events.to_vec(),
                created_at: now,
                updated_at: now,
            },
        );
        self.dirty_threads.insert(thread_id);
        Ok(())
    }

    async fn append_to_thread(
        &mut self,
        thread_id: Uuid,
        expected_len: usize,
        events: &[ThreadEvent],
    ) -> PortResult<()> {
        let committed_len = self
            .shared
            .lock()
            .unwrap()
            .threads
            .get(&thread_id)
            .map(|t| t.events.len());
        let appended = self.appended.get(&thread_id).copied().unwrap_or(0);
        let thread = self
            .working
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| PortError::NotFound(format!("Thread {} not found", thread_id)))?;

        let committed_matches = committed_len.map_or(true, |len| len + appended == expected_len);
        if thread.events.len() != expected_len || !committed_matches {
            return Err(PortError::Conflict(format!(
                "Thread {} no longer has {} events",
                thread_id, expected_len
            )));
        }

        thread.events.extend_from_slice(events);
        thread.updated_at = Utc::now();
        *self.appended.entry(thread_id).or_default() += events.len();
        self.dirty_threads.insert(thread_id);
        Ok(())
    }

    async fn get_thread(&mut self, thread_id: Uuid) -> PortResult<ThreadRecord> {
        self.working
            .threads
            .get(&thread_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Thread {} not found", thread_id)))
    }

    async fn associate_thread_with_recipe(&mut self, thread_id: Uuid, recipe_id: Uuid) -> PortResult<()> {
        let thread = self
            .working
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| PortError::NotFound(format!("Thread {} not found", thread_id)))?;
        thread.recipe_id = Some(recipe_id);
        self.dirty_threads.insert(thread_id);
        Ok(())
    }

    async fn create_user_recipe(&mut self, recipe: &UserRecipe) -> PortResult<()> {
        self.working.recipes.insert(recipe.id, recipe.clone());
        self.dirty_recipes.insert(recipe.id);
        Ok(())
    }

    async fn get_user_recipe(&mut self, user_id: Uuid, recipe_id: Uuid) -> PortResult<UserRecipe> {
        self.working
            .recipes
            .get(&recipe_id)
            .filter(|r| r.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Recipe {} not found", recipe_id)))
    }

    async fn list_user_recipes(&mut self, user_id: Uuid) -> PortResult<Vec<UserRecipe>> {
        let mut recipes: Vec<UserRecipe> = self
            .working
            .recipes
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        recipes.sort_by_key(|r| (r.created_at, r.id));
        Ok(recipes)
    }

    async fn delete_user_recipe(&mut self, user_id: Uuid, recipe_id: Uuid) -> PortResult<()> {
        let owned = self
            .working
            .recipes
            .get(&recipe_id)
            .is_some_and(|r| r.user_id == user_id);
        if !owned {
            return Err(PortError::NotFound(format!("Recipe {} not found", recipe_id)));
        }
        self.working.recipes.remove(&recipe_id);
        self.deleted_recipes.insert(recipe_id);

        let chain: Vec<Uuid> = self
            .working
            .versions
            .values()
            .filter(|v| v.user_recipe_id == recipe_id)
            .map(|v| v.id)
            .collect();
        for id in chain {
            self.working.versions.remove(&id);
            self.deleted_versions.insert(id);
        }

        for thread in self.working.threads.values_mut() {
            if thread.recipe_id == Some(recipe_id) {
                thread.recipe_id = None;
                self.dirty_threads.insert(thread.id);
            }
        }
        Ok(())
    }

    async fn update_user_recipe_version(
        &mut self,
        user_id: Uuid,
        recipe_id: Uuid,
        version: &RecipeVersion,
    ) -> PortResult<()> {
        let recipe = self
            .working
            .recipes
            .get_mut(&recipe_id)
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Recipe {} not found", recipe_id)))?;
        recipe.latest_version_id = version.id;
        recipe.body = version.body.clone();
        recipe.updated_at = Utc::now();
        self.dirty_recipes.insert(recipe_id);
        Ok(())
    }

    async fn create_recipe_version(&mut self, version: &RecipeVersion) -> PortResult<()> {
        if self.working.versions.contains_key(&version.id) {
            return Err(PortError::Unexpected(format!(
                "Recipe version {} already exists",
                version.id
            )));
        }
        self.working.versions.insert(version.id, version.clone());
        self.dirty_versions.insert(version.id);
        Ok(())
    }

    async fn get_recipe_version(&mut self, version_id: Uuid) -> PortResult<RecipeVersion> {
        self.working
            .versions
            .get(&version_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Recipe version {} not found", version_id)))
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let mut shared = self.shared.lock().unwrap();
        for id in &self.dirty_profiles {
            if let Some(profile) = self.working.profiles.get(id) {
                shared.profiles.insert(*id, profile.clone());
            }
        }
        for id in &self.dirty_threads {
            if let Some(thread) = self.working.threads.get(id) {
                shared.threads.insert(*id, thread.clone());
            }
        }
        for id in &self.dirty_recipes {
            if let Some(recipe) = self.working.recipes.get(id) {
                shared.recipes.insert(*id, recipe.clone());
            }
        }
        for id in &self.dirty_versions {
            if let Some(version) = self.working.versions.get(id) {
                shared.versions.insert(*id, version.clone());
            }
        }
        for id in &self.deleted_recipes {
            shared.recipes.remove(id);
        }
        for id in &self.deleted_versions {
            shared.versions.remove(id);
        }
        Ok(())
    }
}

//=========================================================================================
// Scripted generation service
//=========================================================================================

/// Replays queued responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedGenerator {
    suggestions: Mutex<VecDeque<Vec<GeneratedSuggestion>>>,
    modifications: Mutex<VecDeque<ModifyResponse>>,
    answers: Mutex<VecDeque<String>>,
    pub suggest_requests: Mutex<Vec<SuggestRequest>>,
    pub modify_requests: Mutex<Vec<ModifyRequest>>,
    pub answer_requests: Mutex<Vec<AnswerRequest>>,
    /// When set, a suggest call first commits an extra event to this thread.
    interfere_with: Mutex<Option<(InMemoryStore, Uuid)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_suggestions(&self, titles: &[&str]) {
        let batch = titles
            .iter()
            .map(|title| GeneratedSuggestion {
                response_text: format!("How about {}?", title),
                recipe: recipe(title),
            })
            .collect();
        self.suggestions.lock().unwrap().push_back(batch);
    }

    pub fn push_modification(&self, response_text: &str, new_recipe: RecipeBody) {
        self.modifications.lock().unwrap().push_back(ModifyResponse {
            response_text: response_text.to_string(),
            new_recipe,
        });
    }

    pub fn push_answer(&self, answer: &str) {
        self.answers.lock().unwrap().push_back(answer.to_string());
    }

    pub fn interfere_with(&self, store: InMemoryStore, thread_id: Uuid) {
        *self.interfere_with.lock().unwrap() = Some((store, thread_id));
    }
}

#[async_trait]
impl RecipeGenerationService for ScriptedGenerator {
    async fn suggest(&self, request: &SuggestRequest) -> PortResult<Vec<GeneratedSuggestion>> {
        self.suggest_requests.lock().unwrap().push(request.clone());
        if let Some((store, thread_id)) = self.interfere_with.lock().unwrap().take() {
            let event = ThreadEvent {
                event_type: "PromptEdited".to_string(),
                payload: serde_json::json!({ "prompt": "written by someone else" }),
                timestamp: Utc::now(),
            };
            store.append_directly(thread_id, event);
        }
        self.suggestions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PortError::Unexpected("no scripted suggestions left".to_string()))
    }

    async fn modify(&self, request: &ModifyRequest) -> PortResult<ModifyResponse> {
        self.modify_requests.lock().unwrap().push(request.clone());
        self.modifications
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PortError::Unexpected("no scripted modifications left".to_string()))
    }

    async fn answer(&self, request: &AnswerRequest) -> PortResult<String> {
        self.answer_requests.lock().unwrap().push(request.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PortError::Unexpected("no scripted answers left".to_string()))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub fn recipe(title: &str) -> RecipeBody {
    RecipeBody {
        title: title.to_string(),
        description: format!("A plate of {}", title.to_lowercase()),
        ingredients: vec![
            Ingredient::new("Onion", 1.0, MeasurementUnit::Count),
            Ingredient::new("Olive Oil", 2.0, MeasurementUnit::Tablespoon),
        ],
        steps: vec!["Chop the onion".to_string(), "Fry in oil".to_string()],
        servings: 2,
        total_time_minutes: 25,
        image_url: None,
    }
}

pub fn profile() -> Profile {
    Profile {
        name: "Sam".to_string(),
        skill: Skill::Intermediate,
        cuisines: vec!["mexican".to_string()],
        diets: vec![],
        equipment: vec!["oven".to_string()],
        allergies: vec!["peanuts".to_string()],
    }
}
