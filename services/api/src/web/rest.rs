//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints. Each handler is a thin
//! mapping from an HTTP verb onto one thread or versioning operation.

use crate::error::ApiError;
use crate::web::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use recipe_assistant_core::{
    Profile, RecipeDiff, RecipeModification, RecipeSuggestion, RecipeVersion, ThreadState,
    UserRecipe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

/// A revised prompt is optional; without one the thread's current prompt is reused.
#[derive(Deserialize)]
pub struct NextSuggestionsRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub answer: String,
}

fn non_empty(field: &str, value: String) -> ApiResult<String> {
    if value.trim().is_empty() {
        Err(ApiError::BadRequest(format!("{} must not be empty", field)))
    } else {
        Ok(value)
    }
}

//=========================================================================================
// Profile
//=========================================================================================

pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(app_state.profiles.get(user_id).await?))
}

pub async fn put_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(profile): Json<Profile>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(app_state.profiles.save(user_id, profile).await?))
}

//=========================================================================================
// Threads
//=========================================================================================

pub async fn start_thread_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<PromptRequest>,
) -> ApiResult<impl IntoResponse> {
    let prompt = non_empty("prompt", req.prompt)?;
    let state = app_state.threads.start_thread(user_id, prompt).await?;
    Ok((StatusCode::CREATED, Json(state)))
}

pub async fn get_thread_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(thread_id): Path<Uuid>,
) -> ApiResult<Json<ThreadState>> {
    Ok(Json(app_state.threads.thread_state(user_id, thread_id).await?))
}

pub async fn next_suggestions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(thread_id): Path<Uuid>,
    body: Option<Json<NextSuggestionsRequest>>,
) -> ApiResult<Json<Vec<RecipeSuggestion>>> {
    let revised = body
        .map(|Json(req)| req.prompt)
        .unwrap_or_default()
        .map(|p| non_empty("prompt", p))
        .transpose()?;
    let suggestions = app_state
        .threads
        .next_suggestions(user_id, thread_id, revised)
        .await?;
    Ok(Json(suggestions))
}

pub async fn accept_suggestion_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((thread_id, suggestion_id)): Path<(Uuid, String)>,
) -> ApiResult<impl IntoResponse> {
    let recipe = app_state
        .threads
        .accept_suggestion(user_id, thread_id, &suggestion_id)
        .await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn reject_suggestion_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((thread_id, suggestion_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<ThreadState>> {
    let state = app_state
        .threads
        .reject_suggestion(user_id, thread_id, &suggestion_id)
        .await?;
    Ok(Json(state))
}

pub async fn answer_question_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<QuestionRequest>,
) -> ApiResult<Json<AnswerResponse>> {
    let question = non_empty("question", req.question)?;
    let answer = app_state
        .threads
        .answer_question(user_id, thread_id, question)
        .await?;
    Ok(Json(AnswerResponse { answer }))
}

pub async fn accept_modification_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(thread_id): Path<Uuid>,
) -> ApiResult<Json<ThreadState>> {
    Ok(Json(app_state.threads.accept_modification(user_id, thread_id).await?))
}

pub async fn reject_modification_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(thread_id): Path<Uuid>,
) -> ApiResult<Json<ThreadState>> {
    Ok(Json(app_state.threads.reject_modification(user_id, thread_id).await?))
}

//=========================================================================================
// Recipes
//=========================================================================================

pub async fn modify_recipe_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(recipe_id): Path<Uuid>,
    Json(req): Json<PromptRequest>,
) -> ApiResult<Json<RecipeModification>> {
    let prompt = non_empty("prompt", req.prompt)?;
    let modification = app_state
        .threads
        .modify_recipe(user_id, recipe_id, prompt)
        .await?;
    Ok(Json(modification))
}

pub async fn list_recipes_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<UserRecipe>>> {
    Ok(Json(app_state.versioning.list_recipes(user_id).await?))
}

pub async fn get_recipe_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(recipe_id): Path<Uuid>,
) -> ApiResult<Json<UserRecipe>> {
    Ok(Json(app_state.versioning.get_recipe(user_id, recipe_id).await?))
}

pub async fn delete_recipe_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(recipe_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    app_state.versioning.delete_recipe(user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recipe_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(recipe_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RecipeVersion>>> {
    Ok(Json(app_state.versioning.history(user_id, recipe_id).await?))
}

pub async fn diff_versions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((from, to)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<RecipeDiff>> {
    Ok(Json(app_state.versioning.diff_versions(user_id, from, to).await?))
}
