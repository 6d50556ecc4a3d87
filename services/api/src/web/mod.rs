pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_user;
use state::AppState;

/// Builds every route of the service. All of them require the `x-user-id` header.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/profile",
            get(rest::get_profile_handler).put(rest::put_profile_handler),
        )
        .route("/threads", post(rest::start_thread_handler))
        .route("/threads/{id}", get(rest::get_thread_handler))
        .route("/threads/{id}/suggestions", post(rest::next_suggestions_handler))
        .route(
            "/threads/{id}/suggestions/{suggestion_id}/accept",
            post(rest::accept_suggestion_handler),
        )
        .route(
            "/threads/{id}/suggestions/{suggestion_id}/reject",
            post(rest::reject_suggestion_handler),
        )
        .route("/threads/{id}/questions", post(rest::answer_question_handler))
        .route(
            "/threads/{id}/modification/accept",
            post(rest::accept_modification_handler),
        )
        .route(
            "/threads/{id}/modification/reject",
            post(rest::reject_modification_handler),
        )
        .route("/recipes", get(rest::list_recipes_handler))
        .route(
            "/recipes/{id}",
            get(rest::get_recipe_handler).delete(rest::delete_recipe_handler),
        )
        .route("/recipes/{id}/modify", post(rest::modify_recipe_handler))
        .route("/recipes/{id}/versions", get(rest::recipe_history_handler))
        .route(
            "/recipes/versions/{from}/diff/{to}",
            get(rest::diff_versions_handler),
        )
        .layer(axum_middleware::from_fn(require_user))
        .with_state(app_state)
}
