//! crates/recipe_assistant_core/src/orchestrator.rs
//!
//! Coordinates suggestion threads: calls the generation service, appends events to
//! the thread log and drives recipe versioning when the user settles on a recipe.
//!
//! Every operation runs inside one store transaction. Appends are
//! compare-and-append against the log length observed when the thread was read,
//! so two callers racing on the same thread cannot both build on a stale view.

use crate::diff::{diff, RecipeDiff};
use crate::domain::{RecipeBody, RecipeSuggestion, ThreadState, UserRecipe};
use crate::error::{ServiceError, ServiceResult, ThreadError};
use crate::events::{
    PromptEdited, PromptSet, QuestionAnswered, RecipeModificationAccepted,
    RecipeModificationRejected, RecipeModified, SuggestionAccepted, SuggestionGenerated,
    SuggestionRejected, ThreadEvent, ThreadEventPayload,
};
use crate::ports::{
    AnswerRequest, GeneratedSuggestion, ModifyRequest, PortError, RecipeGenerationService,
    StoreService, StoreTransaction, SuggestRequest, ThreadRecord,
};
use crate::profiles::load_profile;
use crate::reducer::reduce;
use crate::versioning::RecipeVersioning;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument, Span};
use uuid::Uuid;

/// The result of modifying a recipe through chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeModification {
    pub current_recipe: RecipeBody,
    pub diff: RecipeDiff,
    pub response_text: String,
}

#[derive(Clone)]
pub struct ThreadService {
    store: Arc<dyn StoreService>,
    generator: Arc<dyn RecipeGenerationService>,
    span: Span,
}

/// A thread loaded and reduced inside a transaction, plus the log length the
/// next append must match.
struct LoadedThread {
    record: ThreadRecord,
    state: ThreadState,
}

impl LoadedThread {
    fn log_len(&self) -> usize {
        self.record.events.len()
    }
}

fn encode(payload: ThreadEventPayload) -> ServiceResult<ThreadEvent> {
    let event_type = payload.event_type();
    payload
        .into_event(Utc::now())
        .map_err(|source| {
            ServiceError::Thread(ThreadError::InvalidEventPayload {
                event_type: event_type.to_string(),
                source,
            })
        })
}

/// Settling a modification with none pending would wipe `current_recipe` from
/// the folded state while the stored recipe keeps its body.
fn require_pending_modification(state: &ThreadState) -> ServiceResult<()> {
    match state.modified_recipe {
        Some(_) => Ok(()),
        None => Err(ServiceError::NoPendingModification(state.id)),
    }
}

fn suggestion_events(suggestions: Vec<GeneratedSuggestion>) -> ServiceResult<Vec<ThreadEvent>> {
    suggestions
        .into_iter()
        .map(|s| {
            encode(ThreadEventPayload::SuggestionGenerated(SuggestionGenerated {
                suggestion_id: Uuid::new_v4().to_string(),
                recipe: s.recipe,
                response_text: s.response_text,
            }))
        })
        .collect()
}

impl ThreadService {
    pub fn new(
        store: Arc<dyn StoreService>,
        generator: Arc<dyn RecipeGenerationService>,
        span: Span,
    ) -> Self {
        Self {
            store,
            generator,
            span,
        }
    }

    async fn begin(&self) -> ServiceResult<Box<dyn StoreTransaction>> {
        self.store
            .begin()
            .await
            .map_err(ServiceError::store("begin transaction"))
    }

    /// Reads a thread owned by `user_id` and folds its log.
    async fn load(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: Uuid,
        thread_id: Uuid,
    ) -> ServiceResult<LoadedThread> {
        let record = tx.get_thread(thread_id).await.map_err(|e| match e {
            PortError::NotFound(_) => ServiceError::ThreadNotFound(thread_id),
            other => ServiceError::Store {
                context: "get thread",
                source: other,
            },
        })?;
        if record.user_id != user_id {
            return Err(ServiceError::ThreadNotFound(thread_id));
        }
        let state = reduce(&Span::current(), thread_id, &record.events, None)?;
        Ok(LoadedThread { record, state })
    }

    async fn append(
        tx: &mut dyn StoreTransaction,
        thread: &LoadedThread,
        events: &[ThreadEvent],
    ) -> ServiceResult<()> {
        let thread_id = thread.record.id;
        tx.append_to_thread(thread_id, thread.log_len(), events)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ServiceError::ThreadConflict(thread_id),
                PortError::NotFound(_) => ServiceError::ThreadNotFound(thread_id),
                other => ServiceError::Store {
                    context: "append to thread",
                    source: other,
                },
            })?;
        debug!(%thread_id, appended = events.len(), "appended events to thread");
        Ok(())
    }

    /// Starts a thread from an initial prompt and the first batch of suggestions.
    pub async fn start_thread(&self, user_id: Uuid, prompt: String) -> ServiceResult<ThreadState> {
        let thread_id = Uuid::new_v4();
        let span = info_span!(parent: &self.span, "start_thread", %user_id, %thread_id);
        async {
            let mut tx = self.begin().await?;
            let profile = load_profile(tx.as_mut(), user_id).await?;

            let request = SuggestRequest {
                message: prompt.clone(),
                profile,
                history: Vec::new(),
            };
            let suggestions = self
                .generator
                .suggest(&request)
                .await
                .map_err(ServiceError::generation("generate recipe suggestions"))?;
            debug!(count = suggestions.len(), "generated recipe suggestions");

            let mut events = vec![encode(ThreadEventPayload::PromptSet(PromptSet { prompt }))?];
            events.extend(suggestion_events(suggestions)?);

            tx.create_thread(user_id, thread_id, &events)
                .await
                .map_err(ServiceError::store("save thread"))?;
            let state = reduce(&Span::current(), thread_id, &events, None)?;
            tx.commit().await.map_err(ServiceError::store("commit new thread"))?;

            info!("started suggestion thread");
            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Generates further suggestions, optionally revising the prompt first.
    ///
    /// Returns only the suggestions produced by this call.
    pub async fn next_suggestions(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        revised_prompt: Option<String>,
    ) -> ServiceResult<Vec<RecipeSuggestion>> {
        let span = info_span!(parent: &self.span, "next_suggestions", %user_id, %thread_id);
        async {
            let mut tx = self.begin().await?;
            let profile = load_profile(tx.as_mut(), user_id).await?;
            let mut thread = self.load(tx.as_mut(), user_id, thread_id).await?;

            if let Some(prompt) = revised_prompt {
                let edit = encode(ThreadEventPayload::PromptEdited(PromptEdited { prompt }))?;
                Self::append(tx.as_mut(), &thread, std::slice::from_ref(&edit)).await?;
                thread.state = reduce(
                    &Span::current(),
                    thread_id,
                    std::slice::from_ref(&edit),
                    Some(&thread.state),
                )?;
                thread.record.events.push(edit);
            }

            let request = SuggestRequest {
                message: thread.state.current_prompt.clone(),
                profile,
                history: thread.state.suggestion_titles(),
            };
            let suggestions = self
                .generator
                .suggest(&request)
                .await
                .map_err(ServiceError::generation("generate recipe suggestions"))?;

            let events = suggestion_events(suggestions)?;
            Self::append(tx.as_mut(), &thread, &events).await?;
            let state = reduce(&Span::current(), thread_id, &events, Some(&thread.state))?;
            tx.commit().await.map_err(ServiceError::store("commit new suggestions"))?;

            let fresh = state.suggestions.len() - events.len();
            Ok(state.suggestions[fresh..].to_vec())
        }
        .instrument(span)
        .await
    }

    /// Turns a suggestion into a user recipe and ties the thread to it.
    pub async fn accept_suggestion(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        suggestion_id: &str,
    ) -> ServiceResult<UserRecipe> {
        let span = info_span!(parent: &self.span, "accept_suggestion", %user_id, %thread_id, suggestion_id);
        async {
            let mut tx = self.begin().await?;
            let thread = self.load(tx.as_mut(), user_id, thread_id).await?;
            let suggestion = thread
                .state
                .suggestion(suggestion_id)
                .ok_or_else(|| ThreadError::SuggestionNotFound(suggestion_id.to_string()))?;

            let recipe = RecipeVersioning::create_recipe_in(
                tx.as_mut(),
                user_id,
                Some(thread_id),
                suggestion.recipe.clone(),
            )
            .await?;
            tx.associate_thread_with_recipe(thread_id, recipe.id)
                .await
                .map_err(ServiceError::store("associate thread with recipe"))?;

            let accepted = encode(ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
                suggestion_id: suggestion_id.to_string(),
                recipe_id: Some(recipe.id),
            }))?;
            Self::append(tx.as_mut(), &thread, &[accepted]).await?;
            tx.commit().await.map_err(ServiceError::store("commit accepted suggestion"))?;

            info!(recipe_id = %recipe.id, "accepted suggestion");
            Ok(recipe)
        }
        .instrument(span)
        .await
    }

    pub async fn reject_suggestion(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        suggestion_id: &str,
    ) -> ServiceResult<ThreadState> {
        let span = info_span!(parent: &self.span, "reject_suggestion", %user_id, %thread_id, suggestion_id);
        async {
            let rejected = encode(ThreadEventPayload::SuggestionRejected(SuggestionRejected {
                suggestion_id: suggestion_id.to_string(),
            }))?;
            self.record_decision(user_id, thread_id, rejected, |_| Ok(())).await
        }
        .instrument(span)
        .await
    }

    /// Rewrites a user recipe from a chat instruction and records the result as a
    /// new version.
    pub async fn modify_recipe(
        &self,
        user_id: Uuid,
        recipe_id: Uuid,
        prompt: String,
    ) -> ServiceResult<RecipeModification> {
        let span = info_span!(parent: &self.span, "modify_recipe", %user_id, %recipe_id);
        async {
            let mut tx = self.begin().await?;
            let profile = load_profile(tx.as_mut(), user_id).await?;
            let recipe = tx
                .get_user_recipe(user_id, recipe_id)
                .await
                .map_err(|e| match e {
                    PortError::NotFound(_) => ServiceError::RecipeNotFound(recipe_id),
                    other => ServiceError::Store {
                        context: "get user recipe",
                        source: other,
                    },
                })?;
            let thread = match recipe.thread_id {
                Some(thread_id) => Some(self.load(tx.as_mut(), user_id, thread_id).await?),
                None => None,
            };

            let request = ModifyRequest {
                message: prompt.clone(),
                recipe: recipe.body.clone(),
                profile,
            };
            let response = self
                .generator
                .modify(&request)
                .await
                .map_err(ServiceError::generation("modify recipe"))?;
            debug!("generated recipe modification");

            if let Some(thread) = &thread {
                let modified = encode(ThreadEventPayload::RecipeModified(RecipeModified {
                    recipe: response.new_recipe.clone(),
                }))?;
                Self::append(tx.as_mut(), thread, &[modified]).await?;
            }
            RecipeVersioning::update_recipe_in(
                tx.as_mut(),
                user_id,
                recipe_id,
                response.new_recipe.clone(),
                Some(prompt),
            )
            .await?;
            tx.commit().await.map_err(ServiceError::store("commit recipe modification"))?;

            Ok(RecipeModification {
                diff: diff(&recipe.body, &response.new_recipe),
                current_recipe: response.new_recipe,
                response_text: response.response_text,
            })
        }
        .instrument(span)
        .await
    }

    pub async fn accept_modification(&self, user_id: Uuid, thread_id: Uuid) -> ServiceResult<ThreadState> {
        let span = info_span!(parent: &self.span, "accept_modification", %user_id, %thread_id);
        async {
            let event = encode(ThreadEventPayload::RecipeModificationAccepted(
                RecipeModificationAccepted {},
            ))?;
            self.record_decision(user_id, thread_id, event, require_pending_modification)
                .await
        }
        .instrument(span)
        .await
    }

    pub async fn reject_modification(&self, user_id: Uuid, thread_id: Uuid) -> ServiceResult<ThreadState> {
        let span = info_span!(parent: &self.span, "reject_modification", %user_id, %thread_id);
        async {
            let event = encode(ThreadEventPayload::RecipeModificationRejected(
                RecipeModificationRejected {},
            ))?;
            self.record_decision(user_id, thread_id, event, require_pending_modification)
                .await
        }
        .instrument(span)
        .await
    }

    /// Answers a cooking question about the recipe the thread produced.
    pub async fn answer_question(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        question: String,
    ) -> ServiceResult<String> {
        let span = info_span!(parent: &self.span, "answer_question", %user_id, %thread_id);
        async {
            let mut tx = self.begin().await?;
            let profile = load_profile(tx.as_mut(), user_id).await?;
            let thread = self.load(tx.as_mut(), user_id, thread_id).await?;
            let recipe_id = thread
                .record
                .recipe_id
                .ok_or(ServiceError::ThreadNotAssociatedWithRecipe(thread_id))?;
            let recipe = tx
                .get_user_recipe(user_id, recipe_id)
                .await
                .map_err(|e| match e {
                    PortError::NotFound(_) => ServiceError::RecipeNotFound(recipe_id),
                    other => ServiceError::Store {
                        context: "get user recipe",
                        source: other,
                    },
                })?;

            let request = AnswerRequest {
                question: question.clone(),
                recipe: recipe.body,
                profile,
            };
            let answer = self
                .generator
                .answer(&request)
                .await
                .map_err(ServiceError::generation("answer cooking question"))?;

            let event = encode(ThreadEventPayload::QuestionAnswered(QuestionAnswered {
                question,
                answer: answer.clone(),
            }))?;
            Self::append(tx.as_mut(), &thread, &[event]).await?;
            tx.commit().await.map_err(ServiceError::store("commit answered question"))?;

            debug!("answered cooking question");
            Ok(answer)
        }
        .instrument(span)
        .await
    }

    /// The current state of a thread, replayed from its full log.
    pub async fn thread_state(&self, user_id: Uuid, thread_id: Uuid) -> ServiceResult<ThreadState> {
        let span = info_span!(parent: &self.span, "thread_state", %user_id, %thread_id);
        async {
            let mut tx = self.begin().await?;
            let thread = self.load(tx.as_mut(), user_id, thread_id).await?;
            Ok(thread.state)
        }
        .instrument(span)
        .await
    }

    /// Appends a single decision event after `precondition` accepts the current
    /// state and the event folds cleanly onto it, and returns the resulting state.
    async fn record_decision<F>(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        event: ThreadEvent,
        precondition: F,
    ) -> ServiceResult<ThreadState>
    where
        F: FnOnce(&ThreadState) -> ServiceResult<()> + Send,
    {
        let mut tx = self.begin().await?;
        let thread = self.load(tx.as_mut(), user_id, thread_id).await?;
        precondition(&thread.state)?;
        let events = [event];
        let state = reduce(&Span::current(), thread_id, &events, Some(&thread.state))?;
        Self::append(tx.as_mut(), &thread, &events).await?;
        tx.commit().await.map_err(ServiceError::store("commit thread event"))?;
        Ok(state)
    }
}
