//! crates/recipe_assistant_core/src/reducer.rs
//!
//! Folds a thread's event log into its current `ThreadState`.
//!
//! Reduction is pure: the only clock it sees is each event's own timestamp, and
//! the only logging it does goes to the span the caller hands in. Because past
//! entries are never mutated, folding a prefix and then the remaining tail gives
//! the same state as folding the whole log, so a caller may keep a snapshot and
//! replay only what was appended after it.

use crate::domain::{ChatMessage, ChatSource, RecipeSuggestion, ThreadState};
use crate::error::ThreadError;
use crate::events::{ThreadEvent, ThreadEventPayload};
use chrono::{DateTime, Utc};
use tracing::Span;
use uuid::Uuid;

/// Folds `events` on top of `prior` (or an empty thread when absent).
///
/// Fails on the first event whose tag is unknown, whose payload does not decode,
/// or which references a suggestion not folded so far. No partial state is
/// returned on failure.
pub fn reduce(
    span: &Span,
    thread_id: Uuid,
    events: &[ThreadEvent],
    prior: Option<&ThreadState>,
) -> Result<ThreadState, ThreadError> {
    let mut state = match prior {
        Some(prior) => ThreadState {
            id: thread_id,
            ..prior.clone()
        },
        None => ThreadState::empty(thread_id),
    };

    tracing::debug!(parent: span, %thread_id, event_count = events.len(), "reducing thread events");

    for (position, event) in events.iter().enumerate() {
        let payload = event.decode().map_err(|e| {
            tracing::error!(parent: span, %thread_id, position, event_type = %event.event_type, error = %e, "failed to decode thread event");
            e
        })?;
        tracing::trace!(parent: span, position, event_type = %event.event_type, "reducing thread event");
        apply(&mut state, payload, event.timestamp).map_err(|e| {
            tracing::error!(parent: span, %thread_id, position, error = %e, "failed to apply thread event");
            e
        })?;
    }

    Ok(state)
}

fn apply(
    state: &mut ThreadState,
    payload: ThreadEventPayload,
    at: DateTime<Utc>,
) -> Result<(), ThreadError> {
    state.updated_at = Some(at);

    match payload {
        ThreadEventPayload::PromptSet(p) => {
            state.original_prompt = p.prompt.clone();
            state.current_prompt = p.prompt;
            state.created_at = Some(at);
        }
        ThreadEventPayload::PromptEdited(p) => {
            state.current_prompt = p.prompt;
        }
        ThreadEventPayload::SuggestionGenerated(p) => {
            state.suggestions.push(RecipeSuggestion {
                id: p.suggestion_id,
                thread_id: state.id,
                recipe: p.recipe,
                response_text: p.response_text,
                accepted: false,
                rejected: false,
                created_at: at,
                updated_at: at,
            });
        }
        ThreadEventPayload::SuggestionAccepted(p) => {
            let suggestion = find_suggestion(state, &p.suggestion_id)?;
            suggestion.accepted = true;
            suggestion.updated_at = at;
            let recipe = suggestion.recipe.clone();
            state.current_recipe = Some(recipe);
        }
        ThreadEventPayload::SuggestionRejected(p) => {
            let suggestion = find_suggestion(state, &p.suggestion_id)?;
            suggestion.rejected = true;
            suggestion.updated_at = at;
        }
        ThreadEventPayload::RecipeModified(p) => {
            state.modified_recipe = Some(p.recipe);
        }
        ThreadEventPayload::RecipeModificationAccepted(_) => {
            state.current_recipe = state.modified_recipe.take();
        }
        ThreadEventPayload::RecipeModificationRejected(_) => {
            state.modified_recipe = None;
        }
        ThreadEventPayload::QuestionAnswered(p) => {
            state.chat_history.push(ChatMessage {
                source: ChatSource::User,
                message: p.question,
            });
            state.chat_history.push(ChatMessage {
                source: ChatSource::Assistant,
                message: p.answer,
            });
        }
    }

    Ok(())
}

fn find_suggestion<'a>(
    state: &'a mut ThreadState,
    suggestion_id: &str,
) -> Result<&'a mut RecipeSuggestion, ThreadError> {
    state
        .suggestions
        .iter_mut()
        .find(|s| s.id == suggestion_id)
        .ok_or_else(|| ThreadError::SuggestionNotFound(suggestion_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ingredient, MeasurementUnit, RecipeBody};
    use crate::events::{
        PromptEdited, PromptSet, QuestionAnswered, RecipeModificationAccepted,
        RecipeModificationRejected, RecipeModified, SuggestionAccepted, SuggestionGenerated,
        SuggestionRejected,
    };
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn recipe(title: &str) -> RecipeBody {
        RecipeBody {
            title: title.to_string(),
            description: format!("{} description", title),
            ingredients: vec![Ingredient::new(
                format!("{} ingredient", title),
                1.0,
                MeasurementUnit::Count,
            )],
            steps: vec![format!("{} step", title)],
            servings: 4,
            total_time_minutes: 30,
            image_url: None,
        }
    }

    /// Builds a log whose timestamps advance one minute per event.
    fn log(payloads: Vec<ThreadEventPayload>) -> Vec<ThreadEvent> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.into_event(start + Duration::minutes(i as i64)).unwrap())
            .collect()
    }

    fn generated(id: &str, title: &str) -> ThreadEventPayload {
        ThreadEventPayload::SuggestionGenerated(SuggestionGenerated {
            suggestion_id: id.to_string(),
            recipe: recipe(title),
            response_text: format!("How about {}?", title),
        })
    }

    fn full_conversation() -> Vec<ThreadEvent> {
        log(vec![
            ThreadEventPayload::PromptSet(PromptSet {
                prompt: "something italian".to_string(),
            }),
            generated("s1", "Veal Bolognese"),
            ThreadEventPayload::PromptEdited(PromptEdited {
                prompt: "something italian, no meat".to_string(),
            }),
            generated("s2", "Mushroom Risotto"),
            ThreadEventPayload::SuggestionRejected(SuggestionRejected {
                suggestion_id: "s1".to_string(),
            }),
            ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
                suggestion_id: "s2".to_string(),
                recipe_id: None,
            }),
            ThreadEventPayload::RecipeModified(RecipeModified {
                recipe: recipe("Vegan Mushroom Risotto"),
            }),
            ThreadEventPayload::RecipeModificationAccepted(RecipeModificationAccepted {}),
            ThreadEventPayload::QuestionAnswered(QuestionAnswered {
                question: "Can I use arborio?".to_string(),
                answer: "Arborio is the classic choice.".to_string(),
            }),
            ThreadEventPayload::RecipeModified(RecipeModified {
                recipe: recipe("Risotto with Peas"),
            }),
        ])
    }

    fn reduce_all(events: &[ThreadEvent], prior: Option<&ThreadState>) -> Result<ThreadState, ThreadError> {
        reduce(&Span::none(), Uuid::nil(), events, prior)
    }

    #[test]
    fn prompt_and_first_suggestion() {
        let events = log(vec![
            ThreadEventPayload::PromptSet(PromptSet {
                prompt: "beef tacos".to_string(),
            }),
            ThreadEventPayload::SuggestionGenerated(SuggestionGenerated {
                suggestion_id: "s1".to_string(),
                recipe: recipe("Beef Stroganoff"),
                response_text: "How about Beef Stroganoff?".to_string(),
            }),
        ]);

        let state = reduce_all(&events, None).unwrap();

        assert_eq!(state.original_prompt, "beef tacos");
        assert_eq!(state.current_prompt, "beef tacos");
        assert_eq!(state.suggestions.len(), 1);
        assert!(!state.suggestions[0].accepted);
        assert!(!state.suggestions[0].rejected);
        assert_eq!(state.suggestions[0].thread_id, Uuid::nil());
        assert_eq!(state.created_at, Some(events[0].timestamp));
        assert_eq!(state.updated_at, Some(events[1].timestamp));
    }

    #[test]
    fn full_conversation_folds_every_transition() {
        let events = full_conversation();
        let state = reduce_all(&events, None).unwrap();

        assert_eq!(state.original_prompt, "something italian");
        assert_eq!(state.current_prompt, "something italian, no meat");

        let ids: Vec<&str> = state.suggestions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
        assert!(state.suggestions[0].rejected && !state.suggestions[0].accepted);
        assert!(state.suggestions[1].accepted && !state.suggestions[1].rejected);
        assert_eq!(state.suggestions[1].updated_at, events[5].timestamp);

        assert_eq!(
            state.current_recipe.as_ref().map(|r| r.title.as_str()),
            Some("Vegan Mushroom Risotto")
        );
        assert_eq!(
            state.modified_recipe.as_ref().map(|r| r.title.as_str()),
            Some("Risotto with Peas")
        );

        assert_eq!(
            state.chat_history,
            vec![
                ChatMessage {
                    source: ChatSource::User,
                    message: "Can I use arborio?".to_string(),
                },
                ChatMessage {
                    source: ChatSource::Assistant,
                    message: "Arborio is the classic choice.".to_string(),
                },
            ]
        );
        assert_eq!(state.updated_at, events.last().map(|e| e.timestamp));
    }

    #[test]
    fn rejected_modification_keeps_current_recipe() {
        let events = log(vec![
            ThreadEventPayload::PromptSet(PromptSet {
                prompt: "soup".to_string(),
            }),
            generated("s1", "Tomato Soup"),
            ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
                suggestion_id: "s1".to_string(),
                recipe_id: None,
            }),
            ThreadEventPayload::RecipeModified(RecipeModified {
                recipe: recipe("Spicy Tomato Soup"),
            }),
            ThreadEventPayload::RecipeModificationRejected(RecipeModificationRejected {}),
        ]);

        let state = reduce_all(&events, None).unwrap();

        assert_eq!(state.current_recipe, Some(recipe("Tomato Soup")));
        assert_eq!(state.modified_recipe, None);
    }

    #[test]
    fn more_than_one_suggestion_may_be_accepted() {
        let events = log(vec![
            generated("s1", "Pho"),
            generated("s2", "Ramen"),
            ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
                suggestion_id: "s1".to_string(),
                recipe_id: None,
            }),
            ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
                suggestion_id: "s2".to_string(),
                recipe_id: None,
            }),
        ]);

        let state = reduce_all(&events, None).unwrap();

        assert!(state.suggestions.iter().all(|s| s.accepted));
        assert_eq!(state.current_recipe, Some(recipe("Ramen")));
        assert_eq!(state.created_at, None);
    }

    #[test]
    fn folding_in_two_steps_matches_folding_at_once() {
        let events = full_conversation();
        let whole = reduce_all(&events, None).unwrap();

        for k in 0..=events.len() {
            let head = reduce_all(&events[..k], None).unwrap();
            let resumed = reduce_all(&events[k..], Some(&head)).unwrap();
            assert_eq!(resumed, whole, "split at {}", k);
        }
    }

    #[test]
    fn empty_log_without_prior_is_an_empty_thread() {
        let state = reduce_all(&[], None).unwrap();
        assert_eq!(state, ThreadState::empty(Uuid::nil()));
    }

    #[test]
    fn unknown_event_type_fails_the_whole_fold() {
        let mut events = log(vec![ThreadEventPayload::PromptSet(PromptSet {
            prompt: "pasta".to_string(),
        })]);
        events.push(ThreadEvent {
            event_type: "RecipeDeleted".to_string(),
            payload: json!({}),
            timestamp: Utc::now(),
        });

        let err = reduce_all(&events, None).unwrap_err();
        assert!(matches!(err, ThreadError::InvalidEventType(_)));
    }

    #[test]
    fn malformed_payload_is_reported_as_such() {
        let events = vec![ThreadEvent {
            event_type: "SuggestionGenerated".to_string(),
            payload: json!({ "suggestion_id": "s1", "response_text": "no recipe here" }),
            timestamp: Utc::now(),
        }];

        let err = reduce_all(&events, None).unwrap_err();
        assert!(matches!(err, ThreadError::InvalidEventPayload { .. }));
    }

    #[test]
    fn accepting_an_unknown_suggestion_fails() {
        let prior = reduce_all(&log(vec![generated("s1", "Curry")]), None).unwrap();
        let events = log(vec![ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
            suggestion_id: "s-unknown".to_string(),
            recipe_id: None,
        })]);

        let err = reduce_all(&events, Some(&prior)).unwrap_err();
        assert!(matches!(err, ThreadError::SuggestionNotFound(id) if id == "s-unknown"));
    }

    #[test]
    fn rejecting_an_unknown_suggestion_fails() {
        let events = log(vec![ThreadEventPayload::SuggestionRejected(SuggestionRejected {
            suggestion_id: "s9".to_string(),
        })]);

        let err = reduce_all(&events, None).unwrap_err();
        assert!(matches!(err, ThreadError::SuggestionNotFound(_)));
    }

    #[test]
    fn suggestions_are_only_referenced_once_folded() {
        // The acceptance precedes the generation in log order.
        let events = log(vec![
            ThreadEventPayload::SuggestionAccepted(SuggestionAccepted {
                suggestion_id: "s1".to_string(),
                recipe_id: None,
            }),
            generated("s1", "Paella"),
        ]);

        assert!(reduce_all(&events, None).is_err());
    }
}
