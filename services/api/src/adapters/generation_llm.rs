//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the recipe-generating LLM.
//! It implements the `RecipeGenerationService` port from the `core` crate.

const SUGGEST_INSTRUCTIONS: &str = r#"You are a friendly cooking assistant who proposes recipes.

Propose exactly {count} distinct recipes that fit the user's request and cooking profile.
Never propose a recipe whose title appears in the ALREADY SUGGESTED list.
Respect every allergy and diet in the profile, and only use the listed equipment when equipment is given.

Respond with JSON only, in this exact shape:
{"suggestions":[{"response_text":"<one or two friendly sentences introducing the recipe>","recipe":<RECIPE>}]}

RECIPE is an object with these fields:
- "title": string
- "description": string
- "ingredients": array of {"name": string, "quantity": number, "unit": one of "g","ml","tsp","tbsp","cup","oz","lb","count"}
- "steps": array of strings, one instruction per entry
- "servings": integer
- "total_time_minutes": integer"#;

const MODIFY_INSTRUCTIONS: &str = r#"You are a friendly cooking assistant who adapts recipes.

Rewrite the CURRENT RECIPE following the user's instruction and cooking profile. Keep everything the instruction does not ask to change.

Respond with JSON only, in this exact shape:
{"response_text":"<one or two friendly sentences describing what changed>","new_recipe":<RECIPE>}

RECIPE has the same fields as the CURRENT RECIPE: "title", "description", "ingredients" (each {"name","quantity","unit"} with unit one of "g","ml","tsp","tbsp","cup","oz","lb","count"), "steps", "servings", "total_time_minutes"."#;

const ANSWER_INSTRUCTIONS: &str = r#"You are a friendly cooking assistant answering questions about a recipe the user is cooking.

Answer in plain text, conversationally and briefly. Use the recipe and the user's cooking profile when they help. Mention any allergy in the profile the answer touches on."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use recipe_assistant_core::{
    domain::{Profile, RecipeBody},
    ports::{
        AnswerRequest, GeneratedSuggestion, ModifyRequest, ModifyResponse, PortError, PortResult,
        RecipeGenerationService, SuggestRequest,
    },
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `RecipeGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiRecipeAdapter {
    client: Client<OpenAIConfig>,
    suggest_model: String,
    modify_model: String,
    answer_model: String,
    suggestion_count: u8,
}

impl OpenAiRecipeAdapter {
    /// Creates a new `OpenAiRecipeAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        suggest_model: String,
        modify_model: String,
        answer_model: String,
        suggestion_count: u8,
    ) -> Self {
        Self {
            client,
            suggest_model,
            modify_model,
            answer_model,
            suggestion_count,
        }
    }

    /// Sends one system and one user message and returns the text of the first choice.
    async fn complete(&self, model: &str, system: &str, user: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Recipe generation LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Recipe generation LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}

//=========================================================================================
// Prompt Rendering and Response Parsing
//=========================================================================================

#[derive(Deserialize)]
struct SuggestionsReply {
    suggestions: Vec<SuggestionReply>,
}

#[derive(Deserialize)]
struct SuggestionReply {
    response_text: String,
    recipe: RecipeBody,
}

#[derive(Debug, Deserialize)]
struct ModifyReply {
    response_text: String,
    new_recipe: RecipeBody,
}

fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn render_profile(profile: &Profile) -> String {
    format!(
        "COOKING PROFILE:\nName: {}\nSkill: {}\nFavourite cuisines: {}\nDiets: {}\nEquipment: {}\nAllergies: {}",
        profile.name,
        profile.skill.as_str(),
        render_list(&profile.cuisines),
        render_list(&profile.diets),
        render_list(&profile.equipment),
        render_list(&profile.allergies),
    )
}

fn render_recipe(recipe: &RecipeBody) -> PortResult<String> {
    serde_json::to_string_pretty(recipe).map_err(|e| PortError::Unexpected(e.to_string()))
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_reply<T: DeserializeOwned>(raw: &str) -> PortResult<T> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| {
        warn!("Could not parse recipe generation reply: {}", e);
        PortError::Unexpected(format!("Recipe generation reply was not valid JSON: {}", e))
    })
}

//=========================================================================================
// `RecipeGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecipeGenerationService for OpenAiRecipeAdapter {
    async fn suggest(&self, request: &SuggestRequest) -> PortResult<Vec<GeneratedSuggestion>> {
        let system = SUGGEST_INSTRUCTIONS.replace("{count}", &self.suggestion_count.to_string());
        let user = format!(
            "{}\n\nALREADY SUGGESTED: {}\n\nREQUEST:\n{}",
            render_profile(&request.profile),
            render_list(&request.history),
            request.message
        );

        let raw = self.complete(&self.suggest_model, &system, user).await?;
        let reply: SuggestionsReply = parse_reply(&raw)?;
        if reply.suggestions.is_empty() {
            return Err(PortError::Unexpected(
                "Recipe generation LLM returned no suggestions.".to_string(),
            ));
        }
        debug!(count = reply.suggestions.len(), "parsed recipe suggestions");

        Ok(reply
            .suggestions
            .into_iter()
            .map(|s| GeneratedSuggestion {
                response_text: s.response_text,
                recipe: s.recipe,
            })
            .collect())
    }

    async fn modify(&self, request: &ModifyRequest) -> PortResult<ModifyResponse> {
        let user = format!(
            "{}\n\nCURRENT RECIPE:\n{}\n\nINSTRUCTION:\n{}",
            render_profile(&request.profile),
            render_recipe(&request.recipe)?,
            request.message
        );

        let raw = self.complete(&self.modify_model, MODIFY_INSTRUCTIONS, user).await?;
        let reply: ModifyReply = parse_reply(&raw)?;
        Ok(ModifyResponse {
            response_text: reply.response_text,
            new_recipe: reply.new_recipe,
        })
    }

    async fn answer(&self, request: &AnswerRequest) -> PortResult<String> {
        let user = format!(
            "{}\n\nRECIPE:\n{}\n\nQUESTION:\n{}",
            render_profile(&request.profile),
            render_recipe(&request.recipe)?,
            request.question
        );

        let raw = self.complete(&self.answer_model, ANSWER_INSTRUCTIONS, user).await?;
        Ok(raw.trim().to_string())
    }
}
