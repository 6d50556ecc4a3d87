//! crates/recipe_assistant_core/src/events.rs
//!
//! The thread event model. Events are persisted as a type tag plus an opaque JSON
//! payload; the payload is only decoded against its tag when the log is folded.

use crate::domain::RecipeBody;
use crate::error::ThreadError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Wire Form
//=========================================================================================

/// A thread event as it is stored: `{type, payload, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ThreadEvent {
    /// Decodes the payload against the declared type tag.
    pub fn decode(&self) -> Result<ThreadEventPayload, ThreadError> {
        let kind: ThreadEventType = self.event_type.parse()?;
        ThreadEventPayload::from_parts(kind, &self.payload)
    }
}

//=========================================================================================
// Type Tags
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadEventType {
    PromptSet,
    PromptEdited,
    SuggestionGenerated,
    SuggestionAccepted,
    SuggestionRejected,
    RecipeModified,
    RecipeModificationAccepted,
    RecipeModificationRejected,
    QuestionAnswered,
}

impl ThreadEventType {
    pub const ALL: [ThreadEventType; 9] = [
        ThreadEventType::PromptSet,
        ThreadEventType::PromptEdited,
        ThreadEventType::SuggestionGenerated,
        ThreadEventType::SuggestionAccepted,
        ThreadEventType::SuggestionRejected,
        ThreadEventType::RecipeModified,
        ThreadEventType::RecipeModificationAccepted,
        ThreadEventType::RecipeModificationRejected,
        ThreadEventType::QuestionAnswered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadEventType::PromptSet => "PromptSet",
            ThreadEventType::PromptEdited => "PromptEdited",
            ThreadEventType::SuggestionGenerated => "SuggestionGenerated",
            ThreadEventType::SuggestionAccepted => "SuggestionAccepted",
            ThreadEventType::SuggestionRejected => "SuggestionRejected",
            ThreadEventType::RecipeModified => "RecipeModified",
            ThreadEventType::RecipeModificationAccepted => "RecipeModificationAccepted",
            ThreadEventType::RecipeModificationRejected => "RecipeModificationRejected",
            ThreadEventType::QuestionAnswered => "QuestionAnswered",
        }
    }
}

impl fmt::Display for ThreadEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadEventType {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ThreadError::InvalidEventType(s.to_string()))
    }
}

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSet {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEdited {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionGenerated {
    pub suggestion_id: String,
    pub recipe: RecipeBody,
    pub response_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionAccepted {
    pub suggestion_id: String,
    /// The user recipe created from the suggestion, when one was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRejected {
    pub suggestion_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeModified {
    pub recipe: RecipeBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeModificationAccepted {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeModificationRejected {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswered {
    pub question: String,
    pub answer: String,
}

/// A decoded event payload, one variant per type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEventPayload {
    PromptSet(PromptSet),
    PromptEdited(PromptEdited),
    SuggestionGenerated(SuggestionGenerated),
    SuggestionAccepted(SuggestionAccepted),
    SuggestionRejected(SuggestionRejected),
    RecipeModified(RecipeModified),
    RecipeModificationAccepted(RecipeModificationAccepted),
    RecipeModificationRejected(RecipeModificationRejected),
    QuestionAnswered(QuestionAnswered),
}

fn decode_as<T: DeserializeOwned>(
    kind: ThreadEventType,
    payload: &serde_json::Value,
) -> Result<T, ThreadError> {
    T::deserialize(payload).map_err(|source| ThreadError::InvalidEventPayload {
        event_type: kind.as_str().to_string(),
        source,
    })
}

impl ThreadEventPayload {
    fn from_parts(kind: ThreadEventType, payload: &serde_json::Value) -> Result<Self, ThreadError> {
        use ThreadEventPayload as P;
        Ok(match kind {
            ThreadEventType::PromptSet => P::PromptSet(decode_as(kind, payload)?),
            ThreadEventType::PromptEdited => P::PromptEdited(decode_as(kind, payload)?),
            ThreadEventType::SuggestionGenerated => {
                P::SuggestionGenerated(decode_as(kind, payload)?)
            }
            ThreadEventType::SuggestionAccepted => P::SuggestionAccepted(decode_as(kind, payload)?),
            ThreadEventType::SuggestionRejected => P::SuggestionRejected(decode_as(kind, payload)?),
            ThreadEventType::RecipeModified => P::RecipeModified(decode_as(kind, payload)?),
            ThreadEventType::RecipeModificationAccepted => {
                P::RecipeModificationAccepted(decode_as(kind, payload)?)
            }
            ThreadEventType::RecipeModificationRejected => {
                P::RecipeModificationRejected(decode_as(kind, payload)?)
            }
            ThreadEventType::QuestionAnswered => P::QuestionAnswered(decode_as(kind, payload)?),
        })
    }

    pub fn event_type(&self) -> ThreadEventType {
        match self {
            ThreadEventPayload::PromptSet(_) => ThreadEventType::PromptSet,
            ThreadEventPayload::PromptEdited(_) => ThreadEventType::PromptEdited,
            ThreadEventPayload::SuggestionGenerated(_) => ThreadEventType::SuggestionGenerated,
            ThreadEventPayload::SuggestionAccepted(_) => ThreadEventType::SuggestionAccepted,
            ThreadEventPayload::SuggestionRejected(_) => ThreadEventType::SuggestionRejected,
            ThreadEventPayload::RecipeModified(_) => ThreadEventType::RecipeModified,
            ThreadEventPayload::RecipeModificationAccepted(_) => {
                ThreadEventType::RecipeModificationAccepted
            }
            ThreadEventPayload::RecipeModificationRejected(_) => {
                ThreadEventType::RecipeModificationRejected
            }
            ThreadEventPayload::QuestionAnswered(_) => ThreadEventType::QuestionAnswered,
        }
    }

    /// Encodes the payload into its stored form.
    pub fn into_event(self, timestamp: DateTime<Utc>) -> Result<ThreadEvent, serde_json::Error> {
        let event_type = self.event_type().as_str().to_string();
        let payload = match self {
            ThreadEventPayload::PromptSet(p) => serde_json::to_value(p)?,
            ThreadEventPayload::PromptEdited(p) => serde_json::to_value(p)?,
            ThreadEventPayload::SuggestionGenerated(p) => serde_json::to_value(p)?,
            ThreadEventPayload::SuggestionAccepted(p) => serde_json::to_value(p)?,
            ThreadEventPayload::SuggestionRejected(p) => serde_json::to_value(p)?,
            ThreadEventPayload::RecipeModified(p) => serde_json::to_value(p)?,
            ThreadEventPayload::RecipeModificationAccepted(p) => serde_json::to_value(p)?,
            ThreadEventPayload::RecipeModificationRejected(p) => serde_json::to_value(p)?,
            ThreadEventPayload::QuestionAnswered(p) => serde_json::to_value(p)?,
        };
        Ok(ThreadEvent {
            event_type,
            payload,
            timestamp,
        })
    }
}
