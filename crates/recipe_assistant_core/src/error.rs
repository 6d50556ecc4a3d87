//! crates/recipe_assistant_core/src/error.rs
//!
//! Error types raised by the reducer and by the services built on top of the ports.

use crate::ports::PortError;
use uuid::Uuid;

/// Failures while folding a thread's event log.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("invalid thread event type: {0}")]
    InvalidEventType(String),

    #[error("invalid payload for {event_type} event: {source}")]
    InvalidEventPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("suggestion {0} not found")]
    SuggestionNotFound(String),
}

/// The error type for the orchestrator and recipe versioning.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("thread {0} not found")]
    ThreadNotFound(Uuid),

    #[error("recipe {0} not found")]
    RecipeNotFound(Uuid),

    #[error("recipe version {0} not found")]
    RecipeVersionNotFound(Uuid),

    #[error("profile for user {0} not found")]
    ProfileNotFound(Uuid),

    #[error("thread {0} is not associated with a recipe")]
    ThreadNotAssociatedWithRecipe(Uuid),

    /// Accepting or rejecting a modification needs one to be pending.
    #[error("thread {0} has no pending recipe modification")]
    NoPendingModification(Uuid),

    /// The thread's log grew between the read and the append.
    #[error("thread {0} was modified concurrently")]
    ThreadConflict(Uuid),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error("store error while trying to {context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: PortError,
    },

    #[error("generation error while trying to {context}: {source}")]
    Generation {
        context: &'static str,
        #[source]
        source: PortError,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn store(context: &'static str) -> impl FnOnce(PortError) -> Self {
        move |source| ServiceError::Store { context, source }
    }

    pub(crate) fn generation(context: &'static str) -> impl FnOnce(PortError) -> Self {
        move |source| ServiceError::Generation { context, source }
    }

    /// True for conditions the caller caused by naming something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::ThreadNotFound(_)
                | ServiceError::RecipeNotFound(_)
                | ServiceError::RecipeVersionNotFound(_)
                | ServiceError::ProfileNotFound(_)
                | ServiceError::Thread(ThreadError::SuggestionNotFound(_))
        )
    }
}
