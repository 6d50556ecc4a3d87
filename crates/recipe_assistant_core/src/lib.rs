pub mod diff;
pub mod domain;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod ports;
pub mod profiles;
pub mod reducer;
pub mod versioning;

pub use diff::{diff, DiffStep, ModifiedIngredient, RecipeDiff, RemovedIngredient};
pub use domain::{
    ChatMessage, ChatSource, Ingredient, MeasurementUnit, Profile, RecipeBody, RecipeSuggestion,
    RecipeVersion, Skill, ThreadState, UserRecipe,
};
pub use error::{ServiceError, ServiceResult, ThreadError};
pub use events::{ThreadEvent, ThreadEventPayload, ThreadEventType};
pub use orchestrator::{RecipeModification, ThreadService};
pub use ports::{
    PortError, PortResult, RecipeGenerationService, StoreService, StoreTransaction, ThreadRecord,
};
pub use profiles::ProfileService;
pub use reducer::reduce;
pub use versioning::RecipeVersioning;
