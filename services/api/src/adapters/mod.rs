pub mod db;
pub mod generation_llm;

pub use db::{PgStore, PgTransaction};
pub use generation_llm::OpenAiRecipeAdapter;
