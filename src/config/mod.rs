//! Configuration management.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts};
pub use settings::{
    AnswerSettings, ContentSettings, EmbeddingSettings, GeneralSettings, IngestionSettings,
    PromptSettings, RetrievalSettings, Settings, VectorStoreSettings,
};
