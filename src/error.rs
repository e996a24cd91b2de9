//! Error types for Lese.

use thiserror::Error;

/// Library-level error type for Lese operations.
#[derive(Error, Debug)]
pub enum LeseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Document conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Content store error: {0}")]
    ContentStore(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Lese operations.
pub type Result<T> = std::result::Result<T, LeseError>;
