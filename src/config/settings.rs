//! Configuration settings for Lese.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub ingestion: IngestionSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub retrieval: RetrievalSettings,
    pub answer: AnswerSettings,
    pub content: ContentSettings,
    pub prompts: PromptSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (document conversion output).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lese".to_string(),
            temp_dir: "/tmp/lese".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Document and transcript ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Character budget per document chunk.
    pub max_chunk_chars: usize,
    /// Character budget per transcript chunk.
    pub segment_chunk_chars: usize,
    /// Overlap carried between consecutive transcript chunks.
    pub segment_overlap_chars: usize,
    /// Maximum concurrent document jobs in a batch.
    pub max_concurrent_documents: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: crate::chunking::DEFAULT_MAX_CHARS,
            segment_chunk_chars: crate::chunking::segments::DEFAULT_SEGMENT_CHUNK_CHARS,
            segment_overlap_chars: crate::chunking::segments::DEFAULT_SEGMENT_OVERLAP_CHARS,
            max_concurrent_documents: 4,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Namespace for document chunks.
    pub document_namespace: String,
    /// Namespace for video transcript chunks.
    pub video_namespace: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.lese/vectors.db".to_string(),
            document_namespace: "documents".to_string(),
            video_namespace: "videos".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of results returned per query.
    pub top_k: usize,
    /// Character budget for assembled prompt context.
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: crate::rag::DEFAULT_CONTEXT_CHARS,
        }
    }
}

/// Answer composition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Enable generative answers; when disabled every answer is extractive.
    pub enabled: bool,
    /// LLM model for answer generation.
    pub model: String,
    /// Minimum chunk score for its images to be offered to the model.
    pub min_image_score: f32,
    /// Maximum images attached to one answer.
    pub max_images: usize,
    /// Chunks included in an extractive fallback answer.
    pub fallback_chunks: usize,
    /// Snippet length per fallback chunk.
    pub fallback_snippet_chars: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            min_image_score: 0.25,
            max_images: 3,
            fallback_chunks: 3,
            fallback_snippet_chars: 300,
        }
    }
}

/// Content persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Root directory for stored sections and images.
    pub storage_dir: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            storage_dir: "~/.lese/content".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LeseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lese")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded content storage directory.
    pub fn storage_dir(&self) -> PathBuf {
        Self::expand_path(&self.content.storage_dir)
    }

    /// Namespaces queried at retrieval time, in order.
    pub fn retrieval_namespaces(&self) -> Vec<String> {
        vec![
            self.vector_store.document_namespace.clone(),
            self.vector_store.video_namespace.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.ingestion.max_chunk_chars, 1200);
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.answer.max_images, 3);
        assert_eq!(
            settings.retrieval_namespaces(),
            vec!["documents".to_string(), "videos".to_string()]
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings =
            toml::from_str("[retrieval]\ntop_k = 8\n").unwrap();
        assert_eq!(settings.retrieval.top_k, 8);
        assert_eq!(settings.answer.model, "gpt-4o-mini");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.answer.max_images = 5;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.answer.max_images, 5);
    }
}
