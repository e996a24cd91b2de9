//! Embedding generation for semantic search and retrieval.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// Implementations are constructed once at startup and shared across
/// concurrent requests; calls are pure inference with no mutable state.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding for a query string.
    ///
    /// Defaults to [`embed`](Embedder::embed); models with asymmetric
    /// query/passage encodings override this.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}
