//! Vector index abstraction.
//!
//! Provides a trait-based interface over namespaced vector storage backends.
//! Namespaces partition one index (e.g. document chunks vs. video transcript
//! chunks); the metadata schema is shared across namespaces so the retrieval
//! fusion step can merge matches from both.

mod memory;
mod sqlite;

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Origin of an indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Document,
    Video,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Document => write!(f, "document"),
            SourceType::Video => write!(f, "video"),
        }
    }
}

/// Exported transcript locations for a video chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TranscriptUrls {
    pub txt: Option<String>,
    pub srt: Option<String>,
    pub vtt: Option<String>,
}

/// Metadata stored alongside each vector.
///
/// All fields are tolerant on deserialization: missing or malformed values
/// fall back to defaults rather than failing the read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    /// Chunk text. The canonical field; `text` is a legacy alias read as a
    /// fallback by [`resolved_text`](ChunkMetadata::resolved_text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Human-readable source label (file name, video title).
    pub source: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Storage path of the owning section, once persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_paths: Vec<String>,
    #[serde(deserialize_with = "tolerant_seconds", skip_serializing_if = "Option::is_none")]
    pub start_seconds: Option<f64>,
    #[serde(deserialize_with = "tolerant_seconds", skip_serializing_if = "Option::is_none")]
    pub end_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_urls: Option<TranscriptUrls>,
    /// When the chunk was written to the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl ChunkMetadata {
    /// Chunk text, preferring `content` over the legacy `text` field.
    pub fn resolved_text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

/// Accept numbers, numeric strings, or null; anything else becomes `None`.
fn tolerant_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

/// A vector with its ID and metadata, as written to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A query hit.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Metadata predicate applied at query time.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub source_type: Option<SourceType>,
}

impl MetadataFilter {
    pub fn source_type(source_type: SourceType) -> Self {
        Self { source_type: Some(source_type) }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match self.source_type {
            Some(st) => metadata.source_type == st,
            None => true,
        }
    }
}

/// Index-wide statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    /// Vector count per namespace, in stable name order.
    pub namespaces: BTreeMap<String, usize>,
}

/// Trait for namespaced vector index implementations.
///
/// Constructed once at startup and shared; all methods take `&self`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records in a namespace. Returns the count written.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Query a namespace for the `top_k` nearest vectors.
    ///
    /// Results come back in non-increasing score order; ties keep insertion
    /// order. An unknown namespace yields an empty list, not an error.
    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>>;

    /// Total and per-namespace vector counts.
    async fn stats(&self) -> Result<IndexStats>;

    /// Delete all vectors from a namespace whose metadata `source` matches.
    async fn delete_by_source(&self, namespace: &str, source: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_resolved_text_prefers_content() {
        let meta = ChunkMetadata {
            content: Some("primary".into()),
            text: Some("legacy".into()),
            ..Default::default()
        };
        assert_eq!(meta.resolved_text(), "primary");

        let meta = ChunkMetadata { text: Some("legacy".into()), ..Default::default() };
        assert_eq!(meta.resolved_text(), "legacy");

        assert_eq!(ChunkMetadata::default().resolved_text(), "");
    }

    #[test]
    fn test_tolerant_seconds_parsing() {
        let meta: ChunkMetadata =
            serde_json::from_str(r#"{"source":"v","source_type":"video","start_seconds":"12.5","end_seconds":30}"#)
                .unwrap();
        assert_eq!(meta.start_seconds, Some(12.5));
        assert_eq!(meta.end_seconds, Some(30.0));

        let meta: ChunkMetadata =
            serde_json::from_str(r#"{"source":"v","start_seconds":"not a number","end_seconds":null}"#)
                .unwrap();
        assert_eq!(meta.start_seconds, None);
        assert_eq!(meta.end_seconds, None);
    }

    #[test]
    fn test_metadata_filter() {
        let video = ChunkMetadata { source_type: SourceType::Video, ..Default::default() };
        let doc = ChunkMetadata::default();

        let filter = MetadataFilter::source_type(SourceType::Video);
        assert!(filter.matches(&video));
        assert!(!filter.matches(&doc));
        assert!(MetadataFilter::default().matches(&doc));
    }
}
