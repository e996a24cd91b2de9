//! Retrieval-augmented generation: multi-namespace retrieval fusion and
//! context assembly.

mod context;
mod retriever;

pub use context::{build_context, DEFAULT_CONTEXT_CHARS};
pub use retriever::{RetrievalOutcome, Retriever, DEFAULT_NAMESPACE};

pub use crate::vector_store::SourceType;

use crate::transcript::format_clock;
use crate::vector_store::{TranscriptUrls, VectorMatch};
use serde::Serialize;

/// One retrieved chunk, enriched for display and generation.
///
/// Derived per query, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
    /// 1-based contiguous rank, assigned after fusion and truncation.
    pub rank: u32,
    /// Similarity score from the index.
    pub score: f32,
    pub id: String,
    pub text: String,
    pub source: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_seconds: Option<f64>,
    /// `HH:MM:SS` from one hour up, else `MM:SS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timecode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timecode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_urls: Option<TranscriptUrls>,
}

impl RetrievedContext {
    /// Build from a raw match; `rank` is assigned by the caller after fusion.
    pub fn from_match(m: &VectorMatch, rank: u32) -> Self {
        let meta = &m.metadata;
        Self {
            rank,
            score: m.score,
            id: m.id.clone(),
            text: meta.resolved_text().to_string(),
            source: meta.source.clone(),
            source_type: meta.source_type,
            section_title: meta.section_title.clone(),
            section_path: meta.section_path.clone(),
            image_paths: meta.image_paths.clone(),
            start_seconds: meta.start_seconds,
            end_seconds: meta.end_seconds,
            start_timecode: meta.start_seconds.map(format_clock),
            end_timecode: meta.end_seconds.map(format_clock),
            video_url: meta.video_url.clone(),
            transcript_urls: meta.transcript_urls.clone(),
        }
    }

    /// Human-readable time range for a video chunk.
    pub fn time_range(&self) -> Option<String> {
        match (&self.start_timecode, &self.end_timecode) {
            (Some(start), Some(end)) => Some(format!("{start} - {end}")),
            (Some(start), None) => Some(start.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::ChunkMetadata;

    #[test]
    fn test_from_match_enriches_timecodes() {
        let m = VectorMatch {
            id: "c1".into(),
            score: 0.8,
            metadata: ChunkMetadata {
                content: Some("the presenter shows the valve".into()),
                source: "Pump Walkthrough".into(),
                source_type: SourceType::Video,
                start_seconds: Some(65.0),
                end_seconds: Some(3661.0),
                video_url: Some("https://example.com/v/1".into()),
                ..Default::default()
            },
        };

        let ctx = RetrievedContext::from_match(&m, 1);
        assert_eq!(ctx.start_timecode.as_deref(), Some("01:05"));
        assert_eq!(ctx.end_timecode.as_deref(), Some("01:01:01"));
        assert_eq!(ctx.time_range().as_deref(), Some("01:05 - 01:01:01"));
        assert_eq!(ctx.text, "the presenter shows the valve");
    }

    #[test]
    fn test_from_match_without_timing() {
        let m = VectorMatch {
            id: "c2".into(),
            score: 0.5,
            metadata: ChunkMetadata {
                text: Some("legacy text field".into()),
                source: "guide.docx".into(),
                ..Default::default()
            },
        };

        let ctx = RetrievedContext::from_match(&m, 3);
        assert_eq!(ctx.rank, 3);
        assert_eq!(ctx.text, "legacy text field");
        assert!(ctx.start_timecode.is_none());
        assert!(ctx.time_range().is_none());
    }
}
