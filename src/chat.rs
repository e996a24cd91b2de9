//! Chat service: the query-side entry points.
//!
//! Wraps retrieval and answer composition behind `search`, `ask`, and
//! `ask_video`. The `ask` flow is a small state machine: an empty vector
//! store short-circuits before any embedding or generation happens; no
//! matches produce the fixed no-information answer; a generation failure
//! lands in the extractive fallback inside the composer.

use crate::answer::{video_clips, AnswerComposer, ImagePlacement, VideoClip};
use crate::error::Result;
use crate::rag::{RetrievedContext, Retriever, SourceType};
use crate::vector_store::{MetadataFilter, VectorIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Error tag for questions against an empty index. A user-visible state,
/// not a failure of the pipeline.
pub const EMPTY_VECTOR_STORE: &str = "empty_vector_store";

/// Pool size searched when building recommendations.
const RECOMMENDATION_POOL: usize = 10;

/// Cap per recommendation group.
const MAX_RECOMMENDATIONS: usize = 5;

/// Canned replies for small talk, cycled per conversation.
const SMALL_TALK_REPLIES: [&str; 3] = [
    "Hello! Ask me anything about the ingested documentation or videos.",
    "Hi there. What would you like to know about the documentation?",
    "Hey! I can answer questions about your documents and video transcripts.",
];

/// Per-conversation state, owned by the caller (session or request context).
#[derive(Debug, Default, Clone)]
pub struct ConversationState {
    /// Index of the last small-talk reply, so consecutive greetings don't
    /// repeat the same canned line.
    last_small_talk: Option<usize>,
}

/// Structured response to `ask`.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImagePlacement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RetrievedContext>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub grounded: bool,
}

impl AskResponse {
    fn plain(answer: String) -> Self {
        Self {
            success: true,
            answer: Some(answer),
            images: Vec::new(),
            sources: Vec::new(),
            confidence: 0.0,
            error: None,
            grounded: false,
        }
    }

    fn empty_store() -> Self {
        Self {
            success: false,
            answer: None,
            images: Vec::new(),
            sources: Vec::new(),
            confidence: 0.0,
            error: Some(EMPTY_VECTOR_STORE.to_string()),
            grounded: false,
        }
    }
}

/// Structured response to `ask_video`.
#[derive(Debug, Serialize)]
pub struct VideoAnswer {
    pub success: bool,
    pub answer: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<VideoClip>,
    /// True when no video content matched and the listed sources come from
    /// an unfiltered retry.
    pub filter_relaxed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RetrievedContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One recommended item, derived from a retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub score: f32,
    pub preview: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// Recommendations for a query, grouped by source type.
#[derive(Debug, Serialize)]
pub struct Recommendations {
    pub documents: Vec<Recommendation>,
    pub videos: Vec<Recommendation>,
}

/// Query-side service over a shared retriever, composer, and index.
pub struct ChatService {
    retriever: Retriever,
    composer: AnswerComposer,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl ChatService {
    pub fn new(
        retriever: Retriever,
        composer: AnswerComposer,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Self {
        Self { retriever, composer, index, top_k }
    }

    /// Raw semantic search without answer composition.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedContext>> {
        self.retriever.retrieve(query, top_k, None).await
    }

    /// Answer a question against the whole index.
    #[instrument(skip(self, state))]
    pub async fn ask(&self, question: &str, state: &mut ConversationState) -> Result<AskResponse> {
        if let Some(reply) = self.small_talk(question, state) {
            return Ok(AskResponse::plain(reply));
        }

        if self.index.stats().await?.total_vectors == 0 {
            info!("ask against empty vector store");
            return Ok(AskResponse::empty_store());
        }

        let contexts = self.retriever.retrieve(question, self.top_k, None).await?;
        let composed = self.composer.compose(question, &contexts).await;
        debug!(grounded = composed.grounded, sources = contexts.len(), "ask complete");

        Ok(AskResponse {
            success: true,
            answer: Some(composed.text),
            images: composed.images,
            sources: contexts,
            confidence: composed.confidence,
            error: None,
            grounded: composed.grounded,
        })
    }

    /// Answer a question restricted to video content with clip citations.
    #[instrument(skip(self))]
    pub async fn ask_video(&self, question: &str) -> Result<VideoAnswer> {
        if self.index.stats().await?.total_vectors == 0 {
            return Ok(VideoAnswer {
                success: false,
                answer: String::new(),
                clips: Vec::new(),
                filter_relaxed: false,
                sources: Vec::new(),
                error: Some(EMPTY_VECTOR_STORE.to_string()),
            });
        }

        let filter = MetadataFilter::source_type(SourceType::Video);
        let outcome = self.retriever.retrieve_or_relax(question, self.top_k, &filter).await?;

        if outcome.filter_relaxed {
            // The relaxed results say what the index does hold; they are
            // reported as sources but never presented as clips.
            return Ok(VideoAnswer {
                success: true,
                answer: "No video content matched this question. Related documentation excerpts are listed as sources.".to_string(),
                clips: Vec::new(),
                filter_relaxed: true,
                sources: outcome.contexts,
                error: None,
            });
        }

        let clips = video_clips(&outcome.contexts);
        let answer = if clips.is_empty() {
            "No video clips could be derived for this question.".to_string()
        } else {
            clips
                .iter()
                .enumerate()
                .map(|(i, clip)| {
                    format!("{}. [{}] {} ({})", i + 1, clip.time_range, clip.description, clip.video_url)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(VideoAnswer {
            success: true,
            answer,
            clips,
            filter_relaxed: false,
            sources: outcome.contexts,
            error: None,
        })
    }

    /// Recommend related documents and videos for a query, deduplicated by
    /// source with the best-scoring occurrence kept.
    #[instrument(skip(self))]
    pub async fn recommendations(&self, query: &str) -> Result<Recommendations> {
        let contexts = self.retriever.retrieve(query, RECOMMENDATION_POOL, None).await?;

        let mut documents: Vec<Recommendation> = Vec::new();
        let mut videos: Vec<Recommendation> = Vec::new();
        for ctx in &contexts {
            let group = match ctx.source_type {
                SourceType::Video => &mut videos,
                SourceType::Document => &mut documents,
            };
            // Contexts arrive sorted by score, so the first occurrence of a
            // source is also its best.
            if group.len() == MAX_RECOMMENDATIONS
                || group.iter().any(|r| r.title == ctx.source)
            {
                continue;
            }
            group.push(Recommendation {
                title: ctx.source.clone(),
                score: ctx.score,
                preview: preview(&ctx.text),
                source_type: ctx.source_type,
                section_title: ctx.section_title.clone(),
                video_url: ctx.video_url.clone(),
            });
        }

        Ok(Recommendations { documents, videos })
    }

    /// Detect small talk and pick a canned reply that differs from the last
    /// one in this conversation.
    fn small_talk(&self, message: &str, state: &mut ConversationState) -> Option<String> {
        let normalized = message.trim().trim_end_matches(['!', '.', '?']).to_lowercase();
        let is_small_talk = matches!(
            normalized.as_str(),
            "hi" | "hello" | "hey" | "good morning" | "good afternoon" | "good evening"
                | "thanks" | "thank you" | "how are you"
        );
        if !is_small_talk {
            return None;
        }

        let next = match state.last_small_talk {
            Some(last) => (last + 1) % SMALL_TALK_REPLIES.len(),
            None => 0,
        };
        state.last_small_talk = Some(next);
        Some(SMALL_TALK_REPLIES[next].to_string())
    }
}

/// First 200 characters of the text, ellipsized.
fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 200;
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerGenerator;
    use crate::config::{AnswerSettings, Prompts};
    use crate::embedding::Embedder;
    use crate::error::LeseError;
    use crate::vector_store::{ChunkMetadata, MemoryVectorIndex, VectorRecord};
    use async_trait::async_trait;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Generator that panics if called; used to prove short-circuits.
    struct ForbiddenGenerator;

    #[async_trait]
    impl AnswerGenerator for ForbiddenGenerator {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            panic!("generator must not be called");
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Ok("A grounded answer.".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Err(LeseError::Generation("provider down".into()))
        }
    }

    fn service(
        index: Arc<MemoryVectorIndex>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> ChatService {
        let retriever = Retriever::new(Arc::new(FixedEmbedder), index.clone(), vec!["documents".into(), "videos".into()]);
        let composer = AnswerComposer::new(generator, Prompts::default(), AnswerSettings::default(), 6000);
        ChatService::new(retriever, composer, index, 5)
    }

    fn doc_record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding: vec![1.0, 0.0],
            metadata: ChunkMetadata {
                content: Some("Install the pump.".into()),
                source: "guide.docx".into(),
                ..Default::default()
            },
        }
    }

    fn video_record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding: vec![1.0, 0.0],
            metadata: ChunkMetadata {
                content: Some("I'm showing the pump seal".into()),
                source: "vid1".into(),
                source_type: SourceType::Video,
                start_seconds: Some(30.0),
                end_seconds: Some(60.0),
                video_url: Some("https://example.com/v/1".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_empty_store_short_circuits_without_generation() {
        let index = Arc::new(MemoryVectorIndex::new());
        let service = service(index, Arc::new(ForbiddenGenerator));

        let mut state = ConversationState::default();
        let response = service.ask("how do I install?", &mut state).await.unwrap();

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(EMPTY_VECTOR_STORE));
        assert!(response.answer.is_none());
    }

    #[tokio::test]
    async fn test_grounded_ask() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.upsert("documents", &[doc_record("a")]).await.unwrap();
        let service = service(index, Arc::new(EchoGenerator));

        let mut state = ConversationState::default();
        let response = service.ask("how do I install?", &mut state).await.unwrap();

        assert!(response.success);
        assert!(response.grounded);
        assert_eq!(response.answer.as_deref(), Some("A grounded answer."));
        assert_eq!(response.sources.len(), 1);
        assert!(response.confidence > 0.9);
    }

    #[tokio::test]
    async fn test_generation_failure_yields_extractive_success() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.upsert("documents", &[doc_record("a")]).await.unwrap();
        let service = service(index, Arc::new(FailingGenerator));

        let mut state = ConversationState::default();
        let response = service.ask("how?", &mut state).await.unwrap();

        assert!(response.success);
        assert!(!response.grounded);
        assert!(response.answer.unwrap().contains("From guide.docx"));
    }

    #[tokio::test]
    async fn test_small_talk_does_not_repeat() {
        let index = Arc::new(MemoryVectorIndex::new());
        let service = service(index, Arc::new(ForbiddenGenerator));

        let mut state = ConversationState::default();
        let first = service.ask("hello", &mut state).await.unwrap().answer.unwrap();
        let second = service.ask("hello!", &mut state).await.unwrap().answer.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_ask_video_returns_clips() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.upsert("videos", &[video_record("v1")]).await.unwrap();
        let service = service(index, Arc::new(ForbiddenGenerator));

        let answer = service.ask_video("show me the seal").await.unwrap();
        assert!(answer.success);
        assert!(!answer.filter_relaxed);
        assert_eq!(answer.clips.len(), 1);
        assert!(answer.answer.contains("00:30 - 01:00"));
        assert_eq!(answer.clips[0].description, "The presenter is showing the pump seal.");
    }

    #[tokio::test]
    async fn test_recommendations_group_and_dedup_by_source() {
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .upsert("documents", &[doc_record("a"), doc_record("b")])
            .await
            .unwrap();
        index.upsert("videos", &[video_record("v1")]).await.unwrap();
        let service = service(index, Arc::new(ForbiddenGenerator));

        let recs = service.recommendations("pump").await.unwrap();
        assert_eq!(recs.documents.len(), 1);
        assert_eq!(recs.documents[0].title, "guide.docx");
        assert_eq!(recs.videos.len(), 1);
        assert_eq!(recs.videos[0].video_url.as_deref(), Some("https://example.com/v/1"));
    }

    #[tokio::test]
    async fn test_ask_video_relaxes_filter_with_label() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.upsert("documents", &[doc_record("a")]).await.unwrap();
        let service = service(index, Arc::new(ForbiddenGenerator));

        let answer = service.ask_video("anything on video?").await.unwrap();
        assert!(answer.filter_relaxed);
        assert!(answer.clips.is_empty());
        assert_eq!(answer.sources.len(), 1);
    }
}
