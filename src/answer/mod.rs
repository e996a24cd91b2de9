//! Answer composition.
//!
//! Takes ranked retrieval results and produces a grounded answer: the
//! generative model is offered the assembled context plus candidate images,
//! its output is post-processed into clean text and exact image placements,
//! and any generation failure falls back to a deterministic extractive
//! answer built from the top chunks.

mod images;
mod video;

pub use images::{parse_image_markers, select_image_candidates, ImageCandidate, ImagePlacement};
pub use video::{paraphrase, video_clips, VideoClip, MAX_CLIPS};

use crate::config::{AnswerSettings, Prompts};
use crate::error::{LeseError, Result};
use crate::openai::create_client;
use crate::rag::{build_context, RetrievedContext};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Answer returned when no context chunks exist for a question.
pub const NO_RELEVANT_INFO: &str =
    "I couldn't find any relevant information in the knowledge base for this question.";

/// Trait for the generative model behind answer composition.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer from a system prompt and a user prompt.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI chat-completion generator.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIGenerator {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIGenerator {
    #[instrument(skip_all)]
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| LeseError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| LeseError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| LeseError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LeseError::OpenAI(format!("Failed to generate answer: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LeseError::Generation("Empty response from model".to_string()))
    }
}

/// A composed answer with image placements and citation material.
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    /// Visible answer text, with all image markers stripped.
    pub text: String,
    /// Image placements into `text`.
    pub images: Vec<ImagePlacement>,
    /// Top result's similarity score clamped to [0, 1], 3 decimals.
    pub confidence: f64,
    /// False when the extractive fallback produced the text.
    pub grounded: bool,
}

/// Composes answers from retrieved context.
pub struct AnswerComposer {
    generator: Arc<dyn AnswerGenerator>,
    prompts: Prompts,
    settings: AnswerSettings,
    max_context_chars: usize,
}

impl AnswerComposer {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        prompts: Prompts,
        settings: AnswerSettings,
        max_context_chars: usize,
    ) -> Self {
        Self { generator, prompts, settings, max_context_chars }
    }

    /// Compose an answer for a question from ranked context chunks.
    ///
    /// A generation failure transitions directly to the extractive fallback;
    /// there are no retries. With zero chunks the fixed no-information answer
    /// comes back with zero confidence.
    #[instrument(skip_all, fields(chunks = contexts.len()))]
    pub async fn compose(&self, question: &str, contexts: &[RetrievedContext]) -> ComposedAnswer {
        if contexts.is_empty() {
            return ComposedAnswer {
                text: NO_RELEVANT_INFO.to_string(),
                images: Vec::new(),
                confidence: 0.0,
                grounded: false,
            };
        }

        let confidence = confidence_score(contexts);
        let candidates = select_image_candidates(
            contexts,
            self.settings.min_image_score,
            self.settings.max_images,
        );

        if !self.settings.enabled {
            return self.extractive(contexts, confidence);
        }

        match self.generate_answer(question, contexts, &candidates).await {
            Ok(raw) => {
                let valid_paths: HashSet<String> =
                    candidates.iter().map(|c| c.path.clone()).collect();
                let (text, placements) = parse_image_markers(&raw, &valid_paths);
                debug!(images = placements.len(), "composed grounded answer");
                ComposedAnswer { text, images: placements, confidence, grounded: true }
            }
            Err(e) => {
                warn!("Answer generation failed, using extractive fallback: {}", e);
                self.extractive(contexts, confidence)
            }
        }
    }

    async fn generate_answer(
        &self,
        question: &str,
        contexts: &[RetrievedContext],
        candidates: &[ImageCandidate],
    ) -> Result<String> {
        let context_text = build_context(contexts, self.max_context_chars);

        let images_text = if candidates.is_empty() {
            String::new()
        } else {
            let mut lines = vec!["Available images:".to_string()];
            for c in candidates {
                lines.push(format!("- {} (appears near: {})", c.path, c.context));
            }
            lines.join("\n")
        };

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context_text);
        vars.insert("images".to_string(), images_text);

        let user_prompt = self.prompts.render_with_custom(&self.prompts.answer.user, &vars);
        self.generator.generate(&self.prompts.answer.system, &user_prompt).await
    }

    /// Deterministic fallback: source labels plus truncated snippets.
    /// Never fails while at least one chunk exists.
    fn extractive(&self, contexts: &[RetrievedContext], confidence: f64) -> ComposedAnswer {
        let parts: Vec<String> = contexts
            .iter()
            .take(self.settings.fallback_chunks)
            .map(|ctx| {
                let label = match ctx.time_range() {
                    Some(range) => format!("{} ({})", ctx.source, range),
                    None => ctx.source.clone(),
                };
                format!("From {}: {}", label, snippet(&ctx.text, self.settings.fallback_snippet_chars))
            })
            .collect();

        ComposedAnswer {
            text: parts.join("\n\n"),
            images: Vec::new(),
            confidence,
            grounded: false,
        }
    }
}

/// Top score clamped to [0, 1] and rounded to 3 decimals; 0.0 without context.
pub fn confidence_score(contexts: &[RetrievedContext]) -> f64 {
    let top = contexts.first().map(|c| c.score as f64).unwrap_or(0.0);
    (top.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
