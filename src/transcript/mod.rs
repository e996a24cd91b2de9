//! Video transcript model and export formats.

mod format;
mod summarize;

pub use format::{format_clock, format_transcript, OutputFormat};
pub use summarize::{group_by_gap, summarize_transcript, TopicSection};

use serde::{Deserialize, Serialize};

/// One timed span of transcript text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// A full video transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Identifier of the source video.
    pub video_id: String,
    /// Playback URL, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Total duration in seconds.
    pub duration_seconds: f64,
    /// Ordered segments.
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Create a transcript; duration is taken from the last segment end.
    pub fn new(video_id: String, segments: Vec<TranscriptSegment>) -> Self {
        let duration_seconds = segments.last().map(|s| s.end_seconds).unwrap_or(0.0);
        Self {
            video_id,
            video_url: None,
            duration_seconds,
            segments,
        }
    }

    pub fn with_video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    /// Full transcript text with segments joined by spaces.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
