//! Video clip answers.
//!
//! When a question is restricted to video context, the answer is a short
//! list of clips rather than prose: each clip carries a playback URL, a
//! start time, a human-readable time range, and a one-line description
//! paraphrased from the transcript snippet.

use crate::rag::RetrievedContext;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// Maximum clips listed per answer.
pub const MAX_CLIPS: usize = 4;

/// One recommended clip.
#[derive(Debug, Clone, Serialize)]
pub struct VideoClip {
    pub video_url: String,
    pub start_seconds: f64,
    /// `MM:SS - MM:SS` style range.
    pub time_range: String,
    /// One-line description derived from the transcript.
    pub description: String,
    pub score: f32,
}

/// Build up to [`MAX_CLIPS`] distinct clips from video-sourced contexts.
///
/// Contexts arrive ranked; distinctness is by `(video_url, start_seconds)`.
pub fn video_clips(contexts: &[RetrievedContext]) -> Vec<VideoClip> {
    let mut clips = Vec::new();
    let mut seen: HashSet<(String, u64)> = HashSet::new();

    for ctx in contexts {
        let Some(url) = &ctx.video_url else { continue };
        let start = ctx.start_seconds.unwrap_or(0.0);
        if !seen.insert((url.clone(), start.to_bits())) {
            continue;
        }
        clips.push(VideoClip {
            video_url: url.clone(),
            start_seconds: start,
            time_range: ctx.time_range().unwrap_or_else(|| "00:00".to_string()),
            description: paraphrase(&ctx.text),
            score: ctx.score,
        });
        if clips.len() >= MAX_CLIPS {
            break;
        }
    }

    clips
}

/// Turn a transcript snippet into a one-line third-person description.
///
/// Strips filler words, rewrites first-person presenter language into
/// descriptive phrasing, and guarantees terminal punctuation.
pub fn paraphrase(text: &str) -> String {
    let filler = Regex::new(r"(?i)\b(um+|uh+|er+|you know|sort of|kind of|basically|actually|so yeah)\b[,]?")
        .expect("valid filler pattern");
    let mut out = filler.replace_all(text, "").to_string();

    for (pattern, replacement) in [
        (r"(?i)\bI'm going to\b", "the presenter will"),
        (r"(?i)\bI'm\b", "the presenter is"),
        (r"(?i)\bI've\b", "the presenter has"),
        (r"(?i)\bI'll\b", "the presenter will"),
        (r"\bI\b", "the presenter"),
        (r"(?i)\bwe're\b", "they are"),
        (r"(?i)\bwe'll\b", "they will"),
        (r"(?i)\bwe\b", "they"),
        (r"(?i)\bmy\b", "their"),
        (r"(?i)\bour\b", "their"),
    ] {
        let re = Regex::new(pattern).expect("valid pronoun pattern");
        out = re.replace_all(&out, replacement).to_string();
    }

    // Collapse whitespace left behind by removals and tidy comma spacing.
    let mut out = out.split_whitespace().collect::<Vec<_>>().join(" ");
    out = out.replace(" ,", ",").replace(" .", ".");

    let mut chars = out.chars();
    let mut out: String = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => return "No description available.".to_string(),
    };

    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}
