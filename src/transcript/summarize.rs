//! Topic summaries: gap-based section grouping with per-section key points.
//!
//! Consecutive segments are joined into topic sections at long pauses (or
//! when a section grows too long); each section is summarized as a handful
//! of its most contentful sentences, order preserved.

use super::{format_clock, Transcript, TranscriptSegment};
use std::collections::{HashMap, HashSet};

/// Pause length that starts a new topic section.
pub const DEFAULT_GAP_SECONDS: f64 = 20.0;

/// Maximum section length before a forced split.
pub const DEFAULT_MAX_SECTION_SECONDS: f64 = 8.0 * 60.0;

/// Bullets kept per section.
const MAX_BULLETS: usize = 4;

/// A contiguous run of segments treated as one topic.
#[derive(Debug, Clone)]
pub struct TopicSection {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Group segments into sections, starting a new one at a pause longer than
/// `gap_seconds` or when a section would exceed `max_section_seconds`.
pub fn group_by_gap(
    segments: &[TranscriptSegment],
    gap_seconds: f64,
    max_section_seconds: f64,
) -> Vec<TopicSection> {
    let mut sections = Vec::new();
    let Some(first) = segments.first() else {
        return sections;
    };

    let mut start = first.start_seconds;
    let mut texts = vec![first.text.trim().to_string()];
    let mut last_end = first.end_seconds;

    for segment in &segments[1..] {
        let boundary = segment.start_seconds - last_end > gap_seconds
            || segment.end_seconds - start > max_section_seconds;
        if boundary {
            sections.push(TopicSection {
                start_seconds: start,
                end_seconds: last_end,
                text: texts.join(" "),
            });
            start = segment.start_seconds;
            texts = vec![segment.text.trim().to_string()];
        } else {
            texts.push(segment.text.trim().to_string());
        }
        last_end = segment.end_seconds;
    }

    sections.push(TopicSection {
        start_seconds: start,
        end_seconds: last_end,
        text: texts.join(" "),
    });
    sections
}

/// Render a markdown topic summary of a transcript.
pub fn summarize_transcript(transcript: &Transcript) -> String {
    let mut lines = vec!["# Topic Summary".to_string(), String::new()];

    if transcript.full_text().is_empty() {
        lines.push("(No speech detected.)".to_string());
        lines.push(String::new());
        return lines.join("\n");
    }

    let sections =
        group_by_gap(&transcript.segments, DEFAULT_GAP_SECONDS, DEFAULT_MAX_SECTION_SECONDS);

    for (i, section) in sections.iter().enumerate() {
        lines.push(format!(
            "## {}. Section ({} - {})",
            i + 1,
            format_clock(section.start_seconds),
            format_clock(section.end_seconds)
        ));
        let bullets = key_points(&section.text, MAX_BULLETS);
        if !bullets.is_empty() {
            lines.push("**Key Points:**".to_string());
            for bullet in bullets {
                lines.push(format!("- {bullet}"));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Pick up to `max_bullets` sentences: always the first, then the most
/// contentful by rarity-weighted term score, returned in original order.
fn key_points(text: &str, max_bullets: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let scores = score_sentences(&sentences);
    let mut order: Vec<usize> = (0..sentences.len()).collect();
    order.sort_by(|a, b| scores[*b].partial_cmp(&scores[*a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut picks = vec![0usize];
    for idx in order {
        if picks.len() >= max_bullets {
            break;
        }
        if !picks.contains(&idx) {
            picks.push(idx);
        }
    }
    picks.sort_unstable();
    picks.into_iter().map(|i| sentences[i].clone()).collect()
}

/// Split text into sentences at `.`, `!`, or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }
    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Score each sentence by the summed rarity of its terms across the section,
/// ignoring common function words.
fn score_sentences(sentences: &[String]) -> Vec<f64> {
    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| tokenize(s)).collect();

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for words in &tokenized {
        let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
        for word in unique {
            *doc_freq.entry(word).or_default() += 1;
        }
    }

    let n = sentences.len() as f64;
    tokenized
        .iter()
        .map(|words| {
            words
                .iter()
                .map(|w| (n / doc_freq[w.as_str()] as f64).ln() + 1.0)
                .sum()
        })
        .collect()
}

const STOP_WORDS: [&str; 32] = [
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "of", "on", "or", "so", "that", "the", "then", "there", "this", "to", "was", "we",
    "were", "will", "with", "you", "your",
];

fn tokenize(sentence: &str) -> Vec<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}
