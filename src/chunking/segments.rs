//! Sliding-window chunking for timed transcript segments.

use crate::transcript::TranscriptSegment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default character budget for a transcript chunk.
pub const DEFAULT_SEGMENT_CHUNK_CHARS: usize = 800;

/// Default overlap carried into the next chunk, in characters.
pub const DEFAULT_SEGMENT_OVERLAP_CHARS: usize = 120;

/// A window of consecutive transcript segments with its covered time span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub chunk_id: Uuid,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Order of this chunk within the transcript.
    pub order: i32,
}

/// Pack timed segments into character-bounded chunks.
///
/// Consecutive chunks overlap: the trailing segments of one chunk (up to
/// `overlap_chars` of text) seed the next, so sentences cut at a boundary
/// stay retrievable from both sides.
pub fn chunk_segments(
    segments: &[TranscriptSegment],
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<TranscriptChunk> {
    let mut chunks = Vec::new();
    let mut window: Vec<&TranscriptSegment> = Vec::new();
    let mut window_len = 0usize;

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        if !window.is_empty() && window_len + 1 + text.len() > max_chars {
            push_chunk(&window, chunks.len() as i32, &mut chunks);
            let keep = overlap_tail(&window, overlap_chars);
            window.drain(..window.len() - keep);
            window_len = window.iter().map(|s| s.text.trim().len() + 1).sum::<usize>().saturating_sub(1);
        }
        if !window.is_empty() {
            window_len += 1;
        }
        window_len += text.len();
        window.push(segment);
    }

    if !window.is_empty() {
        push_chunk(&window, chunks.len() as i32, &mut chunks);
    }

    chunks
}

/// Number of trailing segments whose combined text fits in `overlap_chars`.
fn overlap_tail(window: &[&TranscriptSegment], overlap_chars: usize) -> usize {
    let mut total = 0usize;
    let mut keep = 0usize;
    for segment in window.iter().rev() {
        let len = segment.text.trim().len();
        if keep > 0 && total + len > overlap_chars {
            break;
        }
        total += len;
        keep += 1;
        if total >= overlap_chars {
            break;
        }
    }
    // Never re-emit the whole window as overlap.
    keep.min(window.len().saturating_sub(1))
}

fn push_chunk(window: &[&TranscriptSegment], order: i32, out: &mut Vec<TranscriptChunk>) {
    let text = window
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    out.push(TranscriptChunk {
        chunk_id: Uuid::new_v4(),
        text,
        start_seconds: window.first().map(|s| s.start_seconds).unwrap_or(0.0),
        end_seconds: window.last().map(|s| s.end_seconds).unwrap_or(0.0),
        order,
    });
}
