//! Chunking: packing section blocks and transcript segments into
//! retrieval-ready units.
//!
//! Document sections go through a greedy packer ([`chunk_sections`]) that
//! respects a character budget and carries image placeholders along with the
//! text they appeared next to. Transcripts use a sliding-window segment
//! chunker ([`segments`]).

pub mod segments;

use crate::document::{Block, Section};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Default chunk text budget in characters.
pub const DEFAULT_MAX_CHARS: usize = 1200;

/// Fraction of the budget past which a pending chunk is flushed once an
/// image is recorded, so the image stays with its nearby context.
const IMAGE_FLUSH_RATIO: f64 = 0.8;

/// A bounded-size unit of section text plus associated image placeholders.
/// The unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Generated unique ID.
    pub chunk_id: Uuid,
    /// Owning section.
    pub section_id: Uuid,
    /// Whitespace-normalized assembled text.
    pub text: String,
    /// Placeholder paths of images associated with this chunk, in order of
    /// appearance. Duplicates are kept; each occurrence is meaningful.
    pub image_paths: Vec<String>,
}

/// Greedily pack each section's blocks into chunks of at most `max_chars`.
///
/// Oversized tables become standalone chunks truncated to the budget. An
/// all-empty section contributes no chunks.
pub fn chunk_sections(sections: &[Section], max_chars: usize) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    for section in sections {
        chunk_section(section, max_chars, &mut chunks);
    }
    debug!(sections = sections.len(), chunks = chunks.len(), "chunked sections");
    chunks
}

fn chunk_section(section: &Section, max_chars: usize, out: &mut Vec<DocumentChunk>) {
    let image_flush_at = (max_chars as f64 * IMAGE_FLUSH_RATIO) as usize;
    let mut pending = Pending::default();

    for block in &section.blocks {
        match block {
            Block::Text { text } => {
                let text = crate::document::normalize_ws(text);
                if text.is_empty() {
                    continue;
                }
                // Paragraphs longer than the budget are split at word
                // boundaries so no chunk ever exceeds it.
                for piece in split_to_budget(&text, max_chars) {
                    if pending.would_overflow(&piece, max_chars) {
                        pending.flush(section.section_id, out);
                    }
                    pending.push_text(&piece);
                }
            }
            Block::Table { rows } => {
                let rendered = render_table(rows);
                if rendered.is_empty() {
                    continue;
                }
                if rendered.len() < max_chars / 2 {
                    if pending.would_overflow(&rendered, max_chars) {
                        pending.flush(section.section_id, out);
                    }
                    pending.push_text(&rendered);
                } else {
                    // Large tables stand alone and carry no image paths.
                    pending.flush(section.section_id, out);
                    let text = truncate_chars(&rendered, max_chars);
                    out.push(DocumentChunk {
                        chunk_id: Uuid::new_v4(),
                        section_id: section.section_id,
                        text,
                        image_paths: Vec::new(),
                    });
                }
            }
            Block::Image { path } => {
                // The image is recorded first so a preemptive flush keeps it
                // with the text it appeared next to.
                pending.image_paths.push(path.clone());
                if pending.text.len() > image_flush_at {
                    pending.flush(section.section_id, out);
                }
            }
        }
    }

    pending.flush(section.section_id, out);
}

#[derive(Default)]
struct Pending {
    text: String,
    image_paths: Vec<String>,
}

impl Pending {
    fn would_overflow(&self, addition: &str, max_chars: usize) -> bool {
        if self.text.is_empty() {
            return false;
        }
        self.text.len() + 1 + addition.len() > max_chars
    }

    fn push_text(&mut self, addition: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(addition);
    }

    fn flush(&mut self, section_id: Uuid, out: &mut Vec<DocumentChunk>) {
        if self.text.is_empty() && self.image_paths.is_empty() {
            return;
        }
        out.push(DocumentChunk {
            chunk_id: Uuid::new_v4(),
            section_id,
            text: std::mem::take(&mut self.text),
            image_paths: std::mem::take(&mut self.image_paths),
        });
    }
}

/// Render a table as pipe-joined rows, one row per line collapsed to spaces.
fn render_table(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(" | "))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into word-boundary pieces of at most `max_chars`, losslessly.
/// A single word longer than the whole budget is split at char boundaries.
fn split_to_budget(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let mut word = word;
        while word.len() > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let head = truncate_chars(word, max_chars);
            word = &word[head.len()..];
            pieces.push(head);
        }
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Section;

    fn section_with(blocks: Vec<Block>) -> Section {
        let mut section = Section::new("Setup", 1, 1, "guide");
        section.blocks = blocks;
        section
    }

    #[test]
    fn test_small_section_yields_one_chunk() {
        let section = section_with(vec![
            Block::Text { text: "Install the pump.".into() },
            Block::Image { path: "images/abc.png".into() },
            Block::Image { path: "images/abc.png".into() },
        ]);

        let chunks = chunk_sections(&[section], DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Install the pump.");
        assert_eq!(chunks[0].image_paths, vec!["images/abc.png", "images/abc.png"]);
    }

    #[test]
    fn test_chunk_size_invariant() {
        let para = "word ".repeat(60).trim().to_string();
        let blocks: Vec<Block> = (0..10).map(|_| Block::Text { text: para.clone() }).collect();
        let chunks = chunk_sections(&[section_with(blocks)], 700);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 700, "chunk of {} chars", chunk.text.len());
        }
    }

    #[test]
    fn test_section_coverage() {
        let blocks = vec![
            Block::Text { text: "First paragraph with some words.".into() },
            Block::Table { rows: vec![vec!["a".into(), "b".into()]] },
            Block::Text { text: "Second   paragraph\twith messy  spacing.".into() },
        ];
        let section = section_with(blocks.clone());
        let chunks = chunk_sections(&[section], 40);

        let reassembled: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let expected = "First paragraph with some words. a | b Second paragraph with messy spacing.";
        assert_eq!(reassembled, expected);
    }

    #[test]
    fn test_oversized_table_is_standalone_and_truncated() {
        let wide_row: Vec<String> = (0..200).map(|i| format!("cell{i}")).collect();
        let blocks = vec![
            Block::Text { text: "Intro.".into() },
            Block::Image { path: "images/x.png".into() },
            Block::Table { rows: vec![wide_row] },
            Block::Text { text: "Outro.".into() },
        ];
        let chunks = chunk_sections(&[section_with(blocks)], 200);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Intro.");
        assert_eq!(chunks[0].image_paths, vec!["images/x.png"]);
        assert_eq!(chunks[1].text.len(), 200);
        assert!(chunks[1].image_paths.is_empty());
        assert_eq!(chunks[2].text, "Outro.");
    }

    #[test]
    fn test_image_near_budget_flushes_preemptively() {
        let long = "x".repeat(170);
        let blocks = vec![
            Block::Text { text: long.clone() },
            Block::Image { path: "images/y.png".into() },
            Block::Text { text: "Caption follows the image.".into() },
        ];
        let chunks = chunk_sections(&[section_with(blocks)], 200);

        // 170 chars > 80% of 200, so the chunk is flushed with the image
        // still attached to the text it appeared next to.
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, long);
        assert_eq!(chunks[0].image_paths, vec!["images/y.png"]);
        assert!(chunks[1].image_paths.is_empty());
        assert_eq!(chunks[1].text, "Caption follows the image.");
    }

    #[test]
    fn test_oversized_paragraph_is_split_across_chunks() {
        let para = "word ".repeat(500).trim().to_string();
        let chunks =
            chunk_sections(&[section_with(vec![Block::Text { text: para.clone() }])], 1200);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 1200, "chunk of {} chars", chunk.text.len());
        }
        let reassembled = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(reassembled, para);
    }

    #[test]
    fn test_word_longer_than_budget_is_hard_split() {
        let word = "x".repeat(45);
        let chunks =
            chunk_sections(&[section_with(vec![Block::Text { text: word.clone() }])], 20);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.len() <= 20));
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, word);
    }

    #[test]
    fn test_empty_section_yields_no_chunks() {
        let chunks = chunk_sections(&[section_with(vec![])], DEFAULT_MAX_CHARS);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_trailing_image_only_chunk_is_kept() {
        let chunks = chunk_sections(
            &[section_with(vec![Block::Image { path: "images/z.png".into() }])],
            DEFAULT_MAX_CHARS,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert_eq!(chunks[0].image_paths, vec!["images/z.png"]);
    }
}
