//! Image candidate selection and inline image-marker parsing.
//!
//! The generative model is offered a short list of candidate images and marks
//! placements inline with `[IMAGE: <path>]` tokens. [`parse_image_markers`]
//! turns that free-form output back into a clean answer string plus exact
//! character offsets.

use crate::rag::RetrievedContext;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Length of the context snippet shown to the model per candidate.
const SNIPPET_CHARS: usize = 150;

/// An image offered to the generative model.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    pub path: String,
    /// Score of the best chunk the image appeared in.
    pub score: f32,
    /// Rank of that chunk.
    pub rank: u32,
    /// Snippet of the chunk text the image appeared next to.
    pub context: String,
}

/// An image placement in the final answer text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImagePlacement {
    /// Byte offset into the stripped answer text.
    pub offset: usize,
    pub path: String,
}

/// Collect candidate images from retrieved chunks.
///
/// Chunks below `min_score` contribute nothing. Candidates are ordered by
/// score descending then rank ascending; a path seen in several chunks keeps
/// its best occurrence. At most `max_images` survive.
pub fn select_image_candidates(
    contexts: &[RetrievedContext],
    min_score: f32,
    max_images: usize,
) -> Vec<ImageCandidate> {
    let mut candidates: Vec<ImageCandidate> = Vec::new();
    for ctx in contexts {
        if ctx.score < min_score {
            continue;
        }
        for path in &ctx.image_paths {
            candidates.push(ImageCandidate {
                path: path.clone(),
                score: ctx.score,
                rank: ctx.rank,
                context: snippet(&ctx.text),
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.rank.cmp(&b.rank))
    });

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.path.clone()));
    candidates.truncate(max_images);
    candidates
}

fn snippet(text: &str) -> String {
    if text.len() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let mut end = SNIPPET_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Parse `[IMAGE: path]` tokens out of generated text.
///
/// Every token is stripped from the visible text, along with one preceding
/// space when present. Tokens naming a path outside `valid_paths` are
/// discarded silently. Offsets are relative to the returned stripped string,
/// computed by sequential removal, so each placement points at the position
/// where the token used to start.
pub fn parse_image_markers(
    text: &str,
    valid_paths: &HashSet<String>,
) -> (String, Vec<ImagePlacement>) {
    let marker_re = Regex::new(r"\[IMAGE:\s*([^\]]+?)\s*\]").expect("valid marker pattern");

    let mut clean = String::with_capacity(text.len());
    let mut placements = Vec::new();
    let mut cursor = 0usize;

    for caps in marker_re.captures_iter(text) {
        let whole = caps.get(0).expect("match group 0");
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        // Swallow one space before the token so stripping doesn't leave
        // doubled whitespace.
        let mut span_start = whole.start();
        if span_start > cursor && text[..span_start].ends_with(' ') {
            span_start -= 1;
        }

        clean.push_str(&text[cursor..span_start]);
        cursor = whole.end();

        if valid_paths.contains(path) {
            placements.push(ImagePlacement { offset: clean.len(), path: path.to_string() });
        } else {
            debug!(path, "discarding image marker with unknown path");
        }
    }
    clean.push_str(&text[cursor..]);

    (clean, placements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::SourceType;

    fn ctx(rank: u32, score: f32, images: &[&str], text: &str) -> RetrievedContext {
        RetrievedContext {
            rank,
            score,
            id: format!("id{rank}"),
            text: text.to_string(),
            source: "guide.docx".to_string(),
            source_type: SourceType::Document,
            section_title: None,
            section_path: None,
            image_paths: images.iter().map(|s| s.to_string()).collect(),
            start_seconds: None,
            end_seconds: None,
            start_timecode: None,
            end_timecode: None,
            video_url: None,
            transcript_urls: None,
        }
    }

    fn paths(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_candidate_selection_filters_sorts_dedups() {
        let contexts = vec![
            ctx(1, 0.9, &["images/a.png"], "best chunk"),
            ctx(2, 0.7, &["images/b.png", "images/a.png"], "second"),
            ctx(3, 0.1, &["images/c.png"], "below threshold"),
        ];
        let candidates = select_image_candidates(&contexts, 0.25, 3);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].path, "images/a.png");
        assert_eq!(candidates[0].rank, 1);
        assert_eq!(candidates[1].path, "images/b.png");
    }

    #[test]
    fn test_candidate_cap() {
        let contexts = vec![ctx(1, 0.9, &["a", "b", "c", "d"], "many images")];
        let candidates = select_image_candidates(&contexts, 0.25, 3);
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_equal_scores_break_ties_by_rank() {
        let contexts = vec![
            ctx(2, 0.8, &["images/late.png"], "rank two"),
            ctx(1, 0.8, &["images/early.png"], "rank one"),
        ];
        let candidates = select_image_candidates(&contexts, 0.25, 3);
        assert_eq!(candidates[0].path, "images/early.png");
    }

    #[test]
    fn test_single_marker_offset() {
        let (clean, placements) = parse_image_markers(
            "Tighten the bolt. [IMAGE: images/bolt.png] Then check torque.",
            &paths(&["images/bolt.png"]),
        );
        assert_eq!(clean, "Tighten the bolt. Then check torque.");
        assert_eq!(placements, vec![ImagePlacement { offset: 17, path: "images/bolt.png".into() }]);
        // The offset lands right after the sentence's terminal punctuation.
        assert_eq!(&clean[..placements[0].offset], "Tighten the bolt.");
    }

    #[test]
    fn test_multi_marker_offsets_adjust_for_prior_removals() {
        let text = "Step one. [IMAGE: images/a.png] Step two. [IMAGE: images/b.png] Done.";
        let (clean, placements) =
            parse_image_markers(text, &paths(&["images/a.png", "images/b.png"]));

        assert_eq!(clean, "Step one. Step two. Done.");
        assert_eq!(placements.len(), 2);
        assert_eq!(&clean[..placements[0].offset], "Step one.");
        assert_eq!(&clean[..placements[1].offset], "Step one. Step two.");
    }

    #[test]
    fn test_hallucinated_paths_are_stripped_without_placement() {
        let (clean, placements) = parse_image_markers(
            "Real. [IMAGE: images/real.png] Fake. [IMAGE: images/fake.png]",
            &paths(&["images/real.png"]),
        );
        assert_eq!(clean, "Real. Fake.");
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].path, "images/real.png");
    }

    #[test]
    fn test_marker_with_no_surrounding_space() {
        let (clean, placements) =
            parse_image_markers("Look:[IMAGE: images/x.png]done", &paths(&["images/x.png"]));
        assert_eq!(clean, "Look:done");
        assert_eq!(placements[0].offset, 5);
    }

    #[test]
    fn test_text_without_markers_passes_through() {
        let (clean, placements) = parse_image_markers("No images here.", &paths(&["images/a.png"]));
        assert_eq!(clean, "No images here.");
        assert!(placements.is_empty());
    }
}
