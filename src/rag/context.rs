//! Context assembly for the generative step.

use super::RetrievedContext;

/// Default character budget for assembled context.
pub const DEFAULT_CONTEXT_CHARS: usize = 6000;

/// Concatenate retrieved chunks into a prompt context string.
///
/// Each chunk becomes a `Source:`/`Title:` block; blocks are separated by
/// `---`. Assembly stops before the block that would exceed `max_chars`
/// rather than truncating mid-block, except that the first block is always
/// included: a non-empty retrieval yields a non-empty context.
pub fn build_context(contexts: &[RetrievedContext], max_chars: usize) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut total = 0usize;

    for ctx in contexts {
        let title = ctx.section_title.as_deref().unwrap_or(&ctx.source);
        let block = format!("Source: {}\nTitle: {}\n{}\n", ctx.source, title, ctx.text);

        let separator_len = if blocks.is_empty() { 0 } else { 5 };
        if total + separator_len + block.len() > max_chars && !blocks.is_empty() {
            break;
        }
        total += separator_len + block.len();
        blocks.push(block);
    }

    blocks.join("\n---\n")
}
