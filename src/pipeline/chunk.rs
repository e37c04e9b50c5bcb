//! Chunking: split a section that exceeds the model's input budget.
//!
//! The split happens on token boundaries as the injected [`Tokenizer`]
//! understands them, never on raw character offsets. Windows are
//! consecutive, with no overlap and no gap, so concatenating the chunks'
//! token sequences reconstructs the section's token sequence exactly — the
//! hierarchical reduce step depends on nothing having been dropped.
//!
//! A section that already fits the budget is passed through as a single
//! chunk holding the original text unchanged (not a detokenized copy), so
//! the common short-section case costs nothing.

use crate::error::DigestError;
use crate::tokenizer::Tokenizer;

/// One ordered slice of a section, sized for a single model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position within the section, starting at 0.
    pub index: usize,
    pub text: String,
    /// Token count as measured by the tokenizer that produced the split.
    pub token_count: usize,
}

/// Split `text` into chunks of at most `max_tokens` tokens each.
///
/// # Errors
/// [`DigestError::ChunkingContract`] when `max_tokens` is zero — a budget
/// that can never make progress.
pub fn chunk(
    text: &str,
    tokenizer: &dyn Tokenizer,
    max_tokens: usize,
) -> Result<Vec<Chunk>, DigestError> {
    if max_tokens == 0 {
        return Err(DigestError::ChunkingContract {
            detail: "max_tokens must be >= 1".into(),
        });
    }

    let ids = tokenizer.tokenize(text);
    if ids.len() <= max_tokens {
        return Ok(vec![Chunk {
            index: 0,
            text: text.to_string(),
            token_count: ids.len(),
        }]);
    }

    Ok(ids
        .chunks(max_tokens)
        .enumerate()
        .map(|(index, window)| Chunk {
            index,
            text: tokenizer.detokenize(window),
            token_count: window.len(),
        })
        .collect())
}
