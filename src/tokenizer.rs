//! The tokenize/detokenize capability consumed by the chunker and engine.
//!
//! Token budgets are the model's, not ours: the chunker must measure and
//! slice text the way the target summarization capability counts it. The
//! capability is therefore injected as a trait object at pipeline
//! construction, never hard-coded, so a caller wrapping a real subword
//! tokenizer can substitute it without touching the chunker.
//!
//! [`WhitespaceTokenizer`] is the built-in default: word-level tokens with an
//! interning vocabulary. One whitespace-delimited word is roughly 1.3
//! subword tokens for common English models, which keeps the budget estimate
//! conservative enough for chunking. On text whose words are separated by
//! single spaces — which is what [`crate::pipeline::normalize`] produces —
//! it round-trips exactly.

use std::collections::HashMap;
use std::sync::RwLock;

/// Measure and slice text by model tokens.
///
/// Implementations must be `Send + Sync`: the engine issues concurrent
/// per-section calls against one shared instance.
///
/// Contract: `tokenize(detokenize(ids)) == ids` for any `ids` previously
/// produced by `tokenize` — chunk reassembly depends on it.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token ids.
    fn tokenize(&self, text: &str) -> Vec<u32>;

    /// Decode token ids back into text.
    fn detokenize(&self, ids: &[u32]) -> String;

    /// Token count of `text`. Default goes through [`tokenize`](Self::tokenize);
    /// implementations with a cheaper counting path may override.
    fn count(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }
}

#[derive(Default)]
struct Vocab {
    by_word: HashMap<String, u32>,
    by_id: Vec<String>,
}

/// Word-level tokenizer with an interning vocabulary.
///
/// Ids are assigned on first sight and stable for the lifetime of the
/// instance. Interior mutability is limited to vocabulary growth, guarded by
/// an `RwLock`, so one instance is safe to share across concurrent section
/// calls.
#[derive(Default)]
pub struct WhitespaceTokenizer {
    vocab: RwLock<Vocab>,
}

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::new();
        {
            let vocab = self.vocab.read().expect("tokenizer vocab poisoned");
            let mut all_known = true;
            for word in text.split_whitespace() {
                match vocab.by_word.get(word) {
                    Some(&id) => ids.push(id),
                    None => {
                        all_known = false;
                        break;
                    }
                }
            }
            if all_known {
                return ids;
            }
        }

        // Slow path: at least one unseen word; re-run under the write lock.
        ids.clear();
        let mut guard = self.vocab.write().expect("tokenizer vocab poisoned");
        let vocab = &mut *guard;
        for word in text.split_whitespace() {
            let id = match vocab.by_word.get(word).copied() {
                Some(id) => id,
                None => {
                    let id = vocab.by_id.len() as u32;
                    vocab.by_id.push(word.to_string());
                    vocab.by_word.insert(word.to_string(), id);
                    id
                }
            };
            ids.push(id);
        }
        ids
    }

    fn detokenize(&self, ids: &[u32]) -> String {
        let vocab = self.vocab.read().expect("tokenizer vocab poisoned");
        let mut out = String::new();
        for &id in ids {
            let Some(word) = vocab.by_id.get(id as usize) else {
                debug_assert!(false, "detokenize called with unknown id {id}");
                continue;
            };
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        out
    }

    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
