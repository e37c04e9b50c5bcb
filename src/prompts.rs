//! Task instructions for summarization calls.
//!
//! Centralising every instruction here serves two purposes:
//!
//! 1. **Single source of truth** — tightening a section's instruction (e.g.
//!    asking results for statistics) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the prompts directly without
//!    a live backend, so instruction regressions are easy to catch.
//!
//! The instructions stay gentle and factual on purpose: heavy-handed
//! "extract exactly these fields" phrasing gets echoed back verbatim by
//! small summarization models, and echoed instructions are exactly what the
//! verifier's denylist then has to throw away.

use crate::pipeline::segment::SectionLabel;

/// Per-section task instruction, prepended to the section text.
pub fn task_for(label: SectionLabel) -> &'static str {
    match label {
        SectionLabel::Abstract => "Write a concise factual summary of the abstract.\n\n",
        SectionLabel::Introduction => {
            "Summarize the introduction: main topic and objectives or hypotheses.\n\n"
        }
        SectionLabel::Methods => {
            "Summarize the methods: participants or subjects, design, measures, analyses.\n\n"
        }
        SectionLabel::Results => {
            "Summarize the key results. Include numbers and statistics if present.\n\n"
        }
        SectionLabel::Discussion => {
            "Summarize the discussion: interpretation, stated limitations, implications.\n\n"
        }
        SectionLabel::Conclusion => "Summarize the conclusions in 2-4 factual sentences.\n\n",
        SectionLabel::Full => {
            "Summarize the paper's purpose, methods, main results, and key takeaways.\n\n"
        }
    }
}

/// Reduce-step instruction for hierarchical summarization: the input is the
/// concatenation of partial chunk summaries, not raw section text.
pub const REDUCE_TASK: &str =
    "Combine the partial summaries below into one coherent summary. \
     Use ONLY facts present in them. Preserve numbers and units. Avoid repetition.\n\n";

/// Synthesis instruction: build the structured abstract from the accepted
/// per-section summaries.
pub const SYNTHESIS_TASK: &str = "Combine the section summaries into a single structured abstract with exactly these headers:\n\
     Background:\nMethods:\nResults:\nConclusions:\n\n\
     Rules: Use ONLY facts present in the summaries below. If a detail is missing, write 'not reported'. \
     Preserve numbers/units/statistics exactly as given. Avoid repetition.\n\n";

/// Whole-document fallback instruction, used when every section failed.
pub const STRUCTURE_TASK: &str =
    "Summarize the following scientific content into a structured abstract with these fields:\n\
     - Background:\n- Methods:\n- Results:\n- Conclusions:\n\
     Use ONLY facts stated in the text. Preserve numbers/units. Avoid repetition.\n\n";

/// Frame a task instruction and its source text into one prompt.
///
/// The explicit delimiters keep instruction echoes recognisable: anything
/// quoting "TEXT START" in the output is boilerplate the verifier drops.
pub fn compose(task: &str, text: &str) -> String {
    format!("{task}==== TEXT START ====\n{text}\n==== TEXT END ====")
}
