//! Pipeline stages for document digestion.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. a different verification heuristic) without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! raw text ──▶ normalize ──▶ segment ──▶ chunk ──▶ summarize ──▶ verify ──▶ synthesize
//!             (cleanup)    (label spans) (budget)  (backend)    (grounding)  (final pass)
//! ```
//!
//! 1. [`normalize`]  — deterministic cleanup of extraction artifacts
//! 2. [`segment`]    — partition into canonical labeled sections, with a
//!    guaranteed `full` fallback
//! 3. [`chunk`]      — token-budget windowing through the injected tokenizer
//! 4. [`summarize`]  — drive the generation backend, with retry/timeout and
//!    the hierarchical chunk-then-reduce strategy; the only stage with I/O
//! 5. [`verify`]     — sentence-level lexical grounding against the source
//! 6. [`synthesize`] — combine verified section summaries into the final
//!    structured abstract, with a whole-document fallback

pub mod chunk;
pub mod normalize;
pub mod segment;
pub mod summarize;
pub mod synthesize;
pub mod verify;
