//! Error types for the paper-digest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DigestError`] — **Fatal**: the digest cannot proceed at all (invalid
//!   configuration, no summarization backend could be resolved, the chunking
//!   token contract is violated). Returned as `Err(DigestError)` from the
//!   top-level `digest*` functions and the job store.
//!
//! * [`UnitError`] — **Non-fatal**: a single unit of work failed (one
//!   section's generation call errored or timed out) but every other unit is
//!   fine. Stored inside [`crate::output::SectionReport`] so callers can
//!   inspect partial success; the unit's summary reads `not reported`.
//!
//! A segmentation miss and a verification reject are not errors at all: the
//! former degrades to the `full` fallback section, the latter to the
//! `not reported` sentinel.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper-digest library.
///
/// Unit-level failures use [`UnitError`] and are stored in
/// [`crate::output::SectionReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No summarization backend could be resolved at pipeline construction.
    #[error("No summarization backend is configured.\n{hint}")]
    EngineNotConfigured { hint: String },

    // ── Pipeline contract errors ──────────────────────────────────────────
    /// The chunking token-capacity contract is violated (e.g. a zero token
    /// budget, or a tokenizer that cannot make progress). The only condition
    /// that makes the whole job meaningless.
    #[error("Chunking contract violated: {detail}")]
    ChunkingContract { detail: String },

    // ── Job store errors ──────────────────────────────────────────────────
    /// Could not read or write the job store file.
    #[error("Job store I/O failed for '{path}': {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The job store file holds something that is not a job array.
    #[error("Job store '{path}' is corrupt: {detail}")]
    StoreCorrupt { path: PathBuf, detail: String },

    /// A job was asked to transition out of a terminal state.
    #[error("Job '{id}' has already finished and cannot change status again")]
    JobAlreadyFinished { id: String },

    /// No job with the given id exists in the store.
    #[error("Job '{id}' not found")]
    JobNotFound { id: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single unit of work (one section, or the
/// synthesis step).
///
/// Stored alongside [`crate::output::SectionReport`] when a unit fails.
/// The overall digest continues; the unit's output reads `not reported`.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The generation backend failed after all retries.
    #[error("Section '{label}': generation failed after {retries} retries: {detail}")]
    Generation {
        label: String,
        retries: u8,
        detail: String,
    },

    /// The generation call exceeded the per-call timeout.
    #[error("Section '{label}': generation timed out after {secs}s")]
    Timeout { label: String, secs: u64 },
}
