//! # paper-digest
//!
//! Turn long, unstructured document text (as extracted from a PDF) into a
//! short, faithful, structured summary.
//!
//! ## Why this crate?
//!
//! Summarization models accept a bounded number of input tokens per call,
//! and left to themselves they invent facts. This crate works within both
//! constraints: it partitions a document into labeled sections, budgets and
//! chunks each one for the model's context window, summarizes
//! hierarchically, and then filters every candidate sentence for lexical
//! grounding against the source before anything reaches the caller. Fields
//! that cannot be grounded read `not reported` — never silently invented,
//! never an error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! raw text
//!  │
//!  ├─ 1. Normalize   de-hyphenate, strip page numbers / running headers
//!  ├─ 2. Segment     abstract / introduction / methods / results / … or `full`
//!  ├─ 3. Chunk       token-budget windows per section (when needed)
//!  ├─ 4. Summarize   concurrent backend calls, chunk → reduce for long sections
//!  ├─ 5. Verify      denylist + digit gate + Jaccard grounding per sentence
//!  └─ 6. Synthesize  one structured abstract (Background/Methods/Results/Conclusions)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_digest::{digest, DigestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend auto-detected from HUGGINGFACE_API_KEY / OPENAI_API_KEY / …
//!     let config = DigestConfig::default();
//!     let output = digest(std::fs::read_to_string("paper.txt")?, &config).await?;
//!     for section in &output.sections {
//!         println!("## {}\n{}\n", section.label, section.summary);
//!     }
//!     println!("## Synthesis\n{}", output.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-digest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paper-digest = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod stream;
pub mod tokenizer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{
    ChatBackend, EngineSelection, GenerationError, GenerationParams, HfInferenceBackend,
    SummaryBackend,
};
pub use config::{DigestConfig, DigestConfigBuilder, ProgressCallback};
pub use digest::{digest, digest_sync};
pub use error::{DigestError, UnitError};
pub use output::{DigestOutput, DigestStats, SectionReport, VerificationStatus, NOT_REPORTED};
pub use pipeline::segment::{Section, SectionLabel, Segmentation, SegmentationMode, SegmentOptions};
pub use pipeline::verify::VerifyPolicy;
pub use progress::DigestProgressCallback;
pub use store::{JobRecord, JobStatus, JobStore, JsonFileStore};
pub use stream::{digest_stream, DigestEvent, DigestEventStream};
pub use tokenizer::{Tokenizer, WhitespaceTokenizer};
