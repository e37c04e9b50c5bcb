//! Result types returned by the digest pipeline.
//!
//! A completed digest always has a result object: fields that could not be
//! grounded read [`NOT_REPORTED`] rather than being absent. Callers check
//! [`SectionReport::status`] (and `error`) to distinguish "the model said
//! nothing verifiable" from "the call failed" — both degrade to the same
//! sentinel text, by design.

use crate::error::UnitError;
use crate::pipeline::segment::{SectionLabel, SegmentationMode};
use serde::{Deserialize, Serialize};

/// Sentinel meaning "no verifiable content produced".
///
/// A designed placeholder, not an error: downstream consumers treat it as
/// "field present but unknown".
pub const NOT_REPORTED: &str = "not reported";

/// Terminal state of one summarization unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// At least one sentence survived verification.
    Accepted,
    /// Generation succeeded but no sentence survived verification, or the
    /// section was too short to summarize.
    NotReported,
    /// The generation call itself failed or timed out.
    Failed,
}

/// Outcome for one section (or for the synthesis unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub label: SectionLabel,
    /// Verified summary text, or [`NOT_REPORTED`].
    pub summary: String,
    pub status: VerificationStatus,
    /// Length of the source span in characters.
    pub source_chars: usize,
    /// Number of chunks the section was split into (1 = direct call).
    pub chunk_count: usize,
    /// Token counts as estimated by the pipeline tokenizer.
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub retries: u8,
    /// Present when `status == Failed`.
    pub error: Option<UnitError>,
}

impl SectionReport {
    pub fn accepted(&self) -> bool {
        self.status == VerificationStatus::Accepted
    }
}

/// Aggregate statistics for one digest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestStats {
    /// Sections found by the segmenter.
    pub total_sections: usize,
    /// Sections with an accepted summary.
    pub summarized_sections: usize,
    /// Sections whose generation call failed.
    pub failed_sections: usize,
    /// Sections skipped as too short to summarize.
    pub skipped_sections: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Wall-clock spent inside generation calls (all sections + synthesis).
    pub generation_duration_ms: u64,
    /// True when the synthesis step fell back to whole-document summarization.
    pub synthesis_fallback: bool,
    /// Which segmentation pass produced the sections.
    pub segmentation: SegmentationMode,
}

/// Result of [`crate::digest`]: per-section reports in document order plus
/// the synthesized structured summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestOutput {
    pub sections: Vec<SectionReport>,
    /// Synthesized structured abstract, or [`NOT_REPORTED`].
    pub summary: String,
    pub stats: DigestStats,
}

impl DigestOutput {
    /// Look up the report for a section label.
    pub fn section(&self, label: SectionLabel) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.label == label)
    }
}
