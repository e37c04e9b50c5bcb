//! Eager (full-document) digest entry points.
//!
//! This module provides the simpler API: run the whole pipeline, wait for
//! every section and the synthesis, then return one [`DigestOutput`]. Use
//! [`crate::stream::digest_stream`] instead when you want section results
//! progressively.
//!
//! ## Failure posture
//!
//! `digest` returns `Err` only for conditions that make the whole job
//! meaningless (no backend, invalid config, broken chunking contract).
//! Everything else degrades in place: unrecognized structure becomes the
//! `full` section, failed generation calls become `not reported`, and empty
//! input produces a completed result whose every field reads `not reported`.

use crate::backend::resolve_backend;
use crate::config::DigestConfig;
use crate::error::{DigestError, UnitError};
use crate::output::{DigestOutput, DigestStats, SectionReport, VerificationStatus, NOT_REPORTED};
use crate::pipeline::normalize::normalize;
use crate::pipeline::segment::{segment, Section, SectionLabel, SegmentationMode};
use crate::pipeline::summarize::{EngineFailure, SummarizationEngine};
use crate::pipeline::synthesize::synthesize;
use crate::pipeline::verify::{verify, VerifyPolicy};
use crate::prompts;
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Digest raw extracted text into per-section summaries plus one
/// synthesized structured abstract.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `raw_text` — plain text as produced by an upstream extractor
/// * `config` — pipeline configuration
///
/// # Returns
/// `Ok(DigestOutput)` on completion, even when sections failed
/// (check `output.stats.failed_sections`).
///
/// # Errors
/// Returns `Err(DigestError)` only for fatal conditions:
/// - no generation backend could be resolved
/// - invalid configuration
pub async fn digest(
    raw_text: impl AsRef<str>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let total_start = Instant::now();
    let raw = raw_text.as_ref();
    info!("Starting digest: {} chars of raw text", raw.len());

    // ── Step 1: Normalize ────────────────────────────────────────────────
    let normalized = normalize(raw);

    // ── Step 2: Degenerate input ─────────────────────────────────────────
    // Empty (or effectively empty) text is not a fault: the result is a
    // completed digest whose every field reads `not reported`.
    if normalized.is_empty() {
        info!("Input is empty after normalization, returning degenerate digest");
        return Ok(degenerate_output(total_start));
    }

    // ── Step 3: Resolve capabilities ─────────────────────────────────────
    let backend = resolve_backend(&config.engine)?;
    debug!("Using backend '{}'", backend.name());
    let tokenizer: Arc<dyn Tokenizer> = config
        .tokenizer
        .clone()
        .unwrap_or_else(|| Arc::new(WhitespaceTokenizer::new()));
    let engine = SummarizationEngine::new(backend, Arc::clone(&tokenizer), config);

    // ── Step 4: Segment ──────────────────────────────────────────────────
    let segmentation = segment(&normalized, &config.segment);
    let total_sections = segmentation.sections.len();
    info!(
        "Segmentation ({:?}): {:?}",
        segmentation.mode,
        segmentation.labels()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_digest_start(total_sections);
    }

    // ── Step 5: Summarize sections concurrently ──────────────────────────
    // Sections are independent: each call reads only its own span and the
    // shared read-only engine, so they fan out freely.
    let generation_start = Instant::now();
    let mut indexed: Vec<(usize, SectionReport)> =
        stream::iter(segmentation.sections.iter().enumerate().map(|(order, section)| {
            let engine = &engine;
            async move {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_section_start(section.label.as_str(), total_sections);
                }
                let report = summarize_section(engine, section, config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &report.error {
                        None => cb.on_section_complete(
                            section.label.as_str(),
                            total_sections,
                            report.summary.len(),
                        ),
                        Some(e) => cb.on_section_error(
                            section.label.as_str(),
                            total_sections,
                            &e.to_string(),
                        ),
                    }
                }
                (order, report)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // Restore document order after unordered completion.
    indexed.sort_by_key(|(order, _)| *order);
    let reports: Vec<SectionReport> = indexed.into_iter().map(|(_, r)| r).collect();

    // ── Step 6: Synthesize (join point over all sections) ────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_synthesis_start();
    }
    let accepted: Vec<(SectionLabel, String)> = reports
        .iter()
        .filter(|r| r.accepted())
        .map(|r| (r.label, r.summary.clone()))
        .collect();
    let synthesis = synthesize(&engine, &accepted, &normalized, config).await;
    let generation_duration_ms = generation_start.elapsed().as_millis() as u64;

    // ── Step 7: Stats and output ─────────────────────────────────────────
    let summarized = accepted.len();
    let failed = reports
        .iter()
        .filter(|r| r.status == VerificationStatus::Failed)
        .count();
    let skipped = segmentation
        .sections
        .iter()
        .filter(|s| s.text.len() <= config.min_section_chars)
        .count();

    let stats = DigestStats {
        total_sections,
        summarized_sections: summarized,
        failed_sections: failed,
        skipped_sections: skipped,
        total_input_tokens: reports.iter().map(|r| r.input_tokens).sum::<u64>()
            + synthesis.input_tokens,
        total_output_tokens: reports.iter().map(|r| r.output_tokens).sum::<u64>()
            + synthesis.output_tokens,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        generation_duration_ms,
        synthesis_fallback: synthesis.fallback_used,
        segmentation: segmentation.mode,
    };

    info!(
        "Digest complete: {}/{} sections, {}ms total",
        summarized, total_sections, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_digest_complete(total_sections, summarized);
    }

    Ok(DigestOutput {
        sections: reports,
        summary: synthesis.summary,
        stats,
    })
}

/// Synchronous wrapper around [`digest`].
///
/// Creates a temporary tokio runtime internally.
pub fn digest_sync(
    raw_text: impl AsRef<str>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(digest(raw_text, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Summarize and verify one section. Always returns a report — a failed
/// call never aborts sibling sections.
pub(crate) async fn summarize_section(
    engine: &SummarizationEngine,
    section: &Section,
    config: &DigestConfig,
) -> SectionReport {
    let source_chars = section.text.len();

    // Too-short spans are heading false positives or stubs; summarizing them
    // wastes a call and the model mostly echoes the instruction back.
    if source_chars <= config.min_section_chars {
        debug!(
            "Skipping section '{}' ({} chars <= {})",
            section.label, source_chars, config.min_section_chars
        );
        return SectionReport {
            label: section.label,
            summary: NOT_REPORTED.to_string(),
            status: VerificationStatus::NotReported,
            source_chars,
            chunk_count: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: None,
        };
    }

    let task = prompts::task_for(section.label);
    match engine.summarize(&section.text, task).await {
        Ok(outcome) => {
            let policy = policy_for(section.label, &section.text, config);
            let verified = verify(&outcome.text, &section.text, &policy);
            let status = if verified == NOT_REPORTED {
                VerificationStatus::NotReported
            } else {
                VerificationStatus::Accepted
            };
            SectionReport {
                label: section.label,
                summary: verified,
                status,
                source_chars,
                chunk_count: outcome.chunk_count,
                input_tokens: outcome.input_tokens,
                output_tokens: outcome.output_tokens,
                duration_ms: outcome.duration_ms,
                retries: outcome.retries,
                error: None,
            }
        }
        Err(failure) => {
            warn!(
                "Section '{}' failed: {}",
                section.label,
                failure.detail()
            );
            let (retries, error) = match &failure {
                EngineFailure::Failed { retries, detail } => (
                    *retries,
                    UnitError::Generation {
                        label: section.label.as_str().to_string(),
                        retries: *retries,
                        detail: detail.clone(),
                    },
                ),
                EngineFailure::TimedOut { secs } => (
                    0,
                    UnitError::Timeout {
                        label: section.label.as_str().to_string(),
                        secs: *secs,
                    },
                ),
            };
            SectionReport {
                label: section.label,
                summary: NOT_REPORTED.to_string(),
                status: VerificationStatus::Failed,
                source_chars,
                chunk_count: 0,
                input_tokens: 0,
                output_tokens: 0,
                duration_ms: 0,
                retries,
                error: Some(error),
            }
        }
    }
}

/// Per-label verification policy.
///
/// Results demand grounding plus digits (when the source itself has any);
/// methods demand grounding; everything else only sheds boilerplate. The
/// asymmetry is deliberate: results and methods are where invented numbers
/// and invented procedures do the most damage.
fn policy_for(label: SectionLabel, source: &str, config: &DigestConfig) -> VerifyPolicy {
    match label {
        SectionLabel::Results => VerifyPolicy {
            enforce_overlap: true,
            min_overlap: config.grounding_overlap,
            require_digit: source.chars().any(|c| c.is_ascii_digit()),
        },
        SectionLabel::Methods => VerifyPolicy::grounded(config.grounding_overlap),
        _ => VerifyPolicy::lenient(),
    }
}

fn degenerate_output(total_start: Instant) -> DigestOutput {
    DigestOutput {
        sections: vec![SectionReport {
            label: SectionLabel::Full,
            summary: NOT_REPORTED.to_string(),
            status: VerificationStatus::NotReported,
            source_chars: 0,
            chunk_count: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: None,
        }],
        summary: NOT_REPORTED.to_string(),
        stats: DigestStats {
            total_sections: 1,
            summarized_sections: 0,
            failed_sections: 0,
            skipped_sections: 1,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            generation_duration_ms: 0,
            synthesis_fallback: true,
            segmentation: SegmentationMode::Fallback,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_policy_requires_digits_only_when_source_has_them() {
        let config = DigestConfig::default();
        let with_digits = policy_for(SectionLabel::Results, "accuracy was 85", &config);
        assert!(with_digits.require_digit);
        let without = policy_for(SectionLabel::Results, "accuracy was high", &config);
        assert!(!without.require_digit);
        assert!(without.enforce_overlap);
    }

    #[test]
    fn non_grounded_labels_get_the_lenient_policy() {
        let config = DigestConfig::default();
        for label in [
            SectionLabel::Abstract,
            SectionLabel::Introduction,
            SectionLabel::Discussion,
            SectionLabel::Conclusion,
            SectionLabel::Full,
        ] {
            let policy = policy_for(label, "text with 42 digits", &config);
            assert!(!policy.enforce_overlap, "{label} should be lenient");
            assert!(!policy.require_digit);
        }
    }

    #[test]
    fn degenerate_output_reads_not_reported_everywhere() {
        let out = degenerate_output(Instant::now());
        assert_eq!(out.summary, NOT_REPORTED);
        assert_eq!(out.sections.len(), 1);
        assert_eq!(out.sections[0].label, SectionLabel::Full);
        assert_eq!(out.sections[0].summary, NOT_REPORTED);
        assert!(out.stats.synthesis_fallback);
    }
}
