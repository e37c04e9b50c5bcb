//! Streaming digest API: emit section results as they complete.
//!
//! Large documents mean several long generation calls. A stream-based API
//! lets callers display partial results immediately or forward them to a
//! client over a WebSocket instead of buffering the whole digest.
//!
//! Unlike the eager [`crate::digest::digest`] which returns only after
//! everything finishes, [`digest_stream`] yields one
//! [`DigestEvent::Section`] per section *in completion order* (sort by
//! label or keep your own order if it matters), followed by exactly one
//! [`DigestEvent::Synthesis`] — the synthesis is a join point and is always
//! the final event.

use crate::backend::resolve_backend;
use crate::config::DigestConfig;
use crate::digest::summarize_section;
use crate::error::DigestError;
use crate::output::{SectionReport, VerificationStatus, NOT_REPORTED};
use crate::pipeline::normalize::normalize;
use crate::pipeline::segment::{segment, SectionLabel};
use crate::pipeline::summarize::SummarizationEngine;
use crate::pipeline::synthesize::synthesize;
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::info;

/// One progressive result from the digest pipeline.
#[derive(Debug, Clone)]
pub enum DigestEvent {
    /// A section finished (accepted, `not reported`, or failed).
    Section(SectionReport),
    /// The final synthesized summary; always the last event.
    Synthesis {
        summary: String,
        fallback_used: bool,
    },
}

/// A boxed stream of digest events.
pub type DigestEventStream = Pin<Box<dyn Stream<Item = DigestEvent> + Send>>;

/// Digest raw text, streaming per-section results as they are ready.
///
/// # Returns
/// - `Ok(DigestEventStream)` — section events in completion order, then one
///   synthesis event
/// - `Err(DigestError)` — fatal error (no backend configured, etc.)
pub async fn digest_stream(
    raw_text: impl Into<String>,
    config: &DigestConfig,
) -> Result<DigestEventStream, DigestError> {
    let raw: String = raw_text.into();
    info!("Starting streaming digest: {} chars", raw.len());

    let normalized = normalize(&raw);

    // Degenerate input: emit the two terminal events without a backend.
    if normalized.is_empty() {
        let events = vec![
            DigestEvent::Section(SectionReport {
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
            }),
            DigestEvent::Synthesis {
                summary: NOT_REPORTED.to_string(),
                fallback_used: true,
            },
        ];
        return Ok(Box::pin(stream::iter(events)));
    }

    // Resolve the backend before spawning so configuration errors surface
    // eagerly as `Err` instead of dying silently inside the task.
    let backend = resolve_backend(&config.engine)?;
    let tokenizer: Arc<dyn Tokenizer> = config
        .tokenizer
        .clone()
        .unwrap_or_else(|| Arc::new(WhitespaceTokenizer::new()));
    let config = config.clone();

    let (tx, rx) = mpsc::channel::<DigestEvent>(8);

    tokio::spawn(async move {
        let engine = SummarizationEngine::new(backend, tokenizer, &config);
        let segmentation = segment(&normalized, &config.segment);

        let mut reports: Vec<SectionReport> = Vec::with_capacity(segmentation.sections.len());
        {
            let engine = &engine;
            let config = &config;
            let mut section_stream =
                stream::iter(segmentation.sections.iter().map(|section| async move {
                    summarize_section(engine, section, config).await
                }))
                .buffer_unordered(config.concurrency);

            while let Some(report) = section_stream.next().await {
                // A dropped receiver cancels the rest of the work.
                if tx.send(DigestEvent::Section(report.clone())).await.is_err() {
                    return;
                }
                reports.push(report);
            }
        }

        let accepted: Vec<(SectionLabel, String)> = reports
            .iter()
            .filter(|r| r.accepted())
            .map(|r| (r.label, r.summary.clone()))
            .collect();

        let synthesis = synthesize(&engine, &accepted, &normalized, &config).await;
        let _ = tx
            .send(DigestEvent::Synthesis {
                summary: synthesis.summary,
                fallback_used: synthesis.fallback_used,
            })
            .await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}
