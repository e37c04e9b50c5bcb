//! Synthesis: combine verified section summaries into one structured abstract.
//!
//! The synthesizer is the pipeline's join point. It concatenates the
//! accepted per-section summaries labeled by section name, runs one more
//! engine call asking for a fixed-schema structured abstract, and verifies
//! the result against the concatenated summaries — not the raw document —
//! with a looser overlap threshold, since the synthesis legitimately
//! rephrases text that was itself already grounded.
//!
//! When no section summary survived (or the synthesis call produced nothing
//! verifiable), the whole normalized document is summarized directly under a
//! lenient policy instead. The pipeline always produces *some* output; the
//! worst case is the `not reported` sentinel, never an empty result or an
//! error.

use crate::config::DigestConfig;
use crate::output::NOT_REPORTED;
use crate::pipeline::segment::SectionLabel;
use crate::pipeline::summarize::{EngineFailure, SummarizationEngine};
use crate::pipeline::verify::{verify, VerifyPolicy};
use crate::prompts;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of the synthesis step.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Structured abstract, or [`NOT_REPORTED`].
    pub summary: String,
    /// True when the whole-document fallback ran.
    pub fallback_used: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// Present when even the fallback call failed.
    pub error: Option<EngineFailure>,
}

fn label_heading(label: SectionLabel) -> String {
    let s = label.as_str();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Build the final summary from the accepted section summaries, falling back
/// to direct whole-document summarization when nothing else is available.
pub async fn synthesize(
    engine: &SummarizationEngine,
    accepted: &[(SectionLabel, String)],
    normalized_doc: &str,
    config: &DigestConfig,
) -> SynthesisResult {
    let start = Instant::now();
    let mut input_tokens = 0u64;
    let mut output_tokens = 0u64;

    // First choice: reduce the section summaries.
    if !accepted.is_empty() {
        let combined = accepted
            .iter()
            .map(|(label, summary)| format!("{}:\n{}", label_heading(*label), summary))
            .collect::<Vec<_>>()
            .join("\n");
        let task = config
            .synthesis_task
            .as_deref()
            .unwrap_or(prompts::SYNTHESIS_TASK);

        match engine.summarize(&combined, task).await {
            Ok(outcome) => {
                input_tokens += outcome.input_tokens;
                output_tokens += outcome.output_tokens;
                let verified = verify(
                    &outcome.text,
                    &combined,
                    &VerifyPolicy::grounded(config.synthesis_overlap),
                );
                if verified != NOT_REPORTED {
                    return SynthesisResult {
                        summary: verified,
                        fallback_used: false,
                        input_tokens,
                        output_tokens,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: None,
                    };
                }
                info!("synthesis output failed verification, falling back to whole document");
            }
            Err(f) => {
                warn!("synthesis call failed, falling back to whole document: {}", f.detail());
            }
        }
    }

    // Fallback: summarize the whole normalized document with the looser
    // policy. Grounding stays lenient here — the goal is any output at all.
    if normalized_doc.trim().is_empty() {
        return SynthesisResult {
            summary: NOT_REPORTED.to_string(),
            fallback_used: true,
            input_tokens,
            output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
        };
    }

    match engine.summarize(normalized_doc, prompts::STRUCTURE_TASK).await {
        Ok(outcome) => {
            input_tokens += outcome.input_tokens;
            output_tokens += outcome.output_tokens;
            let verified = verify(&outcome.text, normalized_doc, &VerifyPolicy::lenient());
            SynthesisResult {
                summary: verified,
                fallback_used: true,
                input_tokens,
                output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            }
        }
        Err(f) => {
            warn!("whole-document fallback failed: {}", f.detail());
            SynthesisResult {
                summary: NOT_REPORTED.to_string(),
                fallback_used: true,
                input_tokens,
                output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                error: Some(f),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerationError, GenerationParams, SummaryBackend};
    use crate::tokenizer::WhitespaceTokenizer;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FnBackend<F>(F);

    #[async_trait]
    impl<F> SummaryBackend for FnBackend<F>
    where
        F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
    {
        async fn generate(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, GenerationError> {
            (self.0)(prompt)
        }

        fn name(&self) -> &str {
            "fn"
        }
    }

    fn engine_for<F>(f: F) -> SummarizationEngine
    where
        F: Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        let config = DigestConfig::builder().retry_backoff_ms(1).build().unwrap();
        SummarizationEngine::new(
            Arc::new(FnBackend(f)),
            Arc::new(WhitespaceTokenizer::new()),
            &config,
        )
    }

    fn config() -> DigestConfig {
        DigestConfig::builder().build().unwrap()
    }

    #[tokio::test]
    async fn synthesizes_from_accepted_sections() {
        let engine = engine_for(|_| {
            Ok("Background: thirty participants were recruited for the accuracy study.".into())
        });
        let accepted = vec![
            (
                SectionLabel::Methods,
                "Thirty participants were recruited.".to_string(),
            ),
            (
                SectionLabel::Results,
                "Accuracy in the study was 85 percent.".to_string(),
            ),
        ];
        let result = synthesize(&engine, &accepted, "ignored document", &config()).await;
        assert!(!result.fallback_used);
        assert!(result.summary.contains("participants"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn empty_accepted_list_uses_whole_document_fallback() {
        let engine = engine_for(|prompt| {
            assert!(prompt.contains("structured abstract"));
            Ok("The document describes an accuracy experiment.".into())
        });
        let result = synthesize(
            &engine,
            &[],
            "A document about an accuracy experiment with thirty participants.",
            &config(),
        )
        .await;
        assert!(result.fallback_used);
        assert!(result.summary.contains("accuracy experiment"));
    }

    #[tokio::test]
    async fn unverifiable_synthesis_falls_back() {
        // First call returns text with zero overlap with the summaries; the
        // fallback call returns something lenient verification keeps.
        let engine = engine_for(|prompt| {
            if prompt.contains("Combine the section summaries") {
                Ok("Completely unrelated planets orbit distant quasars.".into())
            } else {
                Ok("A grounded fallback sentence.".into())
            }
        });
        let accepted = vec![(
            SectionLabel::Results,
            "Accuracy in the study was 85 percent.".to_string(),
        )];
        let result = synthesize(&engine, &accepted, "the document text", &config()).await;
        assert!(result.fallback_used);
        assert_eq!(result.summary, "A grounded fallback sentence.");
    }

    #[tokio::test]
    async fn total_failure_still_returns_not_reported() {
        let engine = engine_for(|_| {
            Err(GenerationError::Permanent {
                detail: "backend gone".into(),
            })
        });
        let result = synthesize(&engine, &[], "some document text", &config()).await;
        assert!(result.fallback_used);
        assert_eq!(result.summary, NOT_REPORTED);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn empty_document_and_no_sections_is_not_reported_without_calls() {
        let engine = engine_for(|_| panic!("no call expected"));
        let result = synthesize(&engine, &[], "   ", &config()).await;
        assert_eq!(result.summary, NOT_REPORTED);
        assert!(result.fallback_used);
    }
}
