//! Summarization engine: drive the generation backend with retry, timeout,
//! and the hierarchical chunk-then-reduce strategy.
//!
//! This module is intentionally thin on prompt content — all instructions
//! live in [`crate::prompts`] so they can change without touching retry or
//! timeout logic here.
//!
//! ## Call shapes
//!
//! * **Direct** — the section fits the input budget; one call, one result.
//! * **Hierarchical** — the chunker produced several slices. Each slice is
//!   summarized with the same instruction, then the concatenated partials
//!   are summarized once more (the reduce step). This bounds compute per
//!   call and keeps latency near-linear in section length.
//!
//! ## Retry strategy
//!
//! Only transient failures are retried, once, after a fixed backoff — long
//! enough for a cold-starting inference endpoint to finish loading.
//! Timeouts are not retried: a backend that sat on one call for the full
//! window will usually sit on the next one too, and sibling sections are
//! waiting.

use crate::backend::{GenerationParams, SummaryBackend};
use crate::config::DigestConfig;
use crate::pipeline::chunk::chunk;
use crate::prompts;
use crate::tokenizer::Tokenizer;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Successful engine result for one unit of work.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub text: String,
    /// 1 for a direct call; the slice count for hierarchical ones.
    pub chunk_count: usize,
    /// Token estimates from the pipeline tokenizer (prompt side / output side).
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// Retries spent across all calls for this unit.
    pub retries: u8,
}

/// Why a unit of work produced no summary.
#[derive(Debug, Clone)]
pub enum EngineFailure {
    /// The backend failed (after the retry, if the failure was transient).
    Failed { retries: u8, detail: String },
    /// The call exceeded the per-call timeout.
    TimedOut { secs: u64 },
}

impl EngineFailure {
    pub fn detail(&self) -> String {
        match self {
            EngineFailure::Failed { detail, .. } => detail.clone(),
            EngineFailure::TimedOut { secs } => format!("timed out after {secs}s"),
        }
    }
}

/// The summarization capability handed to the pipeline stages.
///
/// Holds only shared, read-only state (backend, tokenizer, decoding
/// parameters), so one engine serves all concurrent section calls.
pub struct SummarizationEngine {
    backend: Arc<dyn SummaryBackend>,
    tokenizer: Arc<dyn Tokenizer>,
    params: GenerationParams,
    max_input_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl SummarizationEngine {
    pub fn new(
        backend: Arc<dyn SummaryBackend>,
        tokenizer: Arc<dyn Tokenizer>,
        config: &DigestConfig,
    ) -> Self {
        Self {
            backend,
            tokenizer,
            params: config.generation.clone(),
            max_input_tokens: config.max_input_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.generation_timeout_secs,
        }
    }

    /// Summarize `text` under `task`, chunking hierarchically when the text
    /// exceeds the input budget.
    pub async fn summarize(
        &self,
        text: &str,
        task: &str,
    ) -> Result<SummaryOutcome, EngineFailure> {
        let start = Instant::now();

        // The budget for the text itself: whatever the instruction and frame
        // leave over. Never zero, so chunking always makes progress.
        let overhead = self.tokenizer.count(&prompts::compose(task, ""));
        let budget = self.max_input_tokens.saturating_sub(overhead).max(1);

        let chunks = match chunk(text, self.tokenizer.as_ref(), budget) {
            Ok(chunks) => chunks,
            Err(e) => {
                return Err(EngineFailure::Failed {
                    retries: 0,
                    detail: e.to_string(),
                })
            }
        };

        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        let mut retries = 0u32;

        if chunks.len() == 1 {
            let prompt = prompts::compose(task, &chunks[0].text);
            input_tokens += self.tokenizer.count(&prompt) as u64;
            let (summary, attempts) = self.call_with_retry(&prompt).await?;
            output_tokens += self.tokenizer.count(&summary) as u64;
            return Ok(SummaryOutcome {
                text: summary,
                chunk_count: 1,
                input_tokens,
                output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                retries: attempts,
            });
        }

        // Map step: summarize each slice with the same instruction. A failed
        // slice is dropped rather than failing the section; the unit fails
        // only when every slice does.
        debug!(chunks = chunks.len(), "hierarchical summarization");
        let mut partials: Vec<String> = Vec::with_capacity(chunks.len());
        let mut last_failure: Option<EngineFailure> = None;
        for c in &chunks {
            let prompt = prompts::compose(task, &c.text);
            input_tokens += self.tokenizer.count(&prompt) as u64;
            match self.call_with_retry(&prompt).await {
                Ok((summary, attempts)) => {
                    output_tokens += self.tokenizer.count(&summary) as u64;
                    retries += attempts as u32;
                    partials.push(summary);
                }
                Err(f) => {
                    warn!(chunk = c.index, "chunk summarization failed: {}", f.detail());
                    if let EngineFailure::Failed { retries: r, .. } = &f {
                        retries += *r as u32;
                    }
                    last_failure = Some(f);
                }
            }
        }

        if partials.is_empty() {
            return Err(last_failure.unwrap_or(EngineFailure::Failed {
                retries: retries.min(u8::MAX as u32) as u8,
                detail: "all chunks failed".into(),
            }));
        }

        // Reduce step: summarize the concatenated partials once more. If the
        // reduce call itself fails, the joined partials are still grounded
        // text; return them rather than discarding the work.
        let joined = partials.join("\n");
        let reduce_prompt = prompts::compose(prompts::REDUCE_TASK, &joined);
        input_tokens += self.tokenizer.count(&reduce_prompt) as u64;
        let text = match self.call_with_retry(&reduce_prompt).await {
            Ok((reduced, attempts)) => {
                retries += attempts as u32;
                output_tokens += self.tokenizer.count(&reduced) as u64;
                reduced
            }
            Err(f) => {
                warn!("reduce step failed, keeping joined partials: {}", f.detail());
                joined
            }
        };

        Ok(SummaryOutcome {
            text,
            chunk_count: chunks.len(),
            input_tokens,
            output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
            retries: retries.min(u8::MAX as u32) as u8,
        })
    }

    /// One generation call: timeout-wrapped, with a single fixed-backoff
    /// retry on transient failures. Returns the text and the attempts spent.
    async fn call_with_retry(&self, prompt: &str) -> Result<(String, u8), EngineFailure> {
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(
                    "retry {}/{} after {}ms: {}",
                    attempt,
                    self.max_retries,
                    self.retry_backoff_ms,
                    last_err.as_deref().unwrap_or("unknown"),
                );
                sleep(Duration::from_millis(self.retry_backoff_ms)).await;
            }

            let call = self.backend.generate(prompt, &self.params);
            match timeout(Duration::from_secs(self.timeout_secs), call).await {
                Err(_) => {
                    return Err(EngineFailure::TimedOut {
                        secs: self.timeout_secs,
                    });
                }
                Ok(Ok(text)) => return Ok((text, attempt as u8)),
                Ok(Err(e)) if e.is_transient() && attempt < self.max_retries => {
                    last_err = Some(e.to_string());
                }
                Ok(Err(e)) => {
                    return Err(EngineFailure::Failed {
                        retries: attempt as u8,
                        detail: e.to_string(),
                    });
                }
            }
        }

        Err(EngineFailure::Failed {
            retries: self.max_retries as u8,
            detail: last_err.unwrap_or_else(|| "unknown error".into()),
        })
    }
}
