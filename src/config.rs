//! Configuration types for the digest pipeline.
//!
//! All pipeline behaviour is controlled through [`DigestConfig`], built via
//! its [`DigestConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::backend::{EngineSelection, GenerationParams, SummaryBackend};
use crate::error::DigestError;
use crate::pipeline::segment::SegmentOptions;
use crate::progress::DigestProgressCallback;
use crate::tokenizer::Tokenizer;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a progress callback.
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;

/// Configuration for one digest run.
///
/// Built via [`DigestConfig::builder()`] or [`DigestConfig::default()`].
///
/// # Example
/// ```rust
/// use paper_digest::DigestConfig;
///
/// let config = DigestConfig::builder()
///     .max_input_tokens(512)
///     .concurrency(2)
///     .min_section_chars(200)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Sections at or below this many characters are skipped as too short to
    /// summarize (reported as `not reported`). Default: 200.
    ///
    /// Heading false positives produce tiny spans; summarizing an 80-char
    /// span wastes a model call and the result is usually an echo of the
    /// instruction. 200 characters is roughly two sentences, the smallest
    /// span a summary can say anything faithful about.
    pub min_section_chars: usize,

    /// The model's input token budget per call. Default: 1024.
    ///
    /// Sections that measure above this are chunked and summarized
    /// hierarchically. The budget covers the whole prompt, instruction
    /// included, as counted by the configured tokenizer.
    pub max_input_tokens: usize,

    /// Decoding controls forwarded to every generation call.
    pub generation: GenerationParams,

    /// Number of concurrent section-level generation calls. Default: 4.
    ///
    /// Sections are independent and the backend is network-bound, so modest
    /// parallelism cuts wall-clock time roughly linearly. Raise with care:
    /// free-tier inference endpoints rate-limit aggressively.
    pub concurrency: usize,

    /// Retries per generation call on a *transient* failure. Default: 1.
    ///
    /// One retry after a fixed backoff catches the cold-start case ("model
    /// is currently loading") without stalling the document on a backend
    /// that is genuinely down. Permanent failures are never retried.
    pub max_retries: u32,

    /// Fixed backoff before the retry, in milliseconds. Default: 5000.
    pub retry_backoff_ms: u64,

    /// Per-generation-call timeout in seconds. Default: 60.
    ///
    /// A stalled remote call must not hold the whole document's progress: a
    /// section whose call exceeds this records as failed and the digest
    /// proceeds.
    pub generation_timeout_secs: u64,

    /// Jaccard overlap floor for results/methods verification. Default: 0.10.
    pub grounding_overlap: f32,

    /// Jaccard overlap floor for the synthesis verification, grounded
    /// against the concatenated section summaries. Default: 0.25.
    pub synthesis_overlap: f32,

    /// Which generation backend to use. Default: [`EngineSelection::Auto`].
    pub engine: EngineSelection,

    /// Token measuring/slicing capability. Default: the built-in
    /// word-level tokenizer.
    pub tokenizer: Option<Arc<dyn Tokenizer>>,

    /// Override for the synthesis instruction. If `None`, uses the built-in
    /// structured-abstract prompt.
    pub synthesis_task: Option<String>,

    /// Optional observer for per-section progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Segmenter tuning.
    pub segment: SegmentOptions,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            min_section_chars: 200,
            max_input_tokens: 1024,
            generation: GenerationParams::default(),
            concurrency: 4,
            max_retries: 1,
            retry_backoff_ms: 5000,
            generation_timeout_secs: 60,
            grounding_overlap: 0.10,
            synthesis_overlap: 0.25,
            engine: EngineSelection::Auto,
            tokenizer: None,
            synthesis_task: None,
            progress_callback: None,
            segment: SegmentOptions::default(),
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("min_section_chars", &self.min_section_chars)
            .field("max_input_tokens", &self.max_input_tokens)
            .field("generation", &self.generation)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("grounding_overlap", &self.grounding_overlap)
            .field("synthesis_overlap", &self.synthesis_overlap)
            .field("engine", &self.engine)
            .field("tokenizer", &self.tokenizer.as_ref().map(|_| "<dyn Tokenizer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn Callback>"),
            )
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DigestConfig`].
#[derive(Debug)]
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    pub fn min_section_chars(mut self, n: usize) -> Self {
        self.config.min_section_chars = n;
        self
    }

    pub fn max_input_tokens(mut self, n: usize) -> Self {
        self.config.max_input_tokens = n.max(1);
        self
    }

    pub fn generation(mut self, params: GenerationParams) -> Self {
        self.config.generation = params;
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.generation.max_output_tokens = n.max(1);
        self
    }

    pub fn num_beams(mut self, n: u32) -> Self {
        self.config.generation.num_beams = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs.max(1);
        self
    }

    pub fn grounding_overlap(mut self, ratio: f32) -> Self {
        self.config.grounding_overlap = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn synthesis_overlap(mut self, ratio: f32) -> Self {
        self.config.synthesis_overlap = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn engine(mut self, selection: EngineSelection) -> Self {
        self.config.engine = selection;
        self
    }

    /// Shortcut for [`EngineSelection::Custom`].
    pub fn backend(mut self, backend: Arc<dyn SummaryBackend>) -> Self {
        self.config.engine = EngineSelection::Custom(backend);
        self
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.config.tokenizer = Some(tokenizer);
        self
    }

    pub fn synthesis_task(mut self, task: impl Into<String>) -> Self {
        self.config.synthesis_task = Some(task.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn min_span_chars(mut self, n: usize) -> Self {
        self.config.segment.min_span_chars = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        if c.max_input_tokens == 0 {
            return Err(DigestError::InvalidConfig(
                "max_input_tokens must be >= 1".into(),
            ));
        }
        if c.generation.max_output_tokens == 0 {
            return Err(DigestError::InvalidConfig(
                "max_output_tokens must be >= 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DigestError::InvalidConfig("concurrency must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&c.grounding_overlap) || !(0.0..=1.0).contains(&c.synthesis_overlap)
        {
            return Err(DigestError::InvalidConfig(
                "overlap thresholds must be within 0.0..=1.0".into(),
            ));
        }
        Ok(self.config)
    }
}
