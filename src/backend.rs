//! Generation backends: the single seam behind summarization.
//!
//! Everything above this module asks one question — "produce a short text
//! from this prompt" — and [`SummaryBackend`] is the only answer it sees.
//! Swapping a local sequence-to-sequence model for a remote inference call
//! (or a scripted test double) changes nothing outside this file.
//!
//! Two backends ship with the crate:
//!
//! * [`ChatBackend`] — any chat-completion provider reachable through
//!   `edgequake_llm` (OpenAI, Anthropic, Gemini, Ollama, …).
//! * [`HfInferenceBackend`] — the Hugging Face Inference API summarization
//!   endpoint, including its cold-start "model is currently loading" state,
//!   which surfaces as a retryable [`GenerationError::Warming`].
//!
//! Which backend runs is decided exactly once, at pipeline construction,
//! from the [`EngineSelection`] value in the config — never by scattering
//! environment checks through call sites.

use crate::error::DigestError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default Hugging Face summarization model for auto-detected setups.
pub const DEFAULT_HF_MODEL: &str = "facebook/bart-large-cnn";

/// Default chat model when a provider is named without a model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-nano";

const HF_API_BASE: &str = "https://api-inference.huggingface.co/models";

// ── Parameters ───────────────────────────────────────────────────────────

/// Decoding controls passed to every generation call.
///
/// Beam and anti-repetition knobs only reach backends that understand them
/// (the HF endpoint); chat backends use temperature and the output cap.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Hard cap on generated tokens.
    pub max_output_tokens: usize,
    /// Optional floor, for backends that support one.
    pub min_output_tokens: Option<usize>,
    pub num_beams: u32,
    /// No-repeat n-gram size; 0 disables.
    pub no_repeat_ngram: u32,
    pub repetition_penalty: f32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 256,
            min_output_tokens: None,
            num_beams: 4,
            no_repeat_ngram: 4,
            repetition_penalty: 1.3,
            temperature: 0.1,
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Why a generation call failed.
///
/// The transient/permanent split drives the retry policy: [`Warming`] and
/// [`Transient`] are retried once after a fixed backoff; [`Permanent`] and
/// [`Empty`] are not retried at all.
///
/// [`Warming`]: GenerationError::Warming
/// [`Transient`]: GenerationError::Transient
/// [`Permanent`]: GenerationError::Permanent
/// [`Empty`]: GenerationError::Empty
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The backend is cold-starting ("model is currently loading").
    #[error("backend is still loading: {detail}")]
    Warming { detail: String },

    /// Rate limit, 5xx, or network blip; a retry may succeed.
    #[error("transient backend error: {detail}")]
    Transient { detail: String },

    /// Bad credentials, bad request, or any condition a retry cannot fix.
    #[error("permanent backend error: {detail}")]
    Permanent { detail: String },

    /// The call succeeded but produced no usable text.
    #[error("backend returned an empty completion")]
    Empty,
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Warming { .. } | GenerationError::Transient { .. }
        )
    }
}

// ── The seam ─────────────────────────────────────────────────────────────

/// Produce a short text from a prompt.
///
/// Implementations hold no mutable state across calls and must be safe for
/// concurrent use: the pipeline issues independent per-section calls against
/// one shared instance.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;

    /// Short human-readable identifier for logs.
    fn name(&self) -> &str;
}

// ── Strategy ─────────────────────────────────────────────────────────────

/// Which backend the pipeline should use, chosen once at construction.
#[derive(Clone, Default)]
pub enum EngineSelection {
    /// Resolve from the environment (see [`resolve_backend`] for the order).
    #[default]
    Auto,
    /// A named chat provider routed through `edgequake_llm`.
    Chat {
        provider: String,
        model: Option<String>,
    },
    /// The Hugging Face Inference API with the given model id.
    HfInference { model: String },
    /// A caller-supplied backend; also the slot test doubles plug into.
    Custom(Arc<dyn SummaryBackend>),
}

impl fmt::Debug for EngineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSelection::Auto => f.write_str("Auto"),
            EngineSelection::Chat { provider, model } => f
                .debug_struct("Chat")
                .field("provider", provider)
                .field("model", model)
                .finish(),
            EngineSelection::HfInference { model } => {
                f.debug_struct("HfInference").field("model", model).finish()
            }
            EngineSelection::Custom(b) => write!(f, "Custom({})", b.name()),
        }
    }
}

/// Resolve the backend, from most-specific to least-specific:
///
/// 1. **Custom backend** — the caller constructed it entirely; used as-is.
/// 2. **Named selection** — `Chat {..}` or `HfInference {..}` from config.
/// 3. **Environment pair** — `PAPER_DIGEST_PROVIDER` + `PAPER_DIGEST_MODEL`
///    both set selects a chat provider at the execution-environment level.
/// 4. **`HUGGINGFACE_API_KEY`** — the Inference API with the default
///    summarization model.
/// 5. **Full auto-detection** — `ProviderFactory::from_env` scans the known
///    chat API key variables and picks the first available provider.
pub fn resolve_backend(
    selection: &EngineSelection,
) -> Result<Arc<dyn SummaryBackend>, DigestError> {
    match selection {
        EngineSelection::Custom(backend) => Ok(Arc::clone(backend)),

        EngineSelection::Chat { provider, model } => {
            let model = model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL);
            create_chat_backend(provider, model)
        }

        EngineSelection::HfInference { model } => {
            let key = non_empty_env("HUGGINGFACE_API_KEY").ok_or_else(|| {
                DigestError::EngineNotConfigured {
                    hint: "The HfInference engine requires HUGGINGFACE_API_KEY.\n\
                           Get a token at https://huggingface.co/settings/tokens."
                        .into(),
                }
            })?;
            Ok(Arc::new(HfInferenceBackend::new(model.clone(), key)))
        }

        EngineSelection::Auto => {
            if let (Some(provider), Some(model)) = (
                non_empty_env("PAPER_DIGEST_PROVIDER"),
                non_empty_env("PAPER_DIGEST_MODEL"),
            ) {
                return create_chat_backend(&provider, &model);
            }

            if let Some(key) = non_empty_env("HUGGINGFACE_API_KEY") {
                return Ok(Arc::new(HfInferenceBackend::new(
                    DEFAULT_HF_MODEL.to_string(),
                    key,
                )));
            }

            let (provider, _embedding) =
                ProviderFactory::from_env().map_err(|e| DigestError::EngineNotConfigured {
                    hint: format!(
                        "No summarization backend could be auto-detected from environment.\n\
                         Set HUGGINGFACE_API_KEY, OPENAI_API_KEY, or configure an engine.\n\
                         Error: {}",
                        e
                    ),
                })?;
            Ok(Arc::new(ChatBackend::new(provider, "auto".to_string())))
        }
    }
}

fn create_chat_backend(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn SummaryBackend>, DigestError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DigestError::EngineNotConfigured {
            hint: format!("Chat provider '{provider_name}' is not configured: {e}"),
        }
    })?;
    Ok(Arc::new(ChatBackend::new(
        provider,
        format!("{provider_name}/{model}"),
    )))
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

// ── Chat backend ─────────────────────────────────────────────────────────

/// Summarization through a chat-completion provider.
pub struct ChatBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ChatBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: String) -> Self {
        Self { provider, label }
    }
}

#[async_trait]
impl SummaryBackend for ChatBackend {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_output_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                let content = response.content.trim().to_string();
                if content.is_empty() {
                    Err(GenerationError::Empty)
                } else {
                    debug!(
                        "Backend '{}': {} prompt tokens, {} completion tokens",
                        self.label, response.prompt_tokens, response.completion_tokens
                    );
                    Ok(content)
                }
            }
            Err(e) => Err(classify_failure(&e.to_string())),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Sort a provider error message into the retry taxonomy.
fn classify_failure(message: &str) -> GenerationError {
    let lower = message.to_lowercase();
    if lower.contains("loading") {
        return GenerationError::Warming {
            detail: message.to_string(),
        };
    }
    const TRANSIENT_MARKERS: &[&str] = &[
        "429",
        "rate limit",
        "timeout",
        "timed out",
        "500",
        "502",
        "503",
        "504",
        "overloaded",
        "unavailable",
        "connection",
    ];
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        GenerationError::Transient {
            detail: message.to_string(),
        }
    } else {
        GenerationError::Permanent {
            detail: message.to_string(),
        }
    }
}

// ── Hugging Face Inference backend ───────────────────────────────────────

/// Summarization through the Hugging Face Inference API.
///
/// The endpoint answers HTTP 503 with an "is currently loading" body while a
/// cold model spins up; that state maps to [`GenerationError::Warming`] so
/// the engine's single retry (after backoff) usually lands on a warm model.
pub struct HfInferenceBackend {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl HfInferenceBackend {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            model,
            api_key,
        }
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        let mut parameters = serde_json::json!({
            "max_new_tokens": params.max_output_tokens,
            "num_beams": params.num_beams,
            "repetition_penalty": params.repetition_penalty,
        });
        if params.no_repeat_ngram > 0 {
            parameters["no_repeat_ngram_size"] = params.no_repeat_ngram.into();
        }
        if let Some(min) = params.min_output_tokens {
            parameters["min_new_tokens"] = min.into();
        }
        serde_json::json!({
            "inputs": prompt,
            "parameters": parameters,
            "options": { "wait_for_model": false },
        })
    }
}

#[async_trait]
impl SummaryBackend for HfInferenceBackend {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let url = format!("{HF_API_BASE}/{}", self.model);
        let body = self.request_body(prompt, params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| GenerationError::Transient {
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transient {
                detail: format!("reading response body failed: {e}"),
            })?;

        match status {
            200 => parse_hf_summary(&text),
            503 if text.to_lowercase().contains("loading") => Err(GenerationError::Warming {
                detail: format!("model '{}' is loading", self.model),
            }),
            429 | 500 | 502 | 503 | 504 => Err(GenerationError::Transient {
                detail: format!("HTTP {status}: {text}"),
            }),
            401 | 403 => Err(GenerationError::Permanent {
                detail: format!("HTTP {status}: check HUGGINGFACE_API_KEY"),
            }),
            _ => Err(GenerationError::Permanent {
                detail: format!("HTTP {status}: {text}"),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Extract the summary string from an Inference API response body.
///
/// The endpoint returns `[{"summary_text": "..."}]` for summarization models
/// and `[{"generated_text": "..."}]` for text-generation ones.
fn parse_hf_summary(body: &str) -> Result<String, GenerationError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GenerationError::Permanent {
            detail: format!("unparseable response: {e}"),
        })?;

    let entry = match &value {
        serde_json::Value::Array(items) => items.first().cloned().unwrap_or_default(),
        other => other.clone(),
    };

    let text = entry
        .get("summary_text")
        .or_else(|| entry.get("generated_text"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if text.is_empty() {
        Err(GenerationError::Empty)
    } else {
        Ok(text)
    }
}
