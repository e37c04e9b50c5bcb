//! CLI binary for paper-digest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigestConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_digest::{
    digest, DigestConfig, DigestOutput, DigestProgressCallback, EngineSelection, ProgressCallback,
    NOT_REPORTED,
};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the sections, with per-section
/// log lines. Works correctly when sections complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len} sections  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Digesting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_digest_start(&self, total_sections: usize) {
        self.bar.set_length(total_sections as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {total_sections} sections…"))
        ));
    }

    fn on_section_start(&self, label: &str, _total: usize) {
        self.bar.set_message(label.to_string());
    }

    fn on_section_complete(&self, label: &str, _total: usize, summary_len: usize) {
        self.bar.println(format!(
            "  {} {:<13} {}",
            green("✓"),
            label,
            dim(&format!("{summary_len} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, label: &str, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<13} {}", red("✗"), label, red(&msg)));
        self.bar.inc(1);
    }

    fn on_synthesis_start(&self) {
        self.bar.set_message("synthesis".to_string());
    }

    fn on_digest_complete(&self, total_sections: usize, summarized: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {}/{} sections summarized",
                green("✔"),
                bold(&summarized.to_string()),
                total_sections
            );
        } else {
            eprintln!(
                "{} {}/{} sections summarized  ({} failed)",
                cyan("⚠"),
                bold(&summarized.to_string()),
                total_sections,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digest extracted text (stdout)
  paper-digest paper.txt

  # Read from stdin, write Markdown to a file
  pdftotext paper.pdf - | paper-digest - -o digest.md

  # Use the Hugging Face Inference API with a specific model
  paper-digest --engine hf --model facebook/bart-large-cnn paper.txt

  # Use a chat provider
  paper-digest --engine openai --model gpt-4.1-nano paper.txt

  # Structured JSON output
  paper-digest --json paper.txt > digest.json

  # Tighter input budget for a small model
  paper-digest --max-input-tokens 512 --max-output-tokens 128 paper.txt

ENGINES:
  auto        Detect from environment (default)
  hf          Hugging Face Inference API (HUGGINGFACE_API_KEY)
  <provider>  Chat provider via edgequake-llm: openai, anthropic, gemini, ollama, …

ENVIRONMENT VARIABLES:
  HUGGINGFACE_API_KEY     Hugging Face Inference API token
  OPENAI_API_KEY          OpenAI API key (auto-detection)
  ANTHROPIC_API_KEY       Anthropic API key (auto-detection)
  PAPER_DIGEST_PROVIDER   Override chat provider for auto mode
  PAPER_DIGEST_MODEL      Override model for auto mode

INPUT:
  paper-digest consumes plain text in reading order, e.g. the output of
  pdftotext. It does not parse PDF bytes itself.
"#;

/// Summarize extracted document text into a structured digest.
#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Summarize extracted document text into a faithful, structured digest",
    long_about = "Segment extracted document text into canonical sections (abstract, introduction, \
methods, results, discussion, conclusion), summarize each within the model's token budget, verify \
every sentence against the source, and synthesize one structured abstract.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to a plain-text file, or '-' for stdin.
    input: String,

    /// Write the digest to this file instead of stdout.
    #[arg(short, long, env = "PAPER_DIGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// Engine: auto, hf, or a chat provider name (openai, anthropic, …).
    #[arg(long, env = "PAPER_DIGEST_ENGINE", default_value = "auto")]
    engine: String,

    /// Model ID for the chosen engine.
    #[arg(long, env = "PAPER_DIGEST_MODEL")]
    model: Option<String>,

    /// Model input token budget per call.
    #[arg(long, env = "PAPER_DIGEST_MAX_INPUT_TOKENS", default_value_t = 1024)]
    max_input_tokens: usize,

    /// Max generated tokens per call.
    #[arg(long, env = "PAPER_DIGEST_MAX_OUTPUT_TOKENS", default_value_t = 256)]
    max_output_tokens: usize,

    /// Beam count (backends that support beam search).
    #[arg(long, env = "PAPER_DIGEST_BEAMS", default_value_t = 4)]
    beams: u32,

    /// Number of concurrent section summarization calls.
    #[arg(short, long, env = "PAPER_DIGEST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Skip sections at or below this many characters.
    #[arg(long, env = "PAPER_DIGEST_MIN_SECTION_CHARS", default_value_t = 200)]
    min_section_chars: usize,

    /// Retries per call on transient backend failures.
    #[arg(long, env = "PAPER_DIGEST_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,

    /// Fixed backoff before a retry, in milliseconds.
    #[arg(long, env = "PAPER_DIGEST_RETRY_BACKOFF_MS", default_value_t = 5000)]
    retry_backoff: u64,

    /// Per-call generation timeout in seconds.
    #[arg(long, env = "PAPER_DIGEST_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Jaccard overlap floor for results/methods verification.
    #[arg(long, env = "PAPER_DIGEST_OVERLAP", default_value_t = 0.10)]
    overlap: f32,

    /// Output structured JSON (DigestOutput) instead of Markdown.
    #[arg(long, env = "PAPER_DIGEST_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PAPER_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER_DIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER_DIGEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides the feedback that matters.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read input ───────────────────────────────────────────────────────
    let raw_text = if cli.input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read '{}'", cli.input))?
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run digest ───────────────────────────────────────────────────────
    let output = digest(&raw_text, &config).await.context("Digest failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")? + "\n"
    } else {
        render_markdown(&output, &cli.input)
    };

    if let Some(ref path) = cli.output {
        tokio::fs::write(path, &rendered)
            .await
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} sections  {}ms  →  {}",
                if output.stats.failed_sections == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                output.stats.summarized_sections,
                output.stats.total_sections,
                output.stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json && !show_progress {
        eprintln!(
            "Summarized {}/{} sections in {}ms",
            output.stats.summarized_sections,
            output.stats.total_sections,
            output.stats.total_duration_ms
        );
        if output.stats.failed_sections > 0 {
            eprintln!("  {} sections failed", output.stats.failed_sections);
        }
    }

    Ok(())
}

/// Map CLI args to `DigestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigestConfig> {
    let engine = parse_engine(&cli.engine, cli.model.clone());

    let mut builder = DigestConfig::builder()
        .engine(engine)
        .max_input_tokens(cli.max_input_tokens)
        .max_output_tokens(cli.max_output_tokens)
        .num_beams(cli.beams)
        .concurrency(cli.concurrency)
        .min_section_chars(cli.min_section_chars)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff)
        .generation_timeout_secs(cli.timeout)
        .grounding_overlap(cli.overlap);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--engine` into an `EngineSelection`.
fn parse_engine(engine: &str, model: Option<String>) -> EngineSelection {
    match engine.to_lowercase().as_str() {
        "auto" => EngineSelection::Auto,
        "hf" | "huggingface" => EngineSelection::HfInference {
            model: model.unwrap_or_else(|| paper_digest::backend::DEFAULT_HF_MODEL.to_string()),
        },
        provider => EngineSelection::Chat {
            provider: provider.to_string(),
            model,
        },
    }
}

/// Render the digest as Markdown, sections first, synthesis last.
fn render_markdown(output: &DigestOutput, input_name: &str) -> String {
    let title = PathBuf::from(input_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());

    let mut parts: Vec<String> = vec![format!("# Digest: {title}")];
    for section in &output.sections {
        let heading = {
            let s = section.label.as_str();
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        };
        parts.push(format!("### {heading}\n{}", section.summary));
    }
    parts.push(format!("### Synthesis\n{}", output.summary));

    if output.summary == NOT_REPORTED && output.sections.iter().all(|s| s.summary == NOT_REPORTED) {
        parts.push("_No verifiable content was produced for this document._".to_string());
    }

    parts.join("\n\n") + "\n"
}
