//! Normalization: deterministic cleanup of raw extracted text.
//!
//! Text extractors hand back everything the PDF page carried: words broken
//! across line ends, lone page numbers, publisher running headers, and
//! whitespace shaped by the original layout rather than by the prose. None
//! of that survives contact with a summarization model gracefully — a page
//! number in the middle of a methods paragraph reads like a sample size.
//!
//! The rules below run in a fixed order and touch formatting artifacts
//! only; no semantic content is removed. The whole pass is a pure function
//! and idempotent: `normalize(normalize(x)) == normalize(x)`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalization rules to raw extracted text.
///
/// Rules (applied in order):
/// 1. Normalize line endings (CRLF → LF)
/// 2. Rejoin words split by a line-end hyphen ("cogni-\ntion" → "cognition")
/// 3. Collapse runs of horizontal whitespace to a single space
/// 4. Strip lines that are bare page numbers
/// 5. Strip running-header/footer lines (publisher branding, DOIs, copyright)
/// 6. Collapse 3+ consecutive newlines to one blank line
/// 7. Trim outer whitespace
pub fn normalize(raw: &str) -> String {
    let s = normalize_line_endings(raw);
    let s = rejoin_hyphenated(&s);
    let s = collapse_horizontal_whitespace(&s);
    let s = strip_page_numbers(&s);
    let s = strip_running_headers(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Line endings ─────────────────────────────────────────────────

fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: De-hyphenation ───────────────────────────────────────────────
//
// Only a lowercase continuation counts as a broken word; "state-\nof-the-art"
// style constructs keep their hyphen when the next line starts uppercase
// because that usually marks a genuine compound at a heading boundary.

static RE_DEHYPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\n([a-z])").unwrap());

fn rejoin_hyphenated(input: &str) -> String {
    RE_DEHYPH.replace_all(input, "$1").to_string()
}

// ── Rule 3: Horizontal whitespace ────────────────────────────────────────

static RE_HWS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    RE_HWS.replace_all(input, " ").to_string()
}

// ── Rules 4–5: Boilerplate lines ─────────────────────────────────────────

static RE_PAGE_NO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:\d+|Page[ \t]+\d+)[ \t]*$").unwrap());

static RE_RUNNING_HDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:bioRxiv|medRxiv|arXiv|Elsevier|Springer|Wiley|Nature|PNAS|©|Copyright\b|[Dd][Oo][Ii]:|https?://(?:dx\.)?doi\.org).*$",
    )
    .unwrap()
});

fn strip_page_numbers(input: &str) -> String {
    RE_PAGE_NO.replace_all(input, "").to_string()
}

fn strip_running_headers(input: &str) -> String {
    RE_RUNNING_HDR.replace_all(input, "").to_string()
}

// ── Rule 6: Blank lines ──────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────
