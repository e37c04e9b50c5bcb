//! Hybrid section segmentation: heading lines first, keyword anchors second.
//!
//! Scientific PDFs rarely agree on how a section announces itself. Clean
//! documents carry standalone heading lines ("2. Methods"); scanned or
//! reflowed ones bury the word "METHODS" mid-line. The segmenter therefore
//! runs two passes over the normalized text:
//!
//! 1. **Header pass** — standalone heading lines are matched against an alias
//!    table (`"materials and methods"` → methods). Headings on the exclusion
//!    list (references, appendix, …) end the previous section but never start
//!    one.
//! 2. **Anchor pass** — for any canonical label the header pass missed, the
//!    first whole-word occurrence of an associated keyword anywhere in
//!    running text becomes a boundary.
//!
//! All accepted boundaries partition the text jointly, so spans never
//! overlap; the first occurrence of each canonical label wins. When neither
//! pass finds anything the entire text is returned under the [`full`]
//! fallback label — segmentation never fails.
//!
//! The alias, anchor, and exclusion tables are plain data. Adding a journal's
//! quirky heading means adding a string here, not a branch.
//!
//! [`full`]: SectionLabel::Full

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical section vocabulary, plus the [`Full`](SectionLabel::Full)
/// fallback used when no section is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLabel {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    /// Whole-document fallback when no canonical section was found.
    Full,
}

impl SectionLabel {
    /// The six canonical labels, in conventional paper order.
    pub const CANONICAL: [SectionLabel; 6] = [
        SectionLabel::Abstract,
        SectionLabel::Introduction,
        SectionLabel::Methods,
        SectionLabel::Results,
        SectionLabel::Discussion,
        SectionLabel::Conclusion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionLabel::Abstract => "abstract",
            SectionLabel::Introduction => "introduction",
            SectionLabel::Methods => "methods",
            SectionLabel::Results => "results",
            SectionLabel::Discussion => "discussion",
            SectionLabel::Conclusion => "conclusion",
            SectionLabel::Full => "full",
        }
    }

    /// True for the whole-document fallback label.
    pub fn is_full(&self) -> bool {
        matches!(self, SectionLabel::Full)
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tables ───────────────────────────────────────────────────────────────
//
// Aliases cover the heading spellings journals actually print. Lookup is
// exact first, then prefix/substring, so "summary and conclusions" resolves
// to conclusion before the "summary" alias of abstract can claim it.

const ALIASES: &[(SectionLabel, &[&str])] = &[
    (SectionLabel::Abstract, &["abstract", "summary", "synopsis"]),
    (
        SectionLabel::Introduction,
        &["introduction", "background", "overview", "aims"],
    ),
    (
        SectionLabel::Methods,
        &[
            "methods",
            "method",
            "materials and methods",
            "participants",
            "subjects",
            "procedures",
            "experimental procedures",
        ],
    ),
    (SectionLabel::Results, &["results", "findings", "outcomes"]),
    (SectionLabel::Discussion, &["discussion", "general discussion"]),
    (
        SectionLabel::Conclusion,
        &[
            "conclusion",
            "conclusions",
            "concluding remarks",
            "summary and conclusions",
        ],
    ),
];

/// Headings that end a section but never start one.
const EXCLUDED_HEADINGS: &[&str] = &[
    "references",
    "bibliography",
    "acknowledgments",
    "acknowledgements",
    "appendix",
    "appendices",
    "funding",
    "supplementary material",
    "supplementary materials",
    "author contributions",
    "conflict of interest",
    "conflicts of interest",
    "ethics statement",
    "data availability",
];

/// Keywords searched in running text when a label has no heading line.
const ANCHORS: &[(SectionLabel, &[&str])] = &[
    (SectionLabel::Abstract, &["abstract"]),
    (SectionLabel::Introduction, &["introduction", "background"]),
    (
        SectionLabel::Methods,
        &["materials and methods", "methods", "method", "participants", "procedures"],
    ),
    (SectionLabel::Results, &["results", "findings", "outcomes"]),
    (SectionLabel::Discussion, &["discussion"]),
    (SectionLabel::Conclusion, &["conclusions", "conclusion", "concluding"]),
];

// ── Types ────────────────────────────────────────────────────────────────

/// One labeled, non-overlapping span of the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub label: SectionLabel,
    /// Owned text of the span, outer whitespace trimmed.
    pub text: String,
    /// Byte offset of the span start in the normalized text.
    pub offset: usize,
}

/// Which pass produced the segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMode {
    /// Every section came from a heading line.
    Headers,
    /// Every section came from a keyword anchor.
    Anchors,
    /// Mixed heading and anchor boundaries.
    Hybrid,
    /// Nothing recognized; single `full` section.
    Fallback,
}

/// Result of [`segment`]: at least one section, ordered by position.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub sections: Vec<Section>,
    pub mode: SegmentationMode,
}

impl Segmentation {
    pub fn get(&self, label: SectionLabel) -> Option<&Section> {
        self.sections.iter().find(|s| s.label == label)
    }

    pub fn labels(&self) -> Vec<SectionLabel> {
        self.sections.iter().map(|s| s.label).collect()
    }

    pub fn is_fallback(&self) -> bool {
        self.mode == SegmentationMode::Fallback
    }

    fn fallback(text: &str) -> Self {
        Segmentation {
            sections: vec![Section {
                label: SectionLabel::Full,
                text: text.trim().to_string(),
                offset: 0,
            }],
            mode: SegmentationMode::Fallback,
        }
    }
}

/// Tuning knobs for [`segment`].
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Spans at or below this many characters are dropped as false positives.
    /// Default 0: every detected span is returned, and summarization
    /// eligibility is filtered later by `DigestConfig::min_section_chars`.
    pub min_span_chars: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self { min_span_chars: 0 }
    }
}

// ── Boundary detection ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Header,
    Anchor,
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    pos: usize,
    /// `None` for excluded or unrecognized headings: they partition the text
    /// but never open a section.
    label: Option<SectionLabel>,
    kind: BoundaryKind,
}

/// Normalize a heading candidate for table lookup: strip `2.`-style
/// numbering and trailing punctuation, fold `&` to `and`, lowercase,
/// collapse inner whitespace.
fn normalize_heading(raw: &str) -> String {
    let s = strip_numbering(raw.trim());
    let s = s.trim_end_matches([':', '.']).trim();
    let lowered = s.to_lowercase().replace('&', "and");
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_alias(key: &str) -> Option<SectionLabel> {
    // exact match wins across the whole table
    for (label, aliases) in ALIASES {
        if aliases.iter().any(|a| *a == key) || key == label.as_str() {
            return Some(*label);
        }
    }
    // fuzzy: heading starts with (or contains) a known alias
    for (label, aliases) in ALIASES {
        if key.starts_with(label.as_str())
            || aliases.iter().any(|a| key.starts_with(a) || key.contains(a))
        {
            return Some(*label);
        }
    }
    None
}

fn is_excluded_heading(key: &str) -> bool {
    EXCLUDED_HEADINGS
        .iter()
        .any(|e| key == *e || key.starts_with(e))
}

/// Strip leading "2." / "2)" / "12 " style numbering from a heading.
fn strip_numbering(s: &str) -> &str {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return s;
    }
    let rest = &s[digits..];
    let rest = rest.strip_prefix(['.', ')']).unwrap_or(rest);
    let stripped = rest.trim_start();
    if stripped.is_empty() {
        s
    } else {
        stripped
    }
}

/// A line qualifies as a heading candidate when it is short, starts
/// uppercase (optionally after numbering), and carries no sentence
/// punctuation. This deliberately over-matches; unrecognized candidates
/// only act as span terminators.
fn heading_candidate(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() < 3 || trimmed.len() > 60 {
        return None;
    }
    if trimmed.split_whitespace().count() > 8 {
        return None;
    }
    let body = strip_numbering(trimmed);
    if body.ends_with('.') {
        return None;
    }
    // sentence-like content disqualifies
    if body.contains(". ") || body.contains(',') {
        return None;
    }
    let ok_chars = body
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | ':' | '/' | '&'));
    if !ok_chars {
        return None;
    }
    let first = body.chars().next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !body.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(trimmed)
}

/// Find the first whole-word, case-insensitive occurrence of `needle` in
/// `haystack_lower` (already lowercased).
fn find_word(haystack_lower: &str, needle: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = haystack_lower[from..].find(needle) {
        let start = from + rel;
        let end = start + needle.len();
        let before_ok = start == 0
            || !haystack_lower[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        let after_ok = end == haystack_lower.len()
            || !haystack_lower[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

// ── Segmentation ─────────────────────────────────────────────────────────

/// Partition normalized text into labeled sections.
///
/// Always returns at least one section; see the module docs for the
/// algorithm. Callers that only care about the mapping can use
/// [`Segmentation::get`].
pub fn segment(text: &str, opts: &SegmentOptions) -> Segmentation {
    if text.trim().is_empty() {
        return Segmentation::fallback(text);
    }

    let mut boundaries: Vec<Boundary> = Vec::new();
    let mut claimed_by_header = [false; 6];

    // Pass 1: heading lines.
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if let Some(candidate) = heading_candidate(content) {
            let key = normalize_heading(candidate);
            let pos = offset + (content.len() - content.trim_start().len());
            if is_excluded_heading(&key) {
                boundaries.push(Boundary {
                    pos,
                    label: None,
                    kind: BoundaryKind::Header,
                });
            } else if let Some(label) = resolve_alias(&key) {
                if let Some(i) = SectionLabel::CANONICAL.iter().position(|l| *l == label) {
                    claimed_by_header[i] = true;
                }
                boundaries.push(Boundary {
                    pos,
                    label: Some(label),
                    kind: BoundaryKind::Header,
                });
            } else {
                // unknown heading: partitions, opens nothing
                boundaries.push(Boundary {
                    pos,
                    label: None,
                    kind: BoundaryKind::Header,
                });
            }
        }
        offset += line.len();
    }

    // Pass 2: keyword anchors for labels the header pass missed.
    let lower = text.to_lowercase();
    for (label, keywords) in ANCHORS {
        let i = SectionLabel::CANONICAL
            .iter()
            .position(|l| l == label)
            .unwrap_or(0);
        if claimed_by_header[i] {
            continue;
        }
        let hit = keywords
            .iter()
            .filter_map(|k| find_word(&lower, k))
            .min();
        if let Some(pos) = hit {
            boundaries.push(Boundary {
                pos,
                label: Some(*label),
                kind: BoundaryKind::Anchor,
            });
        }
    }

    if !boundaries.iter().any(|b| b.label.is_some()) {
        return Segmentation::fallback(text);
    }

    // Partition on every boundary; first occurrence per label wins.
    boundaries.sort_by_key(|b| b.pos);
    boundaries.dedup_by_key(|b| b.pos);

    let mut sections: Vec<Section> = Vec::new();
    let mut used_header = false;
    let mut used_anchor = false;
    for (i, b) in boundaries.iter().enumerate() {
        let Some(label) = b.label else { continue };
        if sections.iter().any(|s| s.label == label) {
            continue;
        }
        let end = boundaries
            .get(i + 1)
            .map(|n| n.pos)
            .unwrap_or_else(|| text.len());
        let span = text[b.pos..end].trim();
        if span.is_empty() || span.len() <= opts.min_span_chars {
            continue;
        }
        match b.kind {
            BoundaryKind::Header => used_header = true,
            BoundaryKind::Anchor => used_anchor = true,
        }
        sections.push(Section {
            label,
            text: span.to_string(),
            offset: b.pos,
        });
    }

    if sections.is_empty() {
        return Segmentation::fallback(text);
    }

    let mode = match (used_header, used_anchor) {
        (true, true) => SegmentationMode::Hybrid,
        (true, false) => SegmentationMode::Headers,
        (false, true) => SegmentationMode::Anchors,
        (false, false) => SegmentationMode::Fallback,
    };

    Segmentation { sections, mode }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Segmentation {
        segment(text, &SegmentOptions::default())
    }

    #[test]
    fn inline_anchors_partition_into_four_sections() {
        let text = "INTRODUCTION\nWe study X. METHODS\nWe recruited N=30 participants. \
                    RESULTS\nMean accuracy was 85% (p<.01). DISCUSSION\nThis supports the hypothesis.";
        let s = seg(text);
        assert_eq!(
            s.labels(),
            vec![
                SectionLabel::Introduction,
                SectionLabel::Methods,
                SectionLabel::Results,
                SectionLabel::Discussion,
            ]
        );
        let intro = s.get(SectionLabel::Introduction).unwrap();
        assert!(intro.text.contains("We study X."));
        assert!(!intro.text.contains("recruited"));
        let results = s.get(SectionLabel::Results).unwrap();
        assert!(results.text.contains("85%"));
        assert!(!results.text.contains("hypothesis"));
        assert_eq!(s.mode, SegmentationMode::Hybrid);
    }

    #[test]
    fn unrecognizable_text_falls_back_to_full() {
        let text = "once upon a time there was a very plain document\nwith nothing to find";
        let s = seg(text);
        assert!(s.is_fallback());
        assert_eq!(s.sections.len(), 1);
        assert_eq!(s.sections[0].label, SectionLabel::Full);
        assert_eq!(s.sections[0].text, text);
    }

    #[test]
    fn empty_input_yields_full_fallback() {
        let s = seg("");
        assert!(s.is_fallback());
        assert_eq!(s.sections[0].label, SectionLabel::Full);
    }

    #[test]
    fn numbered_alias_heading_resolves() {
        let text = "1. Introduction\nThe field has grown.\n\n2. Materials and Methods\nWe measured everything twice.";
        let s = seg(text);
        assert!(s.get(SectionLabel::Introduction).is_some());
        let methods = s.get(SectionLabel::Methods).unwrap();
        assert!(methods.text.contains("measured everything"));
        assert_eq!(s.mode, SegmentationMode::Headers);
    }

    #[test]
    fn excluded_heading_terminates_previous_section() {
        let text = "DISCUSSION\nThe effect was robust across cohorts.\n\nREFERENCES\nSmith 2020 Journal of Things";
        let s = seg(text);
        let discussion = s.get(SectionLabel::Discussion).unwrap();
        assert!(discussion.text.contains("robust"));
        assert!(!discussion.text.contains("Smith 2020"));
        // references never becomes a section
        assert_eq!(s.sections.len(), 1);
    }

    #[test]
    fn first_occurrence_per_label_wins() {
        let text = "RESULTS\nFirst block of findings here.\n\nRESULTS\nSecond block that must not replace the first.";
        let s = seg(text);
        let results = s.get(SectionLabel::Results).unwrap();
        assert!(results.text.contains("First block"));
        assert!(!results.text.contains("Second block"));
    }

    #[test]
    fn sections_are_ordered_by_position_not_canonical_order() {
        let text = "RESULTS\nAccuracy improved with practice sessions.\n\nMETHODS\nForty adults completed the task.";
        let s = seg(text);
        assert_eq!(
            s.labels(),
            vec![SectionLabel::Results, SectionLabel::Methods]
        );
        assert!(s.sections[0].offset < s.sections[1].offset);
    }

    #[test]
    fn labels_are_subset_of_vocabulary() {
        let text = "ABSTRACT\nA study.\nINTRODUCTION\nContext.\nCONCLUSION\nDone.";
        let s = seg(text);
        for label in s.labels() {
            assert!(
                SectionLabel::CANONICAL.contains(&label) || label == SectionLabel::Full,
                "unexpected label {label}"
            );
        }
    }

    #[test]
    fn min_span_chars_discards_short_spans() {
        let text = "METHODS\nShort.\n\nRESULTS\nThis results span is comfortably long enough to be accepted by the filter.";
        let s = segment(text, &SegmentOptions { min_span_chars: 40 });
        assert!(s.get(SectionLabel::Methods).is_none());
        assert!(s.get(SectionLabel::Results).is_some());
    }

    #[test]
    fn heading_aliases_fold_ampersand_and_case() {
        assert_eq!(normalize_heading("2. Materials & Methods:"), "materials and methods");
        assert_eq!(resolve_alias("materials and methods"), Some(SectionLabel::Methods));
        assert_eq!(resolve_alias("concluding remarks"), Some(SectionLabel::Conclusion));
        assert_eq!(resolve_alias("summary"), Some(SectionLabel::Abstract));
        assert_eq!(resolve_alias("summary and conclusions"), Some(SectionLabel::Conclusion));
        assert_eq!(resolve_alias("general discussion"), Some(SectionLabel::Discussion));
    }

    #[test]
    fn label_serializes_lowercase() {
        let json = serde_json::to_string(&SectionLabel::Methods).unwrap();
        assert_eq!(json, "\"methods\"");
        let back: SectionLabel = serde_json::from_str("\"conclusion\"").unwrap();
        assert_eq!(back, SectionLabel::Conclusion);
    }

    #[test]
    fn word_boundary_anchor_does_not_match_inside_words() {
        // "methodsology" must not anchor methods
        assert_eq!(find_word("the methodsology of things", "methods"), None);
        assert_eq!(find_word("the methods of things", "methods"), Some(4));
    }
}
