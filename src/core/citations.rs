//! Inline citation extraction and bibliography sanitization.
//!
//! The manuscript dialect embeds pseudo-BibTeX records directly in the
//! prose as `[[@article{key, author={...}, ...}]]` markers. This module
//! locates every marker, stores one record per key (first occurrence wins),
//! and normalizes each record into a syntactically valid bibliography
//! entry.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::core::text::{brace_surplus, escape_unescaped, find_balanced_brace};
use crate::data::symbols::greek_to_math;

lazy_static! {
    static ref MARKER_START: Regex = Regex::new(r"\[\[@([A-Za-z]+)\{").expect("marker regex");
}

/// One extracted bibliographic record.
#[derive(Debug, Clone)]
pub struct CitationRecord {
    /// Unique citation key, e.g. `smith2020`
    pub key: String,
    /// BibTeX entry type, e.g. `article`
    pub entry_type: String,
    /// Field text exactly as it appeared in the first marker for this key
    pub raw_fields: String,
    /// Normalized bibliography entry, safe to embed
    pub sanitized_entry: String,
    /// Zero-based rank of this key's first occurrence
    pub first_seen_order: usize,
}

/// All citations found in one manuscript.
#[derive(Debug, Clone, Default)]
pub struct ExtractedCitations {
    /// One record per unique key, in ascending `first_seen_order`
    pub records: Vec<CitationRecord>,
    /// Every marker occurrence's key, left to right, duplicates included
    pub encounter_order: Vec<String>,
}

impl ExtractedCitations {
    pub fn get(&self, key: &str) -> Option<&CitationRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sanitized entries joined with blank-line separation, ready to embed
    /// as a bibliography block.
    pub fn bibliography_block(&self) -> String {
        self.records
            .iter()
            .map(|r| r.sanitized_entry.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A located citation marker, including its byte span in the source text.
#[derive(Debug, Clone)]
pub(crate) struct MarkerSpan {
    /// Offset of the opening `[[`
    pub start: usize,
    /// Offset just past the closing `]]`
    pub end: usize,
    pub entry_type: String,
    pub key: String,
    pub raw_fields: String,
    /// Full `@type{key, fields}` text
    pub entry: String,
}

/// Locate every well-formed citation marker. Text that resembles a marker
/// but cannot be matched (unbalanced braces, missing `]]`) is skipped and
/// stays in the prose as literal text.
pub(crate) fn scan_markers(text: &str) -> Vec<MarkerSpan> {
    let mut spans: Vec<MarkerSpan> = Vec::new();
    let mut last_end = 0;
    for caps in MARKER_START.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        if m.start() < last_end {
            continue;
        }
        let open = m.end() - 1;
        let Some(close) = find_balanced_brace(text, open) else {
            continue;
        };
        if !text[close + 1..].starts_with("]]") {
            continue;
        }
        let inner = &text[open + 1..close];
        let (key, fields) = match inner.find(',') {
            Some(idx) => (inner[..idx].trim(), inner[idx + 1..].trim()),
            None => (inner.trim(), ""),
        };
        if key.is_empty() {
            continue;
        }
        let span = MarkerSpan {
            start: m.start(),
            end: close + 1 + 2,
            entry_type: caps[1].to_string(),
            key: key.to_string(),
            raw_fields: fields.to_string(),
            entry: text[m.start() + 2..close + 1].to_string(),
        };
        last_end = span.end;
        spans.push(span);
    }
    spans
}

/// Extract every citation marker from the manuscript.
///
/// Records preserve first-occurrence order and are deduplicated by key: a
/// key seen again contributes to `encounter_order` only, and the stored
/// record keeps the first occurrence's fields. No markers is not an error;
/// both outputs are simply empty.
pub fn extract_citations(text: &str) -> ExtractedCitations {
    let mut records: IndexMap<String, CitationRecord> = IndexMap::new();
    let mut encounter_order = Vec::new();
    for span in scan_markers(text) {
        encounter_order.push(span.key.clone());
        if records.contains_key(&span.key) {
            continue;
        }
        let order = records.len();
        records.insert(
            span.key.clone(),
            CitationRecord {
                key: span.key,
                entry_type: span.entry_type,
                raw_fields: span.raw_fields,
                sanitized_entry: sanitize_entry(&span.entry),
                first_seen_order: order,
            },
        );
    }
    ExtractedCitations {
        records: records.into_values().collect(),
        encounter_order,
    }
}

/// Replace every well-formed marker with `\supercite{key}` for the LaTeX
/// backend. Malformed markers are left in place.
pub fn replace_markers_with_supercite(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in scan_markers(text) {
        out.push_str(&text[last..span.start]);
        out.push_str("\\supercite{");
        out.push_str(&span.key);
        out.push('}');
        last = span.end;
    }
    out.push_str(&text[last..]);
    out
}

/// Normalize one pseudo-BibTeX entry into a valid bibliography entry.
///
/// Rules run in a fixed order: escape unescaped `&`, escape unescaped `_`,
/// replace Unicode Greek letters with math-mode commands, then append
/// closing braces until the entry balances. Excess closing braces are never
/// removed. The whole transform is idempotent.
pub fn sanitize_entry(entry: &str) -> String {
    let mut out = escape_unescaped(entry, '&');
    out = escape_unescaped(&out, '_');
    out = greek_to_math(&out);
    let surplus = brace_surplus(&out);
    for _ in 0..surplus.max(0) {
        out.push('}');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_single_marker() {
        let text = "See [[@article{a1,author={X},title={T},year={2020}}]] for details.";
        let extracted = extract_citations(text);
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.records[0].key, "a1");
        assert_eq!(extracted.records[0].entry_type, "article");
        assert_eq!(extracted.encounter_order, vec!["a1"]);
    }

    #[test]
    fn test_no_markers_is_empty_not_error() {
        let extracted = extract_citations("plain prose with no citations");
        assert!(extracted.is_empty());
        assert!(extracted.encounter_order.is_empty());
        assert_eq!(extracted.bibliography_block(), "");
    }

    #[test]
    fn test_duplicate_key_first_occurrence_wins() {
        let text = "A [[@article{dup,title={First}}]] B [[@article{dup,title={Second}}]] \
                    C [[@article{dup,title={Third}}]]";
        let extracted = extract_citations(text);
        assert_eq!(extracted.records.len(), 1);
        assert!(extracted.records[0].sanitized_entry.contains("First"));
        assert_eq!(extracted.encounter_order, vec!["dup", "dup", "dup"]);
    }

    #[test]
    fn test_first_seen_order_is_stable() {
        let text = "[[@article{b,title={B}}]] [[@article{a,title={A}}]] [[@article{b,title={X}}]]";
        let extracted = extract_citations(text);
        let keys: Vec<&str> = extracted.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(extracted.records[1].first_seen_order, 1);
    }

    #[test]
    fn test_malformed_marker_left_as_literal() {
        let text = "broken [[@article{k1,title={no close here";
        let extracted = extract_citations(text);
        assert!(extracted.is_empty());
        assert_eq!(replace_markers_with_supercite(text), text);
    }

    #[test]
    fn test_replace_markers() {
        let text = "See [[@article{a1,title={T}}]] and [[@book{b2,title={U}}]].";
        assert_eq!(
            replace_markers_with_supercite(text),
            "See \\supercite{a1} and \\supercite{b2}."
        );
    }

    #[test]
    fn test_sanitize_escapes_ampersand_and_underscore() {
        let entry = "@article{k1,journal={Science & Nature},note={a_b}}";
        let sanitized = sanitize_entry(entry);
        assert!(sanitized.contains("Science \\& Nature"));
        assert!(sanitized.contains("a\\_b"));
    }

    #[test]
    fn test_sanitize_appends_missing_brace() {
        let entry = "@article{k1, title={Unbalanced";
        let sanitized = sanitize_entry(entry);
        assert_eq!(sanitized, "@article{k1, title={Unbalanced}}");
        assert_eq!(brace_surplus(&sanitized), 0);
    }

    #[test]
    fn test_sanitize_never_removes_excess_closers() {
        let entry = "@article{k1, title={X}}}";
        assert_eq!(sanitize_entry(entry), entry);
    }

    #[test]
    fn test_sanitize_greek() {
        let entry = "@article{k1, title={TNF-α and ΔCt}}";
        let sanitized = sanitize_entry(entry);
        assert!(sanitized.contains("TNF-$\\alpha$"));
        assert!(sanitized.contains("$\\Delta$Ct"));
    }

    #[test]
    fn test_sanitize_idempotent() {
        let entry = "@article{k1, title={α & β_1}, journal={A & B";
        let once = sanitize_entry(entry);
        assert_eq!(sanitize_entry(&once), once);
    }
}
