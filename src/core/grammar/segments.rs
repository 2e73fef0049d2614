//! Typed segmentation of manuscript text.
//!
//! A single pre-pass locates every table environment and citation marker so
//! the grammar rules can operate on typed segments instead of re-deriving
//! context per rule. Table begin/end pairs are matched non-nested: the
//! first matching end closes a begin.

use crate::core::citations::scan_markers;

/// Environments whose bodies use `&` as a structural column separator.
const TABLE_ENVIRONMENTS: &[&str] = &[
    "tabular",
    "tabular*",
    "array",
    "longtable",
    "threeparttable",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    Prose,
    Table,
    Citation,
}

#[derive(Debug, Clone)]
pub(crate) struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

fn protected_spans(input: &str) -> Vec<(usize, usize, SegmentKind)> {
    let mut spans: Vec<(usize, usize, SegmentKind)> = Vec::new();
    for env in TABLE_ENVIRONMENTS {
        let begin_tag = format!("\\begin{{{}}}", env);
        let end_tag = format!("\\end{{{}}}", env);
        let mut from = 0;
        while let Some(pos) = input[from..].find(&begin_tag) {
            let start = from + pos;
            let body_from = start + begin_tag.len();
            match input[body_from..].find(&end_tag) {
                Some(offset) => {
                    let end = body_from + offset + end_tag.len();
                    spans.push((start, end, SegmentKind::Table));
                    from = end;
                }
                None => {
                    // Unterminated environment: protect through end of input
                    spans.push((start, input.len(), SegmentKind::Table));
                    break;
                }
            }
        }
    }
    for marker in scan_markers(input) {
        spans.push((marker.start, marker.end, SegmentKind::Citation));
    }
    spans.sort_by_key(|s| s.0);
    // Overlaps keep the earliest span (a marker inside a table cell belongs
    // to the table)
    let mut merged: Vec<(usize, usize, SegmentKind)> = Vec::new();
    for span in spans {
        let overlaps = merged.last().map(|last| span.0 < last.1).unwrap_or(false);
        if !overlaps {
            merged.push(span);
        }
    }
    merged
}

/// Split the input into prose, table, and citation-marker segments.
/// Concatenating the segment texts reproduces the input exactly.
pub(crate) fn split_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for (start, end, kind) in protected_spans(input) {
        if start > last {
            segments.push(Segment {
                kind: SegmentKind::Prose,
                text: input[last..start].to_string(),
            });
        }
        segments.push(Segment {
            kind,
            text: input[start..end].to_string(),
        });
        last = end;
    }
    if last < input.len() {
        segments.push(Segment {
            kind: SegmentKind::Prose,
            text: input[last..].to_string(),
        });
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_concatenation() {
        let input = "before \\begin{tabular}{ll}\nA & B \\\\\n\\end{tabular} after";
        let segments = split_segments(input);
        let rebuilt: String = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn test_table_segment_detected() {
        let input = "x \\begin{longtable}{ll} A & B \\end{longtable} y";
        let segments = split_segments(input);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].kind, SegmentKind::Table);
        assert!(segments[1].text.contains("A & B"));
    }

    #[test]
    fn test_citation_segment_detected() {
        let input = "see [[@article{k,title={T}}]] here";
        let segments = split_segments(input);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].kind, SegmentKind::Citation);
    }

    #[test]
    fn test_nested_tabular_inside_table_env_stays_one_span() {
        let input = "\\begin{threeparttable}\\begin{tabular}{ll}a & b\\end{tabular}\\end{threeparttable}";
        let segments = split_segments(input);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::Table);
    }

    #[test]
    fn test_unterminated_environment_protected_to_end() {
        let input = "p \\begin{tabular}{ll} a & b";
        let segments = split_segments(input);
        assert_eq!(segments.last().unwrap().kind, SegmentKind::Table);
    }
}
