//! Figure-block reordering.
//!
//! LaTeX numbers figures by declaration order, not citation order, so
//! figure environments are physically reordered to match the first
//! reference to each label. Unlabeled or unreferenced figures sort last
//! and keep their relative order; with fewer than two blocks this is a
//! no-op.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FIGURE_LABEL: Regex = Regex::new(r"\\label\{([^}]+)\}").expect("label regex");
}

const REFERENCE_COMMANDS: &[&str] = &["\\ref{", "\\autoref{", "\\cref{"];

/// Reorder self-contained figure blocks by ascending first-reference
/// offset. Block positions in the document stay fixed; their contents are
/// permuted.
pub fn reorder_figures(input: &str) -> String {
    let blocks = figure_spans(input);
    if blocks.len() < 2 {
        return input.to_string();
    }
    let offsets: Vec<usize> = blocks
        .iter()
        .map(|&(start, end)| {
            match FIGURE_LABEL.captures(&input[start..end]) {
                Some(caps) => first_reference_offset(input, &caps[1], (start, end)),
                None => usize::MAX,
            }
        })
        .collect();
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&i| (offsets[i], i));

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for (slot, &(start, end)) in blocks.iter().enumerate() {
        out.push_str(&input[last..start]);
        let (source_start, source_end) = blocks[order[slot]];
        out.push_str(&input[source_start..source_end]);
        last = end;
    }
    out.push_str(&input[last..]);
    out
}

fn figure_spans(input: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    for env in ["figure*", "figure"] {
        let begin_tag = format!("\\begin{{{}}}", env);
        let end_tag = format!("\\end{{{}}}", env);
        let mut from = 0;
        while let Some(pos) = input[from..].find(&begin_tag) {
            let start = from + pos;
            let body_from = start + begin_tag.len();
            let Some(offset) = input[body_from..].find(&end_tag) else {
                break;
            };
            let end = body_from + offset + end_tag.len();
            spans.push((start, end));
            from = end;
        }
    }
    spans.sort_by_key(|s| s.0);
    spans
}

/// Byte offset of the first reference to `label` anywhere outside the
/// figure's own block, or `usize::MAX` when the label is never referenced.
fn first_reference_offset(text: &str, label: &str, own: (usize, usize)) -> usize {
    let mut best = usize::MAX;
    for command in REFERENCE_COMMANDS {
        let needle = format!("{}{}}}", command, label);
        let mut from = 0;
        while let Some(pos) = text[from..].find(&needle) {
            let at = from + pos;
            if at < own.0 || at >= own.1 {
                best = best.min(at);
                break;
            }
            from = at + needle.len();
        }
    }
    best
}
