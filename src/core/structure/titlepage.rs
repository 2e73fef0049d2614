//! Title-page extraction.
//!
//! The generation step sometimes emits `\title`, `\author`, `\affil` and a
//! Correspondence section inline in the body instead of as caller-supplied
//! metadata. They are pulled out here, before assembly, so the fragments
//! are not duplicated in both the body and the title block. The body is
//! scanned once and never re-scanned.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::text::find_balanced_brace;

lazy_static! {
    static ref CORR_INLINE_PLAIN: Regex =
        Regex::new(r"(?i)^\s*correspondence:[ \t]*(\S.*)$").expect("correspondence regex");
    static ref CORR_INLINE_BOLD: Regex =
        Regex::new(r"(?i)^\s*\\textbf\{correspondence:?\}:?[ \t]*(\S.*)$")
            .expect("correspondence bold regex");
    static ref CORR_HEADING: Regex = Regex::new(
        r"(?i)^\s*(?:\\(?:sub)?section\*?\{\s*correspondence\s*\}|correspondence:?|\\textbf\{correspondence:?\}:?)\s*$"
    )
    .expect("correspondence heading regex");
}

/// Title-page fragments extracted from the body, plus the body that
/// remains after removal.
#[derive(Debug, Clone, Default)]
pub struct TitlePageElements {
    pub title_fragments: Vec<String>,
    pub author_fragments: Vec<String>,
    pub affiliation_fragments: Vec<String>,
    pub correspondence_text: String,
    pub remaining_body: String,
}

/// Pull title-page commands and the Correspondence section out of the body.
pub fn extract_title_page(body: &str) -> TitlePageElements {
    let mut text = body.to_string();
    let title_fragments = drain_command(&mut text, "title");
    let author_fragments = drain_command(&mut text, "author");
    let mut affiliation_fragments = drain_command(&mut text, "affiliation");
    affiliation_fragments.extend(drain_command(&mut text, "affil"));
    let correspondence_text = drain_correspondence(&mut text);
    TitlePageElements {
        title_fragments,
        author_fragments,
        affiliation_fragments,
        correspondence_text,
        remaining_body: text,
    }
}

/// Remove every `\name{...}` occurrence from the text, returning the brace
/// contents in document order.
fn drain_command(text: &mut String, name: &str) -> Vec<String> {
    let needle = format!("\\{}{{", name);
    let mut fragments = Vec::new();
    loop {
        let Some(pos) = text.find(&needle) else {
            break;
        };
        let open = pos + needle.len() - 1;
        let Some(close) = find_balanced_brace(text, open) else {
            break;
        };
        let fragment = text[open + 1..close].trim().to_string();
        if !fragment.is_empty() {
            fragments.push(fragment);
        }
        let mut cut_end = close + 1;
        // Swallow a trailing newline so removal doesn't leave a blank line
        if text[cut_end..].starts_with('\n') {
            cut_end += 1;
        }
        text.replace_range(pos..cut_end, "");
    }
    fragments
}

/// Locate a Correspondence section (inline `Correspondence: ...` or a
/// heading followed by a paragraph), remove it from the body, and return
/// its text.
fn drain_correspondence(text: &mut String) -> String {
    let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    let mut kept: Vec<String> = Vec::with_capacity(lines.len());
    let mut captured: Vec<String> = Vec::new();
    let mut i = 0;
    let mut found = false;
    while i < lines.len() {
        let line = &lines[i];
        if !found {
            if let Some(caps) = CORR_INLINE_PLAIN
                .captures(line)
                .or_else(|| CORR_INLINE_BOLD.captures(line))
            {
                captured.push(caps[1].trim().to_string());
                found = true;
                i += 1;
                i = capture_until_break(&lines, i, &mut captured);
                continue;
            }
            if CORR_HEADING.is_match(line) {
                found = true;
                i += 1;
                i = capture_until_break(&lines, i, &mut captured);
                continue;
            }
        }
        kept.push(line.clone());
        i += 1;
    }
    if found {
        *text = kept.join("\n");
    }
    captured.join(" ")
}

fn capture_until_break(lines: &[String], mut i: usize, captured: &mut Vec<String>) -> usize {
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() || line.starts_with("\\section") || line.starts_with("\\subsection") {
            break;
        }
        captured.push(line.to_string());
        i += 1;
    }
    i
}
