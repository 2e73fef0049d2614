//! Word document assembly.
//!
//! The Word backend re-walks the normalized manuscript independently of the
//! LaTeX backend, building a block tree of headings, paragraphs and tables.
//! Inline citation markers become superscript reference numbers under the
//! backend's own numbering domain, and a reference list is appended. Since
//! Word is not markup-based, LaTeX escapes are reversed back into the
//! underlying characters.

pub mod table;
pub mod tracker;

use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow, VertAlignType};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::core::citations::{scan_markers, CitationRecord, ExtractedCitations};
use crate::core::structure::titlepage::TitlePageElements;
use crate::core::text::brace_depths;
use crate::core::ExternalMetadata;
use crate::data::symbols::GREEK_COMMANDS;
use crate::utils::{ConversionError, ConversionResult};
use self::table::{parse_longtable, DocTable};
use self::tracker::CitationTracker;

lazy_static! {
    static ref SECTION_LINE: Regex =
        Regex::new(r"^\\section\*?\{(.+)\}$").expect("section regex");
    static ref SUBSECTION_LINE: Regex =
        Regex::new(r"^\\subsection\*?\{(.+)\}$").expect("subsection regex");
    static ref SUBSUBSECTION_LINE: Regex =
        Regex::new(r"^\\subsubsection\*?\{(.+)\}$").expect("subsubsection regex");
    static ref CAPTION_LINE: Regex = Regex::new(r"\\caption\{(.+)\}").expect("caption regex");
    static ref INLINE_FORMAT: Regex =
        Regex::new(r"\\(?:textbf|textit|emph|texttt|underline)\{([^{}]*)\}")
            .expect("inline format regex");
    static ref MATH_P_VALUE: Regex =
        Regex::new(r"\$(p ?[<>=] ?[0-9][^$]*)\$").expect("math p regex");
}

/// One run of text inside a paragraph.
#[derive(Debug, Clone)]
pub struct DocRun {
    pub text: String,
    pub superscript: bool,
}

/// Typed block tree node.
#[derive(Debug, Clone)]
pub enum DocBlock {
    /// Level 0 is the document title, 1..=3 are section levels
    Heading { level: u8, text: String },
    Paragraph { runs: Vec<DocRun> },
    Table(DocTable),
}

/// Build the block tree and pack it into `.docx` bytes.
pub fn assemble_word(
    body: &str,
    citations: &ExtractedCitations,
    title_page: &TitlePageElements,
    metadata: Option<&ExternalMetadata>,
) -> ConversionResult<Vec<u8>> {
    let mut tracker = CitationTracker::new();
    let mut blocks = title_blocks(title_page, metadata);
    blocks.extend(build_blocks(body, citations, &mut tracker));
    render_docx(&blocks, &tracker)
}

fn title_blocks(
    title_page: &TitlePageElements,
    metadata: Option<&ExternalMetadata>,
) -> Vec<DocBlock> {
    let mut blocks = Vec::new();
    let title = if title_page.title_fragments.is_empty() {
        metadata.and_then(|m| m.title.clone()).unwrap_or_default()
    } else {
        title_page.title_fragments.join(" ")
    };
    if !title.is_empty() {
        blocks.push(DocBlock::Heading {
            level: 0,
            text: reverse_escapes(&title),
        });
    }

    let authors = if title_page.author_fragments.is_empty() {
        metadata
            .map(|m| m.authors.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default()
    } else {
        title_page.author_fragments.clone()
    };
    if !authors.is_empty() {
        blocks.push(plain_paragraph(&reverse_escapes(&authors.join(", "))));
    }

    let affiliations = if title_page.affiliation_fragments.is_empty() {
        metadata
            .map(|m| m.affiliations.clone())
            .unwrap_or_default()
    } else {
        title_page.affiliation_fragments.clone()
    };
    for affiliation in &affiliations {
        blocks.push(plain_paragraph(&reverse_escapes(affiliation)));
    }

    let correspondence = if title_page.correspondence_text.is_empty() {
        metadata
            .and_then(|m| m.correspondence.clone())
            .unwrap_or_default()
    } else {
        title_page.correspondence_text.clone()
    };
    if !correspondence.is_empty() {
        blocks.push(plain_paragraph(&format!(
            "Correspondence: {}",
            reverse_escapes(&correspondence)
        )));
    }
    blocks
}

/// Walk the manuscript body into typed blocks, assigning citation numbers
/// on first encounter.
pub fn build_blocks(
    body: &str,
    citations: &ExtractedCitations,
    tracker: &mut CitationTracker,
) -> Vec<DocBlock> {
    let mut blocks = Vec::new();
    let mut last = 0;
    for (start, end) in longtable_spans(body) {
        prose_blocks(&body[last..start], citations, tracker, &mut blocks);
        match parse_longtable(&body[start..end]) {
            Some(mut table) => {
                for row in &mut table.rows {
                    for cell in row.iter_mut() {
                        *cell = reverse_escapes(&cell_citations(cell, citations, tracker));
                    }
                }
                if let Some(caption) = &table.caption {
                    blocks.push(plain_paragraph(&reverse_escapes(caption)));
                }
                blocks.push(DocBlock::Table(table));
            }
            // A block with no parseable rows degrades to plain paragraphs
            // rather than disappearing
            None => {
                warn!("longtable block had no parseable rows, keeping it as prose");
                prose_blocks(&body[start..end], citations, tracker, &mut blocks);
            }
        }
        last = end;
    }
    prose_blocks(&body[last..], citations, tracker, &mut blocks);
    blocks
}

fn longtable_spans(input: &str) -> Vec<(usize, usize)> {
    let begin_tag = "\\begin{longtable}";
    let end_tag = "\\end{longtable}";
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(pos) = input[from..].find(begin_tag) {
        let start = from + pos;
        let body_from = start + begin_tag.len();
        let Some(offset) = input[body_from..].find(end_tag) else {
            break;
        };
        let end = body_from + offset + end_tag.len();
        spans.push((start, end));
        from = end;
    }
    spans
}

fn prose_blocks(
    text: &str,
    citations: &ExtractedCitations,
    tracker: &mut CitationTracker,
    blocks: &mut Vec<DocBlock>,
) {
    let mut in_figure = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("\\begin{figure") {
            in_figure = true;
            continue;
        }
        if trimmed.starts_with("\\end{figure") {
            in_figure = false;
            continue;
        }
        if in_figure {
            // Only the caption survives into the Word document
            if let Some(caps) = CAPTION_LINE.captures(trimmed) {
                blocks.push(plain_paragraph(&reverse_escapes(&strip_inline_format(
                    &caps[1],
                ))));
            }
            continue;
        }
        if let Some(caps) = SUBSUBSECTION_LINE.captures(trimmed) {
            blocks.push(heading_block(3, &caps[1]));
            continue;
        }
        if let Some(caps) = SUBSECTION_LINE.captures(trimmed) {
            blocks.push(heading_block(2, &caps[1]));
            continue;
        }
        if let Some(caps) = SECTION_LINE.captures(trimmed) {
            blocks.push(heading_block(1, &caps[1]));
            continue;
        }
        if trimmed.starts_with("\\begin{") || trimmed.starts_with("\\end{") {
            continue;
        }
        blocks.push(DocBlock::Paragraph {
            runs: paragraph_runs(trimmed, citations, tracker),
        });
    }
}

fn heading_block(level: u8, text: &str) -> DocBlock {
    DocBlock::Heading {
        level,
        text: reverse_escapes(&strip_inline_format(text)),
    }
}

fn plain_paragraph(text: &str) -> DocBlock {
    DocBlock::Paragraph {
        runs: vec![DocRun {
            text: text.to_string(),
            superscript: false,
        }],
    }
}

/// Split one prose line into text runs and superscript citation-number
/// runs. Malformed markers stay in the text verbatim.
fn paragraph_runs(
    line: &str,
    citations: &ExtractedCitations,
    tracker: &mut CitationTracker,
) -> Vec<DocRun> {
    let mut runs = Vec::new();
    let mut last = 0;
    for span in scan_markers(line) {
        if span.start > last {
            runs.push(DocRun {
                text: reverse_escapes(&strip_inline_format(&line[last..span.start])),
                superscript: false,
            });
        }
        let entry_text = citations
            .get(&span.key)
            .map(format_reference)
            .unwrap_or_else(|| span.entry.clone());
        let number = tracker.number_for(&span.key, &entry_text);
        runs.push(DocRun {
            text: number.to_string(),
            superscript: true,
        });
        last = span.end;
    }
    if last < line.len() {
        runs.push(DocRun {
            text: reverse_escapes(&strip_inline_format(&line[last..])),
            superscript: false,
        });
    }
    runs
}

/// Replace markers inside a table cell with bracketed reference numbers.
fn cell_citations(
    cell: &str,
    citations: &ExtractedCitations,
    tracker: &mut CitationTracker,
) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut last = 0;
    for span in scan_markers(cell) {
        out.push_str(&cell[last..span.start]);
        let entry_text = citations
            .get(&span.key)
            .map(format_reference)
            .unwrap_or_else(|| span.entry.clone());
        let number = tracker.number_for(&span.key, &entry_text);
        out.push_str(&format!("[{}]", number));
        last = span.end;
    }
    out.push_str(&cell[last..]);
    out
}

/// Human-readable reference-list entry assembled from the record's raw
/// fields.
pub fn format_reference(record: &CitationRecord) -> String {
    let fields = parse_fields(&record.raw_fields);
    let lookup = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };
    let mut parts: Vec<String> = Vec::new();
    for name in ["author", "title"] {
        if let Some(value) = lookup(name) {
            parts.push(value.to_string());
        }
    }
    if let Some(venue) = lookup("journal").or_else(|| lookup("booktitle")) {
        parts.push(venue.to_string());
    }
    if let Some(year) = lookup("year") {
        parts.push(year.to_string());
    }
    if parts.is_empty() {
        return record.key.clone();
    }
    let mut out = parts.join(". ");
    out.push('.');
    reverse_escapes(&out).replace(['{', '}'], "")
}

/// Split pseudo-BibTeX fields on top-level commas into (name, value) pairs.
fn parse_fields(raw: &str) -> Vec<(String, String)> {
    let depths = brace_depths(raw);
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        if c == ',' && depths[i] == 0 {
            parts.push(&raw[start..i]);
            start = i + 1;
        }
    }
    parts.push(&raw[start..]);

    let mut fields = Vec::new();
    for part in parts {
        let Some(eq) = part.find('=') else {
            continue;
        };
        let name = part[..eq].trim().to_lowercase();
        let mut value = part[eq + 1..].trim();
        if value.len() >= 2 {
            let stripped = value
                .strip_prefix('{')
                .and_then(|v| v.strip_suffix('}'))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')));
            if let Some(stripped) = stripped {
                value = stripped;
            }
        }
        if !name.is_empty() && !value.is_empty() {
            fields.push((name, value.trim().to_string()));
        }
    }
    fields
}

/// Strip inline formatting commands down to their text content.
fn strip_inline_format(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = INLINE_FORMAT.replace_all(&current, "$1").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Turn LaTeX escapes and math-mode snippets back into plain characters.
pub fn reverse_escapes(text: &str) -> String {
    let mut out = text.to_string();
    for (letter, command) in GREEK_COMMANDS.entries() {
        let needle = format!("${}$", command);
        if out.contains(&needle) {
            out = out.replace(&needle, &letter.to_string());
        }
    }
    out = out
        .replace("$\\pm$", "±")
        .replace("$\\times$", "×")
        .replace("$\\geq$", "≥")
        .replace("$\\leq$", "≤");
    out = MATH_P_VALUE.replace_all(&out, "$1").into_owned();
    out = out
        .replace("{,}", ",")
        .replace("\\&", "&")
        .replace("\\%", "%")
        .replace("\\_", "_")
        .replace("\\#", "#");
    out = out
        .replace("``", "\u{201C}")
        .replace("''", "\u{201D}")
        .replace('`', "\u{2018}");
    out.replace("---", "\u{2014}").replace("--", "\u{2013}")
}

fn heading_size(level: u8) -> usize {
    // Half-points
    match level {
        0 => 40,
        1 => 32,
        2 => 28,
        _ => 26,
    }
}

/// Render the block tree to packed `.docx` bytes, appending the reference
/// list.
pub fn render_docx(blocks: &[DocBlock], tracker: &CitationTracker) -> ConversionResult<Vec<u8>> {
    let mut doc = Docx::new();
    for block in blocks {
        match block {
            DocBlock::Heading { level, text } => {
                doc = doc.add_paragraph(
                    Paragraph::new().add_run(
                        Run::new()
                            .add_text(text.as_str())
                            .bold()
                            .size(heading_size(*level)),
                    ),
                );
            }
            DocBlock::Paragraph { runs } => {
                let mut paragraph = Paragraph::new();
                for run in runs {
                    let mut r = Run::new().add_text(run.text.as_str());
                    if run.superscript {
                        r.run_property = r.run_property.vert_align(VertAlignType::SuperScript);
                    }
                    paragraph = paragraph.add_run(r);
                }
                doc = doc.add_paragraph(paragraph);
            }
            DocBlock::Table(table) => {
                let rows = table
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| {
                        TableRow::new(
                            row.iter()
                                .map(|cell| {
                                    let mut run = Run::new().add_text(cell.as_str());
                                    if i == 0 && table.bold_header {
                                        run = run.bold();
                                    }
                                    TableCell::new()
                                        .add_paragraph(Paragraph::new().add_run(run))
                                })
                                .collect(),
                        )
                    })
                    .collect();
                doc = doc.add_table(Table::new(rows));
            }
        }
    }

    if !tracker.is_empty() {
        doc = doc.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("References").bold().size(32)),
        );
        for (i, entry) in tracker.entries().iter().enumerate() {
            doc = doc.add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(format!("{}. {}", i + 1, entry.text))),
            );
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    doc.build()
        .pack(&mut buffer)
        .map_err(|err| ConversionError::internal(format!("failed to pack document: {}", err)))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::citations::extract_citations;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_citation_numbers_stable_and_increasing() {
        let body = "First [[@article{a,title={A}}]] then [[@article{b,title={B}}]]\n\
                    again [[@article{a,title={A}}]]";
        let citations = extract_citations(body);
        let mut tracker = CitationTracker::new();
        let blocks = build_blocks(body, &citations, &mut tracker);

        let mut numbers = Vec::new();
        for block in &blocks {
            if let DocBlock::Paragraph { runs } = block {
                for run in runs {
                    if run.superscript {
                        numbers.push(run.text.clone());
                    }
                }
            }
        }
        assert_eq!(numbers, vec!["1", "2", "1"]);
        assert_eq!(tracker.entries().len(), 2);
    }

    #[test]
    fn test_heading_classification() {
        let body = "\\section{Intro}\nSome text.\n\\subsection{Details}";
        let citations = extract_citations(body);
        let mut tracker = CitationTracker::new();
        let blocks = build_blocks(body, &citations, &mut tracker);
        assert!(matches!(
            blocks[0],
            DocBlock::Heading { level: 1, ref text } if text == "Intro"
        ));
        assert!(matches!(blocks[1], DocBlock::Paragraph { .. }));
        assert!(matches!(blocks[2], DocBlock::Heading { level: 2, .. }));
    }

    #[test]
    fn test_table_block_parsed() {
        let body = "Before.\n\\begin{longtable}{ll}\n\\textbf{K} & \\textbf{V} \\\\\nx & 1 \\\\\n\\end{longtable}\nAfter.";
        let citations = extract_citations(body);
        let mut tracker = CitationTracker::new();
        let blocks = build_blocks(body, &citations, &mut tracker);
        let table = blocks
            .iter()
            .find_map(|b| match b {
                DocBlock::Table(t) => Some(t),
                _ => None,
            })
            .expect("table block");
        assert!(table.bold_header);
        assert_eq!(table.rows[1], vec!["x", "1"]);
    }

    #[test]
    fn test_figure_caption_only() {
        let body = "\\begin{figure}\n\\includegraphics{figures/x.png}\n\\caption{A picture.}\n\\label{fig1}\n\\end{figure}";
        let citations = extract_citations(body);
        let mut tracker = CitationTracker::new();
        let blocks = build_blocks(body, &citations, &mut tracker);
        assert_eq!(blocks.len(), 1);
        assert!(matches!(
            &blocks[0],
            DocBlock::Paragraph { runs } if runs[0].text == "A picture."
        ));
    }

    #[test]
    fn test_reverse_escapes() {
        assert_eq!(reverse_escapes("5\\% of A \\& B"), "5% of A & B");
        assert_eq!(reverse_escapes("12{,}345"), "12,345");
        assert_eq!(reverse_escapes("$\\alpha$-level"), "α-level");
        assert_eq!(reverse_escapes("$p<0.05$"), "p<0.05");
        assert_eq!(reverse_escapes("pages 3--7"), "pages 3\u{2013}7");
    }

    #[test]
    fn test_format_reference() {
        let citations = extract_citations(
            "[[@article{a1,author={Roe J and Doe A},title={On Things},journal={J Stuff},year={2021}}]]",
        );
        let reference = format_reference(&citations.records[0]);
        assert_eq!(reference, "Roe J and Doe A. On Things. J Stuff. 2021.");
    }

    #[test]
    fn test_docx_bytes_are_zip() {
        let body = "\\section{Intro}\nSee [[@article{a,author={X},title={T},year={2020}}]].";
        let citations = extract_citations(body);
        let tp = crate::core::structure::titlepage::extract_title_page("");
        let bytes = assemble_word(body, &citations, &tp, None).expect("docx bytes");
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }
}
