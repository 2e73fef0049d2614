//! Structural conversion: heading markup, paragraph boundaries, title-page
//! extraction, figure ordering.
//!
//! The four passes are independent pure text transforms and run in this
//! order: headings, paragraphs, title page, figures.

pub mod figures;
pub mod titlepage;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Most specific first, so a level-1 pattern cannot consume a level-3 line
    static ref HEADING_L3: Regex = Regex::new(r"(?m)^###[ \t]*(.+?)[ \t]*$").expect("h3 regex");
    static ref HEADING_L2: Regex = Regex::new(r"(?m)^##[ \t]*(.+?)[ \t]*$").expect("h2 regex");
    static ref HEADING_L1: Regex = Regex::new(r"(?m)^#[ \t]*(.+?)[ \t]*$").expect("h1 regex");
}

/// Convert `#`-marked heading lines into sectioning commands.
pub fn convert_headings(input: &str) -> String {
    let out = HEADING_L3.replace_all(input, "\\subsubsection{$1}");
    let out = HEADING_L2.replace_all(&out, "\\subsection{$1}");
    let out = HEADING_L1.replace_all(&out, "\\section{$1}");
    out.into_owned()
}

/// Insert blank-line paragraph separators the upstream generation omits,
/// and collapse runs of three or more blank lines to a single one.
///
/// A separator goes between two adjacent non-empty lines when the first
/// ends a sentence (final punctuation, possibly brace-closed, or a citation
/// marker) and the second starts a new one (capital letter or a command),
/// but only while no markup environment is open.
pub fn normalize_paragraphs(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut spaced: Vec<&str> = Vec::with_capacity(lines.len() + 8);
    let mut depth: i64 = 0;
    for (i, line) in lines.iter().enumerate() {
        spaced.push(line);
        depth += environment_delta(line);
        if depth == 0 {
            if let Some(next) = lines.get(i + 1) {
                if needs_paragraph_break(line, next) {
                    spaced.push("");
                }
            }
        }
    }
    collapse_blank_runs(&spaced)
}

fn environment_delta(line: &str) -> i64 {
    line.matches("\\begin{").count() as i64 - line.matches("\\end{").count() as i64
}

fn needs_paragraph_break(line: &str, next: &str) -> bool {
    let tail = line.trim_end();
    let head = next.trim_start();
    if tail.is_empty() || head.is_empty() {
        return false;
    }
    let sentence_end = tail.ends_with('.')
        || tail.ends_with('!')
        || tail.ends_with('?')
        || tail.ends_with(".}")
        || tail.ends_with("!}")
        || tail.ends_with("?}")
        || tail.ends_with("]]");
    if !sentence_end {
        return false;
    }
    head.starts_with('\\')
        || head
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
}

fn collapse_blank_runs(lines: &[&str]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut run = 0usize;
    for line in lines {
        if line.trim().is_empty() {
            run += 1;
            continue;
        }
        if run > 0 {
            let keep = if run >= 3 { 1 } else { run };
            for _ in 0..keep {
                out.push("");
            }
            run = 0;
        }
        out.push(line);
    }
    if run > 0 {
        let keep = if run >= 3 { 1 } else { run };
        for _ in 0..keep {
            out.push("");
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_heading_levels() {
        let input = "# Intro\n## Methods\n### Cohort";
        assert_eq!(
            convert_headings(input),
            "\\section{Intro}\n\\subsection{Methods}\n\\subsubsection{Cohort}"
        );
    }

    #[test]
    fn test_heading_without_space_after_marker() {
        assert_eq!(convert_headings("##Results"), "\\subsection{Results}");
    }

    #[test]
    fn test_paragraph_break_inserted() {
        let input = "First sentence ends here.\nThe next one starts fresh.";
        assert_eq!(
            normalize_paragraphs(input),
            "First sentence ends here.\n\nThe next one starts fresh."
        );
    }

    #[test]
    fn test_no_break_mid_sentence() {
        let input = "this line ends without punctuation\nand continues lowercase.";
        assert_eq!(normalize_paragraphs(input), input);
    }

    #[test]
    fn test_break_after_citation_marker() {
        let input = "Shown previously [[@article{a,title={T}}]]\nNew paragraph begins.";
        let out = normalize_paragraphs(input);
        assert!(out.contains("]]\n\nNew paragraph"));
    }

    #[test]
    fn test_no_break_inside_environment() {
        let input = "\\begin{itemize}\n\\item One.\n\\item Two.\n\\end{itemize}";
        assert_eq!(normalize_paragraphs(input), input);
    }

    #[test]
    fn test_collapse_three_blank_lines() {
        let input = "a.\n\n\n\nB starts.";
        assert_eq!(normalize_paragraphs(input), "a.\n\nB starts.");
    }

    #[test]
    fn test_two_blank_lines_kept() {
        let input = "a.\n\n\nB starts.";
        assert_eq!(normalize_paragraphs(input), input);
    }
}
