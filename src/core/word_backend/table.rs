//! Longtable parsing for the Word backend.
//!
//! Converts a `\begin{longtable}{...} ... \end{longtable}` block into a
//! row/column grid. The first row counts as a bold header when every
//! non-empty cell is wrapped in `\textbf{...}`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::text::find_balanced_brace;

lazy_static! {
    static ref BOLD_CELL: Regex = Regex::new(r"^\\textbf\{(.*)\}$").expect("bold cell regex");
    static ref CAPTION: Regex = Regex::new(r"\\caption\{([^}]*)\}").expect("caption regex");
    static ref LABEL: Regex = Regex::new(r"\\label\{[^}]*\}").expect("label regex");
}

const RULE_COMMANDS: &[&str] = &[
    "\\hline",
    "\\toprule",
    "\\midrule",
    "\\bottomrule",
    "\\endhead",
    "\\endfirsthead",
    "\\endfoot",
    "\\endlastfoot",
    "\\centering",
];

#[derive(Debug, Clone, Default)]
pub struct DocTable {
    pub rows: Vec<Vec<String>>,
    pub bold_header: bool,
    pub caption: Option<String>,
}

/// Parse one longtable block (including its begin/end lines) into a grid.
/// Returns None when the block has no parseable rows.
pub(crate) fn parse_longtable(block: &str) -> Option<DocTable> {
    let begin_tag = "\\begin{longtable}";
    let end_tag = "\\end{longtable}";
    let start = block.find(begin_tag)? + begin_tag.len();
    let end = block.find(end_tag)?;
    let mut body = &block[start..end];

    // Skip the column-spec group right after \begin{longtable}
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        let offset = body.len() - trimmed.len();
        if let Some(close) = find_balanced_brace(body, offset) {
            body = &body[close + 1..];
        }
    }

    let caption = CAPTION
        .captures(body)
        .map(|caps| caps[1].trim().to_string());
    let mut cleaned = CAPTION.replace_all(body, "").into_owned();
    cleaned = LABEL.replace_all(&cleaned, "").into_owned();
    for command in RULE_COMMANDS {
        cleaned = cleaned.replace(command, "");
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for raw_row in cleaned.split("\\\\") {
        if raw_row.trim().is_empty() {
            continue;
        }
        let cells = split_cells(raw_row);
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(cells);
    }
    if rows.is_empty() {
        return None;
    }

    let bold_header = rows[0]
        .iter()
        .filter(|c| !c.is_empty())
        .all(|c| BOLD_CELL.is_match(c))
        && rows[0].iter().any(|c| !c.is_empty());
    if bold_header {
        rows[0] = rows[0]
            .iter()
            .map(|c| match BOLD_CELL.captures(c) {
                Some(caps) => caps[1].to_string(),
                None => c.clone(),
            })
            .collect();
    }

    Some(DocTable {
        rows,
        bold_header,
        caption,
    })
}

/// Split one table row on unescaped `&`.
fn split_cells(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in row.chars() {
        if c == '&' && !escaped {
            cells.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
        escaped = c == '\\' && !escaped;
    }
    cells.push(current.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_grid() {
        let block = "\\begin{longtable}{ll}\nA & B \\\\\nC & D \\\\\n\\end{longtable}";
        let table = parse_longtable(block).unwrap();
        assert_eq!(table.rows, vec![vec!["A", "B"], vec!["C", "D"]]);
        assert!(!table.bold_header);
    }

    #[test]
    fn test_bold_header_detected_and_unwrapped() {
        let block = "\\begin{longtable}{ll}\n\\textbf{Name} & \\textbf{Value} \\\\\nx & 1 \\\\\n\\end{longtable}";
        let table = parse_longtable(block).unwrap();
        assert!(table.bold_header);
        assert_eq!(table.rows[0], vec!["Name", "Value"]);
    }

    #[test]
    fn test_rules_and_labels_stripped() {
        let block = "\\begin{longtable}{ll}\n\\toprule\nA & B \\\\\n\\midrule\n\\label{tab:x}\nC & D \\\\\n\\bottomrule\n\\end{longtable}";
        let table = parse_longtable(block).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_caption_captured() {
        let block =
            "\\begin{longtable}{l}\n\\caption{Summary of runs} \\\\\nA \\\\\n\\end{longtable}";
        let table = parse_longtable(block).unwrap();
        assert_eq!(table.caption.as_deref(), Some("Summary of runs"));
        assert_eq!(table.rows, vec![vec!["A"]]);
    }

    #[test]
    fn test_escaped_ampersand_stays_in_cell() {
        let block = "\\begin{longtable}{ll}\nSmith \\& Co & 5 \\\\\n\\end{longtable}";
        let table = parse_longtable(block).unwrap();
        assert_eq!(table.rows[0][0], "Smith \\& Co");
        assert_eq!(table.rows[0][1], "5");
    }
}
