//! Grammar normalization: rewrite manuscript prose into LaTeX-safe
//! typography.
//!
//! The rules run in a fixed order over typed segments. Citation markers
//! pass through untouched (the bibliography sanitizer owns their content);
//! table bodies are excluded from the ampersand rule only, since `&` is a
//! structural column separator there.

pub(crate) mod segments;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::core::text::{brace_depths, escape_unescaped, math_mask};
use crate::data::symbols::{contains_greek, GREEK_COMMANDS, GREEK_COMMAND_NAMES, GREEK_LATIN_LOOKALIKES};
use self::segments::{split_segments, SegmentKind};

lazy_static! {
    static ref GROUPED_INT: Regex = Regex::new(r"(\d),(\d{3})").expect("grouped int regex");
    static ref URL_ARG: Regex = Regex::new(r"\\(?:url|href)\{[^}]*\}").expect("url regex");
    static ref P_VALUE: Regex =
        Regex::new(r"\bp ?([<>=]) ?(\d+(?:\.\d+)?)").expect("p-value regex");
    static ref COMMAND_NAME: Regex = Regex::new(r"\\([A-Za-z]+)").expect("command regex");
}

/// Run the full ordered rule set over the manuscript body.
pub fn normalize_grammar(input: &str) -> String {
    split_segments(input)
        .into_iter()
        .map(|seg| match seg.kind {
            SegmentKind::Citation => seg.text,
            SegmentKind::Table => apply_rules(&seg.text, false),
            SegmentKind::Prose => apply_rules(&seg.text, true),
        })
        .collect()
}

fn apply_rules(text: &str, escape_ampersands: bool) -> String {
    let mut out = group_separators(text);
    out = escape_percent(&out);
    if escape_ampersands {
        out = escape_unescaped(&out, '&');
    }
    out = math_symbols(&out);
    out = significance_idioms(&out);
    out = convert_dashes(&out);
    out = escape_underscores(&out);
    out = smart_quotes(&out);
    out = wrap_greek_commands(&out);
    out = bare_greek_letters(&out);
    out
}

/// Replace matches of `re` whose start lies at brace depth zero.
fn replace_outside_braces(
    text: &str,
    re: &Regex,
    rep: impl Fn(&Captures) -> String,
) -> String {
    let depths = brace_depths(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        if depths[m.start()] > 0 {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&rep(&caps));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Replace matches of `re` whose start is outside math mode.
fn replace_outside_math(text: &str, re: &Regex, rep: impl Fn(&Captures) -> String) -> String {
    let mask = math_mask(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        if mask[m.start()] {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&rep(&caps));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// `12,345` -> `12{,}345`, outside existing braces only. Iterates so that
/// numbers with several group separators converge.
fn group_separators(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = replace_outside_braces(&current, &GROUPED_INT, |caps| {
            format!("{}{{,}}{}", &caps[1], &caps[2])
        });
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Escape unescaped `%`, leaving `\url{...}`/`\href{...}` arguments alone.
fn escape_percent(text: &str) -> String {
    let mut protected = vec![false; text.len()];
    for m in URL_ARG.find_iter(text) {
        for slot in protected.iter_mut().take(m.end()).skip(m.start()) {
            *slot = true;
        }
    }
    let mut out = String::with_capacity(text.len() + 8);
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if c == '%' && !escaped && !protected[i] {
            out.push('\\');
        }
        out.push(c);
        escaped = c == '\\' && !escaped;
    }
    out
}

/// Unicode comparison/arithmetic symbols become math-mode commands. ASCII
/// `<` and `>` are never touched.
fn math_symbols(text: &str) -> String {
    if !text.contains(['±', '×', '≥', '≤']) {
        return text.to_string();
    }
    let mask = math_mask(text);
    let mut out = String::with_capacity(text.len() + 16);
    for (i, c) in text.char_indices() {
        let cmd = match c {
            '±' => Some("\\pm"),
            '×' => Some("\\times"),
            '≥' => Some("\\geq"),
            '≤' => Some("\\leq"),
            _ => None,
        };
        match cmd {
            Some(cmd) if mask[i] => {
                out.push_str(cmd);
                out.push(' ');
            }
            Some(cmd) => {
                out.push('$');
                out.push_str(cmd);
                out.push('$');
            }
            None => out.push(c),
        }
    }
    out
}

/// `p<0.05`, `p>0.9`, `p=0.001` become inline math.
fn significance_idioms(text: &str) -> String {
    replace_outside_math(text, &P_VALUE, |caps| {
        format!("$p{}{}$", &caps[1], &caps[2])
    })
}

fn convert_dashes(text: &str) -> String {
    text.replace('–', "--").replace('—', ", ")
}

/// Escape unescaped `_` outside command arguments and math.
fn escape_underscores(text: &str) -> String {
    if !text.contains('_') {
        return text.to_string();
    }
    let depths = brace_depths(text);
    let mask = math_mask(text);
    let mut out = String::with_capacity(text.len() + 8);
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if c == '_' && !escaped && depths[i] == 0 && !mask[i] {
            out.push('\\');
        }
        out.push(c);
        escaped = c == '\\' && !escaped;
    }
    out
}

/// Map Unicode smart quotes to the LaTeX directional convention.
fn smart_quotes(text: &str) -> String {
    text.replace('\u{201C}', "``")
        .replace('\u{201D}', "''")
        .replace('\u{2018}', "`")
        .replace('\u{2019}', "'")
}

/// Wrap bare `\alpha`-style Greek commands in math delimiters when they are
/// not already inside math.
fn wrap_greek_commands(text: &str) -> String {
    replace_outside_math(text, &COMMAND_NAME, |caps| {
        if GREEK_COMMAND_NAMES.contains(&caps[1]) {
            format!("${}$", &caps[0])
        } else {
            caps[0].to_string()
        }
    })
}

/// Replace bare Unicode Greek letters with math-mode commands (or the bare
/// Latin letter for lookalike capitals).
fn bare_greek_letters(text: &str) -> String {
    if !contains_greek(text) {
        return text.to_string();
    }
    let mask = math_mask(text);
    let mut out = String::with_capacity(text.len() + 16);
    for (i, c) in text.char_indices() {
        if let Some(latin) = GREEK_LATIN_LOOKALIKES.get(&c) {
            out.push(*latin);
        } else if let Some(cmd) = GREEK_COMMANDS.get(&c) {
            if mask[i] {
                out.push_str(cmd);
                out.push(' ');
            } else {
                out.push('$');
                out.push_str(cmd);
                out.push('$');
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_group_separators() {
        assert_eq!(normalize_grammar("about 12,345 cells"), "about 12{,}345 cells");
    }

    #[test]
    fn test_group_separators_multiple_groups() {
        assert_eq!(normalize_grammar("1,234,567 reads"), "1{,}234{,}567 reads");
    }

    #[test]
    fn test_group_separator_skips_braced_text() {
        let input = "\\caption{12,345 cells}";
        assert_eq!(normalize_grammar(input), input);
    }

    #[test]
    fn test_percent_escaped() {
        assert_eq!(normalize_grammar("rose by 50% overall"), "rose by 50\\% overall");
        assert_eq!(
            normalize_grammar("already 50\\% here"),
            "already 50\\% here"
        );
    }

    #[test]
    fn test_percent_in_url_untouched() {
        let input = "see \\url{https://x.org/a%20b} now";
        assert_eq!(normalize_grammar(input), input);
    }

    #[test]
    fn test_ampersand_escaped_in_prose_only() {
        let input = "Smith & Jones\n\\begin{tabular}{ll}\nA & B & C \\\\\n\\end{tabular}\nfoo & bar";
        let out = normalize_grammar(input);
        assert!(out.contains("Smith \\& Jones"));
        assert!(out.contains("A & B & C"));
        assert!(out.contains("foo \\& bar"));
    }

    #[test]
    fn test_math_symbols() {
        assert_eq!(normalize_grammar("3 × 5"), "3 $\\times$ 5");
        assert_eq!(normalize_grammar("x ± y"), "x $\\pm$ y");
        assert_eq!(normalize_grammar("n ≥ 10 and m ≤ 2"), "n $\\geq$ 10 and m $\\leq$ 2");
    }

    #[test]
    fn test_ascii_angle_brackets_untouched() {
        let input = "a < b and c > d";
        assert_eq!(normalize_grammar(input), input);
    }

    #[test]
    fn test_significance_idiom_wrapped() {
        assert_eq!(normalize_grammar("significant at p<0.05 level"),
                   "significant at $p<0.05$ level");
        assert_eq!(normalize_grammar("with p = 0.001 overall"),
                   "with $p=0.001$ overall");
    }

    #[test]
    fn test_dashes() {
        assert_eq!(normalize_grammar("pages 3–7"), "pages 3--7");
        assert_eq!(normalize_grammar("however—notably"), "however, notably");
    }

    #[test]
    fn test_underscore_escaped_outside_commands() {
        let out = normalize_grammar("gene_name matters; see \\label{fig_one}");
        assert!(out.contains("gene\\_name"));
        assert!(out.contains("\\label{fig_one}"));
    }

    #[test]
    fn test_smart_quotes() {
        assert_eq!(
            normalize_grammar("\u{201C}quoted\u{201D} and \u{2018}single\u{2019}"),
            "``quoted'' and `single'"
        );
    }

    #[test]
    fn test_greek_command_wrapped() {
        assert_eq!(normalize_grammar("the \\alpha subunit"), "the $\\alpha$ subunit");
        assert_eq!(normalize_grammar("already $\\alpha$ here"), "already $\\alpha$ here");
    }

    #[test]
    fn test_bare_greek_letter() {
        assert_eq!(normalize_grammar("TGF-β signaling"), "TGF-$\\beta$ signaling");
    }

    #[test]
    fn test_citation_marker_untouched() {
        let input = "x [[@article{a_1,journal={A & B},note={50%}}]] y";
        let out = normalize_grammar(input);
        assert!(out.contains("[[@article{a_1,journal={A & B},note={50%}}]]"));
    }
}
