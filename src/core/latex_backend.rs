//! LaTeX document assembly.
//!
//! Pure template substitution: a fixed preamble, the embedded sanitized
//! bibliography, the title block (inline fragments first, caller metadata
//! as fallback), the normalized body, and the bibliography print
//! directive. Identical inputs produce byte-identical output.

use crate::core::citations::ExtractedCitations;
use crate::core::structure::titlepage::TitlePageElements;
use crate::core::text::escape_unescaped;
use crate::core::{AuthorMetadata, ExternalMetadata};

/// Bibliography file name used inside the generated document and by the
/// compilation pipeline's biber pass.
pub const BIBLIOGRAPHY_FILE: &str = "references.bib";

/// Assemble the complete `.tex` source.
pub fn assemble_latex(
    body: &str,
    citations: &ExtractedCitations,
    title_page: &TitlePageElements,
    metadata: Option<&ExternalMetadata>,
) -> String {
    let mut out = String::with_capacity(body.len() + 2048);

    out.push_str("\\documentclass[11pt]{article}\n");
    out.push_str("\\usepackage[utf8]{inputenc}\n");
    out.push_str("\\usepackage[T1]{fontenc}\n");
    out.push_str("\\usepackage{amsmath,amssymb}\n");
    out.push_str("\\usepackage{graphicx}\n");
    out.push_str("\\usepackage{booktabs}\n");
    out.push_str("\\usepackage{longtable}\n");
    out.push_str("\\usepackage{threeparttable}\n");
    out.push_str("\\usepackage{authblk}\n");
    out.push_str("\\usepackage[backend=biber,style=numeric-comp,sorting=none]{biblatex}\n");
    out.push_str("\\usepackage{hyperref}\n");
    out.push('\n');

    out.push_str(&format!(
        "\\begin{{filecontents*}}[overwrite]{{{}}}\n",
        BIBLIOGRAPHY_FILE
    ));
    let bibliography = citations.bibliography_block();
    if !bibliography.is_empty() {
        out.push_str(&bibliography);
        out.push('\n');
    }
    out.push_str("\\end{filecontents*}\n");
    out.push_str(&format!("\\addbibresource{{{}}}\n\n", BIBLIOGRAPHY_FILE));

    let has_title_block = push_title_block(&mut out, title_page, metadata);

    out.push_str("\\begin{document}\n\n");
    if has_title_block {
        out.push_str("\\maketitle\n\n");
    }

    let correspondence = correspondence_text(title_page, metadata);
    if !correspondence.is_empty() {
        out.push_str("\\noindent\\textbf{Correspondence:} ");
        out.push_str(&escape_field(&correspondence));
        out.push_str("\n\n");
    }

    let body = body.trim();
    if !body.is_empty() {
        out.push_str(body);
        out.push_str("\n\n");
    }

    out.push_str("\\printbibliography\n\n");
    out.push_str("\\end{document}\n");
    out
}

/// Emit `\title`/`\author`/`\affil` commands. Returns false when neither
/// inline fragments nor metadata provide anything to typeset, in which case
/// `\maketitle` is skipped entirely.
fn push_title_block(
    out: &mut String,
    title_page: &TitlePageElements,
    metadata: Option<&ExternalMetadata>,
) -> bool {
    let title = if title_page.title_fragments.is_empty() {
        metadata.and_then(|m| m.title.clone()).unwrap_or_default()
    } else {
        title_page.title_fragments.join(" ")
    };

    let inline_authors = !title_page.author_fragments.is_empty();
    let meta_authors: &[AuthorMetadata] = match metadata {
        Some(m) if !inline_authors => &m.authors,
        _ => &[],
    };

    if title.is_empty() && !inline_authors && meta_authors.is_empty() {
        return false;
    }

    out.push_str(&format!("\\title{{{}}}\n", escape_field(&title)));

    if inline_authors {
        for author in &title_page.author_fragments {
            out.push_str(&format!("\\author{{{}}}\n", escape_field(author)));
        }
        for (i, affiliation) in title_page.affiliation_fragments.iter().enumerate() {
            out.push_str(&format!(
                "\\affil[{}]{{{}}}\n",
                i + 1,
                escape_field(affiliation)
            ));
        }
    } else {
        for author in meta_authors {
            if author.affiliation_indices.is_empty() {
                out.push_str(&format!("\\author{{{}}}\n", escape_field(&author.name)));
            } else {
                let indices = author
                    .affiliation_indices
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                out.push_str(&format!(
                    "\\author[{}]{{{}}}\n",
                    indices,
                    escape_field(&author.name)
                ));
            }
        }
        if let Some(m) = metadata {
            for (i, affiliation) in m.affiliations.iter().enumerate() {
                out.push_str(&format!(
                    "\\affil[{}]{{{}}}\n",
                    i + 1,
                    escape_field(affiliation)
                ));
            }
        }
    }
    out.push('\n');
    true
}

fn correspondence_text(
    title_page: &TitlePageElements,
    metadata: Option<&ExternalMetadata>,
) -> String {
    if !title_page.correspondence_text.is_empty() {
        return title_page.correspondence_text.clone();
    }
    metadata
        .and_then(|m| m.correspondence.clone())
        .unwrap_or_default()
}

/// Escape the characters that commonly leak in from caller metadata.
fn escape_field(text: &str) -> String {
    let out = escape_unescaped(text, '&');
    let out = escape_unescaped(&out, '%');
    escape_unescaped(&out, '_')
}
