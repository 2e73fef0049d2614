//! Manutex - AI-manuscript to LaTeX/PDF/Word compiler
//!
//! Converts plain prose interleaved with inline pseudo-BibTeX citation
//! markers (`[[@article{key, author={...}, ...}]]`) into a complete LaTeX
//! document, a compiled PDF (via an external TeX toolchain), or a native
//! Word document.
//!
//! The front-end (citation extraction, sanitization, grammar
//! normalization, structural conversion) is shared; the LaTeX and Word
//! backends consume its output independently, each with its own citation
//! numbering domain.

pub mod core;
pub mod data;
pub mod pipeline;
pub mod utils;

use crate::core::word_backend;

// Re-export the public surface
pub use crate::core::citations::{
    extract_citations, replace_markers_with_supercite, sanitize_entry, CitationRecord,
    ExtractedCitations,
};
pub use crate::core::grammar::normalize_grammar;
pub use crate::core::latex_backend::assemble_latex;
pub use crate::core::structure::figures::reorder_figures;
pub use crate::core::structure::titlepage::{extract_title_page, TitlePageElements};
pub use crate::core::structure::{convert_headings, normalize_paragraphs};
pub use crate::core::word_backend::{assemble_word, DocBlock, DocRun};
pub use crate::core::{AuthorMetadata, ExternalMetadata};
pub use crate::pipeline::{render_pdf, render_pdf_cancellable, ImageAsset, PassResult};
pub use crate::utils::{ConversionError, ConversionResult, RenderError};

const WRAPPER_OPEN: &str = "<latex>";
const WRAPPER_CLOSE: &str = "</latex>";

/// Strip the optional wrapper sentinel and reject empty input.
fn prepare_manuscript(manuscript: &str) -> ConversionResult<String> {
    let trimmed = manuscript.trim();
    let stripped = trimmed.strip_prefix(WRAPPER_OPEN).unwrap_or(trimmed);
    let stripped = stripped.strip_suffix(WRAPPER_CLOSE).unwrap_or(stripped);
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return Err(ConversionError::invalid("manuscript text is empty"));
    }
    Ok(stripped.to_string())
}

/// Run the shared front-end passes: grammar normalization, heading
/// conversion, paragraph normalization, title-page extraction, figure
/// reordering. Citation markers survive intact.
fn run_front_end(text: &str) -> TitlePageElements {
    let body = normalize_grammar(text);
    let body = convert_headings(&body);
    let body = normalize_paragraphs(&body);
    let mut title_page = extract_title_page(&body);
    title_page.remaining_body = reorder_figures(&title_page.remaining_body);
    title_page
}

/// Compile a manuscript into a complete `.tex` document.
///
/// Deterministic: identical inputs yield byte-identical output. Caller
/// metadata fills in title-page fields only where no inline element was
/// found.
pub fn compile_to_latex(
    manuscript: &str,
    metadata: Option<&ExternalMetadata>,
) -> ConversionResult<String> {
    let text = prepare_manuscript(manuscript)?;
    let citations = extract_citations(&text);
    log::debug!(
        "extracted {} citation records ({} marker occurrences)",
        citations.records.len(),
        citations.encounter_order.len()
    );
    let title_page = run_front_end(&text);
    let body = replace_markers_with_supercite(&title_page.remaining_body);
    Ok(assemble_latex(&body, &citations, &title_page, metadata))
}

/// Compile a manuscript into packed `.docx` bytes.
pub fn compile_to_word(
    manuscript: &str,
    metadata: Option<&ExternalMetadata>,
) -> ConversionResult<Vec<u8>> {
    let text = prepare_manuscript(manuscript)?;
    let citations = extract_citations(&text);
    let title_page = run_front_end(&text);
    word_backend::assemble_word(&title_page.remaining_body, &citations, &title_page, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_manuscript_rejected() {
        assert!(compile_to_latex("", None).is_err());
        assert!(compile_to_latex("   \n  ", None).is_err());
        assert!(compile_to_latex("<latex></latex>", None).is_err());
    }

    #[test]
    fn test_wrapper_sentinel_stripped() {
        let wrapped = "<latex>\n# Intro\n\nBody text here.\n</latex>";
        let out = compile_to_latex(wrapped, None).expect("latex");
        assert!(out.contains("\\section{Intro}"));
        assert!(!out.contains("<latex>"));
    }
}
