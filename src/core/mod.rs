//! Manuscript conversion core: shared front-end passes and the two
//! backends.

pub mod citations;
pub mod grammar;
pub mod latex_backend;
pub mod structure;
pub(crate) mod text;
pub mod word_backend;

use serde::{Deserialize, Serialize};

/// Caller-supplied document metadata, used field-by-field only when the
/// corresponding inline title-page element is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalMetadata {
    pub title: Option<String>,
    pub authors: Vec<AuthorMetadata>,
    pub affiliations: Vec<String>,
    pub correspondence: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorMetadata {
    pub name: String,
    /// One-based indices into `ExternalMetadata::affiliations`
    pub affiliation_indices: Vec<usize>,
}
