//! Static data tables
//!
//! Symbol maps shared by the bibliography sanitizer and the grammar
//! normalizer.

pub mod symbols;
