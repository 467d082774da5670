//! tutorrag-text
//!
//! Tantivy-backed sparse index. Documents are tokenized by lowercasing and
//! splitting on whitespace, fed to tantivy as pre-tokenized text and scored
//! with BM25. The index lives in RAM; the tokenized corpus is what callers
//! persist and rebuild from.
pub mod index;
pub mod schema;

pub use index::TantivySparseIndex;
pub use schema::tokenize;
