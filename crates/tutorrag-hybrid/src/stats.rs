use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use tutorrag_core::types::Document;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStatistics {
    pub total_documents: usize,
    pub total_sources: usize,
    /// Dense backend in use, e.g. `lance-flat` or `brute-force`.
    pub index_type: String,
    pub has_sparse_index: bool,
    pub has_reranker: bool,
    /// Chunk count per source file name.
    pub source_breakdown: BTreeMap<String, usize>,
}

impl CorpusStatistics {
    pub fn collect(documents: &[Document], index_type: impl Into<String>, has_sparse_index: bool, has_reranker: bool) -> Self {
        let sources: BTreeSet<&str> = documents.iter().map(|d| d.source.as_str()).collect();
        let mut source_breakdown = BTreeMap::new();
        for doc in documents {
            *source_breakdown.entry(doc.source_name()).or_insert(0) += 1;
        }
        Self {
            total_documents: documents.len(),
            total_sources: sources.len(),
            index_type: index_type.into(),
            has_sparse_index,
            has_reranker,
            source_breakdown,
        }
    }
}
