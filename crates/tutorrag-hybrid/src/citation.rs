use serde::Serialize;
use std::collections::HashSet;

use tutorrag_core::types::{Document, RetrievalResult};

const SEPARATOR: &str = "\n\n---\n\n";

/// What `retrieve` hands to the prompt builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub context: String,
    pub citations: Vec<String>,
    pub documents: Vec<Document>,
    pub scores: Vec<f32>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
}

pub fn assemble(results: Vec<RetrievalResult>, include_scores: bool) -> RetrievedContext {
    let mut parts = Vec::with_capacity(results.len());
    let mut citations = Vec::new();
    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(results.len());
    let mut scores = Vec::with_capacity(results.len());
    for RetrievalResult { document, score } in results {
        if include_scores {
            parts.push(format!("[Relevance: {score:.2}]\n{}", document.text));
        } else {
            parts.push(document.text.clone());
        }
        let citation = document.citation();
        if seen.insert(citation.clone()) { citations.push(citation); }
        documents.push(document);
        scores.push(score);
    }
    RetrievedContext { context: parts.join(SEPARATOR), citations, documents, scores }
}
