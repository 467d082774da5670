//! Domain types shared by the chunker, the index backends and the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub type DocId = String;
pub type Meta = BTreeMap<String, serde_json::Value>;

const ID_PREFIX_CHARS: usize = 50;

/// A retrievable chunk of a source document.
///
/// - `id`: unique within a corpus snapshot; derived from content when not supplied
/// - `source`: path or identifier of the originating file
/// - `page`: 1-based page for paginated sources
/// - `chunk_index`: 0-based position within `source`
/// - `metadata`: open bag used only by filters
/// - `embedding`: assigned once during ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: Meta,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Builds a document whose id is derived from its position and content.
    pub fn new(text: impl Into<String>, source: impl Into<String>, page: Option<u32>, chunk_index: usize) -> Self {
        let text = text.into();
        let source = source.into();
        let id = derive_id(&source, page, chunk_index, &text);
        Self { id, text, source, page, chunk_index, metadata: Meta::new(), embedding: None }
    }

    /// Builds a document with a caller-supplied id. An empty id falls back to the derived one.
    pub fn with_id(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>, page: Option<u32>, chunk_index: usize) -> Self {
        let mut doc = Self::new(text, source, page, chunk_index);
        let id = id.into();
        if !id.is_empty() {
            doc.id = id;
        }
        doc
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `[stem, p. N]` when the page is known, `[stem]` otherwise.
    pub fn citation(&self) -> String {
        let stem = source_stem(&self.source);
        match self.page {
            Some(page) => format!("[{stem}, p. {page}]"),
            None => format!("[{stem}]"),
        }
    }

    pub fn source_name(&self) -> String {
        Path::new(&self.source)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.clone())
    }
}

/// Stable content id: blake3 over `source_page_chunkindex_prefix`.
pub fn derive_id(source: &str, page: Option<u32>, chunk_index: usize, text: &str) -> DocId {
    let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();
    let page = page.map_or_else(|| "None".to_string(), |p| p.to_string());
    let key = format!("{source}_{page}_{chunk_index}_{prefix}");
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

fn source_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string())
}

/// Indicates which engine produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by both index backends.
///
/// `position` is the document's ordinal in the corpus. `score` is
/// engine-specific but higher is always better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub position: usize,
    pub score: f32,
    pub source: SourceKind,
}

/// A document paired with the score of whichever stage produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub document: Document,
    pub score: f32,
}

impl RetrievalResult {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}
