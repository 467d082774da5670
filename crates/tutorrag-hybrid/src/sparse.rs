use tutorrag_core::error::{Error, Result};
use tutorrag_core::types::SearchHit;

/// Lexical capability. `Disabled` answers every query with no hits.
pub enum SparseIndex {
    #[cfg(feature = "sparse")]
    Tantivy(tutorrag_text::TantivySparseIndex),
    Disabled,
}

impl SparseIndex {
    /// Builds over `texts` in corpus order. Build failures downgrade to `Disabled`.
    pub fn build<S: AsRef<str>>(texts: &[S], enabled: bool) -> Self {
        if !enabled || texts.is_empty() { return SparseIndex::Disabled; }
        Self::build_backend(texts)
    }

    #[cfg(feature = "sparse")]
    fn build_backend<S: AsRef<str>>(texts: &[S]) -> Self {
        match tutorrag_text::TantivySparseIndex::from_texts(texts) {
            Ok(index) => SparseIndex::Tantivy(index),
            Err(e) => {
                tracing::warn!(error = %e, "sparse index build failed, lexical search disabled");
                SparseIndex::Disabled
            }
        }
    }

    #[cfg(not(feature = "sparse"))]
    fn build_backend<S: AsRef<str>>(_texts: &[S]) -> Self {
        static NOTICE: std::sync::Once = std::sync::Once::new();
        NOTICE.call_once(|| tracing::info!("built without the `sparse` feature, lexical search disabled"));
        SparseIndex::Disabled
    }

    /// Rebuilds from a snapshotted tokenized corpus.
    #[cfg(feature = "sparse")]
    pub fn from_tokenized(tokenized: Vec<Vec<String>>) -> anyhow::Result<Self> {
        Ok(SparseIndex::Tantivy(tutorrag_text::TantivySparseIndex::build(tokenized)?))
    }

    #[cfg(not(feature = "sparse"))]
    pub fn from_tokenized(_tokenized: Vec<Vec<String>>) -> anyhow::Result<Self> {
        anyhow::bail!("snapshot carries a sparse index but this build has no `sparse` feature")
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        match self {
            #[cfg(feature = "sparse")]
            SparseIndex::Tantivy(index) => index.search(query, k).map_err(Error::index),
            SparseIndex::Disabled => Ok(vec![]),
        }
    }

    pub fn is_available(&self) -> bool { !matches!(self, SparseIndex::Disabled) }

    /// What gets persisted; `None` when disabled.
    pub fn tokenized(&self) -> Option<Vec<Vec<String>>> {
        match self {
            #[cfg(feature = "sparse")]
            SparseIndex::Tantivy(index) => Some(index.tokenized().to_vec()),
            SparseIndex::Disabled => None,
        }
    }
}
