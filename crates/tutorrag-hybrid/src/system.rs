use std::path::PathBuf;

use tutorrag_core::config::{expand_path, RagSettings};
use tutorrag_core::data_processor::DataProcessor;
use tutorrag_core::error::{Error, ModelStage, Result};
use tutorrag_core::traits::{CrossEncoder, Embedder};
use tutorrag_embed::{get_default_embedder, get_default_reranker};

use crate::citation::RetrievedContext;
use crate::engine::{HybridRetriever, RetrieveOptions, RetrieverOptions};
use crate::stats::CorpusStatistics;

/// Chunker plus retriever, bootstrapped from settings.
pub struct RagSystem {
    settings: RagSettings,
    processor: DataProcessor,
    retriever: HybridRetriever,
    docs_dir: PathBuf,
}

impl RagSystem {
    /// Loads the models named in `settings`, then the cached corpus, or
    /// chunks and ingests `paths.docs_dir` when no usable cache exists.
    pub fn open(settings: RagSettings) -> Result<Self> {
        settings.validate()?;
        let embedder = get_default_embedder(&settings.embedding).map_err(|e| Error::model(ModelStage::Embedding, e))?;
        let reranker = match get_default_reranker(&settings.reranker, settings.embedding.use_fake) {
            Ok(reranker) => reranker,
            Err(e) => {
                tracing::warn!(error = %e, "reranker unavailable, continuing without reranking");
                None
            }
        };
        Self::open_with(settings, embedder, reranker)
    }

    /// Same bootstrap with caller-supplied models.
    pub fn open_with(settings: RagSettings, embedder: Box<dyn Embedder>, reranker: Option<Box<dyn CrossEncoder>>) -> Result<Self> {
        settings.validate()?;
        let docs_dir = expand_path(&settings.paths.docs_dir);
        let cache_dir = expand_path(&settings.paths.cache_dir);
        let retriever = HybridRetriever::new(embedder, reranker, RetrieverOptions::from_settings(&settings, Some(cache_dir)));
        let processor = DataProcessor::with_config(settings.chunking.clone());
        let system = Self { settings, processor, retriever, docs_dir };
        match system.retriever.load_cache() {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(docs = %system.docs_dir.display(), "no corpus snapshot, ingesting sources");
                system.reindex()?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "corpus snapshot unusable, re-ingesting sources");
                system.reindex()?;
            }
        }
        Ok(system)
    }

    /// Re-chunks the docs directory and replaces the corpus. Returns the chunk count.
    pub fn reindex(&self) -> Result<usize> {
        let documents = self.processor.process_directory(&self.docs_dir).map_err(|e| match e.downcast::<std::io::Error>() {
            Ok(io) => Error::Io(io),
            Err(other) => Error::InvalidArgument(format!("{other:#}")),
        })?;
        let count = documents.len();
        self.retriever.ingest(documents)?;
        Ok(count)
    }

    /// Retrieval with the configured defaults.
    pub fn default_options(&self) -> RetrieveOptions { RetrieveOptions::from(&self.settings.retrieval) }

    pub fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<RetrievedContext> {
        self.retriever.retrieve(query, options)
    }

    pub fn statistics(&self) -> CorpusStatistics { self.retriever.statistics() }

    pub fn retriever(&self) -> &HybridRetriever { &self.retriever }

    pub fn settings(&self) -> &RagSettings { &self.settings }

    pub fn docs_dir(&self) -> &std::path::Path { &self.docs_dir }
}
