use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tutorrag_core::config::{RagSettings, RetrievalSettings};
use tutorrag_core::error::{Error, ModelStage, Result};
use tutorrag_core::traits::{CrossEncoder, Embedder};
use tutorrag_core::types::{Document, RetrievalResult};
use tutorrag_vector::{DenseIndex, DenseParams};

use crate::citation::{assemble, RetrievedContext};
use crate::filter::RetrievalFilters;
use crate::fusion::{fuse, validate_alpha};
use crate::persist::{self, CacheSnapshot};
use crate::rerank::rerank;
use crate::sparse::SparseIndex;
use crate::stats::CorpusStatistics;

/// Candidates fetched from each path per requested result.
const FETCH_FACTOR: usize = 3;
/// Candidates kept after fusion per requested result.
const FUSED_FACTOR: usize = 2;

#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    /// Snapshot directory; `None` keeps everything in memory.
    pub cache_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub parallel_embedding: bool,
    pub sparse_enabled: bool,
    pub dense: DenseParams,
    pub include_scores: bool,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self::from_settings(&RagSettings::default(), None)
    }
}

impl RetrieverOptions {
    pub fn from_settings(settings: &RagSettings, cache_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            batch_size: settings.embedding.batch_size.max(1),
            parallel_embedding: settings.embedding.parallel,
            sparse_enabled: settings.sparse.enabled,
            dense: DenseParams::from(&settings.dense),
            include_scores: settings.retrieval.include_scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOptions {
    pub k: usize,
    pub use_reranking: bool,
    /// Weight of the dense signal; `1 - alpha` goes to the sparse one.
    pub alpha: f32,
    pub filters: Option<RetrievalFilters>,
}

impl Default for RetrieveOptions {
    fn default() -> Self { Self::from(&RetrievalSettings::default()) }
}

impl From<&RetrievalSettings> for RetrieveOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self { k: s.k, use_reranking: s.use_reranking, alpha: s.alpha, filters: None }
    }
}

impl RetrieveOptions {
    pub fn with_k(mut self, k: usize) -> Self { self.k = k; self }
    pub fn with_alpha(mut self, alpha: f32) -> Self { self.alpha = alpha; self }
    pub fn with_reranking(mut self, use_reranking: bool) -> Self { self.use_reranking = use_reranking; self }
    pub fn with_filters(mut self, filters: RetrievalFilters) -> Self { self.filters = Some(filters); self }
}

/// One immutable generation of the corpus and both indices.
pub struct CorpusSnapshot {
    pub documents: Vec<Document>,
    pub sparse: SparseIndex,
    pub dense: DenseIndex,
}

impl CorpusSnapshot {
    pub fn empty() -> Self {
        Self { documents: Vec::new(), sparse: SparseIndex::Disabled, dense: DenseIndex::Empty }
    }
}

/// Hybrid sparse + dense retriever with optional cross-encoder reranking.
///
/// Queries read a shared snapshot; `ingest` and `load_cache` build a new one
/// off to the side and swap it in under the write lock.
pub struct HybridRetriever {
    embedder: Box<dyn Embedder>,
    reranker: Option<Box<dyn CrossEncoder>>,
    options: RetrieverOptions,
    corpus: RwLock<Arc<CorpusSnapshot>>,
}

impl HybridRetriever {
    pub fn new(embedder: Box<dyn Embedder>, reranker: Option<Box<dyn CrossEncoder>>, options: RetrieverOptions) -> Self {
        Self { embedder, reranker, options, corpus: RwLock::new(Arc::new(CorpusSnapshot::empty())) }
    }

    pub fn options(&self) -> &RetrieverOptions { &self.options }

    pub fn has_reranker(&self) -> bool { self.reranker.is_some() }

    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        match self.corpus.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap(&self, snapshot: CorpusSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.corpus.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Replaces the whole corpus. Duplicate ids keep their first occurrence;
    /// documents without embeddings are embedded in batches.
    pub fn ingest(&self, documents: Vec<Document>) -> Result<()> {
        let start = Instant::now();
        let mut documents = dedup_by_id(documents);
        self.embed_missing(&mut documents)?;
        let vectors: Vec<Vec<f32>> = documents.iter().filter_map(|d| d.embedding.clone()).collect();
        if let Some(first) = vectors.first() {
            if let Some(bad) = documents.iter().find(|d| d.embedding.as_ref().map(Vec::len) != Some(first.len())) {
                return Err(Error::InvalidArgument(format!("document {} embedding dimension differs from {}", bad.id, first.len())));
            }
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let sparse = SparseIndex::build(&texts, self.options.sparse_enabled);
        let dense = DenseIndex::build(&vectors, self.options.cache_dir.as_deref(), &self.options.dense).map_err(Error::index)?;
        tracing::info!(
            documents = documents.len(),
            dense = %dense.kind(),
            sparse = sparse.is_available(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "corpus indexed"
        );

        let snapshot = CorpusSnapshot { documents, sparse, dense };
        self.persist(&snapshot);
        self.swap(snapshot);
        Ok(())
    }

    fn embed_missing(&self, documents: &mut [Document]) -> Result<()> {
        let missing: Vec<usize> = (0..documents.len()).filter(|&i| documents[i].embedding.is_none()).collect();
        if missing.is_empty() { return Ok(()); }
        let texts: Vec<String> = missing.iter().map(|&i| documents[i].text.clone()).collect();
        let embed = |batch: &[String]| -> Result<Vec<Vec<f32>>> {
            let vectors = self.embedder.embed_batch(batch).map_err(|e| Error::model(ModelStage::Embedding, e))?;
            if vectors.len() != batch.len() {
                return Err(Error::ModelInvocation {
                    stage: ModelStage::Embedding,
                    source: format!("embedder returned {} vectors for {} texts", vectors.len(), batch.len()).into(),
                });
            }
            Ok(vectors)
        };
        let batches: Vec<Result<Vec<Vec<f32>>>> = if self.options.parallel_embedding {
            texts.par_chunks(self.options.batch_size).map(embed).collect()
        } else {
            texts.chunks(self.options.batch_size).map(embed).collect()
        };
        let mut positions = missing.into_iter();
        for batch in batches {
            for vector in batch? {
                if let Some(i) = positions.next() { documents[i].embedding = Some(vector); }
            }
        }
        tracing::debug!(embedded = texts.len(), "embedded documents");
        Ok(())
    }

    /// Writes the snapshot for `snapshot`, or removes the previous one when the
    /// new corpus cannot be written, so a restart never loads a replaced corpus.
    fn persist(&self, snapshot: &CorpusSnapshot) {
        let Some(cache_dir) = &self.options.cache_dir else { return };
        let saved = match snapshot.dense.manifest() {
            Some(manifest) => {
                let cache = CacheSnapshot::new(snapshot.documents.clone(), snapshot.sparse.tokenized(), manifest);
                persist::save(cache_dir, &cache).map(|_| ()).map_err(|e| {
                    tracing::warn!(error = %e, "could not save corpus snapshot, serving in-memory corpus");
                })
            }
            None => {
                tracing::warn!("dense index is not persistent, snapshot not written");
                Err(())
            }
        };
        if saved.is_err() {
            if let Err(e) = persist::remove(cache_dir) {
                tracing::warn!(error = %e, "could not remove stale corpus snapshot");
            }
        }
    }

    /// Restores the last snapshot. `Ok(false)` when there is none to load.
    pub fn load_cache(&self) -> Result<bool> {
        let Some(cache_dir) = &self.options.cache_dir else { return Ok(false) };
        let Some(cache) = persist::load(cache_dir)? else { return Ok(false) };
        let path = persist::cache_path(cache_dir);
        let vectors = persist::embeddings(&cache, &path)?;
        persist::check_dense_backend(&cache.dense, &path)?;
        let dense = DenseIndex::restore(&cache.dense, &vectors, &self.options.dense)
            .map_err(|e| Error::malformed_cache(&path, format!("{e:#}")))?;
        let sparse = match cache.sparse {
            Some(tokenized) if self.options.sparse_enabled => {
                SparseIndex::from_tokenized(tokenized).map_err(|e| Error::malformed_cache(&path, format!("{e:#}")))?
            }
            Some(_) => SparseIndex::Disabled,
            None if self.options.sparse_enabled && cfg!(feature = "sparse") && !cache.documents.is_empty() => {
                return Err(Error::malformed_cache(&path, "snapshot has no sparse index"));
            }
            None => SparseIndex::Disabled,
        };
        tracing::info!(documents = cache.documents.len(), saved_at = %cache.timestamp, dense = %dense.kind(), "loaded corpus snapshot");
        self.swap(CorpusSnapshot { documents: cache.documents, sparse, dense });
        Ok(true)
    }

    /// Fused, filtered and (optionally) reranked results, best first.
    pub fn search(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<RetrievalResult>> {
        validate_alpha(options.alpha)?;
        let k = options.k;
        let snapshot = self.snapshot();
        if k == 0 || snapshot.documents.is_empty() { return Ok(vec![]); }

        let candidates = self.fused_candidates(&snapshot, query, k, options.alpha)?;
        let candidates = match &options.filters {
            Some(filters) => filters.apply(candidates),
            None => candidates,
        };
        if candidates.is_empty() { return Ok(vec![]); }

        match (&self.reranker, options.use_reranking) {
            (Some(reranker), true) => rerank(reranker.as_ref(), query, candidates, k),
            _ => Ok(candidates.into_iter().take(k).collect()),
        }
    }

    fn fused_candidates(&self, snapshot: &CorpusSnapshot, query: &str, k: usize, alpha: f32) -> Result<Vec<RetrievalResult>> {
        let total = snapshot.documents.len();
        let fetch = k.saturating_mul(FETCH_FACTOR).min(total);
        let sparse_hits = if alpha < 1.0 { snapshot.sparse.search(query, fetch)? } else { Vec::new() };
        let dense_hits = if alpha > 0.0 {
            let query_vector = self.embed_query(query)?;
            snapshot.dense.search(&query_vector, fetch).map_err(Error::index)?
        } else {
            Vec::new()
        };
        tracing::debug!(sparse = sparse_hits.len(), dense = dense_hits.len(), alpha, "candidate hits");
        Ok(fuse(&sparse_hits, &dense_hits, alpha, k.saturating_mul(FUSED_FACTOR).min(total))
            .into_iter()
            .filter_map(|(position, score)| snapshot.documents.get(position).map(|d| RetrievalResult::new(d.clone(), score)))
            .collect())
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embedder.embed_batch(&[query.to_string()]).map_err(|e| Error::model(ModelStage::Embedding, e))?;
        match vectors.pop() {
            Some(v) if vectors.is_empty() => Ok(v),
            _ => Err(Error::ModelInvocation { stage: ModelStage::Embedding, source: "expected exactly one query embedding".into() }),
        }
    }

    /// Context string, citations and the documents behind them.
    pub fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<RetrievedContext> {
        let results = self.search(query, options)?;
        let context = assemble(results, self.options.include_scores);
        tracing::info!(query, results = context.documents.len(), citations = context.citations.len(), "retrieved context");
        Ok(context)
    }

    pub fn statistics(&self) -> CorpusStatistics {
        let snapshot = self.snapshot();
        CorpusStatistics::collect(&snapshot.documents, snapshot.dense.kind().as_str(), snapshot.sparse.is_available(), self.has_reranker())
    }
}

fn dedup_by_id(documents: Vec<Document>) -> Vec<Document> {
    let total = documents.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<Document> = documents.into_iter().filter(|d| seen.insert(d.id.clone())).collect();
    if unique.len() < total {
        tracing::warn!(dropped = total - unique.len(), "dropped documents with duplicate ids");
    }
    unique
}
