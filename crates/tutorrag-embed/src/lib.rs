//! tutorrag-embed
//!
//! Candle-backed sentence embedder and cross-encoder, plus deterministic fakes
//! selected with `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) for tests
//! and offline development.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use tutorrag_core::config::{expand_path, EmbeddingSettings, RerankerSettings};
use tutorrag_core::traits::{CrossEncoder, Embedder};

pub mod bert;
pub mod device;
pub mod pool;
pub mod tokenize;

pub use bert::{BertCrossEncoder, BertEmbedder};
pub use pool::masked_mean_l2;

pub const FAKE_EMBEDDING_DIM: usize = 384;
const DEFAULT_EMBEDDING_MODEL: &str = "models/all-MiniLM-L6-v2";
const DEFAULT_RERANK_MODEL: &str = "models/ms-marco-MiniLM-L-6-v2";

/// Hash-based bag-of-words embedder. Tokens are lowercased and stripped of
/// surrounding punctuation, so texts sharing words point in similar directions.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in normalized_tokens(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Token-overlap reranker: share of query tokens found in the text, mapped onto `[-1, 1]`.
#[derive(Debug, Default)]
pub struct FakeCrossEncoder;

impl CrossEncoder for FakeCrossEncoder {
    fn score_pairs(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let query_tokens: Vec<String> = normalized_tokens(query).collect();
        Ok(texts
            .iter()
            .map(|text| {
                if query_tokens.is_empty() { return -1.0; }
                let text_tokens: std::collections::HashSet<String> = normalized_tokens(text).collect();
                let hits = query_tokens.iter().filter(|t| text_tokens.contains(*t)).count();
                2.0 * hits as f32 / query_tokens.len() as f32 - 1.0
            })
            .collect())
    }
}

fn normalized_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
}

fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.use_fake || fake_requested() {
        tracing::info!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(FAKE_EMBEDDING_DIM)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref(), &["APP_MODEL_DIR", "MODEL_DIR"], DEFAULT_EMBEDDING_MODEL)?;
    Ok(Box::new(BertEmbedder::load(&dir, settings.max_len)?))
}

/// `Ok(None)` when reranking is switched off in settings.
pub fn get_default_reranker(settings: &RerankerSettings, use_fake: bool) -> Result<Option<Box<dyn CrossEncoder>>> {
    if !settings.enabled { return Ok(None); }
    if use_fake || fake_requested() {
        tracing::info!("using FakeCrossEncoder");
        return Ok(Some(Box::new(FakeCrossEncoder)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref(), &["APP_RERANKER_DIR"], DEFAULT_RERANK_MODEL)?;
    Ok(Some(Box::new(BertCrossEncoder::load(&dir, settings.max_len)?)))
}

fn resolve_model_dir(configured: Option<&str>, env_vars: &[&str], fallback: &str) -> Result<PathBuf> {
    if let Some(dir) = configured { let p = expand_path(dir); if p.exists() { return Ok(p); } tracing::warn!(dir = %p.display(), "configured model dir does not exist"); }
    for var in env_vars {
        if let Ok(dir) = std::env::var(var) { let p = expand_path(&dir); if p.exists() { tracing::info!(var = *var, dir = %p.display(), "using model dir from env"); return Ok(p); } }
    }
    let p = PathBuf::from(fallback); if p.exists() { return Ok(p); }
    Err(anyhow!("Could not locate model directory (tried settings, {:?}, {})", env_vars, fallback))
}
