//! Model capabilities consumed by the retrieval engine.

/// Maps text to fixed-length vectors. Must be deterministic for identical input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Pairwise relevance model. Returns one score per text, aligned to `texts`.
pub trait CrossEncoder: Send + Sync {
    fn score_pairs(&self, query: &str, texts: &[&str]) -> anyhow::Result<Vec<f32>>;
}
