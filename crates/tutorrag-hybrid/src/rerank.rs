//! Second-stage cross-encoder rescoring.
use tutorrag_core::error::{Error, ModelStage, Result};
use tutorrag_core::traits::CrossEncoder;
use tutorrag_core::types::RetrievalResult;

pub const RETRIEVAL_WEIGHT: f32 = 0.3;
pub const RERANK_WEIGHT: f32 = 0.7;

/// Maps a score in `[-1, 1]` onto `[0, 1]`. Values outside pass through linearly.
fn unit(x: f32) -> f32 { (x + 1.0) / 2.0 }

pub fn blend(retrieval: f32, rerank: f32) -> f32 {
    RETRIEVAL_WEIGHT * unit(retrieval) + RERANK_WEIGHT * unit(rerank)
}

/// Rescores every candidate, re-sorts by the blended score and keeps `k`.
pub fn rerank(reranker: &dyn CrossEncoder, query: &str, candidates: Vec<RetrievalResult>, k: usize) -> Result<Vec<RetrievalResult>> {
    if candidates.is_empty() || k == 0 { return Ok(vec![]); }
    let texts: Vec<&str> = candidates.iter().map(|r| r.document.text.as_str()).collect();
    let scores = reranker.score_pairs(query, &texts).map_err(|e| Error::model(ModelStage::Reranking, e))?;
    if scores.len() != candidates.len() {
        return Err(Error::ModelInvocation {
            stage: ModelStage::Reranking,
            source: format!("reranker returned {} scores for {} candidates", scores.len(), candidates.len()).into(),
        });
    }
    let mut reranked: Vec<RetrievalResult> = candidates
        .into_iter()
        .zip(scores)
        .map(|(r, score)| RetrievalResult::new(r.document, blend(r.score, score)))
        .collect();
    reranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    reranked.truncate(k);
    Ok(reranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorrag_core::types::Document;

    struct Fixed(Vec<f32>);

    impl CrossEncoder for Fixed {
        fn score_pairs(&self, _query: &str, _texts: &[&str]) -> anyhow::Result<Vec<f32>> { Ok(self.0.clone()) }
    }

    fn candidates(n: usize) -> Vec<RetrievalResult> {
        (0..n).map(|i| RetrievalResult::new(Document::new(format!("doc {i}"), "a.txt", None, i), 0.5)).collect()
    }

    #[test]
    fn blend_weights_and_no_clamping() {
        assert!((blend(1.0, 1.0) - 1.0).abs() < 1e-6);
        assert!((blend(-1.0, -1.0)).abs() < 1e-6);
        assert!((blend(0.0, 1.0) - 0.85).abs() < 1e-6);
        assert!(blend(0.0, 3.0) > 1.0);
    }

    #[test]
    fn reorders_by_reranker_and_truncates() {
        let out = rerank(&Fixed(vec![-0.5, 0.9, 0.1, 0.4]), "q", candidates(4), 2).expect("rerank");
        let order: Vec<usize> = out.iter().map(|r| r.document.chunk_index).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn wrong_score_count_is_model_failure() {
        let err = rerank(&Fixed(vec![0.1]), "q", candidates(3), 2).expect_err("mismatch");
        assert!(matches!(err, Error::ModelInvocation { stage: ModelStage::Reranking, .. }));
    }
}
