use tutorrag_core::types::{SearchHit, SourceKind};

/// Exact inner-product scan over normalized vectors.
#[derive(Debug, Clone, Default)]
pub struct BruteForceIndex {
    vectors: Vec<Vec<f32>>,
}

impl BruteForceIndex {
    pub fn new(vectors: &[Vec<f32>]) -> Self {
        Self { vectors: vectors.iter().map(|v| l2_normalize(v)).collect() }
    }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    pub fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
        if let Some(first) = self.vectors.first() {
            if first.len() != query.len() {
                anyhow::bail!("query has dimension {}, index has {}", query.len(), first.len());
            }
        }
        let q = l2_normalize(query);
        let mut scored: Vec<(usize, f32)> = self.vectors.iter().map(|v| dot(v, &q)).enumerate().collect();
        // stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(position, score)| SearchHit { position, score, source: SourceKind::Vector }).collect())
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// Unit-length copy of `v`; a zero vector stays zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON { return v.to_vec(); }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_are_cosine_and_sorted() {
        let index = BruteForceIndex::new(&[vec![1.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]]);
        let hits = index.search(&[3.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn ties_keep_corpus_order_and_k_truncates() {
        let index = BruteForceIndex::new(&[vec![1.0, 0.0], vec![2.0, 0.0], vec![0.0, 1.0]]);
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.position).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let index = BruteForceIndex::new(&[vec![1.0, 0.0]]);
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }
}
