//! Weighted blend of the sparse and dense result lists.
use std::collections::HashMap;

use tutorrag_core::error::{Error, Result};
use tutorrag_core::types::SearchHit;

pub fn validate_alpha(alpha: f32) -> Result<()> {
    if alpha.is_nan() || !(0.0..=1.0).contains(&alpha) {
        return Err(Error::InvalidArgument(format!("alpha must be within [0, 1], got {alpha}")));
    }
    Ok(())
}

/// `(1 - alpha) * sparse + alpha * dense` per corpus position. A position seen
/// by one path only gets that path's term. Sorted descending and truncated to
/// `limit`; ties keep first-seen order, sparse hits before dense-only ones.
pub fn fuse(sparse: &[SearchHit], dense: &[SearchHit], alpha: f32, limit: usize) -> Vec<(usize, f32)> {
    let mut order: Vec<usize> = Vec::with_capacity(sparse.len() + dense.len());
    let mut combined: HashMap<usize, f32> = HashMap::with_capacity(sparse.len() + dense.len());
    for hit in sparse {
        if !combined.contains_key(&hit.position) { order.push(hit.position); }
        *combined.entry(hit.position).or_insert(0.0) += (1.0 - alpha) * hit.score;
    }
    for hit in dense {
        if !combined.contains_key(&hit.position) { order.push(hit.position); }
        *combined.entry(hit.position).or_insert(0.0) += alpha * hit.score;
    }
    let mut fused: Vec<(usize, f32)> = order.into_iter().map(|p| (p, combined[&p])).collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused.truncate(limit);
    fused
}
