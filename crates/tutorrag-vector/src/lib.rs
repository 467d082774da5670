//! tutorrag-vector
//!
//! Dense (embedding) index. With the `lance` feature a LanceDB table backs the
//! index: a flat table for small corpora, IVF_FLAT above `exact_threshold`.
//! Without it, or when LanceDB fails, an in-memory brute-force scan is used.
//! All vectors are L2-normalized and scored by inner product, so scores are
//! cosine similarities in `[-1, 1]`.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tutorrag_core::config::DenseSettings;
use tutorrag_core::types::SearchHit;

pub mod brute_force;
#[cfg(feature = "lance")]
pub mod index_build;
#[cfg(feature = "lance")]
pub mod schema;
#[cfg(feature = "lance")]
pub mod search;
#[cfg(feature = "lance")]
pub mod table;
#[cfg(feature = "lance")]
pub mod writer;

pub use brute_force::{l2_normalize, BruteForceIndex};
#[cfg(feature = "lance")]
pub use search::LanceDenseIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct DenseParams {
    pub exact_threshold: usize,
    pub max_partitions: usize,
    pub nprobes: usize,
}

impl Default for DenseParams {
    fn default() -> Self { Self::from(&DenseSettings::default()) }
}

impl From<&DenseSettings> for DenseParams {
    fn from(s: &DenseSettings) -> Self {
        Self { exact_threshold: s.exact_threshold, max_partitions: s.max_partitions.max(1), nprobes: s.nprobes.max(1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    LanceFlat,
    LanceIvfFlat,
    BruteForce,
    Empty,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::LanceFlat => "lance-flat",
            IndexKind::LanceIvfFlat => "lance-ivf-flat",
            IndexKind::BruteForce => "brute-force",
            IndexKind::Empty => "empty",
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Where a persisted dense index lives, as recorded in the corpus snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum DenseManifest {
    Lance { dir: PathBuf, rows: usize, kind: IndexKind },
    BruteForce,
    Empty,
}

pub enum DenseIndex {
    #[cfg(feature = "lance")]
    Lance(LanceDenseIndex),
    BruteForce(BruteForceIndex),
    Empty,
}

impl DenseIndex {
    /// Builds the best available backend. `vectors` must share one dimension.
    /// LanceDB writes under `cache_dir` when given, else into a private temp dir.
    pub fn build(vectors: &[Vec<f32>], cache_dir: Option<&Path>, params: &DenseParams) -> Result<Self> {
        if vectors.is_empty() { return Ok(DenseIndex::Empty); }
        let dim = vectors[0].len();
        if dim == 0 { bail!("embeddings must have at least one dimension"); }
        if let Some(pos) = vectors.iter().position(|v| v.len() != dim) {
            bail!("embedding {} has dimension {}, expected {}", pos, vectors[pos].len(), dim);
        }
        Ok(Self::build_backend(vectors, cache_dir, params))
    }

    #[cfg(feature = "lance")]
    fn build_backend(vectors: &[Vec<f32>], cache_dir: Option<&Path>, params: &DenseParams) -> Self {
        match LanceDenseIndex::build(vectors, cache_dir, params) {
            Ok(index) => DenseIndex::Lance(index),
            Err(e) => {
                tracing::warn!(error = %e, "LanceDB index build failed, using brute-force search");
                DenseIndex::BruteForce(BruteForceIndex::new(vectors))
            }
        }
    }

    #[cfg(not(feature = "lance"))]
    fn build_backend(vectors: &[Vec<f32>], _cache_dir: Option<&Path>, _params: &DenseParams) -> Self {
        static NOTICE: std::sync::Once = std::sync::Once::new();
        NOTICE.call_once(|| tracing::info!("built without the `lance` feature, dense search uses brute force"));
        DenseIndex::BruteForce(BruteForceIndex::new(vectors))
    }

    /// Reopens a persisted index. `vectors` are the corpus embeddings in order;
    /// they back the brute-force variant and size-check the LanceDB one.
    pub fn restore(manifest: &DenseManifest, vectors: &[Vec<f32>], params: &DenseParams) -> Result<Self> {
        match manifest {
            DenseManifest::Empty if vectors.is_empty() => Ok(DenseIndex::Empty),
            DenseManifest::Empty => bail!("snapshot has {} embeddings but an empty dense index", vectors.len()),
            DenseManifest::BruteForce if vectors.is_empty() => bail!("brute-force manifest without embeddings"),
            DenseManifest::BruteForce => Ok(DenseIndex::BruteForce(BruteForceIndex::new(vectors))),
            DenseManifest::Lance { dir, rows, kind } => {
                if *rows != vectors.len() {
                    bail!("dense manifest lists {} rows for {} documents", rows, vectors.len());
                }
                Self::restore_lance(dir, *rows, *kind, params)
            }
        }
    }

    #[cfg(feature = "lance")]
    fn restore_lance(dir: &Path, rows: usize, kind: IndexKind, params: &DenseParams) -> Result<Self> {
        Ok(DenseIndex::Lance(LanceDenseIndex::open(dir, rows, kind, params.nprobes)?))
    }

    #[cfg(not(feature = "lance"))]
    fn restore_lance(dir: &Path, _rows: usize, _kind: IndexKind, _params: &DenseParams) -> Result<Self> {
        bail!("snapshot references a LanceDB index at {} but this build has no `lance` feature", dir.display())
    }

    /// Top-`k` positions by cosine similarity, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 { return Ok(vec![]); }
        match self {
            #[cfg(feature = "lance")]
            DenseIndex::Lance(index) => index.search(query, k),
            DenseIndex::BruteForce(index) => index.search(query, k),
            DenseIndex::Empty => Ok(vec![]),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            #[cfg(feature = "lance")]
            DenseIndex::Lance(index) => index.kind(),
            DenseIndex::BruteForce(_) => IndexKind::BruteForce,
            DenseIndex::Empty => IndexKind::Empty,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            #[cfg(feature = "lance")]
            DenseIndex::Lance(index) => index.rows(),
            DenseIndex::BruteForce(index) => index.len(),
            DenseIndex::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// `None` when the index cannot be reopened from disk (it lives in a temp dir).
    pub fn manifest(&self) -> Option<DenseManifest> {
        match self {
            #[cfg(feature = "lance")]
            DenseIndex::Lance(index) if index.is_persistent() => {
                Some(DenseManifest::Lance { dir: index.dir().to_path_buf(), rows: index.rows(), kind: index.kind() })
            }
            #[cfg(feature = "lance")]
            DenseIndex::Lance(_) => None,
            DenseIndex::BruteForce(_) => Some(DenseManifest::BruteForce),
            DenseIndex::Empty => Some(DenseManifest::Empty),
        }
    }
}
