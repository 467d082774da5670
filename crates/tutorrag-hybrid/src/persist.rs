//! On-disk corpus snapshot: `rag_cache.json` next to the dense index generations.
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tutorrag_core::error::{Error, Result};
use tutorrag_core::types::Document;
use tutorrag_vector::DenseManifest;

pub const CACHE_FILE: &str = "rag_cache.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub format_version: u32,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub documents: Vec<Document>,
    pub sparse: Option<Vec<Vec<String>>>,
    pub dense: DenseManifest,
}

impl CacheSnapshot {
    pub fn new(documents: Vec<Document>, sparse: Option<Vec<Vec<String>>>, dense: DenseManifest) -> Self {
        Self { format_version: FORMAT_VERSION, timestamp: chrono::Utc::now().to_rfc3339(), documents, sparse, dense }
    }
}

pub fn cache_path(cache_dir: &Path) -> PathBuf { cache_dir.join(CACHE_FILE) }

/// Writes through a temp file in `cache_dir` and renames it into place.
pub fn save(cache_dir: &Path, snapshot: &CacheSnapshot) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir)?;
    let path = cache_path(cache_dir);
    let mut tmp = tempfile::NamedTempFile::new_in(cache_dir)?;
    serde_json::to_writer(&mut tmp, snapshot).map_err(|e| Error::Io(e.into()))?;
    tmp.flush()?;
    tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
    tracing::info!(path = %path.display(), documents = snapshot.documents.len(), "saved corpus snapshot");
    Ok(path)
}

/// Deletes the snapshot if one exists.
pub fn remove(cache_dir: &Path) -> Result<()> {
    let path = cache_path(cache_dir);
    match fs::remove_file(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed stale corpus snapshot");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// `Ok(None)` when no snapshot exists. Anything unreadable is `MalformedCache`.
pub fn load(cache_dir: &Path) -> Result<Option<CacheSnapshot>> {
    let path = cache_path(cache_dir);
    if !path.exists() { return Ok(None); }
    let raw = fs::read(&path).map_err(|e| Error::malformed_cache(&path, e.to_string()))?;
    let snapshot: CacheSnapshot = serde_json::from_slice(&raw).map_err(|e| Error::malformed_cache(&path, e.to_string()))?;
    if snapshot.format_version != FORMAT_VERSION {
        return Err(Error::malformed_cache(&path, format!("format version {} (expected {})", snapshot.format_version, FORMAT_VERSION)));
    }
    chrono::DateTime::parse_from_rfc3339(&snapshot.timestamp)
        .map_err(|e| Error::malformed_cache(&path, format!("bad timestamp: {e}")))?;
    if let Some(tokenized) = &snapshot.sparse {
        if tokenized.len() != snapshot.documents.len() {
            return Err(Error::malformed_cache(&path, format!("sparse corpus has {} entries for {} documents", tokenized.len(), snapshot.documents.len())));
        }
    }
    Ok(Some(snapshot))
}

/// The manifest must name the dense backend this build would produce.
#[cfg(feature = "lance")]
pub fn check_dense_backend(manifest: &DenseManifest, path: &Path) -> Result<()> {
    match manifest {
        DenseManifest::BruteForce => Err(Error::malformed_cache(path, "snapshot holds a brute-force dense index, expected LanceDB")),
        _ => Ok(()),
    }
}

#[cfg(not(feature = "lance"))]
pub fn check_dense_backend(manifest: &DenseManifest, path: &Path) -> Result<()> {
    match manifest {
        DenseManifest::Lance { .. } => Err(Error::malformed_cache(path, "snapshot holds a LanceDB index, built without `lance`")),
        _ => Ok(()),
    }
}

/// All documents must carry embeddings of one dimension.
pub fn embeddings(snapshot: &CacheSnapshot, path: &Path) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(snapshot.documents.len());
    for doc in &snapshot.documents {
        let embedding = doc.embedding.as_ref().ok_or_else(|| Error::malformed_cache(path, format!("document {} has no embedding", doc.id)))?;
        if let Some(first) = vectors.first().map(|v: &Vec<f32>| v.len()) {
            if embedding.len() != first {
                return Err(Error::malformed_cache(path, format!("document {} has dimension {}, expected {}", doc.id, embedding.len(), first)));
            }
        }
        vectors.push(embedding.clone());
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> CacheSnapshot {
        let mut doc = Document::new("Cats are mammals.", "a.txt", None, 0);
        doc.embedding = Some(vec![0.6, 0.8]);
        CacheSnapshot::new(vec![doc], Some(vec![vec!["cats".into(), "are".into(), "mammals.".into()]]), DenseManifest::BruteForce)
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &snapshot()).unwrap();
        let loaded = load(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded.documents[0].id, snapshot().documents[0].id);
        assert_eq!(loaded.dense, DenseManifest::BruteForce);
        assert_eq!(embeddings(&loaded, tmp.path()).unwrap(), vec![vec![0.6, 0.8]]);
        // No temp files left behind.
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_snapshot_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn garbage_and_wrong_version_are_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(cache_path(tmp.path()), b"{ not json").unwrap();
        assert!(matches!(load(tmp.path()), Err(Error::MalformedCache { .. })));

        let mut old = snapshot();
        old.format_version = 0;
        fs::write(cache_path(tmp.path()), serde_json::to_vec(&old).unwrap()).unwrap();
        assert!(matches!(load(tmp.path()), Err(Error::MalformedCache { .. })));
    }

    #[test]
    fn remove_deletes_snapshot_and_tolerates_absence() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &snapshot()).unwrap();
        remove(tmp.path()).unwrap();
        assert!(load(tmp.path()).unwrap().is_none());
        remove(tmp.path()).unwrap();
    }

    #[test]
    fn empty_corpus_snapshot_loads() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &CacheSnapshot::new(vec![], None, DenseManifest::Empty)).unwrap();
        let loaded = load(tmp.path()).unwrap().unwrap();
        assert!(loaded.documents.is_empty());
        assert!(embeddings(&loaded, tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_embedding_is_malformed() {
        let mut snap = snapshot();
        snap.documents[0].embedding = None;
        assert!(matches!(embeddings(&snap, Path::new("x")), Err(Error::MalformedCache { .. })));
    }
}
