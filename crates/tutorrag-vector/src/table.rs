//! LanceDB connection and generation-directory housekeeping.
use anyhow::Result;
use lancedb::{connect, Connection, Table};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::schema::TABLE_NAME;

const GENERATION_PREFIX: &str = "dense-";
/// Newest generations kept on disk regardless of use.
const GENERATIONS_KEPT: usize = 2;

/// Open-index count per generation directory in this process.
static LIVE_GENERATIONS: Mutex<BTreeMap<PathBuf, usize>> = Mutex::new(BTreeMap::new());

fn live_generations() -> MutexGuard<'static, BTreeMap<PathBuf, usize>> {
    LIVE_GENERATIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn generation_key(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Held by every open index; `prune_generations` never removes a leased directory.
#[derive(Debug)]
pub struct GenerationLease {
    key: PathBuf,
}

impl GenerationLease {
    pub fn acquire(dir: &Path) -> Self {
        let key = generation_key(dir);
        *live_generations().entry(key.clone()).or_insert(0) += 1;
        Self { key }
    }
}

impl Drop for GenerationLease {
    fn drop(&mut self) {
        let mut live = live_generations();
        if let Some(count) = live.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 { live.remove(&self.key); }
        }
    }
}

pub fn is_generation_live(dir: &Path) -> bool {
    live_generations().contains_key(&generation_key(dir))
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn open_vectors_table(dir: &Path) -> Result<Table> {
    let conn = open_db(&dir.to_string_lossy()).await?;
    Ok(conn.open_table(TABLE_NAME).execute().await?)
}

/// A fresh, timestamped directory under `cache_dir`.
pub fn new_generation_dir(cache_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(cache_dir)?;
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string();
    let mut dir = cache_dir.join(format!("{GENERATION_PREFIX}{stamp}"));
    let mut n = 1;
    while dir.exists() {
        dir = cache_dir.join(format!("{GENERATION_PREFIX}{stamp}-{n}"));
        n += 1;
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Removes all but the newest generations, skipping any still held open by an
/// index in this process. Failures are logged, not returned.
pub fn prune_generations(cache_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(cache_dir) else { return };
    let mut generations: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(GENERATION_PREFIX))
        .map(|e| e.path())
        .collect();
    generations.sort();
    let stale = generations.len().saturating_sub(GENERATIONS_KEPT);
    for dir in generations.into_iter().take(stale) {
        if is_generation_live(&dir) {
            tracing::debug!(dir = %dir.display(), "stale dense index still in use, kept");
            continue;
        }
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => tracing::debug!(dir = %dir.display(), "removed stale dense index"),
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "could not remove stale dense index"),
        }
    }
}
