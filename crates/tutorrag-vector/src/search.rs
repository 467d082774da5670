use anyhow::{anyhow, Result};
use arrow_array::{Float32Array, Int64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::runtime::{Handle, Runtime};

use tutorrag_core::types::{SearchHit, SourceKind};

use crate::index_build::{build_ivf_flat_index, compute_ivf_params};
use crate::schema::{DISTANCE_COLUMN, ORDINAL_COLUMN};
use crate::table::{new_generation_dir, open_db, open_vectors_table, prune_generations, GenerationLease};
use crate::writer::write_vectors;
use crate::{l2_normalize, DenseParams, IndexKind};

/// Owned runtime that drives LanceDB from synchronous code. Safe to use and
/// drop from inside another tokio runtime.
struct BlockingRuntime(Option<Runtime>);

impl BlockingRuntime {
	fn new() -> Result<Self> { Ok(Self(Some(Runtime::new()?))) }

	fn run<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>> + Send,
		T: Send,
	{
		let rt = self.0.as_ref().ok_or_else(|| anyhow!("dense index runtime is shut down"))?;
		if Handle::try_current().is_err() { return rt.block_on(fut); }
		// block_on panics on a thread that is already driving a runtime.
		std::thread::scope(|s| s.spawn(move || rt.block_on(fut)).join())
			.map_err(|_| anyhow!("dense index worker thread panicked"))?
	}
}

impl Drop for BlockingRuntime {
	fn drop(&mut self) {
		if let Some(rt) = self.0.take() { rt.shutdown_background(); }
	}
}

/// LanceDB-backed dense index. Queries run on an owned tokio runtime, so the
/// index may be used from plain threads and from async tasks alike.
pub struct LanceDenseIndex {
	table: Table,
	dir: PathBuf,
	rows: usize,
	kind: IndexKind,
	nprobes: usize,
	// Dropped after the table.
	rt: BlockingRuntime,
	scratch: Option<TempDir>,
	_lease: GenerationLease,
}

impl LanceDenseIndex {
	pub fn build(vectors: &[Vec<f32>], cache_dir: Option<&Path>, params: &DenseParams) -> Result<Self> {
		let rt = BlockingRuntime::new()?;
		let (dir, scratch) = match cache_dir {
			Some(cache_dir) => (new_generation_dir(cache_dir)?, None),
			None => { let tmp = tempfile::tempdir()?; (tmp.path().to_path_buf(), Some(tmp)) }
		};
		let rows = vectors.len();
		let kind = if rows < params.exact_threshold { IndexKind::LanceFlat } else { IndexKind::LanceIvfFlat };
		let lease = GenerationLease::acquire(&dir);
		let table = rt.run(async {
			let conn = open_db(&dir.to_string_lossy()).await?;
			let table = write_vectors(&conn, vectors).await?;
			if kind == IndexKind::LanceIvfFlat {
				let ivf = compute_ivf_params(rows, params.max_partitions);
				tracing::info!(rows, partitions = ivf.num_partitions, "training IVF_FLAT index");
				build_ivf_flat_index(&table, &ivf).await?;
			}
			anyhow::Ok(table)
		})?;
		tracing::info!(rows, kind = %kind, dir = %dir.display(), "dense index built");
		if let Some(cache_dir) = cache_dir { prune_generations(cache_dir); }
		Ok(Self { rt, table, dir, rows, kind, nprobes: params.nprobes, scratch, _lease: lease })
	}

	/// Opens a previously built generation and checks it holds `rows` vectors.
	pub fn open(dir: &Path, rows: usize, kind: IndexKind, nprobes: usize) -> Result<Self> {
		let rt = BlockingRuntime::new()?;
		let lease = GenerationLease::acquire(dir);
		let (table, found) = rt.run(async {
			let table = open_vectors_table(dir).await?;
			let found = table.count_rows(None).await?;
			anyhow::Ok((table, found))
		})?;
		if found != rows {
			return Err(anyhow!("dense index at {} has {} rows, expected {}", dir.display(), found, rows));
		}
		Ok(Self { rt, table, dir: dir.to_path_buf(), rows, kind, nprobes, scratch: None, _lease: lease })
	}

	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
		let q = l2_normalize(query);
		let batches: Vec<arrow_array::RecordBatch> = self.rt.run(async {
			let stream = self.table
				.vector_search(q)?
				.distance_type(DistanceType::Dot)
				.nprobes(self.nprobes)
				.select(Select::columns(&[ORDINAL_COLUMN]))
				.limit(k.min(self.rows))
				.execute()
				.await?;
			anyhow::Ok(stream.try_collect().await?)
		})?;
		let mut hits = Vec::with_capacity(k.min(self.rows));
		for batch in batches {
			let ordinals = batch.column_by_name(ORDINAL_COLUMN).and_then(|c| c.as_any().downcast_ref::<Int64Array>())
				.ok_or_else(|| anyhow!("search result is missing the ordinal column"))?;
			let distances = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| anyhow!("search result is missing the distance column"))?;
			for i in 0..batch.num_rows() {
				let ordinal = ordinals.value(i);
				if ordinal < 0 || ordinal as usize >= self.rows { continue; }
				// Dot distance is 1 - inner product.
				hits.push(SearchHit { position: ordinal as usize, score: 1.0 - distances.value(i), source: SourceKind::Vector });
			}
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(k);
		Ok(hits)
	}

	pub fn kind(&self) -> IndexKind { self.kind }

	pub fn rows(&self) -> usize { self.rows }

	pub fn dir(&self) -> &Path { &self.dir }

	/// False when the table lives in a scratch directory dropped with the index.
	pub fn is_persistent(&self) -> bool { self.scratch.is_none() }
}
