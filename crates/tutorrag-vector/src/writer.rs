use anyhow::Result;
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator};
use lancedb::{Connection, Table};
use std::sync::Arc;

use crate::l2_normalize;
use crate::schema::{build_arrow_schema, TABLE_NAME};

const WRITE_BATCH_ROWS: usize = 10_000;

/// Creates the `vectors` table holding every vector (normalized) with its corpus position.
pub async fn write_vectors(conn: &Connection, vectors: &[Vec<f32>]) -> Result<Table> {
	let dim = vectors.first().map(|v| v.len()).unwrap_or(0) as i32;
	let schema = build_arrow_schema(dim);
	let mut batches = Vec::with_capacity(vectors.len().div_ceil(WRITE_BATCH_ROWS));
	for (chunk_no, chunk) in vectors.chunks(WRITE_BATCH_ROWS).enumerate() {
		batches.push(Ok(to_record_batch(chunk, chunk_no * WRITE_BATCH_ROWS, dim)?));
	}
	let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
	let table = conn.create_table(TABLE_NAME, reader).execute().await?;
	tracing::debug!(rows = vectors.len(), dim, "wrote dense vectors");
	Ok(table)
}

fn to_record_batch(vectors: &[Vec<f32>], first_ordinal: usize, dim: i32) -> Result<RecordBatch> {
	let ordinals: Vec<i64> = (first_ordinal..first_ordinal + vectors.len()).map(|o| o as i64).collect();
	let values = vectors.iter().map(|v| Some(l2_normalize(v).into_iter().map(Some).collect::<Vec<_>>()));
	Ok(RecordBatch::try_new(build_arrow_schema(dim), vec![
		Arc::new(Int64Array::from(ordinals)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(values, dim)),
	])?)
}
