//! IVF_FLAT training for large corpora.
use anyhow::Result;
use lancedb::index::{vector::IvfFlatIndexBuilder, Index};
use lancedb::{DistanceType, Table};

use crate::schema::VECTOR_COLUMN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfFlatParams {
    pub num_partitions: usize,
}

/// `min(n / 10, max_partitions)`, at least one partition.
pub fn compute_ivf_params(total_rows: usize, max_partitions: usize) -> IvfFlatParams {
    IvfFlatParams { num_partitions: (total_rows / 10).min(max_partitions).max(1) }
}

pub async fn build_ivf_flat_index(table: &Table, params: &IvfFlatParams) -> Result<()> {
    table
        .create_index(
            &[VECTOR_COLUMN],
            Index::IvfFlat(
                IvfFlatIndexBuilder::default()
                    .distance_type(DistanceType::Dot)
                    .num_partitions(params.num_partitions as u32),
            ),
        )
        .execute()
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_scale_with_rows_and_cap() {
        assert_eq!(compute_ivf_params(10_000, 100).num_partitions, 100);
        assert_eq!(compute_ivf_params(500, 100).num_partitions, 50);
        assert_eq!(compute_ivf_params(5, 100).num_partitions, 1);
    }
}
