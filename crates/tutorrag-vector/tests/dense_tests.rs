use tutorrag_vector::{DenseIndex, DenseManifest, DenseParams, IndexKind};

/// Deterministic pseudo-random vectors.
fn vectors(n: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..n)
        .map(|_| {
            (0..dim)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
                })
                .collect()
        })
        .collect()
}

fn positions(hits: &[tutorrag_core::types::SearchHit]) -> Vec<usize> { hits.iter().map(|h| h.position).collect() }

#[test]
fn empty_corpus_builds_empty_index() {
    let index = DenseIndex::build(&[], None, &DenseParams::default()).expect("build");
    assert_eq!(index.kind(), IndexKind::Empty);
    assert!(index.search(&[1.0, 0.0], 5).expect("search").is_empty());
    assert_eq!(index.manifest(), Some(DenseManifest::Empty));
}

#[test]
fn mixed_dimensions_are_rejected() {
    let err = DenseIndex::build(&[vec![1.0, 0.0], vec![1.0]], None, &DenseParams::default());
    assert!(err.is_err());
}

#[test]
fn self_query_ranks_itself_first() {
    let data = vectors(40, 8);
    let index = DenseIndex::build(&data, None, &DenseParams::default()).expect("build");
    eprintln!("dense backend: {}", index.kind());
    assert_eq!(index.len(), 40);
    for probe in [0usize, 17, 39] {
        let hits = index.search(&data[probe], 3).expect("search");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].position, probe);
        assert!((hits[0].score - 1.0).abs() < 1e-3, "self similarity ~1, got {}", hits[0].score);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }
    assert!(index.search(&data[0], 0).expect("search").is_empty());
}

#[test]
fn brute_force_manifest_restores_from_embeddings() {
    let data = vectors(10, 4);
    let restored = DenseIndex::restore(&DenseManifest::BruteForce, &data, &DenseParams::default()).expect("restore");
    assert_eq!(restored.kind(), IndexKind::BruteForce);
    assert_eq!(restored.search(&data[3], 1).expect("search")[0].position, 3);
    assert!(DenseIndex::restore(&DenseManifest::Empty, &data, &DenseParams::default()).is_err());
}

#[cfg(feature = "lance")]
mod lance {
    use super::*;

    #[test]
    fn flat_table_matches_brute_force_ordering() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(60, 12);
        let lance = DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("build");
        assert_eq!(lance.kind(), IndexKind::LanceFlat);
        let exact = DenseIndex::restore(&DenseManifest::BruteForce, &data, &DenseParams::default()).expect("bf");
        let query = &data[5];
        let a = lance.search(query, 5).expect("lance search");
        let b = exact.search(query, 5).expect("bf search");
        assert_eq!(positions(&a), positions(&b));
        for (x, y) in a.iter().zip(&b) { assert!((x.score - y.score).abs() < 1e-4); }
    }

    #[test]
    fn persisted_generation_reopens_and_checks_row_count() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(20, 6);
        let built = DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("build");
        let manifest = built.manifest().expect("persistent");
        let DenseManifest::Lance { ref dir, rows, .. } = manifest else { panic!("expected lance manifest") };
        assert_eq!(rows, 20);
        assert!(dir.starts_with(tmp.path()));

        let reopened = DenseIndex::restore(&manifest, &data, &DenseParams::default()).expect("restore");
        assert_eq!(positions(&reopened.search(&data[7], 2).expect("search"))[0], 7);

        let wrong = DenseManifest::Lance { dir: dir.clone(), rows: 20, kind: IndexKind::LanceFlat };
        assert!(DenseIndex::restore(&wrong, &data[..19], &DenseParams::default()).is_err());
    }

    #[test]
    fn large_corpus_uses_ivf_and_finds_exact_match() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(400, 16);
        let params = DenseParams { exact_threshold: 100, max_partitions: 4, nprobes: 4 };
        let index = DenseIndex::build(&data, Some(tmp.path()), &params).expect("build");
        eprintln!("large corpus backend: {}", index.kind());
        assert_ne!(index.kind(), IndexKind::Empty);
        // All partitions probed, so the result is exact.
        assert_eq!(index.search(&data[123], 1).expect("search")[0].position, 123);
    }

    #[test]
    fn old_generations_are_pruned() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(5, 4);
        for _ in 0..4 {
            DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("build");
        }
        let generations = std::fs::read_dir(tmp.path()).expect("read").filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("dense-")).count();
        assert_eq!(generations, 2);
    }

    #[test]
    fn generation_held_by_open_index_survives_pruning() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(5, 4);
        let served = DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("build");
        let Some(DenseManifest::Lance { dir, .. }) = served.manifest() else { panic!("expected lance manifest") };
        for _ in 0..3 {
            DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("rebuild");
        }
        assert!(dir.exists());
        assert_eq!(served.search(&data[1], 1).expect("search")[0].position, 1);

        drop(served);
        DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("rebuild");
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn usable_from_inside_an_async_runtime() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(10, 4);
        let index = DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("build");
        assert_eq!(index.kind(), IndexKind::LanceFlat);
        assert_eq!(index.search(&data[2], 1).expect("search")[0].position, 2);
        let reopened = DenseIndex::restore(&index.manifest().expect("manifest"), &data, &DenseParams::default()).expect("restore");
        assert_eq!(reopened.search(&data[4], 1).expect("search")[0].position, 4);
    }

    #[test]
    fn huge_k_is_clamped_to_corpus_size() {
        let tmp = tempfile::tempdir().expect("tmp");
        let data = vectors(8, 4);
        let index = DenseIndex::build(&data, Some(tmp.path()), &DenseParams::default()).expect("build");
        assert_eq!(index.search(&data[0], 1 << 40).expect("search").len(), 8);
    }
}
