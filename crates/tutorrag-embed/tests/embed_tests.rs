use tutorrag_core::config::{EmbeddingSettings, RerankerSettings};
use tutorrag_core::traits::CrossEncoder;
use tutorrag_embed::{get_default_embedder, get_default_reranker, FakeCrossEncoder, FAKE_EMBEDDING_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { use_fake: true, ..Default::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), FAKE_EMBEDDING_DIM);
    assert_eq!(embedder.dim(), FAKE_EMBEDDING_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_ignores_case_and_punctuation() {
    let settings = EmbeddingSettings { use_fake: true, ..Default::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let embs = embedder
        .embed_batch(&["Mammals.".to_string(), "mammals".to_string(), "volcano".to_string()])
        .expect("embed");
    assert!((cosine(&embs[0], &embs[1]) - 1.0).abs() < 1e-5);
    assert!(cosine(&embs[0], &embs[2]) < 0.99);
}

#[test]
fn fake_cross_encoder_scores_overlap_in_unit_range() {
    let scores = FakeCrossEncoder
        .score_pairs("cats mammals", &["Cats are mammals.", "Dogs are mammals.", "Rocks."])
        .expect("score");
    assert_eq!(scores, vec![1.0, 0.0, -1.0]);
}

#[test]
fn disabled_reranker_is_none() {
    let settings = RerankerSettings { enabled: false, ..Default::default() };
    assert!(get_default_reranker(&settings, true).expect("reranker").is_none());
    let enabled = RerankerSettings::default();
    assert!(get_default_reranker(&enabled, true).expect("reranker").is_some());
}
