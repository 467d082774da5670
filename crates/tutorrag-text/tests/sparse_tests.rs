use tutorrag_text::{tokenize, TantivySparseIndex};

fn corpus() -> Vec<&'static str> {
    vec![
        "Cats are mammals and cats purr",
        "Dogs are mammals",
        "Volcanoes erupt molten rock",
        "The cat sat on the mat",
    ]
}

#[test]
fn ranks_term_matches_and_drops_non_matches() {
    let index = TantivySparseIndex::from_texts(&corpus()).expect("build");
    let hits = index.search("cats mammals", 10).expect("search");
    let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
    eprintln!("hits: {:?}", hits);
    assert_eq!(positions[0], 0, "doc with both terms ranks first");
    assert!(positions.contains(&1));
    assert!(!positions.contains(&2));
    assert!(hits.iter().all(|h| h.score > 0.0));
    for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }
}

#[test]
fn respects_k_and_empty_inputs() {
    let index = TantivySparseIndex::from_texts(&corpus()).expect("build");
    assert_eq!(index.search("mammals", 1).expect("search").len(), 1);
    assert!(index.search("mammals", 0).expect("search").is_empty());
    assert!(index.search("   ", 5).expect("search").is_empty());
    assert!(index.search("unicorn", 5).expect("search").is_empty());
}

#[test]
fn matching_is_case_insensitive_but_literal() {
    let index = TantivySparseIndex::from_texts(&corpus()).expect("build");
    let hits = index.search("VOLCANOES", 5).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].position, 2);
    // Whitespace tokens keep punctuation, so "mat." would not match "mat".
    assert!(index.search("mat.", 5).expect("search").is_empty());
}

#[test]
fn rebuild_from_tokenized_corpus_gives_same_results() {
    let index = TantivySparseIndex::from_texts(&corpus()).expect("build");
    let rebuilt = TantivySparseIndex::build(index.tokenized().to_vec()).expect("rebuild");
    assert_eq!(rebuilt.len(), 4);
    assert_eq!(rebuilt.tokenized()[1], tokenize("Dogs are mammals"));
    let a: Vec<usize> = index.search("cat mat", 4).expect("a").iter().map(|h| h.position).collect();
    let b: Vec<usize> = rebuilt.search("cat mat", 4).expect("b").iter().map(|h| h.position).collect();
    assert_eq!(a, b);
}

#[test]
fn huge_k_is_capped_at_corpus_size() {
    let index = TantivySparseIndex::from_texts(&corpus()).expect("build");
    let hits = index.search("mammals", 1 << 40).expect("search");
    assert_eq!(hits.len(), 2);
}
