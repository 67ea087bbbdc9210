//! Tests for the persisted vector index.

mod common;

use std::time::Duration;

use bookqa_rag::{
    BuildOptions, Chunk, ChunkMetadata, EmbeddedChunk, EmbeddingProvider, RagError, VectorIndex,
    rank_by_cosine,
};
use common::{HashEmbeddingProvider, KeywordEmbeddingProvider, WrongDimensionProvider};
use proptest::prelude::*;

fn chunk(id: usize, text: &str, page: u32) -> Chunk {
    Chunk {
        id: format!("book_{id}"),
        text: text.to_string(),
        metadata: ChunkMetadata { source_id: "book".into(), page_number: page, offset: 0 },
    }
}

fn sample_chunks() -> Vec<Chunk> {
    vec![
        chunk(0, "Overfitting means memorizing noise in the data.", 1),
        chunk(1, "Regularization helps prevent overfitting.", 2),
        chunk(2, "Gradient descent minimizes a cost function.", 3),
        chunk(3, "A random forest averages many decision tree models.", 4),
    ]
}

#[tokio::test]
async fn build_then_open_returns_same_top_result() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    let embedder = KeywordEmbeddingProvider::new();

    let built = VectorIndex::build(
        &location,
        "book",
        sample_chunks(),
        &embedder,
        &BuildOptions::default(),
    )
    .await
    .unwrap();
    let query = embedder.embed("gradient descent").await.unwrap();
    let before = built.search(&query, 1).unwrap();

    let opened = VectorIndex::open(&location).await.unwrap();
    let after = opened.search(&query, 1).unwrap();

    assert_eq!(before[0].chunk.id, "book_2");
    assert_eq!(after[0].chunk, before[0].chunk);
    assert_eq!(opened.manifest().chunk_count, 4);
    assert_eq!(opened.manifest().source_id, "book");
}

#[tokio::test]
async fn every_stored_vector_has_provider_dimension() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    let embedder = HashEmbeddingProvider { dimensions: 24 };

    VectorIndex::build(&location, "book", sample_chunks(), &embedder, &BuildOptions::default())
        .await
        .unwrap();

    let index = VectorIndex::open(&location).await.unwrap();
    assert_eq!(index.dimensions(), 24);
    assert!(index.chunks().iter().all(|c| c.embedding.len() == embedder.dimensions()));
}

#[tokio::test]
async fn open_missing_or_empty_location_is_not_found() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing");
    assert!(matches!(VectorIndex::open(&missing).await, Err(RagError::NotFound { .. })));
    assert!(!missing.exists(), "open must never create the index");

    let empty = dir.path().join("empty");
    std::fs::create_dir(&empty).unwrap();
    assert!(matches!(VectorIndex::open(&empty).await, Err(RagError::NotFound { .. })));
}

#[tokio::test]
async fn build_into_empty_directory_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    std::fs::create_dir(&location).unwrap();

    let index = VectorIndex::build(
        &location,
        "book",
        sample_chunks(),
        &KeywordEmbeddingProvider::new(),
        &BuildOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(index.len(), 4);
    assert!(VectorIndex::exists(&location).await);
}

#[tokio::test]
async fn build_refuses_populated_location() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    let embedder = KeywordEmbeddingProvider::new();
    let options = BuildOptions::default();

    VectorIndex::build(&location, "book", sample_chunks(), &embedder, &options).await.unwrap();
    let err = VectorIndex::build(&location, "book", sample_chunks()[..1].to_vec(), &embedder, &options)
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::Storage { .. }));
    assert_eq!(VectorIndex::open(&location).await.unwrap().len(), 4);
}

#[tokio::test]
async fn failed_build_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");

    let err = VectorIndex::build(
        &location,
        "book",
        sample_chunks(),
        &WrongDimensionProvider,
        &BuildOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert!(!location.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0, "staging dir was not removed");
}

#[tokio::test]
async fn persisted_set_is_independent_of_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = HashEmbeddingProvider { dimensions: 8 };
    let chunks: Vec<Chunk> =
        (0..37).map(|i| chunk(i, &format!("passage number {i}"), i as u32 / 10 + 1)).collect();

    let serial = BuildOptions { batch_size: 1, concurrency: 1, timeout: Duration::from_secs(5) };
    let parallel = BuildOptions { batch_size: 4, concurrency: 8, timeout: Duration::from_secs(5) };

    let a = VectorIndex::build(&dir.path().join("a"), "book", chunks.clone(), &embedder, &serial)
        .await
        .unwrap();
    let b = VectorIndex::build(&dir.path().join("b"), "book", chunks, &embedder, &parallel)
        .await
        .unwrap();

    assert_eq!(a.chunks(), b.chunks());
}

#[tokio::test]
async fn incompatible_provider_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    VectorIndex::build(
        &location,
        "book",
        sample_chunks(),
        &KeywordEmbeddingProvider::new(),
        &BuildOptions::default(),
    )
    .await
    .unwrap();

    let index = VectorIndex::open(&location).await.unwrap();
    assert!(index.ensure_compatible(&KeywordEmbeddingProvider::new().signature()).is_ok());

    let other_model = KeywordEmbeddingProvider::with_model("keyword-v2").signature();
    assert!(matches!(
        index.ensure_compatible(&other_model),
        Err(RagError::EmbeddingMismatch { .. })
    ));
    let other_dims = HashEmbeddingProvider { dimensions: 10 }.signature();
    assert!(index.ensure_compatible(&other_dims).is_err());
}

#[tokio::test]
async fn search_validates_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = KeywordEmbeddingProvider::new();
    let index = VectorIndex::build(
        &dir.path().join("index"),
        "book",
        sample_chunks(),
        &embedder,
        &BuildOptions::default(),
    )
    .await
    .unwrap();

    let query = embedder.embed("overfitting").await.unwrap();
    assert!(matches!(index.search(&query, 0), Err(RagError::InvalidInput(_))));
    assert!(matches!(index.search(&[1.0, 2.0], 3), Err(RagError::InvalidInput(_))));
    assert_eq!(index.search(&query, 50).unwrap().len(), 4);
}

#[tokio::test]
async fn clear_removes_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    VectorIndex::build(
        &location,
        "book",
        sample_chunks(),
        &KeywordEmbeddingProvider::new(),
        &BuildOptions::default(),
    )
    .await
    .unwrap();

    VectorIndex::clear(&location).await.unwrap();
    assert!(!VectorIndex::exists(&location).await);
    VectorIndex::clear(&location).await.unwrap();
}

#[tokio::test]
async fn corrupt_manifest_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("index");
    std::fs::create_dir(&location).unwrap();
    std::fs::write(location.join("manifest.json"), "{not json").unwrap();

    assert!(matches!(VectorIndex::open(&location).await, Err(RagError::Storage { .. })));
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Search ordering: results are ordered by non-increasing cosine score and
/// never exceed `top_k` or the number of stored chunks.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let stored: Vec<EmbeddedChunk> = embeddings
                .into_iter()
                .enumerate()
                .map(|(i, embedding)| EmbeddedChunk { chunk: chunk(i, "text", 1), embedding })
                .collect();

            let results = rank_by_cosine(&stored, &query, top_k);

            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= stored.len());
            prop_assert_eq!(results.len(), top_k.min(stored.len()));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn equal_scores_keep_insertion_order(
            embedding in arb_normalized_embedding(DIM),
            copies in 2usize..10,
        ) {
            let stored: Vec<EmbeddedChunk> = (0..copies)
                .map(|i| EmbeddedChunk { chunk: chunk(i, "same", 1), embedding: embedding.clone() })
                .collect();

            let results = rank_by_cosine(&stored, &embedding, copies);
            let ids: Vec<String> = results.iter().map(|r| r.chunk.id.clone()).collect();
            let expected: Vec<String> = (0..copies).map(|i| format!("book_{i}")).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
