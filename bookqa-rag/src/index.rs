//! Persisted vector index with exact cosine-similarity search.
//!
//! An index lives in a directory holding two files:
//!
//! - `manifest.json` holds the [`IndexManifest`]: format version, source, embedding
//!   signature and chunk count
//! - `chunks.json` holds the [`EmbeddedChunk`]s in insertion order
//!
//! [`VectorIndex::build`] writes into a hidden staging directory next to the
//! target and renames it into place once both files are complete. A location
//! that exists and is non-empty therefore always holds a finished build, and
//! concurrent builds for the same location cannot interleave: the second
//! rename finds the target populated and fails.
//!
//! Once loaded, an index is immutable and can be searched from many tasks at
//! once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{Chunk, EmbeddedChunk, SearchResult};
use crate::embedding::{EmbeddingProvider, EmbeddingSignature, embed_batch_with_timeout};
use crate::error::{RagError, Result};

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";

/// Summary of a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// On-disk format version.
    pub format_version: u32,
    /// The document the index was built from.
    pub source_id: String,
    /// Embedding model and dimension every stored vector was produced with.
    pub embedding: EmbeddingSignature,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// When the build completed.
    pub created_at: DateTime<Utc>,
}

/// Tuning for the embedding phase of [`VectorIndex::build`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Chunks per `embed_batch` call.
    pub batch_size: usize,
    /// Maximum number of batches in flight.
    pub concurrency: usize,
    /// Deadline for each provider call.
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { batch_size: 32, concurrency: 4, timeout: Duration::from_secs(60) }
    }
}

/// A loaded vector index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    location: PathBuf,
    manifest: IndexManifest,
    chunks: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// Whether `location` exists and holds at least one entry.
    pub async fn exists(location: &Path) -> bool {
        match tokio::fs::read_dir(location).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
            Err(_) => false,
        }
    }

    /// Embed `chunks` and persist them at `location`.
    ///
    /// Batches are embedded concurrently but reassembled in input order, so
    /// the persisted index is identical for every concurrency setting.
    ///
    /// # Errors
    ///
    /// - [`RagError::Storage`] if `location` already holds an index or cannot
    ///   be written.
    /// - [`RagError::EmbeddingError`] if the provider fails, times out or
    ///   returns vectors of the wrong shape.
    pub async fn build(
        location: &Path,
        source_id: &str,
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> Result<Self> {
        if Self::exists(location).await {
            return Err(RagError::storage(
                location,
                "location already holds an index; clear it before rebuilding",
            ));
        }

        let staging = staging_dir(location)?;
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| RagError::storage(location, format!("cannot create staging dir: {e}")))?;

        let result = Self::build_in(location, &staging, source_id, chunks, embedder, options).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
                warn!(staging = %staging.display(), error = %e, "failed to remove staging dir");
            }
        }
        result
    }

    async fn build_in(
        location: &Path,
        staging: &Path,
        source_id: &str,
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> Result<Self> {
        let signature = embedder.signature();
        info!(
            location = %location.display(),
            chunk_count = chunks.len(),
            embedding = %signature,
            "building vector index"
        );

        let embedded = embed_chunks(chunks, embedder, options).await?;
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            source_id: source_id.to_string(),
            embedding: signature,
            chunk_count: embedded.len(),
            created_at: Utc::now(),
        };

        write_json(location, &staging.join(CHUNKS_FILE), &embedded).await?;
        write_json(location, &staging.join(MANIFEST_FILE), &manifest).await?;

        // An empty directory may have been created by the caller; replace it.
        if tokio::fs::metadata(location).await.is_ok() {
            tokio::fs::remove_dir(location)
                .await
                .map_err(|e| RagError::storage(location, format!("cannot replace location: {e}")))?;
        }
        tokio::fs::rename(staging, location)
            .await
            .map_err(|e| RagError::storage(location, format!("cannot move index into place: {e}")))?;

        info!(location = %location.display(), chunk_count = manifest.chunk_count, "vector index built");
        Ok(Self { location: location.to_path_buf(), manifest, chunks: embedded })
    }

    /// Load a previously built index.
    ///
    /// Never builds: a missing or empty location is reported as
    /// [`RagError::NotFound`].
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if `location` is absent or empty.
    /// - [`RagError::Storage`] if the files are missing, unreadable or
    ///   inconsistent with each other.
    pub async fn open(location: &Path) -> Result<Self> {
        if !Self::exists(location).await {
            return Err(RagError::NotFound { location: location.to_path_buf() });
        }

        let manifest: IndexManifest = read_json(location, &location.join(MANIFEST_FILE)).await?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::storage(
                location,
                format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    manifest.format_version
                ),
            ));
        }

        let chunks: Vec<EmbeddedChunk> = read_json(location, &location.join(CHUNKS_FILE)).await?;
        if chunks.len() != manifest.chunk_count {
            return Err(RagError::storage(
                location,
                format!(
                    "manifest lists {} chunks but {} are stored",
                    manifest.chunk_count,
                    chunks.len()
                ),
            ));
        }
        let dimensions = manifest.embedding.dimensions;
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimensions) {
            return Err(RagError::storage(
                location,
                format!(
                    "chunk '{}' has {} dimensions, manifest declares {dimensions}",
                    bad.chunk.id,
                    bad.embedding.len()
                ),
            ));
        }

        info!(location = %location.display(), chunk_count = chunks.len(), "opened vector index");
        Ok(Self { location: location.to_path_buf(), manifest, chunks })
    }

    /// Remove the index at `location`. No-op if nothing is there.
    pub async fn clear(location: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(location).await {
            Ok(()) => {
                info!(location = %location.display(), "cleared vector index");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::storage(location, format!("cannot clear index: {e}"))),
        }
    }

    /// Search for the `top_k` chunks most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `top_k` is zero or the query has
    /// the wrong dimension.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".into()));
        }
        if query.len() != self.dimensions() {
            return Err(RagError::InvalidInput(format!(
                "query vector has {} dimensions, index expects {}",
                query.len(),
                self.dimensions()
            )));
        }
        let results = rank_by_cosine(&self.chunks, query, top_k);
        debug!(top_k, result_count = results.len(), "searched vector index");
        Ok(results)
    }

    /// Fail unless this index was built with the given embedding signature.
    pub fn ensure_compatible(&self, signature: &EmbeddingSignature) -> Result<()> {
        if &self.manifest.embedding != signature {
            return Err(RagError::EmbeddingMismatch {
                expected: self.manifest.embedding.to_string(),
                found: signature.to_string(),
            });
        }
        Ok(())
    }

    /// The directory this index was loaded from or built into.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The index manifest.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Vector dimensionality shared by every stored chunk.
    pub fn dimensions(&self) -> usize {
        self.manifest.embedding.dimensions
    }

    /// The stored chunks in insertion order.
    pub fn chunks(&self) -> &[EmbeddedChunk] {
        &self.chunks
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score every chunk against `query` and keep the best `top_k`.
///
/// The sort is stable, so chunks with equal scores stay in input order.
/// NaN scores rank last.
pub fn rank_by_cosine(chunks: &[EmbeddedChunk], query: &[f32], top_k: usize) -> Vec<SearchResult> {
    let mut scored: Vec<SearchResult> = chunks
        .iter()
        .map(|c| {
            let score = cosine_similarity(&c.embedding, query);
            let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
            SearchResult { chunk: c.chunk.clone(), score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}

async fn embed_chunks(
    chunks: Vec<Chunk>,
    embedder: &dyn EmbeddingProvider,
    options: &BuildOptions,
) -> Result<Vec<EmbeddedChunk>> {
    let batch_size = options.batch_size.max(1);
    let concurrency = options.concurrency.max(1);
    let dimensions = embedder.dimensions();

    let batches: Vec<Vec<Vec<f32>>> = stream::iter(chunks.chunks(batch_size))
        .map(|batch| async move {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = embed_batch_with_timeout(embedder, &texts, options.timeout).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: embedder.model_id().to_string(),
                    message: format!(
                        "requested {} embeddings, received {}",
                        batch.len(),
                        vectors.len()
                    ),
                });
            }
            debug!(batch_size = batch.len(), "embedded batch");
            Ok(vectors)
        })
        .buffered(concurrency)
        .try_collect()
        .await?;

    let mut embedded = Vec::with_capacity(chunks.len());
    for (chunk, embedding) in chunks.into_iter().zip(batches.into_iter().flatten()) {
        if embedding.len() != dimensions {
            return Err(RagError::EmbeddingError {
                provider: embedder.model_id().to_string(),
                message: format!(
                    "chunk '{}' embedded to {} dimensions, provider declares {dimensions}",
                    chunk.id,
                    embedding.len()
                ),
            });
        }
        embedded.push(EmbeddedChunk { chunk, embedding });
    }
    Ok(embedded)
}

fn staging_dir(location: &Path) -> Result<PathBuf> {
    let name = location
        .file_name()
        .ok_or_else(|| RagError::storage(location, "location must name a directory"))?;
    let staging_name = format!(".{}.building-{}", name.to_string_lossy(), uuid::Uuid::new_v4());
    Ok(location.with_file_name(staging_name))
}

async fn write_json<T: Serialize + ?Sized>(location: &Path, path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| RagError::storage(location, format!("cannot serialize {}: {e}", path.display())))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| RagError::storage(location, format!("cannot write {}: {e}", path.display())))
}

async fn read_json<T: serde::de::DeserializeOwned>(location: &Path, path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RagError::storage(location, format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RagError::storage(location, format!("corrupt {}: {e}", path.display())))
}
