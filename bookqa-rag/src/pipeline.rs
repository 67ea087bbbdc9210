//! Conversational RAG orchestrator.
//!
//! The [`ConversationalRag`] coordinates index lifecycle (load → chunk →
//! embed → persist, or reopen) and the per-question flow:
//!
//! ```text
//! RECEIVED → QUERY_CONTEXTUALIZED → RETRIEVED → GENERATED → MEMORY_UPDATED → RESPONDED
//!                                (any step) → FAILED
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bookqa_rag::{ConversationalRag, ConversationMemory, RagConfig};
//!
//! let rag = ConversationalRag::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! rag.ensure_index(Path::new("mlbook.pdf"), Path::new("artifacts/index")).await?;
//! let mut memory = ConversationMemory::new();
//! let answer = rag.ask("What is overfitting?", &mut memory).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::condense::{LlmCondenser, QueryCondenser};
use crate::config::RagConfig;
use crate::document::{Chunk, SearchResult};
use crate::embedding::{EmbeddingProvider, embed_with_timeout};
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, generate_with_timeout};
use crate::index::VectorIndex;
use crate::memory::{ConversationMemory, Turn};
use crate::prompt::{NO_CONTEXT_ANSWER, PromptBuilder};
use crate::source::load_document;

/// Default on-disk location of the index.
pub const DEFAULT_INDEX_DIR: &str = "artifacts/index";

/// Steps a question moves through inside [`ConversationalRag::ask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// The question was accepted.
    Received,
    /// The retrieval query was resolved against the history.
    QueryContextualized,
    /// Supporting passages were fetched.
    Retrieved,
    /// The model produced an answer.
    Generated,
    /// The turn was recorded in the session history.
    MemoryUpdated,
    /// The answer was returned to the caller.
    Responded,
    /// The question could not be answered.
    Failed,
}

/// An answer grounded in retrieved passages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The answer text. Never empty.
    pub text: String,
    /// The retrieved passages, most relevant first.
    pub cited_chunks: Vec<Chunk>,
    /// The self-contained query used for retrieval.
    pub standalone_question: String,
}

/// Outcome of [`ConversationalRag::ensure_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// A new index was built from the source document.
    Built {
        /// Number of chunks stored.
        chunk_count: usize,
    },
    /// An existing index was opened as-is.
    Reused {
        /// Number of chunks stored.
        chunk_count: usize,
    },
}

/// Open the index at `location`, or build it from `source` if the location is
/// absent or empty.
///
/// This is the index half of [`ConversationalRag::ensure_index`] and needs
/// only an embedding provider, so an index can be prepared ahead of time
/// without generation credentials. Callers sharing a location must serialize
/// their calls; the orchestrator does so with its write lock.
///
/// # Errors
///
/// Same as [`ConversationalRag::ensure_index`].
pub async fn ingest(
    source: &Path,
    location: &Path,
    config: &RagConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<(VectorIndex, IndexStatus)> {
    if VectorIndex::exists(location).await {
        info!(location = %location.display(), "vector index already exists, skipping build");
        let index = VectorIndex::open(location).await?;
        index.ensure_compatible(&embedder.signature())?;
        let chunk_count = index.len();
        return Ok((index, IndexStatus::Reused { chunk_count }));
    }

    info!(source = %source.display(), location = %location.display(), "building vector index");
    let source_path = source.to_path_buf();
    let document = tokio::task::spawn_blocking(move || load_document(&source_path))
        .await
        .map_err(|e| RagError::SourceError {
            path: source.to_path_buf(),
            message: format!("loader task failed: {e}"),
        })??;

    let chunker = RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?;
    let chunks = chunker.chunk(&document);
    info!(source_id = %document.id, chunk_count = chunks.len(), "chunked source document");

    let index = VectorIndex::build(location, &document.id, chunks, embedder, &config.build_options())
        .await
        .inspect_err(|e| error!(location = %location.display(), error = %e, "index build failed"))?;

    let chunk_count = index.len();
    Ok((index, IndexStatus::Built { chunk_count }))
}

/// The conversational RAG orchestrator.
///
/// Providers are injected at construction and live as long as the
/// orchestrator. The loaded index sits behind a read-write lock: questions
/// share read access, while building, opening or clearing takes the write
/// lock. Session history is owned by the caller and passed to each
/// [`ask`](Self::ask), so one orchestrator can serve many independent
/// sessions.
pub struct ConversationalRag {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generation_provider: Arc<dyn GenerationProvider>,
    condenser: Arc<dyn QueryCondenser>,
    index_location: PathBuf,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl ConversationalRag {
    /// Create a new [`ConversationalRagBuilder`].
    pub fn builder() -> ConversationalRagBuilder {
        ConversationalRagBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Location [`ask`](Self::ask) opens the index from when none is loaded.
    pub fn index_location(&self) -> &Path {
        &self.index_location
    }

    /// The currently loaded index, if any.
    pub async fn index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }

    /// Open the index at `location`, building it from `source` only if the
    /// location is absent or empty.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingMismatch`] if an existing index was built with a
    ///   different embedding model or dimension.
    /// - [`RagError::SourceNotFound`] / [`RagError::SourceError`] if a build is
    ///   needed and the source cannot be loaded.
    /// - [`RagError::Storage`] or [`RagError::EmbeddingError`] if the build fails.
    pub async fn ensure_index(&self, source: &Path, location: &Path) -> Result<IndexStatus> {
        let mut slot = self.index.write().await;
        let (index, status) =
            ingest(source, location, &self.config, self.embedding_provider.as_ref()).await?;
        *slot = Some(Arc::new(index));
        Ok(status)
    }

    /// Load an existing index without ever building one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if nothing has been built at `location`,
    /// and [`RagError::EmbeddingMismatch`] if it was built with another
    /// embedding model.
    pub async fn open_index(&self, location: &Path) -> Result<Arc<VectorIndex>> {
        let mut slot = self.index.write().await;
        let index = Arc::new(self.open_checked(location).await?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Delete the index at `location`, unloading it if it is the active one.
    pub async fn clear_index(&self, location: &Path) -> Result<()> {
        let mut slot = self.index.write().await;
        VectorIndex::clear(location).await?;
        if slot.as_ref().is_some_and(|idx| idx.location() == location) {
            *slot = None;
        }
        Ok(())
    }

    /// Answer `question` in the context of `memory`.
    ///
    /// On success the question and answer are appended to `memory`. On any
    /// failure `memory` is left untouched so the same turn can be retried.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `question` is blank.
    /// - [`RagError::NotFound`] if no index has been built.
    /// - [`RagError::EmbeddingError`] / [`RagError::GenerationError`] if a
    ///   provider fails or times out. Nothing is retried.
    pub async fn ask(&self, question: &str, memory: &mut ConversationMemory) -> Result<Answer> {
        let answer = match self.answer(question, memory.as_context()).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(state = ?QueryState::Failed, error = %e, "query failed");
                return Err(e);
            }
        };

        memory.append(Turn::user(question));
        memory.append(Turn::assistant(answer.text.clone()));
        debug!(state = ?QueryState::MemoryUpdated, turns = memory.len(), "recorded turn");

        info!(state = ?QueryState::Responded, cited = answer.cited_chunks.len(), "answered question");
        Ok(answer)
    }

    async fn answer(&self, question: &str, history: &[Turn]) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".into()));
        }
        debug!(state = ?QueryState::Received, history_turns = history.len(), "question received");

        let index = self.active_index().await?;

        let standalone_question = self.condenser.condense(history, question).await?;
        debug!(state = ?QueryState::QueryContextualized, standalone = %standalone_question, "query contextualized");

        let results = self.retrieve(&index, &standalone_question).await?;
        debug!(state = ?QueryState::Retrieved, result_count = results.len(), "passages retrieved");

        let text = self.generate(&standalone_question, &results).await?;
        debug!(state = ?QueryState::Generated, answer_len = text.len(), "answer generated");

        Ok(Answer {
            text,
            cited_chunks: results.into_iter().map(|r| r.chunk).collect(),
            standalone_question,
        })
    }

    /// Embed the query and fetch the top-k passages.
    pub async fn retrieve(&self, index: &VectorIndex, query: &str) -> Result<Vec<SearchResult>> {
        let timeout = self.config.provider_timeout();
        let query_embedding =
            embed_with_timeout(self.embedding_provider.as_ref(), query, timeout).await?;

        let results = index.search(&query_embedding, self.config.top_k)?;
        let results = match self.config.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };
        Ok(results)
    }

    async fn generate(&self, question: &str, results: &[SearchResult]) -> Result<String> {
        let prompt = PromptBuilder::answer(question, results);
        let raw = generate_with_timeout(
            self.generation_provider.as_ref(),
            &prompt,
            self.config.provider_timeout(),
        )
        .await?;

        let text = raw.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }
        if results.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }
        Err(RagError::GenerationError {
            provider: self.generation_provider.name().to_string(),
            message: "model returned an empty answer".into(),
        })
    }

    async fn active_index(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.index.read().await.clone() {
            return Ok(index);
        }
        self.open_index(&self.index_location).await
    }

    async fn open_checked(&self, location: &Path) -> Result<VectorIndex> {
        let index = VectorIndex::open(location).await?;
        index.ensure_compatible(&self.embedding_provider.signature())?;
        Ok(index)
    }
}

/// Builder for constructing a [`ConversationalRag`].
///
/// Both providers are required. The configuration defaults to
/// [`RagConfig::default`], the condenser to an [`LlmCondenser`] over the
/// generation provider, and the index location to [`DEFAULT_INDEX_DIR`].
#[derive(Default)]
pub struct ConversationalRagBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    condenser: Option<Arc<dyn QueryCondenser>>,
    index_location: Option<PathBuf>,
}

impl ConversationalRagBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Replace the default model-backed query condenser.
    pub fn condenser(mut self, condenser: Arc<dyn QueryCondenser>) -> Self {
        self.condenser = Some(condenser);
        self
    }

    /// Set where [`ConversationalRag::ask`] opens the index from.
    pub fn index_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.index_location = Some(location.into());
        self
    }

    /// Build the [`ConversationalRag`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a provider is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<ConversationalRag> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let condenser = self.condenser.unwrap_or_else(|| {
            Arc::new(LlmCondenser::new(Arc::clone(&generation_provider), config.provider_timeout()))
        });

        Ok(ConversationalRag {
            config,
            embedding_provider,
            generation_provider,
            condenser,
            index_location: self.index_location.unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_DIR)),
            index: RwLock::new(None),
        })
    }
}
