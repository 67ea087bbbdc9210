//! # bookqa-rag
//!
//! Conversational question answering over a single reference book.
//!
//! The crate covers the retrieval-augmented generation core:
//!
//! - [`load_document`] reads a paginated source and [`normalize`]s its text
//! - [`RecursiveChunker`] cuts pages into overlapping chunks with page provenance
//! - [`VectorIndex`] embeds and persists chunks, and answers cosine top-k searches
//! - [`ConversationalRag`] condenses follow-ups against a caller-owned
//!   [`ConversationMemory`], retrieves passages and asks the model for a
//!   grounded [`Answer`]
//!
//! Embedding and generation backends plug in through [`EmbeddingProvider`]
//! and [`GenerationProvider`]. OpenAI-compatible implementations live in
//! [`openai`] behind the `openai` feature.
//!
//! ## Features
//!
//! - `pdf` (default): PDF loading via `lopdf`
//! - `openai`: OpenAI-compatible embedding and chat providers
//! - `full`: everything

pub mod chunking;
pub mod condense;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod memory;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod source;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker, TextSpan, chunk_document};
pub use condense::{LlmCondenser, QueryCondenser, RuleBasedCondenser};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, ChunkMetadata, EmbeddedChunk, Page, SearchResult, SourceDocument};
pub use embedding::{EmbeddingProvider, EmbeddingSignature};
pub use error::{RagError, Result};
pub use generation::GenerationProvider;
pub use index::{BuildOptions, IndexManifest, VectorIndex, cosine_similarity, rank_by_cosine};
pub use memory::{ConversationMemory, Role, Turn};
pub use normalize::{normalize, normalize_bytes, normalize_utf16};
pub use pipeline::{
    Answer, ConversationalRag, ConversationalRagBuilder, DEFAULT_INDEX_DIR, IndexStatus,
    QueryState, ingest,
};
pub use prompt::{NO_CONTEXT_ANSWER, PromptBuilder};
pub use source::{load_document, paginate_text};
