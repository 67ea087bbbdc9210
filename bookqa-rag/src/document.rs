//! Data types for source documents, chunks, and search results.

use serde::{Deserialize, Serialize};

/// One page of extracted source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number within the source document.
    pub number: u32,
    /// The normalized text of the page.
    pub text: String,
}

impl Page {
    /// Create a page from its number and text.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self { number, text: text.into() }
    }
}

/// A paginated source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDocument {
    /// Identifier recorded as `source_id` on every chunk (usually the file name).
    pub id: String,
    /// Pages in reading order.
    pub pages: Vec<Page>,
}

impl SourceDocument {
    /// Create a document from an identifier and its pages.
    pub fn new(id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self { id: id.into(), pages }
    }

    /// Whether no page carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// Provenance of a [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// The [`SourceDocument`] the chunk was cut from.
    pub source_id: String,
    /// Page the chunk text comes from.
    pub page_number: u32,
    /// Character offset of the chunk start within its page.
    pub offset: usize,
}

/// A bounded span of document text with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Unique identifier, `{source_id}_{index}`, where `index` counts chunks
    /// across the whole document.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Where the text came from.
    pub metadata: ChunkMetadata,
}

/// A [`Chunk`] together with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// The vector embedding of the chunk text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
