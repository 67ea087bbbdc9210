//! Error types for the `bookqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while indexing a book or answering questions about it.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied unusable input, such as an empty question.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The source document does not exist.
    #[error("Source document not found at: {}", path.display())]
    SourceNotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The source document exists but could not be read or parsed.
    #[error("Failed to read source document {}: {message}", path.display())]
    SourceError {
        /// The path of the source document.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Writing or reading the persisted index failed.
    #[error("Index storage error at {}: {message}", location.display())]
    Storage {
        /// The index location involved.
        location: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// No index has been built at the given location.
    #[error("Vector index not found at {}; build it first", location.display())]
    NotFound {
        /// The location that was expected to hold an index.
        location: PathBuf,
    },

    /// The persisted index was built with a different embedding model or dimension.
    #[error("Embedding mismatch: index was built with {expected}, provider is {found}; clear the index to rebuild")]
    EmbeddingMismatch {
        /// The signature recorded in the index manifest.
        expected: String,
        /// The signature of the active provider.
        found: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating text.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Whether the error came from an external provider rather than from
    /// configuration or stored state.
    ///
    /// Transient errors leave the session untouched, so the same turn can be
    /// retried as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EmbeddingError { .. } | Self::GenerationError { .. })
    }

    pub(crate) fn storage(location: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Storage { location: location.into(), message: message.to_string() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
