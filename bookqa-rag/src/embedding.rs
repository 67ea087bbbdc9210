//! Embedding provider trait for generating vector embeddings from text.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use bookqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identifier of the model (and version) behind this provider.
    ///
    /// Recorded in the index manifest; an index is only usable with a
    /// provider reporting the same identifier and dimensions.
    fn model_id(&self) -> &str;

    /// The model/dimension pair identifying vectors from this provider.
    fn signature(&self) -> EmbeddingSignature {
        EmbeddingSignature { model: self.model_id().to_string(), dimensions: self.dimensions() }
    }
}

/// Identifies the vector space an index was built in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingSignature {
    /// Embedding model identifier.
    pub model: String,
    /// Vector dimensionality.
    pub dimensions: usize,
}

impl fmt::Display for EmbeddingSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}d)", self.model, self.dimensions)
    }
}

/// Run [`EmbeddingProvider::embed_batch`] under a deadline.
///
/// An elapsed deadline is reported as [`RagError::EmbeddingError`] so callers
/// never hang on an unresponsive provider.
pub(crate) async fn embed_batch_with_timeout(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>> {
    tokio::time::timeout(timeout, provider.embed_batch(texts)).await.map_err(|_| {
        RagError::EmbeddingError {
            provider: provider.model_id().to_string(),
            message: format!("no response within {}s", timeout.as_secs()),
        }
    })?
}

/// Run [`EmbeddingProvider::embed`] under a deadline.
pub(crate) async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    tokio::time::timeout(timeout, provider.embed(text)).await.map_err(|_| {
        RagError::EmbeddingError {
            provider: provider.model_id().to_string(),
            message: format!("no response within {}s", timeout.as_secs()),
        }
    })?
}
