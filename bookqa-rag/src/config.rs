//! Configuration for indexing and question answering.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::BuildOptions;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks of a page.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Results scoring below this cosine similarity are dropped.
    pub similarity_threshold: Option<f32>,
    /// Chunks per embedding request while building the index.
    pub embed_batch_size: usize,
    /// Embedding requests in flight while building the index.
    pub embed_concurrency: usize,
    /// Deadline for any single provider call, in seconds.
    pub provider_timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            similarity_threshold: None,
            embed_batch_size: 32,
            embed_concurrency: 4,
            provider_timeout_secs: 60,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Deadline applied to embedding and generation calls.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Options for the embedding phase of an index build.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            batch_size: self.embed_batch_size,
            concurrency: self.embed_concurrency,
            timeout: self.provider_timeout(),
        }
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".into()));
        }
        if self.embed_batch_size == 0 || self.embed_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size and embed_concurrency must be greater than zero".into(),
            ));
        }
        if self.provider_timeout_secs == 0 {
            return Err(RagError::ConfigError("provider_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity for retrieved passages.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the number of chunks per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the number of concurrent embedding requests during a build.
    pub fn embed_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embed_concurrency = concurrency;
        self
    }

    /// Set the provider call deadline.
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout_secs = timeout.as_secs();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size`, `embed_concurrency` or the timeout is zero
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
