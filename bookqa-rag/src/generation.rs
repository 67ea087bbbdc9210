//! Generation provider trait for producing text from a prompt.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A language model that turns a prompt into text.
///
/// Implementations must report failures as
/// [`RagError::GenerationError`](crate::RagError::GenerationError); backend
/// error types never cross this boundary.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Provider name used in logs and error messages.
    fn name(&self) -> &str;
}

/// Run [`GenerationProvider::generate`] under a deadline.
///
/// An elapsed deadline is reported as [`RagError::GenerationError`].
pub(crate) async fn generate_with_timeout(
    provider: &dyn GenerationProvider,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, provider.generate(prompt)).await.map_err(|_| {
        RagError::GenerationError {
            provider: provider.name().to_string(),
            message: format!("no response within {}s", timeout.as_secs()),
        }
    })?
}
