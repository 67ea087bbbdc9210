//! Deterministic providers and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bookqa_rag::{EmbeddingProvider, GenerationProvider, RagError};

const VOCABULARY: &[&str] = &[
    "overfitting",
    "regularization",
    "prevent",
    "gradient",
    "descent",
    "forest",
    "tree",
    "neural",
    "network",
    "data",
];

/// Embeds text as keyword counts over a small vocabulary, so similar topics
/// land close together. Records every single-text query.
pub struct KeywordEmbeddingProvider {
    model: String,
    queries: Mutex<Vec<String>>,
}

impl KeywordEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_model("keyword-v1")
    }

    pub fn with_model(model: &str) -> Self {
        Self { model: model.to_string(), queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCABULARY.iter().map(|word| lower.matches(word).count() as f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddingProvider {
    async fn embed(&self, text: &str) -> bookqa_rag::Result<Vec<f32>> {
        self.queries.lock().unwrap().push(text.to_string());
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> bookqa_rag::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Deterministic hash-based embeddings of any dimension.
pub struct HashEmbeddingProvider {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> bookqa_rag::Result<Vec<f32>> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "hash-v1"
    }
}

/// Declares one dimension but returns another.
pub struct WrongDimensionProvider;

#[async_trait]
impl EmbeddingProvider for WrongDimensionProvider {
    async fn embed(&self, _text: &str) -> bookqa_rag::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_id(&self) -> &str {
        "broken"
    }
}

/// Replies to condense prompts and answer prompts with fixed text and keeps
/// every prompt it was sent.
pub struct ScriptedGenerator {
    condense_reply: String,
    answer_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(condense_reply: &str, answer_reply: &str) -> Self {
        Self {
            condense_reply: condense_reply.to_string(),
            answer_reply: answer_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answer_reply: &str) -> Self {
        Self::new("", answer_reply)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> bookqa_rag::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("Standalone question:") {
            Ok(self.condense_reply.clone())
        } else {
            Ok(self.answer_reply.clone())
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Always fails, as an unreachable provider would.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> bookqa_rag::Result<String> {
        Err(RagError::GenerationError {
            provider: "failing".into(),
            message: "service unavailable".into(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Never answers within any reasonable deadline.
pub struct StalledGenerator;

#[async_trait]
impl GenerationProvider for StalledGenerator {
    async fn generate(&self, _prompt: &str) -> bookqa_rag::Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".into())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

/// Write a small four-page book to `dir` and return its path.
pub fn write_book(dir: &Path) -> PathBuf {
    let pages = [
        "Overfitting happens when a model learns the noise in its training data instead of \
         the signal. An overfitting model scores well on training data and poorly on new data.",
        "Regularization is the main way to prevent overfitting. Constraining the weights, \
         gathering more data and early stopping all prevent overfitting.",
        "Gradient descent tweaks parameters iteratively to minimize a cost function. \
         The learning rate controls the step size of gradient descent.",
        "A random forest is an ensemble of decision tree models trained on random subsets.",
    ];
    let path = dir.join("mlbook.txt");
    std::fs::write(&path, pages.join("\x0c")).unwrap();
    path
}
