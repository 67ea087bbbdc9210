use std::path::PathBuf;

use bookqa_rag::DEFAULT_INDEX_DIR;
use bookqa_rag::openai::{GROQ_BASE_URL, OPENAI_BASE_URL};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bookqa", version, about = "Ask questions about a book, conversationally")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the vector index.
    #[arg(long, global = true, env = "BOOKQA_INDEX", default_value = DEFAULT_INDEX_DIR)]
    pub index: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the index from the source book, or reuse the one already there.
    Ingest(IngestArgs),
    /// Answer a single question.
    Ask(AskArgs),
    /// Start an interactive conversation.
    Chat(ChatArgs),
    /// Delete the index.
    Clear,
    /// Show what the index was built from.
    Info,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// The book to index (PDF, or text with form-feed page breaks).
    #[arg(long, env = "BOOKQA_SOURCE", default_value = "mlbook.pdf")]
    pub source: PathBuf,

    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Chunks per embedding request.
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Embedding requests in flight.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    #[command(flatten)]
    pub providers: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    pub question: String,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[command(flatten)]
    pub providers: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[command(flatten)]
    pub providers: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Passages retrieved per question.
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Drop passages scoring below this cosine similarity.
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Print the retrieved passages under each answer.
    #[arg(long, default_value_t = false)]
    pub sources: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    #[arg(long, env = "BOOKQA_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    /// Required when the model does not produce 1536-dimensional vectors.
    #[arg(long, env = "BOOKQA_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    #[arg(long, env = "BOOKQA_EMBEDDING_BASE_URL", default_value = OPENAI_BASE_URL)]
    pub embedding_base_url: String,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub generation_api_key: Option<String>,

    #[arg(long, env = "BOOKQA_GENERATION_MODEL", default_value = "llama-3.1-8b-instant")]
    pub generation_model: String,

    #[arg(long, env = "BOOKQA_GENERATION_BASE_URL", default_value = GROQ_BASE_URL)]
    pub generation_base_url: String,

    #[arg(long, env = "BOOKQA_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    /// Seconds to wait for any single provider call.
    #[arg(long, env = "BOOKQA_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,
}
