use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bookqa_rag::openai::{OpenAiChatProvider, OpenAiEmbeddingProvider};
use bookqa_rag::{
    Answer, ConversationMemory, ConversationalRag, IndexStatus, RagConfig, VectorIndex, ingest,
};
use tracing::info;

use crate::cli::{AskArgs, ChatArgs, Cli, Commands, IngestArgs, ProviderArgs, RetrievalArgs};
use crate::repl;

/// Longest excerpt printed per source passage.
const EXCERPT_CHARS: usize = 240;

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest(args) => ingest_source(&cli.index, args).await,
        Commands::Ask(args) => ask(&cli.index, args).await,
        Commands::Chat(args) => chat(&cli.index, args).await,
        Commands::Clear => clear(&cli.index).await,
        Commands::Info => show_info(&cli.index).await,
    }
}

async fn ingest_source(index: &Path, args: IngestArgs) -> Result<()> {
    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .embed_batch_size(args.batch_size)
        .embed_concurrency(args.concurrency)
        .provider_timeout(Duration::from_secs(args.providers.timeout_secs))
        .build()?;
    let embedder = embedder(&args.providers)?;

    let (_, status) = ingest(&args.source, index, &config, &embedder).await?;
    match status {
        IndexStatus::Built { chunk_count } => {
            println!(
                "Indexed {} into {} chunks at {}",
                args.source.display(),
                chunk_count,
                index.display()
            );
        }
        IndexStatus::Reused { chunk_count } => {
            println!(
                "Index at {} already holds {} chunks; run `bookqa clear` to rebuild it",
                index.display(),
                chunk_count
            );
        }
    }
    Ok(())
}

async fn ask(index: &Path, args: AskArgs) -> Result<()> {
    let rag = build_rag(query_config(&args.retrieval, &args.providers)?, &args.providers, index)?;
    let mut memory = ConversationMemory::new();
    let answer = rag.ask(&args.question, &mut memory).await?;
    print_answer(&answer, args.retrieval.sources);
    Ok(())
}

async fn chat(index: &Path, args: ChatArgs) -> Result<()> {
    let rag = build_rag(query_config(&args.retrieval, &args.providers)?, &args.providers, index)?;
    let index = rag
        .open_index(index)
        .await
        .with_context(|| format!("run `bookqa ingest` to build the index at {}", index.display()))?;
    info!(chunk_count = index.len(), "index loaded");
    repl::run(&rag, args.retrieval.sources).await
}

async fn clear(index: &Path) -> Result<()> {
    VectorIndex::clear(index).await?;
    println!("Removed index at {}", index.display());
    Ok(())
}

async fn show_info(index: &Path) -> Result<()> {
    let index = VectorIndex::open(index).await?;
    let manifest = index.manifest();
    println!("Location:   {}", index.location().display());
    println!("Source:     {}", manifest.source_id);
    println!("Embedding:  {}", manifest.embedding);
    println!("Chunks:     {}", manifest.chunk_count);
    println!("Built:      {}", manifest.created_at.to_rfc3339());
    Ok(())
}

fn query_config(retrieval: &RetrievalArgs, providers: &ProviderArgs) -> Result<RagConfig> {
    let mut builder = RagConfig::builder()
        .top_k(retrieval.top_k)
        .provider_timeout(Duration::from_secs(providers.timeout_secs));
    if let Some(threshold) = retrieval.threshold {
        builder = builder.similarity_threshold(threshold);
    }
    Ok(builder.build()?)
}

fn embedder(providers: &ProviderArgs) -> Result<OpenAiEmbeddingProvider> {
    let Some(key) = providers.embedding_api_key.as_deref() else {
        bail!("an embedding API key is required (set OPENAI_API_KEY or --embedding-api-key)");
    };
    let mut embedder = OpenAiEmbeddingProvider::new(key)?
        .with_model(&providers.embedding_model)
        .with_base_url(&providers.embedding_base_url);
    if let Some(dimensions) = providers.embedding_dimensions {
        embedder = embedder.with_dimensions(dimensions);
    }
    Ok(embedder)
}

fn chat_model(providers: &ProviderArgs) -> Result<OpenAiChatProvider> {
    let Some(key) = providers.generation_api_key.as_deref() else {
        bail!("a generation API key is required (set GROQ_API_KEY or --generation-api-key)");
    };
    Ok(OpenAiChatProvider::new(key, &providers.generation_base_url)?
        .with_model(&providers.generation_model)
        .with_temperature(providers.temperature))
}

fn build_rag(config: RagConfig, providers: &ProviderArgs, index: &Path) -> Result<ConversationalRag> {
    let embedder = embedder(providers)?;
    let llm = chat_model(providers)?;

    Ok(ConversationalRag::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .generation_provider(Arc::new(llm))
        .index_location(index)
        .build()?)
}

pub fn print_answer(answer: &Answer, with_sources: bool) {
    println!("{}", answer.text);
    if !with_sources || answer.cited_chunks.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, chunk) in answer.cited_chunks.iter().enumerate() {
        println!("  [{}] page {}: {}", i + 1, chunk.metadata.page_number, excerpt(&chunk.text));
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}
