//! `bookqa`: conversational question answering over a single book.
//!
//! ```text
//! bookqa ingest --source mlbook.pdf
//! bookqa ask "What is overfitting?" --sources
//! bookqa chat
//! ```
//!
//! Provider keys are read from the environment (`OPENAI_API_KEY` for
//! embeddings, `GROQ_API_KEY` for generation) or a `.env` file.

mod cli;
mod commands;
mod repl;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = commands::run(cli).await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,bookqa=debug,bookqa_rag=debug"
    } else {
        "warn,bookqa=info,bookqa_rag=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
