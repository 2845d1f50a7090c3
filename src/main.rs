//! # docqa CLI
//!
//! Commands for syncing a local document directory into the vector index,
//! querying it, and serving the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./docqa.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa sync` | Incrementally sync the docs directory into the index |
//! | `docqa search "<query>"` | Similarity search over indexed chunks |
//! | `docqa qa "<question>"` | Answer a question from the indexed documents |
//! | `docqa status` | Completeness check (local files vs indexed chunks) |
//! | `docqa serve` | Start the HTTP API |

mod chunk;
mod config;
mod embedding;
mod hash_store;
mod index;
mod jobs;
mod llm;
mod loader;
mod query;
mod server;
mod sync;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::embedding::EmbeddingClient;
use crate::llm::ChatClient;

/// Local-first document ingestion, semantic search, and grounded Q&A.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Local-first document ingestion, semantic search, and grounded Q&A",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the documents directory into the vector index.
    ///
    /// Hashes every supported file, diffs against the previous sync,
    /// re-embeds changed documents, prunes deleted ones, and persists the
    /// new hash map. Blocks until the sync finishes.
    Sync,

    /// Search indexed chunks by similarity.
    Search {
        /// The search query string.
        query: String,

        /// Number of results to return.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question using retrieved context.
    ///
    /// Retrieves the top chunks, asks the language model to answer from
    /// them alone, and retries once with a wider context window when the
    /// first answer looks insufficient.
    Qa {
        /// The question to answer.
        question: String,
    },

    /// Report whether the index looks complete for the docs directory.
    Status,

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync => {
            let embedder = EmbeddingClient::new(&cfg.embedding)?;
            sync::run_sync(&cfg, &embedder).await?;
            sync::check_completeness(&cfg).await?;
        }
        Commands::Search { query, k } => {
            let embedder = EmbeddingClient::new(&cfg.embedding)?;
            let results = query::run_search(&cfg, &embedder, &query, k).await?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} #{}",
                    i + 1,
                    result.score,
                    result.path,
                    result.chunk_index
                );
                println!(
                    "    excerpt: \"{}\"",
                    truncate_chars(&result.text, 240).replace('\n', " ")
                );
                println!();
            }
        }
        Commands::Qa { question } => {
            let embedder = EmbeddingClient::new(&cfg.embedding)?;
            let llm = ChatClient::new(&cfg.llm)?;
            let answer = query::run_answer(&cfg, &embedder, &llm, &question).await?;
            println!("{}", answer);
        }
        Commands::Status => {
            sync::check_completeness(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
