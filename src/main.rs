//! redline: retrieval-augmented code review for local LLMs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use redline_core::config::Config;
use redline_core::review;
use redline_index::indexer::CodeIndexer;
use redline_index::retriever::ContextRetriever;

mod init;

#[derive(Parser)]
#[command(name = "redline", version, about = "Retrieval-augmented code review for local LLMs")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "redline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a project tree into the vector store.
    Index {
        /// Project root to index.
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Collection to index into (overrides config).
        #[arg(long)]
        collection: Option<String>,
    },
    /// Review a diff with retrieved context. Reads stdin unless --diff is given.
    Review {
        /// Read the diff from a file instead of stdin.
        #[arg(long)]
        diff: Option<PathBuf>,
        /// Collection to search (overrides config).
        #[arg(long)]
        collection: Option<String>,
        /// Print the assembled context instead of calling the LLM.
        #[arg(long)]
        context_only: bool,
    },
    /// Manage redline collections in Qdrant.
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
}

#[derive(Subcommand)]
enum CollectionsAction {
    /// List this tool's collections.
    List,
    /// Delete a collection by name.
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Index { path, collection } => {
            let provider = Arc::new(init::build_provider(&config)?);
            let store = init::build_store(&config, collection.as_deref())?;
            let indexer = CodeIndexer::new(store, provider);

            let report = indexer
                .index_project(&path)
                .await
                .context("indexing failed")?;

            println!(
                "indexed {} files ({} chunks) in {} ms; {} skipped, {} errors",
                report.files_indexed,
                report.chunks_created,
                report.duration_ms,
                report.files_skipped,
                report.errors.len(),
            );
            for error in &report.errors {
                eprintln!("  {error}");
            }
        }
        Command::Review {
            diff,
            collection,
            context_only,
        } => {
            let diff_text = init::read_diff(diff.as_deref()).await?;
            let provider = Arc::new(init::build_provider(&config)?);
            let store = init::build_store(&config, collection.as_deref())?;
            let retriever = ContextRetriever::new(
                store,
                Arc::clone(&provider),
                init::retrieval_config(&config),
            );

            let context = retriever
                .retrieve_for_diff(&diff_text)
                .await
                .context("context retrieval failed")?;

            if context_only {
                println!("{}", context.text);
                return Ok(());
            }

            let result = review::run_review(provider.as_ref(), &diff_text, &context).await?;
            println!("{result}");
        }
        Command::Collections { action } => {
            let store = init::build_store(&config, None)?;
            match action {
                CollectionsAction::List => {
                    for name in store.list_collections().await? {
                        println!("{name}");
                    }
                }
                CollectionsAction::Delete { name } => {
                    store.delete_collection(&name).await?;
                    println!("deleted {name}");
                }
            }
        }
    }

    Ok(())
}
