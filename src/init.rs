//! Wiring: configuration values into providers and stores.

use std::path::Path;

use anyhow::{Context, bail};

use redline_core::config::Config;
use redline_index::assembler::AssembleConfig;
use redline_index::retriever::RetrievalConfig;
use redline_index::store::ChunkStore;
use redline_llm::any::AnyProvider;
use redline_llm::compatible::CompatibleProvider;
use redline_llm::ollama::OllamaProvider;

/// Build the configured LLM provider.
///
/// # Errors
///
/// Returns an error for an unknown provider name.
pub fn build_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider.as_str() {
        "ollama" => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        ))),
        "compatible" | "openai" => Ok(AnyProvider::Compatible(CompatibleProvider::new(
            llm.provider.clone(),
            llm.api_key.clone(),
            llm.base_url.clone(),
            llm.model.clone(),
            Some(llm.embedding_model.clone()),
            llm.temperature,
        ))),
        other => bail!("unknown llm provider {other:?} (expected \"ollama\" or \"compatible\")"),
    }
}

/// Build the chunk store for the selected collection.
///
/// # Errors
///
/// Returns an error if the Qdrant client cannot be constructed.
pub fn build_store(config: &Config, collection: Option<&str>) -> anyhow::Result<ChunkStore> {
    let name = collection.unwrap_or(&config.index.collection);
    ChunkStore::connect(&config.qdrant.url, name)
        .with_context(|| format!("failed to connect to Qdrant at {}", config.qdrant.url))
}

#[must_use]
pub fn retrieval_config(config: &Config) -> RetrievalConfig {
    RetrievalConfig {
        top_k: config.retrieval.top_k,
        assemble: AssembleConfig {
            max_chars: config.retrieval.max_context_chars,
            include_metadata: true,
        },
    }
}

/// Read the diff from a file, or from stdin when no path is given.
///
/// # Errors
///
/// Returns an error if reading fails.
pub async fn read_diff(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read diff from {}", path.display())),
        None => {
            use tokio::io::AsyncReadExt;
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("failed to read diff from stdin")?;
            Ok(buffer)
        }
    }
}
