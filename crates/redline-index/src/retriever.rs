//! Retrieval orchestration: diff text in, assembled context out.
//!
//! Thin coordinator over the pure pieces. The only suspension points
//! are the embedding batch call and the per-query Qdrant searches.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;

use redline_llm::provider::LlmProvider;

use crate::assembler::{AssembleConfig, AssembledContext, assemble};
use crate::diff;
use crate::error::{IndexError, Result};
use crate::store::{ChunkStore, RetrievedResult};

/// Vector-store searches in flight at once.
pub const MAX_CONCURRENT_SEARCHES: usize = 4;

/// Retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Results requested per generated query.
    pub top_k: usize,
    pub assemble: AssembleConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            assemble: AssembleConfig::default(),
        }
    }
}

/// Coordinates diff analysis, embedding, search, and assembly.
pub struct ContextRetriever<P> {
    store: ChunkStore,
    provider: Arc<P>,
    config: RetrievalConfig,
}

impl<P: LlmProvider> ContextRetriever<P> {
    #[must_use]
    pub fn new(store: ChunkStore, provider: Arc<P>, config: RetrievalConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Retrieve and assemble context for one diff submission.
    ///
    /// A diff with no extractable signal yields the empty-context
    /// placeholder, not an error. A failed embedding batch is fatal; a
    /// failed individual search degrades to zero results for that query.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] if the embedding batch fails.
    pub async fn retrieve_for_diff(&self, diff_text: &str) -> Result<AssembledContext> {
        let analysis = diff::parse(diff_text);
        let queries = diff::generate_queries(&analysis);

        if queries.is_empty() {
            tracing::debug!("diff produced no search queries");
            return Ok(assemble(&[], &self.config.assemble));
        }

        tracing::debug!(count = queries.len(), "running retrieval queries");

        let embeddings = self
            .provider
            .embed_batch(&queries)
            .await
            .map_err(IndexError::Embedding)?;

        // Bounded concurrency; `buffered` preserves query order so the
        // dedup-by-id merge below is deterministic.
        let per_query: Vec<Vec<RetrievedResult>> =
            futures::stream::iter(embeddings.into_iter().enumerate().map(|(i, vector)| {
                let store = &self.store;
                let top_k = self.config.top_k;
                async move {
                    match store.search(vector, top_k, None).await {
                        Ok(hits) => hits,
                        Err(e) => {
                            tracing::warn!(query_index = i, error = %e, "search failed, treating as empty");
                            Vec::new()
                        }
                    }
                }
            }))
            .buffered(MAX_CONCURRENT_SEARCHES)
            .collect()
            .await;

        let merged = merge_results(per_query);
        Ok(assemble(&merged, &self.config.assemble))
    }
}

/// Merge per-query result lists in query order, deduplicating by id and
/// keeping the first occurrence.
#[must_use]
pub fn merge_results(groups: Vec<Vec<RetrievedResult>>) -> Vec<RetrievedResult> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for group in groups {
        for result in group {
            if seen.insert(result.id.clone()) {
                merged.push(result);
            }
        }
    }
    merged
}
