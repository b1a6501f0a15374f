//! Project indexing orchestrator: walk → chunk → embed → store.

use std::path::Path;
use std::sync::Arc;

use redline_llm::provider::LlmProvider;

use crate::chunker::{Chunk, extract_chunks};
use crate::context::contextualize_for_embedding;
use crate::error::{IndexError, Result};
use crate::languages::detect_language;
use crate::store::ChunkStore;

/// Chunks embedded per provider request.
pub const EMBED_BATCH_SIZE: usize = 10;

/// Summary of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    /// Files with unsupported extensions. Expected, not errors.
    pub files_skipped: usize,
    pub chunks_created: usize,
    /// Per-file failures (parse errors, unreadable files).
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Orchestrates code indexing over a project tree.
pub struct CodeIndexer<P> {
    store: ChunkStore,
    provider: Arc<P>,
}

impl<P: LlmProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(store: ChunkStore, provider: Arc<P>) -> Self {
        Self { store, provider }
    }

    /// Index every supported file under `root`.
    ///
    /// A file that fails to parse is counted and skipped; the run
    /// continues. An embedding batch failure aborts the remaining
    /// batches, since a partial index with silent gaps is worse than a
    /// clear failure. Work already upserted is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding probe, collection setup, an
    /// embedding batch, or a Qdrant upsert fails.
    pub async fn index_project(&self, root: &Path) -> Result<IndexReport> {
        let start = std::time::Instant::now();
        let mut report = IndexReport::default();

        let probe = self
            .provider
            .embed("probe")
            .await
            .map_err(IndexError::Embedding)?;
        let vector_size = u64::try_from(probe.len())
            .map_err(|e| IndexError::Other(format!("embedding width overflow: {e}")))?;
        self.store.ensure_collection(vector_size).await?;

        let entries: Vec<_> = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .collect();

        let total = entries.len();
        tracing::info!(total, "indexing started");

        let mut pending: Vec<Chunk> = Vec::new();

        for entry in &entries {
            report.files_scanned += 1;
            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            let Some(lang) = detect_language(entry.path()) else {
                report.files_skipped += 1;
                continue;
            };

            let source = match tokio::fs::read_to_string(entry.path()).await {
                Ok(source) => source,
                Err(e) => {
                    report.errors.push(format!("{rel_path}: {e}"));
                    continue;
                }
            };

            match extract_chunks(&source, &rel_path, lang) {
                Ok(chunks) => {
                    if !chunks.is_empty() {
                        report.files_indexed += 1;
                        tracing::debug!(file = %rel_path, chunks = chunks.len(), "chunked");
                        pending.extend(chunks);
                    }
                }
                Err(e) => {
                    report.errors.push(format!("{rel_path}: {e}"));
                }
            }
        }

        for batch in pending.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(contextualize_for_embedding).collect();
            let vectors = self
                .provider
                .embed_batch(&texts)
                .await
                .map_err(IndexError::Embedding)?;

            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }

            report.chunks_created += self.store.upsert_chunks(batch).await?;
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            files = report.files_indexed,
            chunks = report.chunks_created,
            errors = report.errors.len(),
            "indexing finished"
        );
        Ok(report)
    }
}
