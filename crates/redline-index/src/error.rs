//! Error types for redline-index.

/// Errors that can occur during indexing and retrieval operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source that cannot be parsed by the grammar-aware extractor.
    #[error("parse failed at {}", format_location(.line, .column))]
    Parse { line: usize, column: Option<usize> },

    /// Unsupported or unrecognized language. Expected for non-source
    /// files; callers that skip them must not log this as a failure.
    #[error("unsupported language")]
    UnsupportedLanguage,

    /// Embedding request failed. Fatal for the current retrieval or
    /// indexing batch.
    #[error("embedding failed: {0}")]
    Embedding(#[source] redline_llm::LlmError),

    /// LLM provider error outside the embedding path.
    #[error("LLM error: {0}")]
    Llm(#[from] redline_llm::LlmError),

    /// Qdrant vector store error.
    #[error("vector store error: {0}")]
    Store(#[from] Box<qdrant_client::QdrantError>),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

fn format_location(line: &usize, column: &Option<usize>) -> String {
    match column {
        Some(col) => format!("line {line}, column {col}"),
        None => format!("line {line}"),
    }
}

impl From<qdrant_client::QdrantError> for IndexError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Self::Store(Box::new(err))
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
