//! LLM chat and embedding providers for redline.
//!
//! One `LlmProvider` trait covers both sides of the pipeline: chat
//! completions for review generation and embeddings for indexing and
//! retrieval. Concrete providers are Ollama (the default local backend)
//! and any OpenAI-compatible HTTP endpoint.

pub mod any;
pub mod compatible;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::{LlmError, Result};
