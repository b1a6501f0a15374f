//! Code chunking, diff analysis, and semantic retrieval.
//!
//! The retrieval-augmentation pipeline for redline reviews: source files
//! are split into semantically coherent chunks and stored in Qdrant with
//! their embeddings; a unified diff is decomposed into changed regions
//! and search queries; retrieved chunks are ranked, budget-packed, and
//! rendered into a context string for the review prompt.

pub mod assembler;
pub mod chunker;
pub(crate) mod context;
pub mod diff;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod retriever;
pub mod store;

pub use error::{IndexError, Result};
