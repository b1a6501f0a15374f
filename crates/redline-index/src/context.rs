//! Contextualized embedding text generation.
//!
//! Embedding raw code alone gives poor retrieval quality. Prepending
//! file path, unit descriptor, and language tag improves results for
//! file- and symbol-level queries derived from diffs.

use crate::chunker::Chunk;

/// Generate text optimized for embedding (not for display).
#[must_use]
pub fn contextualize_for_embedding(chunk: &Chunk) -> String {
    let mut text = String::with_capacity(chunk.text.len() + 128);

    text.push_str("# ");
    text.push_str(&chunk.file_path);
    text.push('\n');

    text.push_str("# Unit: ");
    text.push_str(chunk.unit_type.id());
    text.push(' ');
    text.push_str(&chunk.name);
    text.push('\n');

    text.push_str("# Language: ");
    text.push_str(chunk.language.id());
    text.push('\n');

    text.push_str(&chunk.text);
    text
}
