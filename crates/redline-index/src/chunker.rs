//! Chunk extraction: grammar-aware Elixir path plus fixed-window fallback.
//!
//! Elixir sources are parsed with tree-sitter and split at top-level
//! definitions (`defmodule`, `def`, `defp`). Every other declared
//! language is split into fixed windows of [`WINDOW_LINES`] lines with
//! [`WINDOW_OVERLAP`] lines of overlap.

use tree_sitter::{Node, Parser};

use crate::error::{IndexError, Result};
use crate::languages::Lang;

/// Chunks with less text than this are discarded as noise.
pub const MIN_CHUNK_LEN: usize = 10;
/// Window height for the fallback path.
pub const WINDOW_LINES: usize = 100;
/// Lines shared between consecutive fallback windows.
pub const WINDOW_OVERLAP: usize = 20;

/// Kind of code unit a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Module,
    PublicFunction,
    PrivateFunction,
    Window,
}

impl UnitType {
    /// Identifier used in Qdrant payload and rendered context blocks.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::PublicFunction => "public-function",
            Self::PrivateFunction => "private-function",
            Self::Window => "unstructured-window",
        }
    }

    /// Inverse of [`UnitType::id`], used when decoding stored payloads.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "module" => Some(Self::Module),
            "public-function" => Some(Self::PublicFunction),
            "private-function" => Some(Self::PrivateFunction),
            "unstructured-window" => Some(Self::Window),
            _ => None,
        }
    }
}

/// One chunk of source code with its retrieval metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub unit_type: UnitType,
    pub name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: Lang,
    /// Attached by the indexing stage; absent until then.
    pub embedding: Option<Vec<f32>>,
}

/// Deterministic chunk id over the identity fields.
///
/// Re-extracting unchanged code yields the same id, so Qdrant upserts
/// overwrite instead of accumulating duplicates.
#[must_use]
pub fn chunk_id(file_path: &str, unit_type: UnitType, name: &str, start_line: usize) -> String {
    let key = format!("{file_path}\x00{}\x00{name}\x00{start_line}", unit_type.id());
    let hash = blake3::hash(key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash.as_bytes()[..16]);
    uuid::Uuid::from_bytes(bytes).to_string()
}

/// Extract chunks from one source file.
///
/// Dispatches on the language: Elixir goes through the tree-sitter
/// grammar, every other declared language through the window fallback.
///
/// # Errors
///
/// Returns [`IndexError::Parse`] if the grammar-aware path cannot parse
/// the full text. The window fallback never fails.
pub fn extract_chunks(source: &str, file_path: &str, lang: Lang) -> Result<Vec<Chunk>> {
    match lang.grammar() {
        Some(grammar) => extract_definitions(source, file_path, lang, &grammar),
        None => Ok(extract_windows(source, file_path, lang)),
    }
}

/// Extract chunks for a file path, detecting the language from its
/// extension.
///
/// # Errors
///
/// Returns [`IndexError::UnsupportedLanguage`] for extensions outside
/// the language table. That is the normal outcome for non-source files;
/// callers that skip them must not log it as a failure. Parse errors
/// propagate as in [`extract_chunks`].
pub fn extract_chunks_for_path(source: &str, file_path: &str) -> Result<Vec<Chunk>> {
    let lang = crate::languages::detect_language(std::path::Path::new(file_path))
        .ok_or(IndexError::UnsupportedLanguage)?;
    extract_chunks(source, file_path, lang)
}

struct ExtractCtx<'a> {
    source: &'a str,
    lines: Vec<&'a str>,
    file_path: &'a str,
    lang: Lang,
}

fn extract_definitions(
    source: &str,
    file_path: &str,
    lang: Lang,
    grammar: &tree_sitter::Language,
) -> Result<Vec<Chunk>> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| IndexError::Other(format!("set_language failed: {e}")))?;

    let tree = parser.parse(source, None).ok_or(IndexError::Parse {
        line: 1,
        column: None,
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let node = first_error_node(root).unwrap_or(root);
        let pos = node.start_position();
        return Err(IndexError::Parse {
            line: pos.row + 1,
            column: Some(pos.column + 1),
        });
    }

    let ctx = ExtractCtx {
        source,
        lines: source.lines().collect(),
        file_path,
        lang,
    };
    let mut chunks = Vec::new();
    collect_definitions(&ctx, &root, &mut chunks);
    chunks.retain(|c| c.text.chars().count() >= MIN_CHUNK_LEN);
    Ok(chunks)
}

fn collect_definitions(ctx: &ExtractCtx<'_>, parent: &Node, output: &mut Vec<Chunk>) {
    let child_count = u32::try_from(parent.named_child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        let Some(child) = parent.named_child(i) else {
            continue;
        };
        if child.kind() != "call" {
            continue;
        }
        match call_target(&child, ctx.source) {
            Some("defmodule") => {
                if let Some(chunk) = module_chunk(ctx, &child) {
                    output.push(chunk);
                }
                if let Some(block) = do_block(&child) {
                    collect_definitions(ctx, &block, output);
                }
            }
            Some("def") => {
                if let Some(chunk) = function_chunk(ctx, &child, UnitType::PublicFunction) {
                    output.push(chunk);
                }
            }
            Some("defp") => {
                if let Some(chunk) = function_chunk(ctx, &child, UnitType::PrivateFunction) {
                    output.push(chunk);
                }
            }
            _ => {}
        }
    }
}

fn module_chunk(ctx: &ExtractCtx<'_>, node: &Node) -> Option<Chunk> {
    let name = module_name(node, ctx.source)?;
    Some(make_chunk(ctx, node, UnitType::Module, name))
}

fn function_chunk(ctx: &ExtractCtx<'_>, node: &Node, unit_type: UnitType) -> Option<Chunk> {
    let name = function_name_arity(node, ctx.source)?;
    Some(make_chunk(ctx, node, unit_type, name))
}

fn make_chunk(ctx: &ExtractCtx<'_>, node: &Node, unit_type: UnitType, name: String) -> Chunk {
    let start_line = node.start_position().row + 1;
    let end_line = definition_end_line(ctx, node, start_line);
    let end_line = end_line.max(start_line);
    let text = ctx.lines[start_line - 1..end_line].join("\n");

    Chunk {
        id: chunk_id(ctx.file_path, unit_type, &name, start_line),
        text,
        unit_type,
        name,
        file_path: ctx.file_path.to_string(),
        start_line,
        end_line,
        language: ctx.lang,
        embedding: None,
    }
}

/// End line for a definition node.
///
/// The `do_block` end position is authoritative when the grammar exposes
/// one; definitions without a `do_block` (keyword one-liners) fall back
/// to [`scan_block_end`].
fn definition_end_line(ctx: &ExtractCtx<'_>, node: &Node, start_line: usize) -> usize {
    match do_block(node) {
        Some(block) => block.end_position().row + 1,
        None => {
            let indent = leading_indent(ctx.lines.get(start_line - 1).copied().unwrap_or(""));
            scan_block_end(&ctx.lines, start_line, indent)
        }
    }
}

/// Greedy forward scan for a standalone `end` token at indentation no
/// deeper than the definition's own, starting after `start_line`
/// (1-based). Returns the matching line, or the last line of the file
/// when none is found.
///
/// This is not a balanced-block matcher: a nested block that closes at
/// the same indentation as the definition stops the scan early. Known
/// approximation, covered by boundary tests.
#[must_use]
pub fn scan_block_end(lines: &[&str], start_line: usize, indent: usize) -> usize {
    for (idx, line) in lines.iter().enumerate().skip(start_line) {
        if line.trim() == "end" && leading_indent(line) <= indent {
            return idx + 1;
        }
    }
    lines.len().max(start_line)
}

fn leading_indent(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn call_target<'a>(node: &Node, source: &'a str) -> Option<&'a str> {
    let target = node.child_by_field_name("target")?;
    if target.kind() == "identifier" {
        Some(&source[target.byte_range()])
    } else {
        None
    }
}

fn do_block<'tree>(node: &Node<'tree>) -> Option<Node<'tree>> {
    let child_count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        if let Some(child) = node.child(i)
            && child.kind() == "do_block"
        {
            return Some(child);
        }
    }
    None
}

fn arguments_node<'tree>(node: &Node<'tree>) -> Option<Node<'tree>> {
    let child_count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        if let Some(child) = node.child(i)
            && child.kind() == "arguments"
        {
            return Some(child);
        }
    }
    None
}

fn module_name(node: &Node, source: &str) -> Option<String> {
    let args = arguments_node(node)?;
    let first = args.named_child(0)?;
    if first.kind() == "alias" {
        Some(source[first.byte_range()].to_string())
    } else {
        None
    }
}

/// `"name/arity"` for a `def`/`defp` call node, following the head
/// through guard operators.
fn function_name_arity(node: &Node, source: &str) -> Option<String> {
    let args = arguments_node(node)?;
    let head = args.named_child(0)?;
    head_name_arity(&head, source)
}

fn head_name_arity(head: &Node, source: &str) -> Option<String> {
    match head.kind() {
        // `def foo(a, b)`
        "call" => {
            let target = head.child_by_field_name("target")?;
            let name = &source[target.byte_range()];
            let arity = arguments_node(head).map_or(0, |a| a.named_child_count());
            Some(format!("{name}/{arity}"))
        }
        // `def foo(a) when a > 0` — the head sits left of the guard.
        "binary_operator" => {
            let left = head.child_by_field_name("left")?;
            head_name_arity(&left, source)
        }
        // `def foo do` — zero-arity, no parentheses.
        "identifier" => Some(format!("{}/0", &source[head.byte_range()])),
        _ => None,
    }
}

fn first_error_node(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let child_count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        if let Some(child) = node.child(i)
            && let Some(err) = first_error_node(child)
        {
            return Some(err);
        }
    }
    Some(node)
}

/// Fixed-window fallback for languages without a grammar.
fn extract_windows(source: &str, file_path: &str, lang: Lang) -> Vec<Chunk> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let stride = WINDOW_LINES - WINDOW_OVERLAP;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let end = (start + WINDOW_LINES).min(lines.len());
        let text = lines[start..end].join("\n");

        if !text.trim().is_empty() && text.chars().count() >= MIN_CHUNK_LEN {
            let name = format!("chunk_{index}");
            chunks.push(Chunk {
                id: chunk_id(file_path, UnitType::Window, &name, start + 1),
                text,
                unit_type: UnitType::Window,
                name,
                file_path: file_path.to_string(),
                start_line: start + 1,
                end_line: end,
                language: lang,
                embedding: None,
            });
        }

        if end == lines.len() {
            break;
        }
        start += stride;
        index += 1;
    }

    chunks
}
