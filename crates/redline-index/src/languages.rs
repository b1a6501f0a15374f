//! Language detection and grammar registry.
//!
//! One language (Elixir) carries a real tree-sitter grammar; every other
//! declared language falls back to fixed-window chunking. Adding a
//! language means adding a table entry here, not touching dispatch logic.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported language for chunk extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Elixir,
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Bash,
}

impl Lang {
    /// Identifier used in Qdrant payload, config, and code fences.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Elixir => "elixir",
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Bash => "bash",
        }
    }

    /// Inverse of [`Lang::id`], used when decoding stored payloads.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "elixir" => Some(Self::Elixir),
            "rust" => Some(Self::Rust),
            "python" => Some(Self::Python),
            "javascript" => Some(Self::JavaScript),
            "typescript" => Some(Self::TypeScript),
            "go" => Some(Self::Go),
            "bash" => Some(Self::Bash),
            _ => None,
        }
    }

    /// Get the tree-sitter grammar. `None` selects the window fallback.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            Self::Elixir => Some(tree_sitter_elixir::LANGUAGE.into()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "ex" | "exs" => Some(Lang::Elixir),
        "rs" => Some(Lang::Rust),
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "tsx" | "mts" | "cts" => Some(Lang::TypeScript),
        "go" => Some(Lang::Go),
        "sh" | "bash" | "zsh" => Some(Lang::Bash),
        _ => None,
    }
}
