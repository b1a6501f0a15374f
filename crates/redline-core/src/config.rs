use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub qdrant: QdrantConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `"ollama"` or `"compatible"` (any OpenAI-style endpoint).
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Bearer token for compatible endpoints; unused by Ollama.
    pub api_key: String,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Collection name; namespaced with the tool prefix at the store.
    pub collection: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REDLINE_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("REDLINE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REDLINE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REDLINE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("REDLINE_LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = std::env::var("REDLINE_QDRANT_URL") {
            self.qdrant.url = v;
        }
        if let Ok(v) = std::env::var("REDLINE_COLLECTION") {
            self.index.collection = v;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            qdrant: QdrantConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            base_url: "http://localhost:11434".into(),
            model: "qwen2.5-coder:7b".into(),
            embedding_model: "nomic-embed-text".into(),
            api_key: String::new(),
            temperature: 0.2,
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".into(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: "default".into(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: redline_index::assembler::DEFAULT_MAX_CHARS,
        }
    }
}
