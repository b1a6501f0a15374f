//! Provider for OpenAI-compatible HTTP endpoints (LM Studio, llama.cpp,
//! vLLM, hosted gateways). Covers the two calls redline needs: chat
//! completions and embeddings.

use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::http::default_client;
use crate::provider::{LlmProvider, Message, Role};

#[derive(Debug, Clone)]
pub struct CompatibleProvider {
    client: reqwest::Client,
    provider_name: String,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

impl CompatibleProvider {
    #[must_use]
    pub fn new(
        provider_name: String,
        api_key: String,
        base_url: String,
        model: String,
        embedding_model: Option<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client: default_client(),
            provider_name,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            embedding_model,
            temperature,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{path}", self.base_url));
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        builder
    }

    async fn request_embeddings(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: "compatible",
            })?;

        let response = self
            .post("/embeddings")
            .json(&json!({ "model": model, "input": input }))
            .send()
            .await?
            .error_for_status()?;

        let mut body: EmbeddingsResponse = response.json().await?;
        // Providers are allowed to reorder entries; `index` is authoritative.
        body.data.sort_by_key(|e| e.index);
        Ok(body.data.into_iter().map(|e| e.embedding).collect())
    }
}

impl LlmProvider for CompatibleProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages
                .iter()
                .map(|m| json!({ "role": role_str(m.role), "content": m.content }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .post("/chat/completions")
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatCompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse {
                provider: "compatible",
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.request_embeddings(json!(text))
            .await?
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "compatible",
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self.request_embeddings(json!(texts)).await {
            Ok(vectors) if vectors.len() == texts.len() => Ok(vectors),
            Ok(_) | Err(_) => {
                tracing::warn!(
                    provider = %self.provider_name,
                    "batch embedding rejected, falling back to per-item requests"
                );
                let mut vectors = Vec::with_capacity(texts.len());
                for text in texts {
                    vectors.push(self.embed(text).await?);
                }
                Ok(vectors)
            }
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}
