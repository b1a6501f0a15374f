use ollama_rs::Ollama;

use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        }
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client
            .list_local_models()
            .await
            .map_err(|e| LlmError::Connection {
                service: "ollama",
                detail: format!("is it running (`ollama serve`)? {e}"),
            })?;
        Ok(())
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama chat request failed: {e}")))?;

        Ok(response.message.content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: "ollama" })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );

        match self.client.generate_embeddings(request).await {
            Ok(response) if response.embeddings.len() == texts.len() => Ok(response.embeddings),
            // Some Ollama builds reject multi-input embedding requests;
            // degrade to one request per text.
            Ok(_) | Err(_) => {
                tracing::warn!("batch embedding rejected, falling back to per-item requests");
                let mut vectors = Vec::with_capacity(texts.len());
                for text in texts {
                    vectors.push(self.embed(text).await?);
                }
                Ok(vectors)
            }
        }
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::Assistant => ChatMessage::assistant(text),
        Role::User => ChatMessage::user(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_without_port() {
        let (host, port) = parse_host_port("http://localhost");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_custom_port() {
        let (host, port) = parse_host_port("http://example.com:8080");
        assert_eq!(host, "http://example.com");
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_host_port_trailing_slash() {
        let (host, port) = parse_host_port("http://localhost:11434/");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_invalid_port_falls_back() {
        let (host, port) = parse_host_port("http://localhost:notaport");
        assert_eq!(host, "http://localhost:notaport");
        assert_eq!(port, 11434);
    }

    #[test]
    fn convert_message_roles() {
        let cm = convert_message(&Message::new(Role::User, "hello"));
        assert_eq!(cm.content, "hello");
        let cm = convert_message(&Message::new(Role::System, "instruction"));
        assert_eq!(cm.content, "instruction");
    }

    #[test]
    fn name_returns_ollama() {
        let provider =
            OllamaProvider::new("http://localhost:11434", "test".into(), "embed".into());
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn supports_embeddings_returns_true() {
        let provider =
            OllamaProvider::new("http://localhost:11434", "test".into(), "embed".into());
        assert!(provider.supports_embeddings());
    }

    #[test]
    fn new_stores_models() {
        let provider = OllamaProvider::new(
            "http://localhost:11434",
            "qwen2.5-coder:7b".into(),
            "nomic-embed-text".into(),
        );
        assert_eq!(provider.model, "qwen2.5-coder:7b");
        assert_eq!(provider.embedding_model, "nomic-embed-text");
    }

    #[tokio::test]
    async fn chat_with_unreachable_endpoint_errors() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "test".into(), "embed".into());
        let messages = vec![Message::new(Role::User, "hello")];
        assert!(provider.chat(&messages).await.is_err());
    }

    #[tokio::test]
    async fn embed_with_unreachable_endpoint_errors() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "test".into(), "embed".into());
        assert!(provider.embed("test text").await.is_err());
    }

    #[tokio::test]
    async fn embed_batch_empty_input_is_empty() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "test".into(), "embed".into());
        let vectors = provider.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn health_check_unreachable_errors() {
        let provider = OllamaProvider::new("http://127.0.0.1:1", "test".into(), "embed".into());
        let err = provider.health_check().await.unwrap_err();
        assert!(err.to_string().contains("ollama"));
    }

    #[tokio::test]
    #[ignore = "requires running Ollama instance"]
    async fn integration_ollama_embed() {
        let provider = OllamaProvider::new(
            "http://localhost:11434",
            "qwen2.5-coder:7b".into(),
            "nomic-embed-text".into(),
        );

        let embedding = provider.embed("hello world").await.unwrap();
        assert!(!embedding.is_empty());
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[tokio::test]
    #[ignore = "requires running Ollama instance"]
    async fn integration_ollama_embed_batch_matches_input_len() {
        let provider = OllamaProvider::new(
            "http://localhost:11434",
            "qwen2.5-coder:7b".into(),
            "nomic-embed-text".into(),
        );

        let texts = vec!["first text".to_string(), "second text".to_string()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), vectors[1].len());
    }
}
