//! OpenAI-compatible HTTP provider.
//!
//! Embeddings go through `/v1/embeddings`, query rewrites through
//! `/v1/chat/completions`. Any server speaking the same wire format (Ollama,
//! vLLM, LiteLLM, ...) works by pointing `[provider.openai] base_url` at it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{require_api_key, EmbeddingProvider, ModelIdentity, QueryRewriter, REWRITE_PROMPT};
use crate::config::EndpointConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let api_key = require_api_key(config, "OpenAI", "OPENAI_API_KEY")?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self::new(api_key, base_url))
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Append `/v1/<path>` unless the base URL already ends in a version segment.
fn endpoint(base_url: &str, path: &str) -> String {
    let has_version = base_url
        .rsplit('/')
        .next()
        .and_then(|seg| seg.strip_prefix('v'))
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
    if has_version {
        format!("{base_url}/{path}")
    } else {
        format!("{base_url}/v1/{path}")
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, model: &ModelIdentity, text: &str) -> Result<Vec<f32>> {
        let req = EmbeddingRequest {
            model: &model.model_id,
            input: vec![text],
        };

        let resp = self
            .client
            .post(endpoint(&self.base_url, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedding request rejected")?
            .json::<EmbeddingResponse>()
            .await
            .context("malformed embedding response")?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("empty embedding response")
    }
}

#[async_trait]
impl QueryRewriter for OpenAiProvider {
    async fn rewrite(&self, model: &ModelIdentity, query: &str) -> Result<String> {
        let req = ChatRequest {
            model: &model.model_id,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: REWRITE_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: query,
                },
            ],
        };

        let resp = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("rewrite request failed")?
            .error_for_status()
            .context("rewrite request rejected")?
            .json::<ChatResponse>()
            .await
            .context("malformed chat response")?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        anyhow::ensure!(!text.is_empty(), "rewrite returned no text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_v1() {
        assert_eq!(
            endpoint("https://api.openai.com", "embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn endpoint_respects_existing_version() {
        assert_eq!(
            endpoint("http://localhost:11434/v1", "chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiProvider::new("sk-test", "https://example.com/");
        assert_eq!(provider.base_url, "https://example.com");
    }

    #[test]
    fn from_config_requires_key() {
        let config = EndpointConfig::default();
        assert!(OpenAiProvider::from_config(&config).is_err());
    }

    #[test]
    fn from_config_defaults_base_url() {
        let config = EndpointConfig {
            base_url: None,
            api_key: Some("sk-test".into()),
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn embedding_response_parses() {
        let body = r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding.len(), 3);
    }
}
