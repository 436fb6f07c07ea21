//! Anthropic Messages API rewriter.
//!
//! Anthropic has no embeddings endpoint, so this only implements
//! [`QueryRewriter`] over `POST /v1/messages`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{require_api_key, ModelIdentity, QueryRewriter, REWRITE_PROMPT};
use crate::config::EndpointConfig;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
/// A search query is a handful of words.
const MAX_TOKENS: u32 = 256;

pub struct AnthropicRewriter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicRewriter {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let api_key = require_api_key(config, "Anthropic", "ANTHROPIC_API_KEY")?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self::new(api_key, base_url))
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[async_trait]
impl QueryRewriter for AnthropicRewriter {
    async fn rewrite(&self, model: &ModelIdentity, query: &str) -> Result<String> {
        let req = MessagesRequest {
            model: &model.model_id,
            max_tokens: MAX_TOKENS,
            system: REWRITE_PROMPT,
            messages: vec![Message {
                role: "user",
                content: query,
            }],
        };

        let resp = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await
            .context("rewrite request failed")?
            .error_for_status()
            .context("rewrite request rejected")?
            .json::<MessagesResponse>()
            .await
            .context("malformed messages response")?;

        let text = first_text(resp).unwrap_or_default();
        anyhow::ensure!(!text.is_empty(), "rewrite returned no text");
        Ok(text)
    }
}

fn first_text(resp: MessagesResponse) -> Option<String> {
    resp.content
        .into_iter()
        .filter(|block| block.kind == "text")
        .find_map(|block| block.text)
        .map(|t| t.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_is_versioned() {
        let rewriter = AnthropicRewriter::new("a-key", "https://api.anthropic.com/");
        assert_eq!(rewriter.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn from_config_requires_key() {
        let err = AnthropicRewriter::from_config(&EndpointConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Anthropic API key not configured"));
    }

    #[test]
    fn request_carries_system_prompt_separately() {
        let req = MessagesRequest {
            model: "claude-haiku",
            max_tokens: MAX_TOKENS,
            system: "sys",
            messages: vec![Message {
                role: "user",
                content: "what editor do I use",
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["system"], "sys");
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_text_skips_non_text_blocks() {
        let body = r#"{"id":"msg_1","type":"message","role":"assistant","content":[
            {"type":"thinking","thinking":"..."},
            {"type":"text","text":"editor Helix\n"}
        ],"stop_reason":"end_turn"}"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(first_text(parsed).as_deref(), Some("editor Helix"));
    }
}
