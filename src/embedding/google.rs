//! Google Gemini API provider.
//!
//! Embeddings go through `models/{model}:embedContent`, query rewrites through
//! `models/{model}:generateContent`. The key travels in the `x-goog-api-key`
//! header rather than the query string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{require_api_key, EmbeddingProvider, ModelIdentity, QueryRewriter, REWRITE_PROMPT};
use crate::config::EndpointConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let api_key = require_api_key(config, "Google", "GEMINI_API_KEY")?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self::new(api_key, base_url))
    }

    /// `{base}/models/{model}:{method}`. Accepts ids with or without the `models/` prefix.
    fn model_url(&self, model_id: &str, method: &str) -> String {
        let model = model_id.strip_prefix("models/").unwrap_or(model_id);
        format!("{}/models/{model}:{method}", self.base_url)
    }
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'a str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for GoogleProvider {
    async fn embed(&self, model: &ModelIdentity, text: &str) -> Result<Vec<f32>> {
        let model_id = model.model_id.strip_prefix("models/").unwrap_or(&model.model_id);
        let req = EmbedContentRequest {
            model: format!("models/{model_id}"),
            content: Content::text(None, text),
        };

        let resp = self
            .client
            .post(self.model_url(&model.model_id, "embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedding request rejected")?
            .json::<EmbedContentResponse>()
            .await
            .context("malformed embedding response")?;

        Ok(resp.embedding.values)
    }
}

#[async_trait]
impl QueryRewriter for GoogleProvider {
    async fn rewrite(&self, model: &ModelIdentity, query: &str) -> Result<String> {
        let req = GenerateContentRequest {
            system_instruction: Content::text(None, REWRITE_PROMPT),
            contents: vec![Content::text(Some("user"), query)],
        };

        let resp = self
            .client
            .post(self.model_url(&model.model_id, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .context("rewrite request failed")?
            .error_for_status()
            .context("rewrite request rejected")?
            .json::<GenerateContentResponse>()
            .await
            .context("malformed generateContent response")?;

        let text = first_text(resp).unwrap_or_default();
        anyhow::ensure!(!text.is_empty(), "rewrite returned no text");
        Ok(text)
    }
}

fn first_text(resp: GenerateContentResponse) -> Option<String> {
    resp.candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .map(|t| t.trim().to_string())
}
