//! Model provider capabilities.
//!
//! The memory engine depends only on [`EmbeddingProvider`] and [`QueryRewriter`];
//! concrete providers are picked from configuration by [`create_embedder`] and
//! [`create_rewriter`]. Provider output is untrusted: callers re-validate vector
//! length before storing or comparing.
//!
//! | provider    | embeddings | rewrites |
//! |-------------|------------|----------|
//! | `openai`    | yes        | yes      |
//! | `google`    | yes        | yes      |
//! | `anthropic` | no         | yes      |

pub mod anthropic;
pub mod google;
pub mod openai;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EndpointConfig, TesseraConfig};

/// System prompt shared by every rewriter.
pub(crate) const REWRITE_PROMPT: &str = "You turn a user's question into a short search query for \
a personal memory store of facts and preferences. Keep the important nouns and names, \
drop filler words, and reply with the query only.";

/// Which model produced (or should produce) a vector or a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub provider: String,
    pub model_id: String,
}

impl ModelIdentity {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model_id)
    }
}

/// Turns text into a dense vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, model: &ModelIdentity, text: &str) -> Result<Vec<f32>>;
}

/// Rewrites a free-text question into a retrieval-friendly search query.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(&self, model: &ModelIdentity, query: &str) -> Result<String>;
}

/// Create the embedding provider named by `[embedding] provider`.
pub fn create_embedder(config: &TesseraConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let endpoints = &config.provider;
    match config.embedding.provider.as_str() {
        "openai" => Ok(Arc::new(openai::OpenAiProvider::from_config(&endpoints.openai)?)),
        "google" => Ok(Arc::new(google::GoogleProvider::from_config(&endpoints.google)?)),
        other => anyhow::bail!("unsupported embedding provider: {other}. Supported: openai, google"),
    }
}

/// Create the query rewriter, or `None` when `[rewrite] enabled = false`.
pub fn create_rewriter(config: &TesseraConfig) -> Result<Option<Arc<dyn QueryRewriter>>> {
    if !config.rewrite.enabled {
        return Ok(None);
    }
    let endpoints = &config.provider;
    let rewriter: Arc<dyn QueryRewriter> = match config.rewrite.provider.as_str() {
        "openai" => Arc::new(openai::OpenAiProvider::from_config(&endpoints.openai)?),
        "google" => Arc::new(google::GoogleProvider::from_config(&endpoints.google)?),
        "anthropic" => Arc::new(anthropic::AnthropicRewriter::from_config(&endpoints.anthropic)?),
        other => anyhow::bail!(
            "unsupported rewrite provider: {other}. Supported: openai, google, anthropic"
        ),
    };
    Ok(Some(rewriter))
}

/// [`create_rewriter`] for startup: a misconfigured rewriter is logged and
/// left out, and queries run unrewritten.
pub fn optional_rewriter(config: &TesseraConfig) -> Option<Arc<dyn QueryRewriter>> {
    match create_rewriter(config) {
        Ok(rewriter) => rewriter,
        Err(e) => {
            tracing::warn!(
                provider = %config.rewrite.provider,
                error = %format!("{e:#}"),
                "query rewrite disabled"
            );
            None
        }
    }
}

/// The configured, non-blank API key of one vendor section.
pub(crate) fn require_api_key(endpoint: &EndpointConfig, vendor: &str, env_var: &str) -> Result<String> {
    endpoint
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .with_context(|| {
            format!(
                "{vendor} API key not configured; set [provider.{}] api_key or {env_var}",
                vendor.to_lowercase()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_displays_as_provider_slash_model() {
        let id = ModelIdentity::new("openai", "text-embedding-3-small");
        assert_eq!(id.to_string(), "openai/text-embedding-3-small");
    }

    #[test]
    fn rewriter_disabled_by_default() {
        let config = TesseraConfig::default();
        assert!(create_rewriter(&config).unwrap().is_none());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut config = TesseraConfig::default();
        config.provider.openai.api_key = Some("sk-test".into());
        config.embedding.provider = "carrier-pigeon".into();
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("unsupported embedding provider"));
    }

    #[test]
    fn each_vendor_builds_with_its_own_key() {
        let mut config = TesseraConfig::default();
        config.provider.google.api_key = Some("g-key".into());
        config.provider.anthropic.api_key = Some("a-key".into());
        config.rewrite.enabled = true;

        config.embedding.provider = "google".into();
        assert!(create_embedder(&config).is_ok());

        for vendor in ["google", "anthropic"] {
            config.rewrite.provider = vendor.into();
            assert!(create_rewriter(&config).unwrap().is_some(), "{vendor}");
        }

        // no OpenAI key in this config
        config.rewrite.provider = "openai".into();
        let err = create_rewriter(&config).err().unwrap();
        assert!(err.to_string().contains("OpenAI API key not configured"));
    }

    #[test]
    fn anthropic_cannot_embed() {
        let mut config = TesseraConfig::default();
        config.provider.anthropic.api_key = Some("a-key".into());
        config.embedding.provider = "anthropic".into();
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("unsupported embedding provider: anthropic"));
    }

    #[test]
    fn missing_key_names_the_vendor() {
        let mut config = TesseraConfig::default();
        config.embedding.provider = "google".into();
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("Google API key not configured"));

        config.provider.google.api_key = Some("   ".into());
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn misconfigured_rewriter_is_left_out() {
        let mut config = TesseraConfig::default();
        config.rewrite.enabled = true;
        config.rewrite.provider = "carrier-pigeon".into();
        assert!(create_rewriter(&config).is_err());
        assert!(optional_rewriter(&config).is_none());

        config.rewrite.provider = "anthropic".into();
        assert!(optional_rewriter(&config).is_none());

        config.provider.anthropic.api_key = Some("a-key".into());
        assert!(optional_rewriter(&config).is_some());
    }
}
