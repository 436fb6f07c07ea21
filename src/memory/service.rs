//! Tool-facing entry points: `save(text, tags)` and `retrieve(query)`.
//!
//! [`MemoryService`] wires the shared store to the configured providers. Both
//! the MCP tools and the CLI go through it.

use std::sync::{Arc, Mutex};

use tracing::info;

use super::format::format_as_text;
use super::retrieval::{RetrievalResponse, Retriever};
use super::store::{lock_store, MemoryStore};
use super::types::{clean_tags, NewMemory, Source};
use crate::config::TesseraConfig;
use crate::embedding::{EmbeddingProvider, QueryRewriter};
use crate::error::{MemoryError, Result};

#[derive(Clone)]
pub struct MemoryService {
    store: Arc<Mutex<MemoryStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    config: Arc<TesseraConfig>,
}

impl MemoryService {
    pub fn new(
        store: Arc<Mutex<MemoryStore>>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: Arc<TesseraConfig>,
    ) -> Self {
        Self {
            store,
            embedder,
            rewriter: None,
            config,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Option<Arc<dyn QueryRewriter>>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn has_rewriter(&self) -> bool {
        self.rewriter.is_some()
    }

    pub fn store(&self) -> &Arc<Mutex<MemoryStore>> {
        &self.store
    }

    pub fn config(&self) -> &TesseraConfig {
        &self.config
    }

    /// A retriever over the shared store using the configured models and policy.
    pub fn retriever(&self) -> Retriever {
        let retriever = Retriever::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.config.embedding.identity(),
            self.config.retrieval.clone(),
        )
        .with_timeout(self.config.provider.timeout());
        match &self.rewriter {
            Some(rewriter) => {
                retriever.with_rewriter(Arc::clone(rewriter), self.config.rewrite.identity())
            }
            None => retriever,
        }
    }

    /// Embed `text` with the configured model, bounded by the provider timeout.
    ///
    /// Any failure, including an empty or unusable vector, is a
    /// [`MemoryError::Provider`].
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.config.embedding.identity();
        let timeout = self.config.provider.timeout();
        let raw = tokio::time::timeout(timeout, self.embedder.embed(&model, text))
            .await
            .map_err(|_| {
                MemoryError::Provider(format!(
                    "embedding timed out after {}s",
                    timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| MemoryError::Provider(format!("embedding failed: {e:#}")))?;
        if raw.is_empty() {
            return Err(MemoryError::Provider(format!(
                "{model} returned an empty embedding"
            )));
        }
        Ok(raw)
    }

    /// Save an explicit memory and return its id.
    ///
    /// Embedding failure is fatal here: a memory is never stored without its vector.
    pub async fn save(&self, text: &str, tags: &[String]) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MemoryError::InvalidInput(
                "text must be a non-empty string".into(),
            ));
        }

        let embedding = self.embed(text).await?;
        let item = NewMemory {
            text: text.to_string(),
            tags: clean_tags(tags),
            source: Source::Explicit,
            model: self.config.embedding.identity(),
            embedding,
        };

        let store = Arc::clone(&self.store);
        let id = tokio::task::spawn_blocking(move || lock_store(&store)?.save_memory(item))
            .await
            .map_err(|e| MemoryError::StorageUnavailable(format!("save task failed: {e}")))??;

        info!(id = %id, text_len = text.len(), tags = tags.len(), "memory saved");
        Ok(id)
    }

    /// Ranked results for `query`, unformatted.
    pub async fn search(&self, query: &str) -> Result<RetrievalResponse> {
        self.retriever().retrieve(query).await
    }

    /// Ranked results for `query`, rendered as text.
    pub async fn retrieve(&self, query: &str) -> Result<String> {
        let response = self.search(query).await?;
        Ok(format_as_text(&response))
    }
}
