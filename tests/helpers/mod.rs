#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tessera::config::TesseraConfig;
use tessera::embedding::{EmbeddingProvider, ModelIdentity, QueryRewriter};
use tessera::memory::service::MemoryService;
use tessera::memory::store::MemoryStore;

/// Dimension of [`HashEmbedder`] vectors.
pub const DIM: usize = 256;

pub fn test_model() -> ModelIdentity {
    ModelIdentity::new("test", "hash-256")
}

/// Default config pointed at the hashing test model.
pub fn test_config() -> TesseraConfig {
    let mut config = TesseraConfig::default();
    config.embedding.provider = "test".into();
    config.embedding.model = "hash-256".into();
    config.rewrite.provider = "test".into();
    config.rewrite.model = "rewrite".into();
    config.provider.timeout_secs = 5;
    config
}

/// Bag-of-words embedding: each lowercase alphanumeric word bumps one of
/// [`DIM`] buckets chosen by FNV-1a. Texts sharing words get positive cosine.
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        v[(hash % DIM as u64) as usize] += 1.0;
    }
    v
}

/// Deterministic embedder backed by [`hash_embedding`].
pub struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, _model: &ModelIdentity, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(hash_embedding(text))
    }
}

/// Always fails, like a provider with a revoked key.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _model: &ModelIdentity, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("401 Unauthorized")
    }
}

/// Never answers within any reasonable timeout.
pub struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed(&self, _model: &ModelIdentity, text: &str) -> anyhow::Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(hash_embedding(text))
    }
}

/// Returns a vector of the wrong length.
pub struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    async fn embed(&self, _model: &ModelIdentity, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

/// Rewrites every query to the same fixed text.
pub struct StaticRewriter(pub &'static str);

#[async_trait]
impl QueryRewriter for StaticRewriter {
    async fn rewrite(&self, _model: &ModelIdentity, _query: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

pub struct FailingRewriter;

#[async_trait]
impl QueryRewriter for FailingRewriter {
    async fn rewrite(&self, _model: &ModelIdentity, _query: &str) -> anyhow::Result<String> {
        anyhow::bail!("rate limited")
    }
}

/// Shared in-memory store.
pub fn test_store() -> Arc<Mutex<MemoryStore>> {
    Arc::new(Mutex::new(MemoryStore::open_in_memory().unwrap()))
}

/// Service over `store` using `embedder` and the test config.
pub fn service_with(
    store: Arc<Mutex<MemoryStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> MemoryService {
    MemoryService::new(store, embedder, Arc::new(test_config()))
}

/// Service over a fresh in-memory store with the hashing embedder.
pub fn test_service() -> MemoryService {
    service_with(test_store(), Arc::new(HashEmbedder))
}
