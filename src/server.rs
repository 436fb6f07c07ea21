//! MCP server initialization for the stdio transport.
//!
//! [`serve_stdio`] wires up the store, the model providers, and the MCP tool
//! handler into a running server.

use crate::config::TesseraConfig;
use crate::embedding;
use crate::memory::service::MemoryService;
use crate::memory::store::MemoryStore;
use crate::tools::TesseraTools;
use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

/// Shared setup: open the store, create providers, check the embedding model.
pub fn build_service(config: TesseraConfig) -> Result<MemoryService> {
    let db_path = config.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = MemoryStore::open(&db_path, &config.storage)?;
    tracing::info!(db = %db_path.display(), "memory store ready");

    let configured = config.embedding.identity();
    match store.embedding_model() {
        Ok(Some(stored)) if stored != configured.to_string() => {
            tracing::warn!(
                stored = %stored,
                configured = %configured,
                "embedding model changed; run `tessera re-embed` to update all vectors"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "could not read stored embedding model"),
    }

    let embedder = embedding::create_embedder(&config)?;
    let rewriter = embedding::optional_rewriter(&config);
    tracing::info!(
        embedding = %configured,
        rewrite = rewriter.is_some(),
        "model providers ready"
    );

    let store = Arc::new(Mutex::new(store));
    Ok(MemoryService::new(store, embedder, Arc::new(config)).with_rewriter(rewriter))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: TesseraConfig) -> Result<()> {
    tracing::info!("starting Tessera MCP server on stdio");

    let service = build_service(config)?;

    let tools = TesseraTools::new(service);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
