//! CLI `re-embed` command: regenerate all embeddings with the current model.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use tessera::config::TesseraConfig;
use tessera::memory::store::lock_store;

/// Re-embed every memory with the currently configured model, then record
/// that model as the store's embedding marker.
///
/// Stops at the first provider failure; memories already refreshed keep their
/// new vectors and a later run picks up the rest.
pub async fn re_embed(config: TesseraConfig) -> Result<()> {
    let model = config.embedding.identity();
    let service = tessera::server::build_service(config)?;

    let memories = lock_store(service.store())?.list_memories(None)?;
    let total = memories.len();
    if total == 0 {
        println!("No memories to re-embed.");
        lock_store(service.store())?.set_embedding_model(&model)?;
        return Ok(());
    }

    println!("Re-embedding {total} memories with model '{model}'...");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    for memory in &memories {
        let embedding = service
            .embed(&memory.text)
            .await
            .with_context(|| format!("failed to embed memory {}", memory.id))?;
        lock_store(service.store())?.update_memory_embedding(&memory.id, &embedding, &model)?;
        pb.inc(1);
    }

    pb.finish_and_clear();

    lock_store(service.store())?.set_embedding_model(&model)?;

    println!("Re-embedded {total} memories with model '{model}'.");
    Ok(())
}
