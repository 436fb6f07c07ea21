//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use tessera::config::TesseraConfig;
use tessera::memory::store::MemoryStore;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &TesseraConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `tessera serve` or `tessera save` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let store = MemoryStore::open(&db_path, &config.storage)
        .context("failed to open database (may be corrupt or in use)")?;
    let report = store.health().context("failed to run health check")?;

    let configured = config.embedding.identity().to_string();

    println!("Tessera Health Report");
    println!("=====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {configured}");
    if let Some(ref stored) = report.embedding_model {
        if stored != &configured {
            println!("  WARNING: model mismatch! Run `tessera re-embed` to update vectors.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  History turns:   {}", report.history_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: restore a backup copy of {}", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
