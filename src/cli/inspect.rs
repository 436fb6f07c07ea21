//! CLI `inspect` command: display full details for a single memory.

use anyhow::Result;

use tessera::config::TesseraConfig;

/// Inspect a single memory by ID and display full details.
pub fn inspect(config: &TesseraConfig, id: &str) -> Result<()> {
    let store = super::open_store(config)?;
    let m = store.get_memory(id)?;

    println!("Memory: {}", m.id);
    println!("{}", "=".repeat(50));
    println!("  Source:         {}", m.source);
    println!("  Created:        {}", m.created_at);
    println!("  Model:          {}", m.model());
    println!("  Dimensions:     {}", m.dim);
    if !m.tags.is_empty() {
        println!("  Tags:           {}", m.tags.join(", "));
    }
    println!();
    println!("Content:");
    println!("  {}", m.text);

    Ok(())
}
