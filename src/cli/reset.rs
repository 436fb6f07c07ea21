//! CLI `reset` command: delete all memories (and optionally history) after confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use tessera::config::TesseraConfig;

/// Delete all memories after user confirmation. `yes` skips the prompt.
pub fn reset(config: &TesseraConfig, include_history: bool, yes: bool) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !yes {
        if include_history {
            println!("WARNING: This will permanently delete ALL memories and conversation history.");
        } else {
            println!("WARNING: This will permanently delete ALL memories.");
        }
        println!("Database: {}", db_path.display());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    let mut store = super::open_store(config)?;
    let memories = store.clear_memories()?;
    println!("Deleted {memories} memories.");

    if include_history {
        let turns = store.clear_history()?;
        println!("Deleted {turns} history turns.");
    }

    store.close()?;
    Ok(())
}
