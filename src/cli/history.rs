use anyhow::Result;

use tessera::config::TesseraConfig;

/// Show the most recent conversation turns, newest first.
pub fn history(config: &TesseraConfig, limit: usize) -> Result<()> {
    let store = super::open_store(config)?;
    let turns = store.recent_history(limit)?;

    if turns.is_empty() {
        println!("No conversation history.");
        return Ok(());
    }

    for turn in &turns {
        println!("  {} {} [{}]", turn.id, turn.created_at, turn.role);
        println!("     {}", super::preview(&turn.content, 120));
    }
    Ok(())
}
