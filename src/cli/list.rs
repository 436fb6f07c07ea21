use anyhow::Result;

use tessera::config::TesseraConfig;
use tessera::memory::types::Source;

/// List saved memories, newest first, optionally of one source only.
pub fn list(config: &TesseraConfig, limit: Option<usize>, source: Option<Source>) -> Result<()> {
    let store = super::open_store(config)?;
    let memories = store.list_memories(source)?;

    if memories.is_empty() {
        match source {
            Some(source) => println!("No {source} memories saved."),
            None => println!("No memories saved."),
        }
        return Ok(());
    }

    let total = memories.len();
    let shown = limit.unwrap_or(total).min(total);
    println!("{total} memories (showing {shown})\n");

    for m in memories.iter().take(shown) {
        let tags = if m.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", m.tags.join(", "))
        };
        let date = m.created_at.get(..10).unwrap_or(&m.created_at);
        println!("  {} {date}{tags}", m.id);
        println!("     {}", super::preview(&m.text, 120));
    }

    Ok(())
}
