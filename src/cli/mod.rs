pub mod doctor;
pub mod forget;
pub mod history;
pub mod inspect;
pub mod list;
pub mod re_embed;
pub mod reset;
pub mod save;
pub mod search;

use anyhow::{Context, Result};

use tessera::config::TesseraConfig;
use tessera::memory::store::MemoryStore;

/// Open the configured store for a one-shot command, creating its directory.
pub fn open_store(config: &TesseraConfig) -> Result<MemoryStore> {
    let db_path = config.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    MemoryStore::open(&db_path, &config.storage)
        .with_context(|| format!("failed to open memory store at {}", db_path.display()))
}

/// Shorten `text` to `max` characters for one-line listings.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
