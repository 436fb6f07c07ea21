//! CLI `forget` command: delete one memory or history turn by id.

use anyhow::Result;

use tessera::config::TesseraConfig;

pub fn forget(config: &TesseraConfig, id: &str, history: bool) -> Result<()> {
    let mut store = super::open_store(config)?;

    if history {
        store.delete_history(id)?;
        println!("Deleted history turn {id}");
    } else {
        store.delete_memory(id)?;
        println!("Deleted memory {id}");
    }
    Ok(())
}
