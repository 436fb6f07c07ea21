use anyhow::Result;

use tessera::config::TesseraConfig;
use tessera::memory::format::format_as_text;

/// Run a hybrid search from the terminal.
///
/// Prints the same text the `memory_retrieve` tool returns, or the full
/// response with per-signal scores as JSON.
pub async fn search(config: TesseraConfig, query: &str, json: bool) -> Result<()> {
    let service = tessera::server::build_service(config)?;
    let response = service.search(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let Some(ref rewritten) = response.rewritten_query {
        println!("(searched as: {rewritten})\n");
    }
    println!("{}", format_as_text(&response));
    Ok(())
}
