use anyhow::Result;

use tessera::config::TesseraConfig;
use tessera::memory::types::parse_tags;

/// Save a memory from the terminal and print its id.
pub async fn save(config: TesseraConfig, text: &str, tags: Option<&str>) -> Result<()> {
    let service = tessera::server::build_service(config)?;
    let tags = tags.map(parse_tags).unwrap_or_default();

    let id = service.save(text, &tags).await?;
    println!("Saved memory {id}");
    Ok(())
}
