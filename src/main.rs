mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tessera::config::TesseraConfig;
use tessera::memory::types::Source;

#[derive(Parser)]
#[command(name = "tessera", version, about = "Long-term memory MCP server for LLM tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Save a memory
    Save {
        /// The fact to remember
        text: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Search memories with hybrid keyword + semantic ranking
    Search {
        query: String,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved memories, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
        /// Only memories of this source: explicit or inferred
        #[arg(long)]
        source: Option<Source>,
    },
    /// Show one memory in full
    Inspect { id: String },
    /// Delete a memory (or, with --history, a history turn) by id
    Forget {
        id: String,
        #[arg(long)]
        history: bool,
    },
    /// Show recent conversation history
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete all memories
    Reset {
        /// Also delete conversation history
        #[arg(long)]
        history: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Regenerate all embeddings with the configured model
    ReEmbed,
    /// Check database health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = TesseraConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => tessera::server::serve_stdio(config).await?,
        Command::Save { text, tags } => cli::save::save(config, &text, tags.as_deref()).await?,
        Command::Search { query, json } => cli::search::search(config, &query, json).await?,
        Command::List { limit, source } => cli::list::list(&config, limit, source)?,
        Command::Inspect { id } => cli::inspect::inspect(&config, &id)?,
        Command::Forget { id, history } => cli::forget::forget(&config, &id, history)?,
        Command::History { limit } => cli::history::history(&config, limit)?,
        Command::Reset { history, yes } => cli::reset::reset(&config, history, yes)?,
        Command::ReEmbed => cli::re_embed::re_embed(config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
