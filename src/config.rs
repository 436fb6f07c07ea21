use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::embedding::ModelIdentity;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TesseraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub embedding: EmbeddingConfig,
    pub rewrite: RewriteConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub busy_timeout_ms: u64,
}

/// Largest accepted `retrieval.candidate_limit`. Semantic candidates are
/// fetched with one bound SQL parameter per id.
pub const MAX_CANDIDATE_LIMIT: usize = 500;

/// Remote model endpoints: a shared timeout plus one section per vendor
/// (`[provider.openai]`, `[provider.google]`, `[provider.anthropic]`).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    pub openai: EndpointConfig,
    pub google: EndpointConfig,
    pub anthropic: EndpointConfig,
}

/// Credentials and location of one vendor API.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EndpointConfig {
    /// Overrides the vendor's public base URL (proxies, compatible servers).
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RewriteConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
}

/// Knobs for the hybrid retriever's fusion policy.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum memories returned per query.
    pub top_k: usize,
    /// Candidates pulled from each search branch before fusion.
    pub candidate_limit: usize,
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    /// Raw cosine floor for items only the semantic branch found.
    pub min_semantic_score: f64,
    /// Floor on the lexical score (rescaled BM25 times term coverage).
    pub min_lexical_score: f64,
    /// Fraction of distinct query terms a keyword hit must contain to count.
    pub min_term_coverage: f64,
    pub min_fused_score: f64,
    pub include_history: bool,
    pub history_top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_tessera_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            openai: EndpointConfig::default(),
            google: EndpointConfig::default(),
            anthropic: EndpointConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            candidate_limit: 20,
            semantic_weight: 0.6,
            lexical_weight: 0.4,
            min_semantic_score: 0.3,
            min_lexical_score: 0.1,
            min_term_coverage: 0.25,
            min_fused_score: 0.2,
            include_history: true,
            history_top_k: 3,
        }
    }
}

impl EmbeddingConfig {
    pub fn identity(&self) -> ModelIdentity {
        ModelIdentity::new(&self.provider, &self.model)
    }
}

impl RewriteConfig {
    pub fn identity(&self) -> ModelIdentity {
        ModelIdentity::new(&self.provider, &self.model)
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrievalConfig {
    /// Pull `candidate_limit` into `1..=MAX_CANDIDATE_LIMIT`.
    fn clamp_limits(&mut self) {
        let clamped = self.candidate_limit.clamp(1, MAX_CANDIDATE_LIMIT);
        if clamped != self.candidate_limit {
            warn!(
                configured = self.candidate_limit,
                using = clamped,
                "retrieval.candidate_limit out of range"
            );
            self.candidate_limit = clamped;
        }
    }
}

/// Returns `~/.tessera/`, or `./.tessera/` when no home directory is known.
pub fn default_tessera_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tessera")
}

/// Returns the default config file path: `~/.tessera/config.toml`
pub fn default_config_path() -> PathBuf {
    default_tessera_dir().join("config.toml")
}

impl TesseraConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TesseraConfig::default()
        };

        config.apply_env_overrides();
        config.retrieval.clamp_limits();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// TESSERA_DB and TESSERA_LOG_LEVEL always win. TESSERA_API_KEY sets the
    /// OpenAI key; OPENAI_API_KEY, GEMINI_API_KEY (or GOOGLE_API_KEY) and
    /// ANTHROPIC_API_KEY only fill keys the file left unset.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TESSERA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("TESSERA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("TESSERA_API_KEY") {
            self.provider.openai.api_key = Some(val);
        }
        fill_from_env(&mut self.provider.openai.api_key, &["OPENAI_API_KEY"]);
        fill_from_env(&mut self.provider.google.api_key, &["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        fill_from_env(&mut self.provider.anthropic.api_key, &["ANTHROPIC_API_KEY"]);
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

fn fill_from_env(slot: &mut Option<String>, vars: &[&str]) {
    if slot.is_some() {
        return;
    }
    *slot = vars.iter().find_map(|var| std::env::var(var).ok());
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
