//! Core record type definitions.
//!
//! Defines [`MemoryItem`] (an explicitly saved fact with its embedding),
//! [`HistoryItem`] (a raw conversational turn), and the inputs used to create
//! them. Retrieval-only types live in [`crate::memory::retrieval`].

use serde::{Deserialize, Serialize};

use crate::embedding::ModelIdentity;

/// Provenance of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Saved on request by the user or tool caller.
    Explicit,
    /// Derived by the system from conversation.
    Inferred,
}

impl Source {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Inferred => "inferred",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(Self::Explicit),
            "inferred" => Ok(Self::Inferred),
            _ => Err(format!("unknown memory source: {s}")),
        }
    }
}

/// Speaker of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Developer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Developer => "developer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "developer" => Ok(Self::Developer),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// A saved fact, matching the `memories` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// UUID v7 (time-sortable), assigned by the store.
    pub id: String,
    /// Trimmed, non-empty content. Never changes after save.
    pub text: String,
    /// Ordered, de-duplicated labels. Informational only.
    pub tags: Vec<String>,
    pub source: Source,
    /// Provider that produced `embedding`.
    pub provider: String,
    /// Model that produced `embedding`.
    pub model_id: String,
    /// Length of `embedding`.
    pub dim: usize,
    /// Unit-normalized vector.
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    /// RFC 3339 creation timestamp (UTC, microseconds).
    pub created_at: String,
}

impl MemoryItem {
    pub fn model(&self) -> ModelIdentity {
        ModelIdentity::new(&self.provider, &self.model_id)
    }
}

/// Input to [`crate::memory::store::MemoryStore::save_memory`].
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub text: String,
    pub tags: Vec<String>,
    pub source: Source,
    pub model: ModelIdentity,
    pub embedding: Vec<f32>,
}

/// A conversational turn, matching the `history` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
}

/// One stored vector, as returned by
/// [`crate::memory::store::MemoryStore::all_memory_vectors`].
#[derive(Debug, Clone)]
pub struct MemoryVector {
    pub id: String,
    pub provider: String,
    pub model_id: String,
    pub embedding: Vec<f32>,
}

/// A keyword-search hit over memories or history.
#[derive(Debug, Clone)]
pub struct LexicalHit<T> {
    pub item: T,
    /// Negated BM25; higher is more relevant. Only comparable within one search.
    pub score: f64,
    /// Fraction of the distinct query terms found in the item, in `[0, 1]`.
    pub coverage: f64,
}

/// Split a comma-separated tag string into trimmed, de-duplicated labels,
/// keeping first-seen order.
pub fn parse_tags(raw: &str) -> Vec<String> {
    clean_tags(raw.split(','))
}

/// Trim, drop empties, and de-duplicate while keeping first-seen order.
pub fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}
