//! Durable memory table: save, update, delete, list, and search primitives.
//!
//! [`MemoryStore`] owns the single connection to the backing file. Every write
//! runs in its own transaction and is fsync'd before returning (WAL with
//! `synchronous=FULL`). Each read is one SQLite statement, so callers always
//! see a consistent snapshot. History operations live in
//! [`crate::memory::history`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{LexicalHit, MemoryItem, MemoryVector, NewMemory, Source};
use super::{bytes_to_embedding, embedding_to_bytes, now_timestamp, vector};
use crate::config::StorageConfig;
use crate::db;
use crate::embedding::ModelIdentity;
use crate::error::{MemoryError, Result};

/// Column list shared by every query that hydrates a [`MemoryItem`]. Queries
/// alias `memories` as `m`.
const MEMORY_COLUMNS: &str =
    "m.id, m.text, m.tags, m.source, m.provider, m.model_id, m.dim, m.embedding, m.created_at";

/// Upper bound on distinct terms sent to FTS5 from one query.
const MAX_QUERY_TERMS: usize = 32;

/// Function words dropped from keyword queries. A question like "what is my
/// favorite color" must not match every memory that contains "is".
const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "had", "has", "have", "he", "her", "his",
    "how", "i", "if", "in", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or",
    "our", "she", "should", "so", "than", "that", "the", "their", "them", "then", "there",
    "they", "this", "to", "was", "we", "were", "what", "when", "where", "which", "who",
    "why", "will", "with", "would", "you", "your",
];

/// Handle to the on-disk memory database.
///
/// Only one handle per file can exist at a time; the connection holds an
/// exclusive lock until [`close`](Self::close) or drop.
pub struct MemoryStore {
    conn: Option<Connection>,
}

impl MemoryStore {
    /// Open (creating if needed) the store at `path` and migrate its schema.
    ///
    /// Fails with [`MemoryError::StorageUnavailable`] when the file cannot be
    /// created or is locked by another process.
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig) -> Result<Self> {
        let path = path.as_ref();
        let conn = db::open_database(path, config.busy_timeout_ms).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to open memory store");
            MemoryError::StorageUnavailable(format!("{}: {e:#}", path.display()))
        })?;
        Ok(Self { conn: Some(conn) })
    }

    /// Open a private in-memory store (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_memory_database()
            .map_err(|e| MemoryError::StorageUnavailable(format!("{e:#}")))?;
        Ok(Self { conn: Some(conn) })
    }

    /// Release the connection. Any later call, including a second `close`,
    /// fails with [`MemoryError::StoreClosed`].
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(MemoryError::StoreClosed)?;
        conn.close().map_err(|(_, e)| MemoryError::Database(e))?;
        tracing::debug!("memory store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(MemoryError::StoreClosed)
    }

    pub(crate) fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(MemoryError::StoreClosed)
    }

    /// Persist a new memory and return its freshly generated id.
    ///
    /// The embedding is re-normalized here so the unit-norm invariant holds no
    /// matter what the caller passed in.
    pub fn save_memory(&mut self, item: NewMemory) -> Result<String> {
        let text = item.text.trim();
        if text.is_empty() {
            return Err(MemoryError::Validation("memory text must not be empty".into()));
        }
        let embedding = vector::normalize(&item.embedding)?;
        let dim = embedding.len();
        let tags = super::types::clean_tags(&item.tags);

        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        check_dim_consistency(&tx, &item.model, dim, None)?;

        let id = uuid::Uuid::now_v7().to_string();
        let now = now_timestamp();
        tx.execute(
            "INSERT INTO memories (id, text, tags, source, provider, model_id, dim, embedding, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                text,
                serde_json::to_string(&tags)?,
                item.source.as_str(),
                item.model.provider,
                item.model.model_id,
                dim as i64,
                embedding_to_bytes(&embedding),
                now,
            ],
        )?;
        let seq = tx.last_insert_rowid();

        // External-content FTS5 must be synced by hand with the same rowid
        tx.execute(
            "INSERT INTO memories_fts (rowid, text) VALUES (?1, ?2)",
            params![seq, text],
        )?;

        tx.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
            params![item.model.to_string()],
        )?;

        tx.commit()?;

        tracing::debug!(id = %id, dim, tags = tags.len(), "memory saved");
        Ok(id)
    }

    /// Fetch one memory by id.
    pub fn get_memory(&self, id: &str) -> Result<MemoryItem> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories m WHERE m.id = ?1"),
            params![id],
            memory_from_row,
        )
        .optional()?
        .ok_or_else(|| MemoryError::memory_not_found(id))
    }

    /// Batch-fetch memories by id. Unknown ids are skipped; order is unspecified.
    pub fn memories_by_ids(&self, ids: &[&str]) -> Result<Vec<MemoryItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories m WHERE m.id IN ({})",
            placeholders.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), memory_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Replace only the embedding fields of an existing memory.
    pub fn update_memory_embedding(
        &mut self,
        id: &str,
        embedding: &[f32],
        model: &ModelIdentity,
    ) -> Result<()> {
        let embedding = vector::normalize(embedding)?;
        let dim = embedding.len();

        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        check_dim_consistency(&tx, model, dim, Some(id))?;

        let rows = tx.execute(
            "UPDATE memories SET embedding = ?1, dim = ?2, provider = ?3, model_id = ?4 WHERE id = ?5",
            params![
                embedding_to_bytes(&embedding),
                dim as i64,
                model.provider,
                model.model_id,
                id
            ],
        )?;
        if rows == 0 {
            return Err(MemoryError::memory_not_found(id));
        }
        tx.commit()?;

        tracing::debug!(id = %id, model = %model, dim, "memory embedding updated");
        Ok(())
    }

    /// Permanently remove one memory and its keyword-index entry.
    pub fn delete_memory(&mut self, id: &str) -> Result<()> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        let (seq, text): (i64, String) = tx
            .query_row(
                "SELECT seq, text FROM memories WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| MemoryError::memory_not_found(id))?;

        // External content table requires the special 'delete' command with the old values
        tx.execute(
            "INSERT INTO memories_fts (memories_fts, rowid, text) VALUES ('delete', ?1, ?2)",
            params![seq, text],
        )?;
        tx.execute("DELETE FROM memories WHERE seq = ?1", params![seq])?;
        tx.commit()?;

        tracing::info!(id = %id, "memory deleted");
        Ok(())
    }

    /// Remove every memory and reset the keyword index. Returns the number of
    /// rows removed; clearing an empty store is a no-op.
    pub fn clear_memories(&mut self) -> Result<usize> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM memories", [])?;
        tx.execute("INSERT INTO memories_fts (memories_fts) VALUES ('delete-all')", [])?;
        tx.commit()?;

        tracing::info!(removed, "memories cleared");
        Ok(removed)
    }

    /// All memories, most recent first, optionally only those of one `source`.
    pub fn list_memories(&self, source: Option<Source>) -> Result<Vec<MemoryItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories m \
             WHERE (?1 IS NULL OR m.source = ?1) \
             ORDER BY m.created_at DESC, m.seq DESC"
        ))?;
        let rows = stmt
            .query_map(params![source.map(|s| s.as_str())], memory_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_memories(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// BM25 keyword search over memory text.
    ///
    /// Hits carry the negated BM25 score (higher is more relevant) and the
    /// fraction of distinct query terms they contain. Ties go to the more
    /// recent memory. A query with no searchable terms matches nothing.
    pub fn lexical_search_memories(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<LexicalHit<MemoryItem>>> {
        let terms = query_terms(query);
        let Some(expr) = fts_match_expression(&terms) else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS}, bm25(memories_fts) AS score, m.seq \
             FROM memories_fts JOIN memories m ON m.seq = memories_fts.rowid \
             WHERE memories_fts MATCH ?1 \
             ORDER BY score ASC, m.created_at DESC, m.seq DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![expr, limit as i64], |row| {
                let item = memory_from_row(row)?;
                // bm25() is negative, more negative is better
                let score: f64 = row.get(9)?;
                let seq: i64 = row.get(10)?;
                Ok((item, -score, seq))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let seqs: Vec<i64> = rows.iter().map(|(_, _, seq)| *seq).collect();
        let coverage = term_coverage(conn, "memories_fts", &terms, &seqs)?;
        Ok(rows
            .into_iter()
            .map(|(item, score, seq)| LexicalHit {
                item,
                score,
                coverage: coverage.get(&seq).copied().unwrap_or(0.0),
            })
            .collect())
    }

    /// Vector length of the stored memories embedded with `model`, if any exist.
    pub fn model_dimension(&self, model: &ModelIdentity) -> Result<Option<usize>> {
        let conn = self.conn()?;
        let dim: Option<i64> = conn
            .query_row(
                "SELECT dim FROM memories WHERE provider = ?1 AND model_id = ?2 LIMIT 1",
                params![model.provider, model.model_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dim.map(|d| d as usize))
    }

    /// Snapshot of every stored vector with its model identity, for brute-force
    /// semantic scoring. Taken by a single statement, so rows added or removed
    /// concurrently are either fully visible or not at all.
    pub fn all_memory_vectors(&self) -> Result<Vec<MemoryVector>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, provider, model_id, embedding FROM memories ORDER BY seq")?;
        let rows = stmt
            .query_map([], |row| {
                let bytes: Vec<u8> = row.get(3)?;
                Ok(MemoryVector {
                    id: row.get(0)?,
                    provider: row.get(1)?,
                    model_id: row.get(2)?,
                    embedding: bytes_to_embedding(&bytes),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The `provider/model_id` marker of the vectors in this store, if any.
    pub fn embedding_model(&self) -> Result<Option<String>> {
        Ok(db::migrations::get_embedding_model(self.conn()?)?)
    }

    pub fn set_embedding_model(&self, model: &ModelIdentity) -> Result<()> {
        db::migrations::set_embedding_model(self.conn()?, &model.to_string())?;
        Ok(())
    }

    /// Integrity check plus row counts, for diagnostics.
    pub fn health(&self) -> Result<db::HealthReport> {
        db::check_database_health(self.conn()?)
            .map_err(|e| MemoryError::StorageUnavailable(format!("health check failed: {e:#}")))
    }
}

/// Lock a shared store, mapping a poisoned lock to [`MemoryError::StorageUnavailable`].
pub fn lock_store(store: &Mutex<MemoryStore>) -> Result<MutexGuard<'_, MemoryStore>> {
    store
        .lock()
        .map_err(|e| MemoryError::StorageUnavailable(format!("memory store lock poisoned: {e}")))
}

/// Reject a vector whose length differs from existing vectors of the same model.
fn check_dim_consistency(
    conn: &Connection,
    model: &ModelIdentity,
    dim: usize,
    exclude_id: Option<&str>,
) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT dim FROM memories WHERE provider = ?1 AND model_id = ?2 \
             AND (?3 IS NULL OR id <> ?3) LIMIT 1",
            params![model.provider, model.model_id, exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(existing) if existing as usize != dim => Err(MemoryError::Validation(format!(
            "dimension mismatch for {model}: stored vectors have {existing}, got {dim}"
        ))),
        _ => Ok(()),
    }
}

/// Distinct lowercase alphanumeric terms of `query`, stopwords removed.
///
/// A query made only of stopwords keeps them, so it can still match
/// something. At most [`MAX_QUERY_TERMS`] terms are returned.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    let mut all: Vec<String> = Vec::new();
    for term in query.split(|c: char| !c.is_alphanumeric()) {
        let term = term.to_lowercase();
        if !term.is_empty() && !all.contains(&term) {
            all.push(term);
        }
    }
    let content: Vec<String> = all
        .iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    let mut terms = if content.is_empty() { all } else { content };
    terms.truncate(MAX_QUERY_TERMS);
    terms
}

/// Build an FTS5 MATCH expression: each term quoted, OR-joined. `None` when
/// there are no terms.
///
/// Quoting keeps user text from being parsed as FTS5 syntax (`AND`, `NEAR`,
/// column filters).
pub(crate) fn fts_match_expression(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// For each rowid in `rowids`, the fraction of `terms` that `fts_table`
/// matches for that row. Terms go through the table's tokenizer, so stemmed
/// forms count as matches.
pub(crate) fn term_coverage(
    conn: &Connection,
    fts_table: &str,
    terms: &[String],
    rowids: &[i64],
) -> Result<HashMap<i64, f64>> {
    if terms.is_empty() || rowids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut matched: HashMap<i64, usize> = rowids.iter().map(|r| (*r, 0)).collect();
    let mut stmt =
        conn.prepare(&format!("SELECT rowid FROM {fts_table} WHERE {fts_table} MATCH ?1"))?;
    for term in terms {
        let rows = stmt.query_map(params![format!("\"{term}\"")], |row| row.get::<_, i64>(0))?;
        for rowid in rows {
            if let Some(count) = matched.get_mut(&rowid?) {
                *count += 1;
            }
        }
    }
    let total = terms.len() as f64;
    Ok(matched
        .into_iter()
        .map(|(rowid, count)| (rowid, count as f64 / total))
        .collect())
}

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryItem> {
    let tags_json: String = row.get(2)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let source_str: String = row.get(3)?;
    let source: Source = source_str
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
    let dim: i64 = row.get(6)?;
    let bytes: Vec<u8> = row.get(7)?;

    Ok(MemoryItem {
        id: row.get(0)?,
        text: row.get(1)?,
        tags,
        source,
        provider: row.get(4)?,
        model_id: row.get(5)?,
        dim: dim as usize,
        embedding: bytes_to_embedding(&bytes),
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelIdentity {
        ModelIdentity::new("test", "unit-8")
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        v[i] = 1.0;
        v
    }

    fn new_memory(text: &str, embedding: Vec<f32>) -> NewMemory {
        NewMemory {
            text: text.to_string(),
            tags: Vec::new(),
            source: Source::Explicit,
            model: model(),
            embedding,
        }
    }

    #[test]
    fn test_save_and_get() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let mut item = new_memory("  Rust is a systems language  ", vec![3.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        item.tags = vec!["lang".into(), " rust ".into(), "lang".into()];

        let id = store.save_memory(item).unwrap();
        let saved = store.get_memory(&id).unwrap();

        assert_eq!(saved.text, "Rust is a systems language");
        assert_eq!(saved.tags, vec!["lang", "rust"]);
        assert_eq!(saved.source, Source::Explicit);
        assert_eq!(saved.dim, 8);
        assert_eq!(saved.embedding.len(), 8);
        assert!(vector::is_unit(&saved.embedding));
        assert!((saved.embedding[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_save_rejects_empty_text() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let err = store.save_memory(new_memory("   ", axis(0))).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
        assert_eq!(store.count_memories().unwrap(), 0);
    }

    #[test]
    fn test_save_rejects_empty_embedding() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let err = store.save_memory(new_memory("fact", Vec::new())).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[test]
    fn test_save_rejects_dimension_change_for_same_model() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        store.save_memory(new_memory("first", axis(0))).unwrap();
        let err = store
            .save_memory(new_memory("second", vec![1.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_other_model_may_use_other_dimension() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        store.save_memory(new_memory("first", axis(0))).unwrap();
        let mut other = new_memory("second", vec![1.0, 0.0, 0.0]);
        other.model = ModelIdentity::new("test", "unit-3");
        store.save_memory(other).unwrap();
        assert_eq!(store.count_memories().unwrap(), 2);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let a = store.save_memory(new_memory("same text", axis(0))).unwrap();
        let b = store.save_memory(new_memory("same text", axis(0))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let first = store.save_memory(new_memory("first", axis(0))).unwrap();
        let second = store.save_memory(new_memory("second", axis(1))).unwrap();

        let listed = store.list_memories(None).unwrap();
        let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);
    }

    #[test]
    fn test_update_embedding() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let id = store.save_memory(new_memory("movable", axis(0))).unwrap();

        let new_model = ModelIdentity::new("test", "unit-4");
        store
            .update_memory_embedding(&id, &[0.0, 2.0, 0.0, 0.0], &new_model)
            .unwrap();

        let item = store.get_memory(&id).unwrap();
        assert_eq!(item.text, "movable");
        assert_eq!(item.model_id, "unit-4");
        assert_eq!(item.dim, 4);
        assert_eq!(item.embedding, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_update_embedding_not_found() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let err = store
            .update_memory_embedding("missing", &axis(0), &model())
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[test]
    fn test_delete_removes_from_fts() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let id = store
            .save_memory(new_memory("The quantum computer runs cold", axis(0)))
            .unwrap();
        assert_eq!(store.lexical_search_memories("quantum", 10).unwrap().len(), 1);

        store.delete_memory(&id).unwrap();

        assert!(store.lexical_search_memories("quantum", 10).unwrap().is_empty());
        assert!(store.all_memory_vectors().unwrap().is_empty());
        let err = store.delete_memory(&id).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        store.save_memory(new_memory("alpha fact", axis(0))).unwrap();
        store.save_memory(new_memory("beta fact", axis(1))).unwrap();

        assert_eq!(store.clear_memories().unwrap(), 2);
        assert_eq!(store.clear_memories().unwrap(), 0);
        assert!(store.list_memories(None).unwrap().is_empty());
        assert!(store.lexical_search_memories("fact", 10).unwrap().is_empty());
    }

    #[test]
    fn test_lexical_search_ranks_by_coverage() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        store.save_memory(new_memory("I prefer dark mode", axis(0))).unwrap();
        let go = store
            .save_memory(new_memory(
                "Go programming language was created by Google in 2009",
                axis(1),
            ))
            .unwrap();
        store
            .save_memory(new_memory("Python is a programming language", axis(2)))
            .unwrap();

        let hits = store
            .lexical_search_memories("Go programming language Google", 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].item.id, go);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.score > 0.0));
        assert!((hits[0].coverage - 1.0).abs() < 1e-9);
        assert!((hits[1].coverage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_lexical_search_tie_prefers_recent() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let older = store.save_memory(new_memory("coffee order", axis(0))).unwrap();
        let newer = store.save_memory(new_memory("coffee order", axis(1))).unwrap();

        let hits = store.lexical_search_memories("coffee", 10).unwrap();
        assert_eq!(hits[0].item.id, newer);
        assert_eq!(hits[1].item.id, older);
    }

    #[test]
    fn test_lexical_search_limit_and_syntax_safety() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .save_memory(new_memory(&format!("note number {i}"), axis(i)))
                .unwrap();
        }
        assert_eq!(store.lexical_search_memories("note", 3).unwrap().len(), 3);
        // FTS5 operators and punctuation are treated as plain terms
        assert!(store.lexical_search_memories("NEAR(\"x\" AND -y*", 3).is_ok());
        assert!(store.lexical_search_memories("?!", 3).unwrap().is_empty());
    }

    #[test]
    fn test_close_then_use_fails() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.list_memories(None), Err(MemoryError::StoreClosed)));
        assert!(matches!(
            store.save_memory(new_memory("late", axis(0))),
            Err(MemoryError::StoreClosed)
        ));
        assert!(matches!(store.close(), Err(MemoryError::StoreClosed)));
    }

    #[test]
    fn test_first_save_records_embedding_model() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        assert!(store.embedding_model().unwrap().is_none());
        store.save_memory(new_memory("fact", axis(0))).unwrap();
        assert_eq!(store.embedding_model().unwrap().as_deref(), Some("test/unit-8"));
    }

    #[test]
    fn test_fts_match_expression() {
        let expr = |q: &str| fts_match_expression(&query_terms(q));
        assert_eq!(expr("Hello, World!").as_deref(), Some("\"hello\" OR \"world\""));
        assert_eq!(expr("rust OR rust").as_deref(), Some("\"rust\""));
        assert_eq!(expr("  ...  "), None);
        assert_eq!(expr(""), None);
    }

    #[test]
    fn test_query_terms_drop_stopwords() {
        assert_eq!(query_terms("What is my favorite color?"), vec!["favorite", "color"]);
        // nothing but stopwords: keep them rather than match nothing
        assert_eq!(query_terms("The Who"), vec!["the", "who"]);
        assert_eq!(query_terms(&"word ".repeat(3)), vec!["word"]);
    }

    #[test]
    fn test_lexical_hits_report_term_coverage() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let full = store
            .save_memory(new_memory("Helix is my editor of choice", axis(0)))
            .unwrap();
        let partial = store.save_memory(new_memory("Editors argue a lot", axis(1))).unwrap();

        let hits = store.lexical_search_memories("which editor is Helix", 10).unwrap();
        assert_eq!(hits.len(), 2);
        let coverage = |id: &str| hits.iter().find(|h| h.item.id == id).unwrap().coverage;
        assert!((coverage(&full) - 1.0).abs() < 1e-9);
        // "editors" stems to "editor"; "helix" is missing
        assert!((coverage(&partial) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_stopword_only_overlap_is_not_a_hit() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        store
            .save_memory(new_memory("Go is a language created by Google", axis(0)))
            .unwrap();
        assert!(store
            .lexical_search_memories("what is my favorite color", 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_list_filters_by_source() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        let explicit = store.save_memory(new_memory("told directly", axis(0))).unwrap();
        let mut inferred = new_memory("picked up from chat", axis(1));
        inferred.source = Source::Inferred;
        let inferred = store.save_memory(inferred).unwrap();

        assert_eq!(store.list_memories(None).unwrap().len(), 2);
        let only_inferred = store.list_memories(Some(Source::Inferred)).unwrap();
        assert_eq!(only_inferred.len(), 1);
        assert_eq!(only_inferred[0].id, inferred);
        let only_explicit = store.list_memories(Some(Source::Explicit)).unwrap();
        assert_eq!(only_explicit.len(), 1);
        assert_eq!(only_explicit[0].id, explicit);
    }

    #[test]
    fn test_model_dimension() {
        let mut store = MemoryStore::open_in_memory().unwrap();
        assert_eq!(store.model_dimension(&model()).unwrap(), None);
        store.save_memory(new_memory("fact", axis(0))).unwrap();
        assert_eq!(store.model_dimension(&model()).unwrap(), Some(8));
        assert_eq!(
            store
                .model_dimension(&ModelIdentity::new("test", "unit-3"))
                .unwrap(),
            None
        );
    }
}
