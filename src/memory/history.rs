//! Conversation history table: append, keyword search, recent, and clear.
//!
//! History rows carry no embedding and are only ever searched lexically. The
//! conversation logger appends; the engine itself only reads, apart from the
//! maintenance deletes exposed here.

use rusqlite::{params, OptionalExtension, Row};

use super::now_timestamp;
use super::store::{fts_match_expression, query_terms, term_coverage, MemoryStore};
use super::types::{HistoryItem, LexicalHit, Role};
use crate::error::{MemoryError, Result};

impl MemoryStore {
    /// Append one conversational turn and return its id.
    pub fn append_history(&mut self, role: Role, content: &str) -> Result<String> {
        if content.trim().is_empty() {
            return Err(MemoryError::Validation("history content must not be empty".into()));
        }

        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        let id = uuid::Uuid::now_v7().to_string();
        tx.execute(
            "INSERT INTO history (id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, role.as_str(), content, now_timestamp()],
        )?;
        let seq = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO history_fts (rowid, content) VALUES (?1, ?2)",
            params![seq, content],
        )?;
        tx.commit()?;

        Ok(id)
    }

    /// BM25 keyword search over history content; higher score is better, ties
    /// go to the more recent turn. Hits carry their query-term coverage.
    pub fn lexical_search_history(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<LexicalHit<HistoryItem>>> {
        let terms = query_terms(query);
        let Some(expr) = fts_match_expression(&terms) else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT h.id, h.role, h.content, h.created_at, bm25(history_fts) AS score, h.seq \
             FROM history_fts JOIN history h ON h.seq = history_fts.rowid \
             WHERE history_fts MATCH ?1 \
             ORDER BY score ASC, h.created_at DESC, h.seq DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![expr, limit as i64], |row| {
                let item = history_from_row(row)?;
                let score: f64 = row.get(4)?;
                let seq: i64 = row.get(5)?;
                Ok((item, -score, seq))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let seqs: Vec<i64> = rows.iter().map(|(_, _, seq)| *seq).collect();
        let coverage = term_coverage(conn, "history_fts", &terms, &seqs)?;
        Ok(rows
            .into_iter()
            .map(|(item, score, seq)| LexicalHit {
                item,
                score,
                coverage: coverage.get(&seq).copied().unwrap_or(0.0),
            })
            .collect())
    }

    /// The `limit` most recent turns, newest first.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<HistoryItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT h.id, h.role, h.content, h.created_at FROM history h \
             ORDER BY h.created_at DESC, h.seq DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], history_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_history(&mut self, id: &str) -> Result<()> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;

        let (seq, content): (i64, String) = tx
            .query_row(
                "SELECT seq, content FROM history WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| MemoryError::history_not_found(id))?;

        tx.execute(
            "INSERT INTO history_fts (history_fts, rowid, content) VALUES ('delete', ?1, ?2)",
            params![seq, content],
        )?;
        tx.execute("DELETE FROM history WHERE seq = ?1", params![seq])?;
        tx.commit()?;
        Ok(())
    }

    /// Remove all history. Returns the number of rows removed.
    pub fn clear_history(&mut self) -> Result<usize> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM history", [])?;
        tx.execute("INSERT INTO history_fts (history_fts) VALUES ('delete-all')", [])?;
        tx.commit()?;

        tracing::info!(removed, "history cleared");
        Ok(removed)
    }
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryItem> {
    let role_str: String = row.get(1)?;
    let role: Role = role_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(HistoryItem {
        id: row.get(0)?,
        role,
        content: row.get(2)?,
        created_at: row.get(3)?,
    })
}
