//! Plain-text rendering of a [`RetrievalResponse`] for an LLM caller.

use std::fmt::Write;

use super::retrieval::{Degradation, RetrievalResponse};

/// Marker returned when a query ran successfully but nothing cleared the thresholds.
pub const NO_RESULTS: &str = "No relevant memories found.";

/// Render results in rank order: memories first, then related history, then
/// any degradation notes. Output is a pure function of the response.
pub fn format_as_text(response: &RetrievalResponse) -> String {
    let mut out = String::new();

    let memories: Vec<_> = response.memories().collect();
    let history: Vec<_> = response.history().collect();

    if memories.is_empty() && history.is_empty() {
        out.push_str(NO_RESULTS);
    } else if memories.is_empty() {
        out.push_str("No saved memories matched.");
    } else {
        let noun = if memories.len() == 1 { "memory" } else { "memories" };
        let _ = writeln!(out, "Found {} relevant {noun}:", memories.len());
        for (item, result) in &memories {
            let _ = writeln!(out, "\n{}. {}", result.rank, item.text);
            let mut meta = Vec::new();
            if !item.tags.is_empty() {
                meta.push(format!("tags: {}", item.tags.join(", ")));
            }
            meta.push(format!("saved: {}", date_of(&item.created_at)));
            meta.push(format!("score: {:.2}", result.fused_score));
            let _ = write!(out, "   {}", meta.join(" | "));
        }
    }

    if !history.is_empty() {
        out.push_str("\n\nRelated conversation history:");
        for (turn, result) in &history {
            let _ = writeln!(out, "\n{}. [{}] {}", result.rank, turn.role, turn.content);
            let _ = write!(
                out,
                "   at: {} | score: {:.2}",
                date_of(&turn.created_at),
                result.fused_score
            );
        }
    }

    for degradation in &response.degradations {
        let note = match degradation {
            Degradation::SemanticUnavailable { .. } => {
                "semantic search was unavailable; results are keyword matches only".to_string()
            }
            Degradation::RewriteSkipped { .. } => {
                "query rewrite failed; the original query was used".to_string()
            }
            Degradation::IncompatibleVectors { skipped } => format!(
                "{skipped} memories were embedded with a different model and were not compared semantically"
            ),
        };
        let _ = write!(out, "\n\nNote: {note}.");
    }

    out
}

/// `YYYY-MM-DD` from an RFC 3339 timestamp, or the input unchanged.
fn date_of(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}
