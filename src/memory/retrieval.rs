//! Hybrid retrieval: optional rewrite → embed → keyword + vector search → fuse → rank.
//!
//! The [`Retriever`] keeps no state between calls and is cheap to build per
//! request. The two search branches read independent snapshots and may finish
//! in any order; [`fuse`] is a pure function of both result sets, so the
//! ranking does not depend on arrival order.
//!
//! Fusion policy:
//! - a keyword hit containing less than `min_term_coverage` of the distinct
//!   query terms is dropped before scoring
//! - lexical score is the BM25 score rescaled by the best in its set, times
//!   the hit's term coverage, so a lone weak match never scores 1
//! - semantic scores are cosine similarities clamped to `[0, 1]`
//! - `fused = semantic_weight * semantic + lexical_weight * lexical`; when the
//!   semantic branch is unavailable the lexical weight becomes 1
//! - at least one signal must clear its floor (`min_semantic_score` /
//!   `min_lexical_score`), every item must clear `min_fused_score`, then the
//!   list is cut to `top_k`
//! - ties go to the more recent item

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::store::{lock_store, MemoryStore};
use super::types::{HistoryItem, LexicalHit, MemoryItem, MemoryVector};
use super::vector;
use crate::config::RetrievalConfig;
use crate::embedding::{EmbeddingProvider, ModelIdentity, QueryRewriter};
use crate::error::{MemoryError, Result};

/// Default bound on each provider call when none is configured.
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// A ranked item: either a saved memory or a conversation turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievedItem {
    Memory(MemoryItem),
    History(HistoryItem),
}

impl RetrievedItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Memory(m) => &m.id,
            Self::History(h) => &h.id,
        }
    }

    pub fn created_at(&self) -> &str {
        match self {
            Self::Memory(m) => &m.created_at,
            Self::History(h) => &h.created_at,
        }
    }
}

/// One entry of the final ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub item: RetrievedItem,
    /// BM25 score rescaled within its result set, times query-term coverage.
    pub lexical_score: Option<f64>,
    /// Cosine similarity clamped to `[0, 1]`. Always `None` for history.
    pub semantic_score: Option<f64>,
    pub fused_score: f64,
    /// 1-based position in the response.
    pub rank: usize,
}

/// A fallback taken while answering a query. Always surfaced on the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// The rewriter failed or timed out; the original query was used.
    RewriteSkipped { reason: String },
    /// The query could not be embedded; results are keyword matches only.
    SemanticUnavailable { reason: String },
    /// Stored vectors from another model or dimension were left out of scoring.
    IncompatibleVectors { skipped: usize },
}

/// Outcome of [`Retriever::retrieve`].
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_query: Option<String>,
    /// Memories first (by rank), then history hits.
    pub results: Vec<RetrievalResult>,
    pub degradations: Vec<Degradation>,
}

impl RetrievalResponse {
    /// `true` when the semantic signal was unavailable for this query.
    pub fn is_degraded(&self) -> bool {
        self.degradations
            .iter()
            .any(|d| matches!(d, Degradation::SemanticUnavailable { .. }))
    }

    pub fn rewrite_skipped(&self) -> bool {
        self.degradations
            .iter()
            .any(|d| matches!(d, Degradation::RewriteSkipped { .. }))
    }

    pub fn memories(&self) -> impl Iterator<Item = (&MemoryItem, &RetrievalResult)> {
        self.results.iter().filter_map(|r| match &r.item {
            RetrievedItem::Memory(m) => Some((m, r)),
            RetrievedItem::History(_) => None,
        })
    }

    pub fn history(&self) -> impl Iterator<Item = (&HistoryItem, &RetrievalResult)> {
        self.results.iter().filter_map(|r| match &r.item {
            RetrievedItem::History(h) => Some((h, r)),
            RetrievedItem::Memory(_) => None,
        })
    }
}

struct LexicalCandidates {
    memories: Vec<LexicalHit<MemoryItem>>,
    history: Vec<LexicalHit<HistoryItem>>,
}

/// Semantic hits with their cosine, plus the number of stored vectors skipped.
type SemanticCandidates = (Vec<(MemoryItem, f64)>, usize);

/// Per-request hybrid retriever.
pub struct Retriever {
    store: Arc<Mutex<MemoryStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: ModelIdentity,
    rewriter: Option<(Arc<dyn QueryRewriter>, ModelIdentity)>,
    config: RetrievalConfig,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        store: Arc<Mutex<MemoryStore>>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: ModelIdentity,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model,
            rewriter: None,
            config,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Enable query rewriting through `rewriter` using `model`.
    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>, model: ModelIdentity) -> Self {
        self.rewriter = Some((rewriter, model));
        self
    }

    /// Bound every provider call (rewrite, embed) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answer `query` with the best-effort ranked set of memories (and history).
    ///
    /// Only a blank query or an unreachable store is an error; provider
    /// failures degrade the response and are listed in
    /// [`RetrievalResponse::degradations`]. Dropping the returned future
    /// cancels the request; the store is only read, so it stays intact.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MemoryError::InvalidInput(
                "query must be a non-empty string".into(),
            ));
        }

        let mut degradations = Vec::new();
        let rewritten = self.rewrite_query(query, &mut degradations).await;
        let search_text = rewritten.as_deref().unwrap_or(query);
        // Keyword search keeps the caller's literal terms even if the rewrite dropped them
        let lexical_text = match &rewritten {
            Some(r) => format!("{query} {r}"),
            None => query.to_string(),
        };

        let (embedded, lexical) = tokio::join!(
            self.embed_query(search_text),
            self.lexical_candidates(lexical_text),
        );
        let lexical = lexical?;

        let semantic = match embedded {
            Ok(query_vector) => self.semantic_candidates(query_vector).await?,
            Err(reason) => Err(reason),
        };
        let semantic = match semantic {
            Ok((hits, skipped)) => {
                if skipped > 0 {
                    warn!(skipped, model = %self.embedding_model, "skipped vectors from another model or dimension");
                    degradations.push(Degradation::IncompatibleVectors { skipped });
                }
                Some(hits)
            }
            Err(reason) => {
                warn!(reason = %reason, "semantic search unavailable, falling back to keyword results");
                degradations.push(Degradation::SemanticUnavailable { reason });
                None
            }
        };

        let mut results = fuse(semantic.as_deref(), &lexical.memories, &self.config);
        if self.config.include_history {
            results.extend(rank_history(&lexical.history, &self.config, results.len()));
        }

        info!(
            results = results.len(),
            lexical_candidates = lexical.memories.len(),
            semantic_candidates = semantic.as_ref().map_or(0, Vec::len),
            degraded = semantic.is_none(),
            "retrieval complete"
        );

        Ok(RetrievalResponse {
            query: query.to_string(),
            rewritten_query: rewritten,
            results,
            degradations,
        })
    }

    async fn rewrite_query(&self, query: &str, degradations: &mut Vec<Degradation>) -> Option<String> {
        let (rewriter, model) = self.rewriter.as_ref()?;

        let reason = match tokio::time::timeout(self.timeout, rewriter.rewrite(model, query)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    debug!(original = %query, rewritten = %text, "query rewritten");
                    return Some(text.to_string());
                }
                "rewrite returned empty text".to_string()
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("rewrite timed out after {}s", self.timeout.as_secs_f64()),
        };

        warn!(reason = %reason, "query rewrite skipped, using original query");
        degradations.push(Degradation::RewriteSkipped { reason });
        None
    }

    /// Embed and normalize the query. The error is the degradation reason.
    async fn embed_query(&self, text: &str) -> std::result::Result<Vec<f32>, String> {
        let raw = match tokio::time::timeout(
            self.timeout,
            self.embedder.embed(&self.embedding_model, text),
        )
        .await
        {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(format!("embedding failed: {e:#}")),
            Err(_) => {
                return Err(format!(
                    "embedding timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            }
        };
        vector::normalize(&raw).map_err(|e| format!("unusable query embedding: {e}"))
    }

    async fn lexical_candidates(&self, text: String) -> Result<LexicalCandidates> {
        let store = Arc::clone(&self.store);
        let limit = self.config.candidate_limit;
        let include_history = self.config.include_history;

        tokio::task::spawn_blocking(move || -> Result<LexicalCandidates> {
            let store = lock_store(&store)?;
            let memories = store.lexical_search_memories(&text, limit)?;
            let history = if include_history {
                store.lexical_search_history(&text, limit)?
            } else {
                Vec::new()
            };
            Ok(LexicalCandidates { memories, history })
        })
        .await
        .map_err(|e| MemoryError::StorageUnavailable(format!("keyword search task failed: {e}")))?
    }

    /// Score the query against stored vectors. The inner error is a degradation
    /// reason: the query vector cannot be compared with this model's vectors.
    async fn semantic_candidates(
        &self,
        query_vector: Vec<f32>,
    ) -> Result<std::result::Result<SemanticCandidates, String>> {
        let store = Arc::clone(&self.store);
        let model = self.embedding_model.clone();
        let limit = self.config.candidate_limit;

        tokio::task::spawn_blocking(move || -> Result<std::result::Result<SemanticCandidates, String>> {
            let store = lock_store(&store)?;
            if let Some(dim) = store.model_dimension(&model)? {
                if dim != query_vector.len() {
                    return Ok(Err(format!(
                        "query embedding has {} dimensions, stored {model} vectors have {dim}",
                        query_vector.len()
                    )));
                }
            }
            let vectors = store.all_memory_vectors()?;
            let (scored, skipped) = score_vectors(&query_vector, &vectors, &model, limit);

            let ids: Vec<&str> = scored.iter().map(|(id, _)| id.as_str()).collect();
            let mut by_id: HashMap<String, MemoryItem> = store
                .memories_by_ids(&ids)?
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect();
            let hits = scored
                .into_iter()
                .filter_map(|(id, sim)| by_id.remove(&id).map(|m| (m, sim)))
                .collect();
            Ok(Ok((hits, skipped)))
        })
        .await
        .map_err(|e| MemoryError::StorageUnavailable(format!("vector search task failed: {e}")))?
    }
}

/// Brute-force cosine scoring of `query` against every compatible stored vector.
///
/// Vectors from another model or with another length are skipped and counted.
/// Returns `(id, cosine)` for positive similarities, best first, at most `limit`.
pub fn score_vectors(
    query: &[f32],
    vectors: &[MemoryVector],
    model: &ModelIdentity,
    limit: usize,
) -> (Vec<(String, f64)>, usize) {
    let mut skipped = 0;
    let mut scored: Vec<(String, f64)> = Vec::new();

    for v in vectors {
        if v.provider != model.provider || v.model_id != model.model_id {
            skipped += 1;
            continue;
        }
        match vector::cosine_similarity(query, &v.embedding) {
            Ok(sim) if sim > 0.0 => scored.push((v.id.clone(), f64::from(sim))),
            Ok(_) => {}
            Err(_) => skipped += 1,
        }
    }

    // UUID v7 ids sort by creation time, so id order breaks ties toward recent
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    scored.truncate(limit);
    (scored, skipped)
}

struct Candidate {
    item: MemoryItem,
    lexical: Option<f64>,
    semantic: Option<f64>,
}

/// Lexical signal of one keyword hit, or `None` when it covers too few query terms.
fn lexical_signal(score: f64, best: f64, coverage: f64, config: &RetrievalConfig) -> Option<f64> {
    if coverage < config.min_term_coverage {
        return None;
    }
    let rescaled = if best > 0.0 { (score / best).clamp(0.0, 1.0) } else { 1.0 };
    Some(rescaled * coverage.clamp(0.0, 1.0))
}

fn best_score<T>(hits: &[LexicalHit<T>]) -> f64 {
    hits.iter().map(|h| h.score).fold(0.0, f64::max)
}

/// At least one signal must clear its own floor.
fn has_strong_signal(semantic: Option<f64>, lexical: Option<f64>, config: &RetrievalConfig) -> bool {
    semantic.is_some_and(|s| s >= config.min_semantic_score)
        || lexical.is_some_and(|l| l >= config.min_lexical_score)
}

/// Merge semantic and lexical memory hits into one ranked, thresholded list.
///
/// `semantic` is `None` when the semantic branch was unavailable; lexical then
/// carries the full weight.
pub fn fuse(
    semantic: Option<&[(MemoryItem, f64)]>,
    lexical: &[LexicalHit<MemoryItem>],
    config: &RetrievalConfig,
) -> Vec<RetrievalResult> {
    let (semantic_weight, lexical_weight) = match semantic {
        Some(_) => (config.semantic_weight, config.lexical_weight),
        None => (0.0, 1.0),
    };

    let best_lexical = best_score(lexical);
    let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();

    for hit in lexical {
        let Some(signal) = lexical_signal(hit.score, best_lexical, hit.coverage, config) else {
            continue;
        };
        candidates
            .entry(hit.item.id.clone())
            .or_insert_with(|| Candidate {
                item: hit.item.clone(),
                lexical: None,
                semantic: None,
            })
            .lexical = Some(signal);
    }
    for (item, cosine) in semantic.unwrap_or(&[]) {
        candidates
            .entry(item.id.clone())
            .or_insert_with(|| Candidate {
                item: item.clone(),
                lexical: None,
                semantic: None,
            })
            .semantic = Some(cosine.clamp(0.0, 1.0));
    }

    let mut results: Vec<RetrievalResult> = candidates
        .into_values()
        .filter_map(|c| {
            if !has_strong_signal(c.semantic, c.lexical, config) {
                return None;
            }
            let fused = semantic_weight * c.semantic.unwrap_or(0.0)
                + lexical_weight * c.lexical.unwrap_or(0.0);
            if fused < config.min_fused_score {
                return None;
            }
            Some(RetrievalResult {
                item: RetrievedItem::Memory(c.item),
                lexical_score: c.lexical,
                semantic_score: c.semantic,
                fused_score: fused,
                rank: 0,
            })
        })
        .collect();

    sort_and_rank(&mut results, config.top_k, 0);
    results
}

/// Rank keyword hits from conversation history. Ranks continue after `offset`.
fn rank_history(
    hits: &[LexicalHit<HistoryItem>],
    config: &RetrievalConfig,
    offset: usize,
) -> Vec<RetrievalResult> {
    let best = best_score(hits);
    let mut results: Vec<RetrievalResult> = hits
        .iter()
        .filter_map(|hit| {
            let lexical = lexical_signal(hit.score, best, hit.coverage, config)?;
            let fused = config.lexical_weight * lexical;
            if lexical < config.min_lexical_score || fused < config.min_fused_score {
                return None;
            }
            Some(RetrievalResult {
                item: RetrievedItem::History(hit.item.clone()),
                lexical_score: Some(lexical),
                semantic_score: None,
                fused_score: fused,
                rank: 0,
            })
        })
        .collect();

    sort_and_rank(&mut results, config.history_top_k, offset);
    results
}

/// Sort by fused score, then newer first, then id; cut to `limit`; number from `offset + 1`.
fn sort_and_rank(results: &mut Vec<RetrievalResult>, limit: usize, offset: usize) {
    results.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| b.item.created_at().cmp(a.item.created_at()))
            .then_with(|| b.item.id().cmp(a.item.id()))
    });
    results.truncate(limit);
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = offset + i + 1;
    }
}
