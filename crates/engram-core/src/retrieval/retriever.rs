//! Token-budgeted hybrid retrieval over a session's memories.

use std::sync::Arc;

use chrono::Utc;
use engram_types::config::RetrievalConfig;
use engram_types::error::StoreError;
use engram_types::memory::ScoredMemory;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::embedding::{EmbeddingCache, EmbeddingProvider};
use crate::retrieval::scoring::{cosine_similarity, keyword_score, temporal_decay};
use crate::store::MemoryStore;

/// Ranks a session's memories against a query and greedily fills a token
/// budget with the highest-scoring ones.
///
/// Scores combine three signals: cosine similarity of embeddings, Jaccard
/// keyword overlap (with a phrase-match boost), and exponential recency
/// decay. When the query embedding cannot be obtained the retriever
/// degrades to keyword + temporal ranking instead of failing the turn.
pub struct HybridRetriever<S, P> {
    store: Arc<S>,
    embeddings: Arc<EmbeddingCache<P>>,
    config: RetrievalConfig,
}

impl<S: MemoryStore, P: EmbeddingProvider> HybridRetriever<S, P> {
    pub fn new(store: Arc<S>, embeddings: Arc<EmbeddingCache<P>>, config: RetrievalConfig) -> Self {
        Self {
            store,
            embeddings,
            config,
        }
    }

    /// Retrieve the best memories for `query` that fit within `token_budget`.
    ///
    /// Selection is strictly greedy by score: a memory whose own
    /// `token_count` exceeds the remaining budget is skipped whole, never
    /// truncated, and lower-scoring memories that still fit are kept.
    /// Returns an empty vec (not an error) when nothing fits.
    pub async fn retrieve(
        &self,
        session_id: Uuid,
        query: &str,
        token_budget: u32,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredMemory>, StoreError> {
        if token_budget == 0 || top_k == Some(0) {
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .get_memories(&session_id, None, Some(self.config.max_scan as i64))
            .await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = match self.embeddings.get_or_compute(query).await {
            Ok(vector) => Some(vector),
            Err(err) => {
                warn!(%session_id, error = %err.0, "query embedding unavailable, keyword-only ranking");
                None
            }
        };

        let now = Utc::now();
        let mut scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .map(|mut memory| {
                let keyword = keyword_score(query, &memory.content, self.config.phrase_boost);
                let combined = match (&query_embedding, &memory.embedding) {
                    // No query embedding: re-normalize to keyword alone so
                    // scores stay in [0, 1].
                    (None, _) => keyword,
                    (Some(query_vec), Some(candidate_vec)) => {
                        let semantic = cosine_similarity(query_vec, candidate_vec).max(0.0);
                        self.config.semantic_weight * semantic
                            + self.config.keyword_weight * keyword
                    }
                    // Candidate never got an embedding: semantic signal is 0.
                    (Some(_), None) => self.config.keyword_weight * keyword,
                };
                let score =
                    combined * temporal_decay(memory.created_at, now, self.config.half_life_days);
                memory.relevance_score = score;
                ScoredMemory { memory, score }
            })
            .collect();

        // Descending by score, ties broken by more-recent-first.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
        });

        let mut selected = Vec::new();
        let mut remaining = token_budget;
        for entry in scored {
            if let Some(k) = top_k {
                if selected.len() >= k {
                    break;
                }
            }
            if entry.memory.token_count <= remaining {
                remaining -= entry.memory.token_count;
                selected.push(entry);
            }
        }

        debug!(
            %session_id,
            selected = selected.len(),
            used_tokens = token_budget - remaining,
            "retrieval complete"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use engram_types::config::EmbeddingConfig;
    use engram_types::memory::{Memory, MemoryKind};
    use engram_types::session::Session;

    use super::*;
    use crate::test_support::{FixedEmbedder, InMemoryStore};

    fn memory(session_id: Uuid, content: &str, tokens: u32) -> Memory {
        Memory::new(session_id, MemoryKind::Conversation, content, tokens)
    }

    async fn seed(store: &InMemoryStore, memories: Vec<Memory>) {
        for m in memories {
            store.put_memory(&m).await.unwrap();
        }
    }

    async fn open_session(store: &InMemoryStore) -> Session {
        let session = Session::new("retrieval test");
        store.create_session(&session).await.unwrap();
        session
    }

    fn retriever(
        store: Arc<InMemoryStore>,
        embedder: FixedEmbedder,
    ) -> HybridRetriever<InMemoryStore, FixedEmbedder> {
        let cache = Arc::new(EmbeddingCache::new(embedder, &EmbeddingConfig::default()));
        HybridRetriever::new(store, cache, RetrievalConfig::default())
    }

    #[tokio::test]
    async fn test_zero_budget_returns_empty() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        seed(&store, vec![memory(session.id, "anything", 10)]).await;

        let r = retriever(Arc::clone(&store), FixedEmbedder::healthy());
        let result = r.retrieve(session.id, "anything", 0, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_budget_ceiling_holds() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        seed(
            &store,
            vec![
                memory(session.id, "refund policy details", 40),
                memory(session.id, "refund policy summary", 40),
                memory(session.id, "refund policy appendix", 40),
            ],
        )
        .await;

        let r = retriever(Arc::clone(&store), FixedEmbedder::healthy());
        let result = r
            .retrieve(session.id, "refund policy", 100, None)
            .await
            .unwrap();

        let total: u32 = result.iter().map(|s| s.memory.token_count).sum();
        assert!(total <= 100);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_memory_skipped_not_truncated() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        // Highest scorer is too big for the budget; smaller one still fits.
        let mut big = memory(session.id, "refund policy full text", 500);
        big.created_at = Utc::now();
        let mut small = memory(session.id, "refund mention", 50);
        small.created_at = Utc::now() - Duration::days(1);
        seed(&store, vec![big, small]).await;

        let r = retriever(Arc::clone(&store), FixedEmbedder::healthy());
        let result = r
            .retrieve(session.id, "refund policy", 100, None)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].memory.token_count, 50);
    }

    #[tokio::test]
    async fn test_phrase_match_ranks_first_despite_recency() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        let now = Utc::now();
        let mut memories = vec![
            memory(session.id, "shipping times vary by region", 20),
            memory(session.id, "payment methods accepted here", 20),
            memory(session.id, "our refund policy allows 30 days", 20),
            memory(session.id, "refund requests need an order id", 20),
            memory(session.id, "contact support for account issues", 20),
        ];
        // Phrase holder is the oldest candidate.
        for (i, m) in memories.iter_mut().enumerate() {
            m.created_at = now - Duration::days((5 - i) as i64);
        }
        seed(&store, memories).await;

        let r = retriever(Arc::clone(&store), FixedEmbedder::healthy());
        let result = r
            .retrieve(session.id, "refund policy", 1_000, None)
            .await
            .unwrap();

        assert!(result[0].memory.content.contains("refund policy"));
    }

    #[tokio::test]
    async fn test_embedding_outage_degrades_to_keyword() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        seed(
            &store,
            vec![
                memory(session.id, "refund policy details", 20),
                memory(session.id, "unrelated gardening tips", 20),
            ],
        )
        .await;

        let r = retriever(Arc::clone(&store), FixedEmbedder::failing());
        let result = r
            .retrieve(session.id, "refund policy", 1_000, None)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert!(result[0].memory.content.contains("refund policy"));
        assert!(result[0].score > result[1].score);
    }

    #[tokio::test]
    async fn test_semantic_signal_uses_stored_vector_only() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        let embedder = FixedEmbedder::healthy();
        let query = "refund policy";

        // Same keyword overlap either way; only one candidate carries a
        // stored vector, and only that one earns the semantic weight.
        let mut with_vector = memory(session.id, "policy refund", 20);
        with_vector.embedding = Some(embedder.embed(query).await.unwrap());
        let without_vector = memory(session.id, "policy refund", 20);
        seed(&store, vec![with_vector.clone(), without_vector]).await;

        let r = retriever(Arc::clone(&store), embedder);
        let result = r.retrieve(session.id, query, 1_000, None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].memory.id, with_vector.id);
        assert!(result[0].score > result[1].score);
    }

    #[tokio::test]
    async fn test_top_k_limits_results() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        seed(
            &store,
            vec![
                memory(session.id, "refund one", 10),
                memory(session.id, "refund two", 10),
                memory(session.id, "refund three", 10),
            ],
        )
        .await;

        let r = retriever(Arc::clone(&store), FixedEmbedder::healthy());
        let result = r
            .retrieve(session.id, "refund", 1_000, Some(2))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_session_returns_empty() {
        let store = Arc::new(InMemoryStore::new());
        let session = open_session(&store).await;
        let r = retriever(Arc::clone(&store), FixedEmbedder::healthy());
        let result = r.retrieve(session.id, "anything", 100, None).await.unwrap();
        assert!(result.is_empty());
    }
}
