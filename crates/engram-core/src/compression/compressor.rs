//! Threshold-triggered compression of a session's oldest memories.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use engram_types::config::CompressionConfig;
use engram_types::error::StoreError;
use engram_types::memory::{
    Memory, MemoryKind, ORIGINAL_TOKENS_KEY, REPLACED_IDS_KEY,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compression::summarizer::Summarizer;
use crate::store::MemoryStore;
use crate::token::estimate_tokens;

/// Per-session compressor state. `Compressing` blocks a second cycle from
/// starting for the same session; sessions are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionState {
    Normal,
    Compressing,
}

/// Watches per-session token volume and, past a threshold, replaces the
/// oldest block of raw memories with one summary memory.
///
/// A cycle is atomic through `MemoryStore::replace_memories`: either the
/// whole block is swapped for the summary or nothing changes. A failed
/// summarization aborts the cycle and is retried on the next qualifying
/// write.
pub struct AdaptiveCompressor<S, Su> {
    store: Arc<S>,
    summarizer: Arc<Su>,
    config: CompressionConfig,
    states: DashMap<Uuid, CompressionState>,
}

impl<S: MemoryStore, Su: Summarizer> AdaptiveCompressor<S, Su> {
    pub fn new(store: Arc<S>, summarizer: Arc<Su>, config: CompressionConfig) -> Self {
        Self {
            store,
            summarizer,
            config,
            states: DashMap::new(),
        }
    }

    /// Current state for a session, `Normal` if never compressed.
    pub fn state(&self, session_id: &Uuid) -> CompressionState {
        self.states
            .get(session_id)
            .map(|s| *s)
            .unwrap_or(CompressionState::Normal)
    }

    /// Run one compression cycle if the session's raw token volume exceeds
    /// the threshold. Returns `Ok(true)` when a summary replaced a block.
    ///
    /// Never errors on summarization failure; only store failures
    /// propagate. Re-entrant calls for a session already compressing are
    /// no-ops.
    pub async fn maybe_compress(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let memories = self.store.get_memories(&session_id, None, None).await?;

        // Raw (compressible) memories, oldest first. Summaries and injected
        // context are never re-compressed.
        let mut raw: Vec<&Memory> = memories
            .iter()
            .filter(|m| matches!(m.kind, MemoryKind::Conversation | MemoryKind::ToolOutput))
            .collect();
        raw.sort_by_key(|m| m.created_at);

        let total_tokens: u64 = raw.iter().map(|m| m.token_count as u64).sum();
        if total_tokens <= self.config.threshold_tokens {
            return Ok(false);
        }

        if !self.begin(session_id) {
            debug!(%session_id, "compression already in progress, skipping");
            return Ok(false);
        }

        let result = self.compress_block(session_id, &raw, total_tokens).await;
        self.states.insert(session_id, CompressionState::Normal);
        result
    }

    async fn compress_block(
        &self,
        session_id: Uuid,
        raw: &[&Memory],
        total_tokens: u64,
    ) -> Result<bool, StoreError> {
        // Oldest contiguous block covering ~block_fraction of total tokens;
        // the memory that crosses the line is included whole.
        let target = (total_tokens as f32 * self.config.block_fraction) as u64;
        let mut block: Vec<&Memory> = Vec::new();
        let mut block_tokens: u64 = 0;
        for memory in raw.iter().copied() {
            block.push(memory);
            block_tokens += memory.token_count as u64;
            if block_tokens >= target {
                break;
            }
        }
        if block.len() < 2 {
            // A single oversized memory cannot be usefully compressed
            // against a 3:1 target; wait for more material.
            return Ok(false);
        }

        let combined = block
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let summary_text = match self
            .summarizer
            .summarize(&combined, self.config.target_ratio)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!(%session_id, error = %err.0, "summarization failed, aborting cycle");
                return Ok(false);
            }
        };

        let summary_tokens = estimate_tokens(&summary_text);
        let mut summary = Memory::new(session_id, MemoryKind::Summary, summary_text, summary_tokens);
        summary.compression_ratio =
            (block_tokens as f32 / summary_tokens.max(1) as f32).max(1.0);
        summary.metadata.insert(
            REPLACED_IDS_KEY.to_string(),
            serde_json::json!(
                block.iter().map(|m| m.id.to_string()).collect::<Vec<_>>()
            ),
        );
        summary.metadata.insert(
            ORIGINAL_TOKENS_KEY.to_string(),
            serde_json::json!(block_tokens),
        );

        let block_ids: Vec<Uuid> = block.iter().map(|m| m.id).collect();
        self.store.replace_memories(&block_ids, &summary).await?;

        info!(
            %session_id,
            replaced = block_ids.len(),
            original_tokens = block_tokens,
            summary_tokens,
            ratio = summary.compression_ratio,
            "compressed memory block"
        );
        Ok(true)
    }

    /// Transition NORMAL -> COMPRESSING, failing if already compressing.
    fn begin(&self, session_id: Uuid) -> bool {
        match self.states.entry(session_id) {
            Entry::Occupied(mut entry) => match entry.get() {
                CompressionState::Compressing => false,
                CompressionState::Normal => {
                    entry.insert(CompressionState::Compressing);
                    true
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(CompressionState::Compressing);
                true
            }
        }
    }
}
