//! Per-turn coordination of retrieval, tools, assembly, and persistence.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use engram_types::config::EngineConfig;
use engram_types::error::{StoreError, TurnError};
use engram_types::memory::{Memory, MemoryKind, SessionMemoryStats};
use engram_types::session::{Message, MessageRole, Session};
use engram_types::tool::ToolCall;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::compression::{AdaptiveCompressor, Summarizer};
use crate::context::ContextAssembler;
use crate::embedding::{EmbeddingCache, EmbeddingProvider};
use crate::retrieval::HybridRetriever;
use crate::store::MemoryStore;
use crate::token::estimate_tokens;
use crate::turn::{ChatModel, ToolExecutor};

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub assistant_text: String,
    /// Ids of the memories that were included in the context payload.
    pub used_memories: Vec<Uuid>,
    /// Tokens consumed by the assembled context.
    pub used_tokens: u32,
}

/// Coordinates one user turn end to end.
///
/// Retrieval and tool execution run concurrently; assembly and the model
/// call follow; persistence runs under a per-session lock so writes from
/// sequential turns land in turn order; the compression check runs in the
/// background after the response is ready.
///
/// A turn degrades rather than fails wherever possible: retrieval errors
/// mean an empty memory context, a slow tool means no tool output. Only an
/// unknown session, a failed completion, or a store failure while
/// persisting abort the turn.
pub struct TurnOrchestrator<S, P, M, Su, T> {
    store: Arc<S>,
    embeddings: Arc<EmbeddingCache<P>>,
    retriever: HybridRetriever<S, P>,
    compressor: Arc<AdaptiveCompressor<S, Su>>,
    assembler: ContextAssembler,
    model: Arc<M>,
    tools: Arc<T>,
    system_prompt: String,
    config: EngineConfig,
    write_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<S, P, M, Su, T> TurnOrchestrator<S, P, M, Su, T>
where
    S: MemoryStore + 'static,
    P: EmbeddingProvider + 'static,
    M: ChatModel,
    Su: Summarizer + 'static,
    T: ToolExecutor,
{
    pub fn new(
        store: Arc<S>,
        embeddings: Arc<EmbeddingCache<P>>,
        model: Arc<M>,
        summarizer: Arc<Su>,
        tools: Arc<T>,
        system_prompt: impl Into<String>,
        config: EngineConfig,
    ) -> Self {
        let retriever = HybridRetriever::new(
            Arc::clone(&store),
            Arc::clone(&embeddings),
            config.retrieval.clone(),
        );
        let compressor = Arc::new(AdaptiveCompressor::new(
            Arc::clone(&store),
            summarizer,
            config.compression.clone(),
        ));
        let assembler = ContextAssembler::new(config.context.clone());
        Self {
            store,
            embeddings,
            retriever,
            compressor,
            assembler,
            model,
            tools,
            system_prompt: system_prompt.into(),
            config,
            write_locks: DashMap::new(),
        }
    }

    /// Create a new session.
    pub async fn create_session(&self, title: &str) -> Result<Session, StoreError> {
        let session = Session::new(title);
        self.store.create_session(&session).await?;
        info!(session_id = %session.id, "created session");
        Ok(session)
    }

    /// Aggregate memory statistics for observability surfaces.
    pub async fn session_memory_stats(
        &self,
        session_id: &Uuid,
    ) -> Result<SessionMemoryStats, StoreError> {
        self.store.session_memory_stats(session_id).await
    }

    /// Handle one user turn.
    #[instrument(skip(self, user_text))]
    pub async fn handle_turn(
        &self,
        session_id: Uuid,
        user_text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        self.store
            .get_session(&session_id)
            .await?
            .ok_or(TurnError::SessionNotFound)?;

        // Retrieval and tool execution run concurrently; each degrades to
        // empty on failure or deadline.
        let retrieval = self.retriever.retrieve(
            session_id,
            user_text,
            self.config.context.max_tokens,
            None,
        );
        let tools = self.execute_tools(session_id, user_text);
        let (retrieved, tool_calls) = tokio::join!(retrieval, tools);
        let retrieved = match retrieved {
            Ok(memories) => memories,
            Err(err) => {
                warn!(error = %err, "retrieval failed, proceeding without memories");
                Vec::new()
            }
        };

        let live_tail = match self
            .store
            .get_messages(
                &session_id,
                Some(self.config.context.live_tail_messages as i64),
            )
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                warn!(error = %err, "live tail unavailable, proceeding without it");
                Vec::new()
            }
        };

        let context = self.assembler.assemble(
            &self.system_prompt,
            &retrieved,
            &live_tail,
            &tool_calls,
            self.config.context.max_tokens,
        );

        let assistant_text = self.model.complete(&context.text, user_text).await?;

        self.persist_turn(session_id, user_text, &assistant_text, &tool_calls)
            .await?;

        // Compression must not delay the response.
        let compressor = Arc::clone(&self.compressor);
        tokio::spawn(async move {
            if let Err(err) = compressor.maybe_compress(session_id).await {
                warn!(%session_id, error = %err, "background compression check failed");
            }
        });

        Ok(TurnOutcome {
            assistant_text,
            used_memories: context.memory_ids,
            used_tokens: context.used_tokens,
        })
    }

    async fn execute_tools(&self, session_id: Uuid, user_text: &str) -> Vec<ToolCall> {
        let deadline = Duration::from_millis(self.config.tools.timeout_ms);
        match tokio::time::timeout(deadline, self.tools.execute(session_id, user_text)).await {
            Ok(calls) => calls,
            Err(_) => {
                warn!(%session_id, "tool execution exceeded deadline, dropping results");
                Vec::new()
            }
        }
    }

    /// Persist the turn's messages and memories under the per-session
    /// write lock, so sequential turns land in order.
    async fn persist_turn(
        &self,
        session_id: Uuid,
        user_text: &str,
        assistant_text: &str,
        tool_calls: &[ToolCall],
    ) -> Result<(), StoreError> {
        let lock = self.write_lock(session_id);
        let _guard = lock.lock().await;

        let user_message = Message::new(session_id, MessageRole::User, user_text);
        self.store.save_message(&user_message).await?;
        let assistant_message = Message::new(session_id, MessageRole::Assistant, assistant_text);
        self.store.save_message(&assistant_message).await?;

        let exchange = format!("user: {user_text}\nassistant: {assistant_text}");
        let mut memory = Memory::new(
            session_id,
            MemoryKind::Conversation,
            &exchange,
            estimate_tokens(&exchange),
        );
        memory.embedding = self.embed_best_effort(&exchange).await;
        self.store.put_memory(&memory).await?;

        for call in tool_calls {
            let Some(result) = &call.result else { continue };
            let content = format!("{} result: {result}", call.kind);
            let mut tool_memory = Memory::new(
                session_id,
                MemoryKind::ToolOutput,
                &content,
                estimate_tokens(&content),
            );
            tool_memory.embedding = self.embed_best_effort(&content).await;
            self.store.put_memory(&tool_memory).await?;
        }

        self.store.touch_session(&session_id).await?;
        Ok(())
    }

    /// Embed for storage; a provider outage just means no vector.
    async fn embed_best_effort(&self, text: &str) -> Option<Vec<f32>> {
        match self.embeddings.get_or_compute(text).await {
            Ok(vector) => Some(vector.as_ref().clone()),
            Err(err) => {
                debug!(error = %err.0, "storing memory without embedding");
                None
            }
        }
    }

    fn write_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
