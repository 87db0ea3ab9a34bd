//! Shared test doubles for the engine's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use engram_types::error::{EmbeddingUnavailable, StoreError};
use engram_types::memory::{Memory, MemoryKind, SessionMemoryStats};
use engram_types::session::{Message, Session};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::store::MemoryStore;

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    messages: Vec<Message>,
    memories: Vec<Memory>,
}

/// Map-backed [`MemoryStore`] mirroring the SQLite implementation's
/// semantics: cascade deletes, integrity checks, atomic replace.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Connection)?;
        Ok(f(&mut inner))
    }
}

impl MemoryStore for InMemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        self.with(|inner| {
            inner.sessions.insert(session.id, session.clone());
        })
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, StoreError> {
        self.with(|inner| inner.sessions.get(session_id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.with(|inner| {
            let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
            sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            sessions
        })
    }

    async fn rename_session(&self, session_id: &Uuid, title: &str) -> Result<(), StoreError> {
        self.with(|inner| match inner.sessions.get_mut(session_id) {
            Some(session) => {
                session.title = title.to_string();
                session.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        })?
    }

    async fn touch_session(&self, session_id: &Uuid) -> Result<(), StoreError> {
        self.with(|inner| match inner.sessions.get_mut(session_id) {
            Some(session) => {
                session.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        })?
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), StoreError> {
        self.with(|inner| {
            if inner.sessions.remove(session_id).is_none() {
                return Err(StoreError::NotFound);
            }
            inner.messages.retain(|m| m.session_id != *session_id);
            inner.memories.retain(|m| m.session_id != *session_id);
            Ok(())
        })?
    }

    async fn save_message(&self, message: &Message) -> Result<(), StoreError> {
        self.with(|inner| {
            if !inner.sessions.contains_key(&message.session_id) {
                return Err(StoreError::Integrity(format!(
                    "message references unknown session {}",
                    message.session_id
                )));
            }
            inner.messages.push(message.clone());
            Ok(())
        })?
    }

    async fn get_messages(
        &self,
        session_id: &Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, StoreError> {
        self.with(|inner| {
            let mut messages: Vec<Message> = inner
                .messages
                .iter()
                .filter(|m| m.session_id == *session_id)
                .cloned()
                .collect();
            messages.sort_by_key(|m| m.created_at);
            if let Some(limit) = limit {
                let keep = limit.max(0) as usize;
                if messages.len() > keep {
                    messages.drain(..messages.len() - keep);
                }
            }
            messages
        })
    }

    async fn put_memory(&self, memory: &Memory) -> Result<Uuid, StoreError> {
        self.with(|inner| {
            if !inner.sessions.contains_key(&memory.session_id) {
                return Err(StoreError::Integrity(format!(
                    "memory references unknown session {}",
                    memory.session_id
                )));
            }
            inner.memories.push(memory.clone());
            Ok(memory.id)
        })?
    }

    async fn get_memories(
        &self,
        session_id: &Uuid,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<Memory>, StoreError> {
        self.with(|inner| {
            if !inner.sessions.contains_key(session_id) {
                return Err(StoreError::NotFound);
            }
            let mut memories: Vec<Memory> = inner
                .memories
                .iter()
                .filter(|m| m.session_id == *session_id)
                .filter(|m| since.is_none_or(|s| m.created_at >= s))
                .cloned()
                .collect();
            memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(limit) = limit {
                memories.truncate(limit.max(0) as usize);
            }
            Ok(memories)
        })?
    }

    async fn delete_memories(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        self.with(|inner| {
            let before = inner.memories.len();
            inner.memories.retain(|m| !ids.contains(&m.id));
            (before - inner.memories.len()) as u64
        })
    }

    async fn replace_memories(&self, old_ids: &[Uuid], summary: &Memory) -> Result<(), StoreError> {
        self.with(|inner| {
            let found = inner
                .memories
                .iter()
                .filter(|m| old_ids.contains(&m.id))
                .count();
            if found != old_ids.len() {
                return Err(StoreError::Integrity(format!(
                    "replace targeted {} memories but only {found} exist",
                    old_ids.len()
                )));
            }
            inner.memories.retain(|m| !old_ids.contains(&m.id));
            inner.memories.push(summary.clone());
            Ok(())
        })?
    }

    async fn session_memory_stats(
        &self,
        session_id: &Uuid,
    ) -> Result<SessionMemoryStats, StoreError> {
        self.with(|inner| {
            if !inner.sessions.contains_key(session_id) {
                return Err(StoreError::NotFound);
            }
            let memories: Vec<&Memory> = inner
                .memories
                .iter()
                .filter(|m| m.session_id == *session_id)
                .collect();
            Ok(SessionMemoryStats {
                total_tokens: memories.iter().map(|m| m.token_count as u64).sum(),
                memory_count: memories.len() as u64,
                last_compression_at: memories
                    .iter()
                    .filter(|m| m.kind == MemoryKind::Summary)
                    .map(|m| m.created_at)
                    .max(),
            })
        })?
    }
}

/// Deterministic embedder: a tiny bag-of-bytes vector per text, or a hard
/// failure when constructed with [`FixedEmbedder::failing`].
pub struct FixedEmbedder {
    fail: AtomicBool,
}

impl FixedEmbedder {
    pub fn healthy() -> Self {
        Self {
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingUnavailable("test provider down".to_string()));
        }
        // Bucket byte values so related texts land near each other.
        let mut vector = vec![0.0f32; 8];
        for byte in text.bytes() {
            vector[(byte % 8) as usize] += 1.0;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use engram_types::session::MessageRole;

    use super::*;

    #[tokio::test]
    async fn test_delete_session_cascades() {
        let store = InMemoryStore::new();
        let session = Session::new("s");
        store.create_session(&session).await.unwrap();
        store
            .save_message(&Message::new(session.id, MessageRole::User, "hi"))
            .await
            .unwrap();
        store
            .put_memory(&Memory::new(session.id, MemoryKind::Conversation, "hi", 1))
            .await
            .unwrap();

        store.delete_session(&session.id).await.unwrap();

        assert!(store.get_session(&session.id).await.unwrap().is_none());
        assert!(store.get_messages(&session.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_memories_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let session = Session::new("s");
        store.create_session(&session).await.unwrap();
        let kept = Memory::new(session.id, MemoryKind::Conversation, "kept", 1);
        store.put_memory(&kept).await.unwrap();

        let summary = Memory::new(session.id, MemoryKind::Summary, "summary", 1);
        let missing = Uuid::now_v7();
        let err = store
            .replace_memories(&[kept.id, missing], &summary)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));

        // The kept memory must still be there, the summary must not.
        let memories = store.get_memories(&session.id, None, None).await.unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_messages_limit_keeps_most_recent_in_order() {
        let store = InMemoryStore::new();
        let session = Session::new("s");
        store.create_session(&session).await.unwrap();
        for i in 0..5 {
            let mut m = Message::new(session.id, MessageRole::User, format!("m{i}"));
            m.created_at = Utc::now() + chrono::Duration::milliseconds(i);
            store.save_message(&m).await.unwrap();
        }

        let messages = store.get_messages(&session.id, Some(2)).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "m3");
        assert_eq!(messages[1].content, "m4");
    }
}
