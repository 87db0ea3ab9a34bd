//! MemoryStore trait definition.
//!
//! The single source of truth for sessions, messages, and memories. All
//! mutation goes through this trait; `replace_memories` is the one
//! cross-cutting atomicity requirement the engine relies on.
//! Implementations live in engram-infra (e.g., `SqliteMemoryStore`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use chrono::{DateTime, Utc};
use engram_types::error::StoreError;
use engram_types::memory::{Memory, SessionMemoryStats};
use engram_types::session::{Message, Session};
use uuid::Uuid;

/// Persistence contract for the Engram memory engine.
pub trait MemoryStore: Send + Sync {
    /// Create a new session.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Get a session by ID.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// List all sessions, most recently updated first.
    fn list_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Update a session's title. Fails with `NotFound` for an unknown session.
    fn rename_session(
        &self,
        session_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Bump a session's updated_at timestamp.
    fn touch_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a session, cascading to its messages and memories.
    fn delete_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Append a message to its session.
    /// Fails with `Integrity` if the session does not exist.
    fn save_message(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Get messages for a session in chronological order.
    /// With `limit`, returns the most recent messages (still ASC).
    fn get_messages(
        &self,
        session_id: &Uuid,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Insert a memory, returning its id.
    /// Fails with `Integrity` if the memory references a nonexistent session.
    fn put_memory(
        &self,
        memory: &Memory,
    ) -> impl std::future::Future<Output = Result<Uuid, StoreError>> + Send;

    /// Get memories for a session, most recent first.
    ///
    /// `since` filters to memories created at or after the given instant.
    /// Fails with `NotFound` for an unknown session.
    fn get_memories(
        &self,
        session_id: &Uuid,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, StoreError>> + Send;

    /// Delete the given memories. Returns the count actually deleted.
    fn delete_memories(
        &self,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// Atomically delete `old_ids` and insert `summary` in one transaction.
    ///
    /// Either every old id is removed and the summary is inserted, or
    /// nothing changes. This preserves the invariant that a summary and the
    /// memories it replaced never coexist in the live set.
    fn replace_memories(
        &self,
        old_ids: &[Uuid],
        summary: &Memory,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Aggregate memory statistics for a session.
    /// Fails with `NotFound` for an unknown session.
    fn session_memory_stats(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<SessionMemoryStats, StoreError>> + Send;
}
