//! SQLite `MemoryStore` implementation.
//!
//! Raw queries with private Row structs, split reader/writer pool usage,
//! RFC 3339 TEXT timestamps. Embeddings and metadata are persisted as JSON
//! text columns; the schema enforces session foreign keys with cascade
//! deletes.

use chrono::{DateTime, Utc};
use engram_core::store::MemoryStore;
use engram_types::Metadata;
use engram_types::error::StoreError;
use engram_types::memory::{Memory, MemoryKind, SessionMemoryStats};
use engram_types::session::{Message, MessageRole, Session};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MemoryStore`.
pub struct SqliteMemoryStore {
    pool: DatabasePool,
}

impl SqliteMemoryStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn session_exists(&self, session_id: &Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.is_some())
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    title: String,
    created_at: String,
    updated_at: String,
    metadata: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            metadata: row.try_get("metadata")?,
        })
    }

    fn into_session(self) -> Result<Session, StoreError> {
        Ok(Session {
            id: parse_uuid(&self.id, "session id")?,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            metadata: parse_metadata(&self.metadata)?,
        })
    }
}

struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    created_at: String,
    metadata: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            metadata: row.try_get("metadata")?,
        })
    }

    fn into_message(self) -> Result<Message, StoreError> {
        let role: MessageRole = self.role.parse().map_err(StoreError::Query)?;
        Ok(Message {
            id: parse_uuid(&self.id, "message id")?,
            session_id: parse_uuid(&self.session_id, "session_id")?,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
            metadata: parse_metadata(&self.metadata)?,
        })
    }
}

struct MemoryRow {
    id: String,
    session_id: String,
    kind: String,
    content: String,
    embedding: Option<String>,
    compression_ratio: f64,
    token_count: i64,
    created_at: String,
    metadata: String,
}

impl MemoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            kind: row.try_get("kind")?,
            content: row.try_get("content")?,
            embedding: row.try_get("embedding")?,
            compression_ratio: row.try_get("compression_ratio")?,
            token_count: row.try_get("token_count")?,
            created_at: row.try_get("created_at")?,
            metadata: row.try_get("metadata")?,
        })
    }

    fn into_memory(self) -> Result<Memory, StoreError> {
        let kind: MemoryKind = self.kind.parse().map_err(StoreError::Query)?;
        let embedding = self
            .embedding
            .as_deref()
            .map(|json| {
                serde_json::from_str::<Vec<f32>>(json)
                    .map_err(|e| StoreError::Query(format!("invalid embedding: {e}")))
            })
            .transpose()?;
        Ok(Memory {
            id: parse_uuid(&self.id, "memory id")?,
            session_id: parse_uuid(&self.session_id, "session_id")?,
            kind,
            content: self.content,
            embedding,
            relevance_score: 0.0,
            compression_ratio: self.compression_ratio as f32,
            token_count: self.token_count as u32,
            created_at: parse_datetime(&self.created_at)?,
            metadata: parse_metadata(&self.metadata)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_metadata(s: &str) -> Result<Metadata, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Query(format!("invalid metadata: {e}")))
}

fn format_metadata(metadata: &Metadata) -> Result<String, StoreError> {
    serde_json::to_string(metadata)
        .map_err(|e| StoreError::Query(format!("unserializable metadata: {e}")))
}

/// Foreign key violations become `Integrity`; everything else is `Query`.
fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    let message = e.to_string();
    if message.contains("FOREIGN KEY") {
        StoreError::Integrity(message)
    } else {
        StoreError::Query(message)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore implementation
// ---------------------------------------------------------------------------

impl MemoryStore for SqliteMemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO sessions (id, title, created_at, updated_at, metadata)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.title)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .bind(format_metadata(&session.metadata)?)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| {
            SessionRow::from_row(&r)
                .map_err(map_sqlx_error)
                .and_then(SessionRow::into_session)
        })
        .transpose()
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY updated_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = SessionRow::from_row(row).map_err(map_sqlx_error)?;
            sessions.push(session_row.into_session()?);
        }
        Ok(sessions)
    }

    async fn rename_session(&self, session_id: &Uuid, title: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE sessions SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(format_datetime(&Utc::now()))
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn touch_session(&self, session_id: &Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn save_message(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO messages (id, session_id, role, content, created_at, metadata)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .bind(format_metadata(&message.metadata)?)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_messages(
        &self,
        session_id: &Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, StoreError> {
        // With a limit, take the most recent N and flip back to ASC.
        let sql = match limit {
            Some(limit) => format!(
                "SELECT * FROM (SELECT * FROM messages WHERE session_id = ? \
                 ORDER BY created_at DESC LIMIT {limit}) ORDER BY created_at ASC"
            ),
            None => {
                "SELECT * FROM messages WHERE session_id = ? ORDER BY created_at ASC".to_string()
            }
        };

        let rows = sqlx::query(&sql)
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row = MessageRow::from_row(row).map_err(map_sqlx_error)?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }

    async fn put_memory(&self, memory: &Memory) -> Result<Uuid, StoreError> {
        let embedding = memory
            .embedding
            .as_ref()
            .map(|v| {
                serde_json::to_string(v)
                    .map_err(|e| StoreError::Query(format!("unserializable embedding: {e}")))
            })
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO memories (id, session_id, kind, content, embedding, compression_ratio, token_count, created_at, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(memory.id.to_string())
        .bind(memory.session_id.to_string())
        .bind(memory.kind.to_string())
        .bind(&memory.content)
        .bind(embedding)
        .bind(memory.compression_ratio as f64)
        .bind(memory.token_count as i64)
        .bind(format_datetime(&memory.created_at))
        .bind(format_metadata(&memory.metadata)?)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(memory.id)
    }

    async fn get_memories(
        &self,
        session_id: &Uuid,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<Memory>, StoreError> {
        if !self.session_exists(session_id).await? {
            return Err(StoreError::NotFound);
        }

        let mut sql = String::from("SELECT * FROM memories WHERE session_id = ?");
        if since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql).bind(session_id.to_string());
        if let Some(since) = since {
            query = query.bind(format_datetime(&since));
        }

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let mut memories = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory_row = MemoryRow::from_row(row).map_err(map_sqlx_error)?;
            memories.push(memory_row.into_memory()?);
        }
        Ok(memories)
    }

    async fn delete_memories(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut deleted = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM memories WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(map_sqlx_error)?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    async fn replace_memories(&self, old_ids: &[Uuid], summary: &Memory) -> Result<(), StoreError> {
        let embedding = summary
            .embedding
            .as_ref()
            .map(|v| {
                serde_json::to_string(v)
                    .map_err(|e| StoreError::Query(format!("unserializable embedding: {e}")))
            })
            .transpose()?;

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(map_sqlx_error)?;

        let mut deleted = 0u64;
        for id in old_ids {
            let result = sqlx::query("DELETE FROM memories WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            deleted += result.rows_affected();
        }
        // Dropping the transaction rolls everything back.
        if deleted != old_ids.len() as u64 {
            return Err(StoreError::Integrity(format!(
                "replace targeted {} memories but only {deleted} exist",
                old_ids.len()
            )));
        }

        sqlx::query(
            r#"INSERT INTO memories (id, session_id, kind, content, embedding, compression_ratio, token_count, created_at, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(summary.id.to_string())
        .bind(summary.session_id.to_string())
        .bind(summary.kind.to_string())
        .bind(&summary.content)
        .bind(embedding)
        .bind(summary.compression_ratio as f64)
        .bind(summary.token_count as i64)
        .bind(format_datetime(&summary.created_at))
        .bind(format_metadata(&summary.metadata)?)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn session_memory_stats(
        &self,
        session_id: &Uuid,
    ) -> Result<SessionMemoryStats, StoreError> {
        if !self.session_exists(session_id).await? {
            return Err(StoreError::NotFound);
        }

        let row = sqlx::query(
            r#"SELECT
                 COALESCE(SUM(token_count), 0) AS total_tokens,
                 COUNT(*) AS memory_count,
                 MAX(CASE WHEN kind = 'summary' THEN created_at END) AS last_compression_at
               FROM memories WHERE session_id = ?"#,
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let total_tokens: i64 = row.try_get("total_tokens").map_err(map_sqlx_error)?;
        let memory_count: i64 = row.try_get("memory_count").map_err(map_sqlx_error)?;
        let last_compression_at: Option<String> =
            row.try_get("last_compression_at").map_err(map_sqlx_error)?;

        Ok(SessionMemoryStats {
            total_tokens: total_tokens as u64,
            memory_count: memory_count as u64,
            last_compression_at: last_compression_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }
}
