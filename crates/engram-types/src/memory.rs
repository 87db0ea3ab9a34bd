//! Memory types for Engram.
//!
//! A memory is a stored, scorable unit of prior interaction content:
//! a raw conversation exchange, a compressor-produced summary, a tool
//! output, or injected context. Memories are never mutated after
//! creation -- only deleted, by compression or by session deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::Metadata;

/// Metadata key on summary memories listing the ids they replaced.
pub const REPLACED_IDS_KEY: &str = "replaced_ids";

/// Metadata key on summary memories recording the pre-compression token count.
pub const ORIGINAL_TOKENS_KEY: &str = "original_tokens";

/// Kind of a stored memory. Closed set so handling is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Raw turn-derived unit (one user + assistant exchange).
    Conversation,
    /// Compressor output replacing a block of older memories.
    Summary,
    /// Output of a tool invocation during a turn.
    ToolOutput,
    /// Externally injected context.
    Context,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Conversation => write!(f, "conversation"),
            MemoryKind::Summary => write!(f, "summary"),
            MemoryKind::ToolOutput => write!(f, "tool_output"),
            MemoryKind::Context => write!(f, "context"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conversation" => Ok(MemoryKind::Conversation),
            "summary" => Ok(MemoryKind::Summary),
            "tool_output" => Ok(MemoryKind::ToolOutput),
            "context" => Ok(MemoryKind::Context),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

/// A stored memory unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: MemoryKind,
    pub content: String,
    /// Vector embedding, absent when the provider was unavailable at write time.
    pub embedding: Option<Vec<f32>>,
    /// Populated transiently by the retriever; not persisted as ground truth.
    #[serde(default)]
    pub relevance_score: f32,
    /// original_token_count / summary_token_count for summaries; 1.0 otherwise.
    pub compression_ratio: f32,
    /// Estimated token count of `content`. Always > 0.
    pub token_count: u32,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Memory {
    /// Create a new memory of the given kind.
    pub fn new(
        session_id: Uuid,
        kind: MemoryKind,
        content: impl Into<String>,
        token_count: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            kind,
            content: content.into(),
            embedding: None,
            relevance_score: 0.0,
            compression_ratio: 1.0,
            token_count,
            created_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Ids of the memories this summary replaced, parsed from metadata.
    ///
    /// Empty for non-summary memories or when the metadata is missing.
    pub fn replaced_ids(&self) -> Vec<Uuid> {
        self.metadata
            .get(REPLACED_IDS_KEY)
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(|s| Uuid::parse_str(s).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A memory paired with its combined relevance score for one query.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
}

/// Per-session memory statistics for observability surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMemoryStats {
    /// Sum of token_count across all live memories in the session.
    pub total_tokens: u64,
    pub memory_count: u64,
    /// Creation time of the newest summary memory, if any compression ran.
    pub last_compression_at: Option<DateTime<Utc>>,
}
