use thiserror::Error;

/// Errors from memory store operations (used by trait definitions in engram-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity not found")]
    NotFound,

    /// A memory references a nonexistent session, or a replace targeted
    /// memories that no longer exist. Fatal; must not be silently retried.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),
}

/// The embedding provider is down, slow, or fenced off by the circuit breaker.
///
/// Callers must treat this as a degrade-gracefully signal: retrieval falls
/// back to keyword + temporal scoring, memories are stored without vectors.
#[derive(Debug, Clone, Error)]
#[error("embedding unavailable: {0}")]
pub struct EmbeddingUnavailable(pub String);

/// A summarization call failed. Aborts the current compression cycle;
/// the compressor retries on the next qualifying write.
#[derive(Debug, Error)]
#[error("summarization failed: {0}")]
pub struct SummarizationFailure(pub String);

/// A chat completion call failed. Turn-fatal: without a model response
/// there is nothing to return to the user.
#[derive(Debug, Error)]
#[error("completion failed: {0}")]
pub struct CompletionFailure(pub String);

/// Errors surfaced by the turn orchestrator.
///
/// Only an unknown session, a store failure on the write path, or a failed
/// chat completion abort a turn. Retrieval and compression failures degrade
/// instead of propagating here.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session not found")]
    SessionNotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("completion error: {0}")]
    Completion(String),
}

impl From<CompletionFailure> for TurnError {
    fn from(err: CompletionFailure) -> Self {
        TurnError::Completion(err.0)
    }
}
