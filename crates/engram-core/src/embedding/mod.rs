//! Embedding support: provider port, circuit breaker, and bounded cache.
//!
//! The cache is an explicit component instance passed to the retriever and
//! orchestrator, never a module-level singleton, so independent caches can
//! exist side by side in tests.

pub mod breaker;
pub mod cache;
pub mod provider;

pub use breaker::{CircuitBreaker, CircuitState};
pub use cache::EmbeddingCache;
pub use provider::EmbeddingProvider;
