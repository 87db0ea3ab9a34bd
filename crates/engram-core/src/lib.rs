//! Ports and algorithms for the Engram memory engine.
//!
//! This crate defines the storage and provider traits that the
//! infrastructure layer implements, plus all the engine logic: the
//! embedding cache with its circuit breaker, the hybrid retriever, the
//! adaptive compressor, the context assembler, and the turn orchestrator.
//! It depends only on `engram-types` -- never on `engram-infra` or any
//! database/HTTP crate.

pub mod compression;
pub mod context;
pub mod embedding;
pub mod retrieval;
pub mod store;
pub mod token;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_support;
