//! Hybrid retrieval: semantic + keyword + temporal ranking over a
//! session's memories, with greedy token-budgeted selection.

pub mod retriever;
pub mod scoring;

pub use retriever::HybridRetriever;
