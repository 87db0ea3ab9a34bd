//! Adaptive compression: threshold-triggered replacement of the oldest
//! block of raw memories with a single summary memory.

pub mod compressor;
pub mod summarizer;

pub use compressor::{AdaptiveCompressor, CompressionState};
pub use summarizer::Summarizer;
