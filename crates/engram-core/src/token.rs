//! Token count estimation.
//!
//! Character-based heuristic (~4 bytes per token). Good enough for budget
//! accounting; the engine never needs exact tokenizer agreement, only a
//! consistent measure applied to both sides of every comparison.

/// Estimate the token count of a text span. Never returns 0.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() as u32) / 4).max(1)
}
