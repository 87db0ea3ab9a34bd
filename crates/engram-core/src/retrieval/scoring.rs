//! Scoring signals for the hybrid retriever.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or zero-norm inputs rather than
/// NaN, so a degenerate embedding never poisons the ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Lowercased alphanumeric word set for Jaccard overlap.
fn token_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Keyword score: Jaccard similarity of word sets, boosted when the full
/// query string appears verbatim in the candidate (phrase match). The
/// boost is multiplicative and the result is capped at 1.0.
pub fn keyword_score(query: &str, candidate: &str, phrase_boost: f32) -> f32 {
    let query_tokens = token_set(query);
    let candidate_tokens = token_set(candidate);
    if query_tokens.is_empty() || candidate_tokens.is_empty() {
        return 0.0;
    }

    let intersection = query_tokens.intersection(&candidate_tokens).count() as f32;
    let union = query_tokens.union(&candidate_tokens).count() as f32;
    let mut score = intersection / union;

    let query_phrase = query.trim().to_lowercase();
    if !query_phrase.is_empty() && candidate.to_lowercase().contains(&query_phrase) {
        score *= phrase_boost;
    }
    score.min(1.0)
}

/// Temporal decay factor `2^(-age_days / half_life_days)`.
///
/// A memory created `half_life_days` ago scores exactly 0.5; future
/// timestamps (clock skew) clamp to no decay.
pub fn temporal_decay(created_at: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f32) -> f32 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    let age_secs = (now - created_at).num_seconds().max(0) as f32;
    let age_days = age_secs / 86_400.0;
    2.0f32.powf(-age_days / half_life_days)
}
