//! Engine configuration.
//!
//! Retrieval weights, compression thresholds, and cache sizing started life
//! as fixed constants in the original design; they are deliberately exposed
//! as configuration here, loaded from `engram.toml` by the infrastructure
//! layer with serde defaults covering every field.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub compression: CompressionConfig,
    pub embedding: EmbeddingConfig,
    pub context: ContextConfig,
    pub tools: ToolConfig,
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
}

/// Hybrid retriever tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the semantic (cosine) signal.
    pub semantic_weight: f32,
    /// Weight of the keyword (Jaccard) signal.
    pub keyword_weight: f32,
    /// Half-life in days for the temporal decay factor.
    pub half_life_days: f32,
    /// Multiplicative boost applied to the keyword score on a full
    /// phrase match, capped so the score stays in [0, 1].
    pub phrase_boost: f32,
    /// Maximum number of candidate memories scanned per retrieval.
    pub max_scan: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            half_life_days: 7.0,
            phrase_boost: 1.5,
            max_scan: 50,
        }
    }
}

/// Adaptive compressor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Live conversation/tool-output token volume that triggers a cycle.
    pub threshold_tokens: u64,
    /// Fraction of total tokens (oldest first) selected for compression.
    pub block_fraction: f32,
    /// Target original:summary token ratio passed to the summarizer.
    pub target_ratio: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold_tokens: 8_000,
            block_fraction: 0.3,
            target_ratio: 3.0,
        }
    }
}

/// Embedding cache and circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Maximum number of cached embeddings.
    pub cache_capacity: u64,
    /// Deadline for a single provider call, in milliseconds.
    pub deadline_ms: u64,
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Seconds the breaker stays open before probing recovery.
    pub cooldown_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1_000,
            deadline_ms: 5_000,
            failure_threshold: 5,
            cooldown_secs: 30,
        }
    }
}

/// Context assembler budget allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Overall context budget per turn.
    pub max_tokens: u32,
    /// Fixed reservation for system instructions.
    pub system_reserved_tokens: u32,
    /// Cap on tool output as a fraction of max_tokens.
    pub tool_output_fraction: f32,
    /// Number of live tail messages considered per turn.
    pub live_tail_messages: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4_000,
            system_reserved_tokens: 200,
            tool_output_fraction: 0.2,
            live_tail_messages: 20,
        }
    }
}

/// Tool execution policy as seen by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Deadline for the tool executor; exceeding it means "no result".
    pub timeout_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// SQLite pool sizing and contention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connections in the read pool; the write pool is always one.
    pub reader_connections: u32,
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            reader_connections: 8,
            busy_timeout_secs: 5,
        }
    }
}

/// Logging and trace export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Fallback log filter directive when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Bridge tracing spans to an OpenTelemetry stdout exporter.
    pub otel_export: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            otel_export: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.retrieval.semantic_weight, 0.7);
        assert_eq!(config.retrieval.keyword_weight, 0.3);
        assert_eq!(config.retrieval.half_life_days, 7.0);
        assert_eq!(config.retrieval.max_scan, 50);
        assert_eq!(config.compression.threshold_tokens, 8_000);
        assert_eq!(config.compression.block_fraction, 0.3);
        assert_eq!(config.compression.target_ratio, 3.0);
        assert_eq!(config.embedding.cache_capacity, 1_000);
        assert_eq!(config.embedding.deadline_ms, 5_000);
        assert_eq!(config.embedding.failure_threshold, 5);
        assert_eq!(config.embedding.cooldown_secs, 30);
        assert_eq!(config.context.tool_output_fraction, 0.2);
        assert_eq!(config.database.reader_connections, 8);
        assert_eq!(config.database.busy_timeout_secs, 5);
        assert_eq!(config.telemetry.log_filter, "info");
        assert!(!config.telemetry.otel_export);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
[compression]
threshold_tokens = 4000

[database]
reader_connections = 2
"#,
        )
        .unwrap();

        assert_eq!(config.compression.threshold_tokens, 4_000);
        assert_eq!(config.database.reader_connections, 2);
        // Unspecified fields keep their defaults.
        assert_eq!(config.compression.target_ratio, 3.0);
        assert_eq!(config.retrieval.semantic_weight, 0.7);
        assert_eq!(config.database.busy_timeout_secs, 5);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.context.max_tokens, 4_000);
        assert_eq!(config.tools.timeout_ms, 10_000);
    }
}
