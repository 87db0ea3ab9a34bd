//! Engine configuration loader.
//!
//! Reads `engram.toml` from the data directory (`~/.engram/` in production)
//! and deserializes it into [`EngineConfig`]. Falls back to defaults when
//! the file is missing or malformed; a partial file fills the rest from
//! defaults via serde.

use std::path::Path;

use engram_types::config::EngineConfig;

/// Load engine configuration from `{data_dir}/engram.toml`.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("engram.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No engram.toml found at {}, using defaults",
                config_path.display()
            );
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}
