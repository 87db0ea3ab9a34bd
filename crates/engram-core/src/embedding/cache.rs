//! Bounded embedding cache with deadline and circuit breaker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use engram_types::config::EmbeddingConfig;
use engram_types::error::EmbeddingUnavailable;
use moka::sync::Cache;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::breaker::CircuitBreaker;
use super::provider::EmbeddingProvider;

/// LRU-bounded cache in front of an [`EmbeddingProvider`].
///
/// Keys are derived from normalized text (lowercased, whitespace collapsed)
/// so trivially different phrasings of the same content share an entry.
/// Provider calls run under a deadline and feed a circuit breaker; while the
/// circuit is open, misses fail fast without touching the provider.
pub struct EmbeddingCache<P> {
    provider: P,
    cache: Cache<String, Arc<Vec<f32>>>,
    breaker: Mutex<CircuitBreaker>,
    deadline: Duration,
}

impl<P: EmbeddingProvider> EmbeddingCache<P> {
    pub fn new(provider: P, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            cache: Cache::new(config.cache_capacity),
            breaker: Mutex::new(CircuitBreaker::new(
                config.failure_threshold,
                Duration::from_secs(config.cooldown_secs),
            )),
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }

    /// Return the embedding for `text`, computing and caching it on a miss.
    ///
    /// A cache hit never consults the breaker: previously computed vectors
    /// stay usable throughout a provider outage.
    pub async fn get_or_compute(&self, text: &str) -> Result<Arc<Vec<f32>>, EmbeddingUnavailable> {
        let key = cache_key(text);

        if let Some(vector) = self.cache.get(&key) {
            debug!(key = %&key[..12], "embedding cache hit");
            return Ok(vector);
        }

        {
            let mut breaker = self.breaker.lock().map_err(|_| {
                EmbeddingUnavailable("embedding breaker lock poisoned".to_string())
            })?;
            if !breaker.can_execute() {
                return Err(EmbeddingUnavailable(
                    "embedding circuit open, skipping provider".to_string(),
                ));
            }
        }

        let result = tokio::time::timeout(self.deadline, self.provider.embed(text)).await;

        match result {
            Ok(Ok(vector)) => {
                if let Ok(mut breaker) = self.breaker.lock() {
                    breaker.record_success();
                }
                let vector = Arc::new(vector);
                self.cache.insert(key, Arc::clone(&vector));
                Ok(vector)
            }
            Ok(Err(err)) => {
                self.note_failure(&err.0);
                Err(err)
            }
            Err(_) => {
                let message = format!(
                    "embedding timed out after {}ms",
                    self.deadline.as_millis()
                );
                self.note_failure(&message);
                Err(EmbeddingUnavailable(message))
            }
        }
    }

    /// Number of entries currently cached.
    pub fn entry_count(&self) -> u64 {
        // moka maintains counts lazily; flush pending ops first.
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn note_failure(&self, message: &str) {
        warn!(error = %message, "embedding provider failure");
        if let Ok(mut breaker) = self.breaker.lock() {
            breaker.record_failure(message);
        }
    }
}

/// Cache key: hex SHA-256 of the normalized text.
fn cache_key(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Provider that counts calls and can be flipped into a failing mode.
    struct FakeProvider {
        calls: AtomicU32,
        fail: std::sync::atomic::AtomicBool,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingProvider for &FakeProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmbeddingUnavailable("provider down".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    /// Provider that never completes, for exercising the deadline.
    struct HangingProvider;

    impl EmbeddingProvider for HangingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
            std::future::pending().await
        }
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig::default()
    }

    #[tokio::test]
    async fn test_hit_skips_provider() {
        let provider = FakeProvider::new();
        let cache = EmbeddingCache::new(&provider, &config());

        let first = cache.get_or_compute("hello world").await.unwrap();
        let second = cache.get_or_compute("hello world").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_normalization_shares_entries() {
        let provider = FakeProvider::new();
        let cache = EmbeddingCache::new(&provider, &config());

        cache.get_or_compute("Hello   World").await.unwrap();
        cache.get_or_compute("hello world").await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let provider = FakeProvider::new();
        provider.fail.store(true, Ordering::SeqCst);
        let cfg = EmbeddingConfig {
            failure_threshold: 2,
            ..config()
        };
        let cache = EmbeddingCache::new(&provider, &cfg);

        assert!(cache.get_or_compute("a").await.is_err());
        assert!(cache.get_or_compute("b").await.is_err());
        // Circuit is open now. Further misses must not touch the provider.
        assert!(cache.get_or_compute("c").await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_hits_survive_open_circuit() {
        let provider = FakeProvider::new();
        let cfg = EmbeddingConfig {
            failure_threshold: 1,
            ..config()
        };
        let cache = EmbeddingCache::new(&provider, &cfg);

        let cached = cache.get_or_compute("warm entry").await.unwrap();

        provider.fail.store(true, Ordering::SeqCst);
        assert!(cache.get_or_compute("miss").await.is_err());

        // Open circuit, but the warm entry is still served.
        let again = cache.get_or_compute("warm entry").await.unwrap();
        assert_eq!(cached, again);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_counts_as_failure() {
        let cfg = EmbeddingConfig {
            deadline_ms: 100,
            failure_threshold: 1,
            ..config()
        };
        let cache = EmbeddingCache::new(HangingProvider, &cfg);

        let err = cache.get_or_compute("slow").await.unwrap_err();
        assert!(err.0.contains("timed out"));

        // One timeout at threshold 1 opened the circuit.
        let err = cache.get_or_compute("next").await.unwrap_err();
        assert!(err.0.contains("circuit open"));
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let provider = FakeProvider::new();
        let cfg = EmbeddingConfig {
            cache_capacity: 2,
            ..config()
        };
        let cache = EmbeddingCache::new(&provider, &cfg);

        cache.get_or_compute("one").await.unwrap();
        cache.get_or_compute("two").await.unwrap();
        cache.get_or_compute("three").await.unwrap();

        assert!(cache.entry_count() <= 2);
    }
}
