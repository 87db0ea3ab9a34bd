use engram_types::error::EmbeddingUnavailable;

/// Port for turning text into a dense vector.
///
/// Implementations are expected to return vectors of a fixed dimension for
/// the lifetime of the provider. Failures are reported as
/// [`EmbeddingUnavailable`] so callers can degrade to keyword-only scoring.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, EmbeddingUnavailable>> + Send;
}
