use engram_types::error::SummarizationFailure;

/// Port for condensing a block of memory content.
///
/// `target_ratio` is the desired original:summary token ratio (3.0 means
/// "aim for a third of the input"). Implementations should preserve named
/// entities, decisions, and open questions; the compressor validates only
/// total length, not content.
pub trait Summarizer: Send + Sync {
    fn summarize(
        &self,
        text: &str,
        target_ratio: f32,
    ) -> impl Future<Output = Result<String, SummarizationFailure>> + Send;
}
