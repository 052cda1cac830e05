use crate::core::future::BoxFuture;
use crate::services::errors::SummaryError;

/// One outbound summarization request per call.
pub trait SummarizationClient: Send + Sync {
    /// `slide_index` is 1-based and only used to label failures.
    fn summarize<'a>(
        &'a self,
        slide_index: usize,
        slide_text: &'a str,
    ) -> BoxFuture<'a, Result<String, SummaryError>>;
}
