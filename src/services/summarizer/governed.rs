use std::sync::Arc;

use super::rate_governor::RateGovernor;
use super::traits::SummarizationClient;
use crate::core::future::BoxFuture;
use crate::services::errors::SummaryError;

/// Wraps a client so that every call first passes through the governor.
pub struct GovernedSummarizer {
    inner: Arc<dyn SummarizationClient>,
    governor: Arc<RateGovernor>,
}

impl GovernedSummarizer {
    pub fn new(inner: Arc<dyn SummarizationClient>, governor: Arc<RateGovernor>) -> Self {
        Self { inner, governor }
    }
}

impl SummarizationClient for GovernedSummarizer {
    fn summarize<'a>(
        &'a self,
        slide_index: usize,
        slide_text: &'a str,
    ) -> BoxFuture<'a, Result<String, SummaryError>> {
        Box::pin(async move {
            self.governor.acquire().await;
            self.inner.summarize(slide_index, slide_text).await
        })
    }
}
