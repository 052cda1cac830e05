use crate::services::errors::SummaryError;

/// Outcome of summarizing one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideResult {
    Summary(String),
    Failed(SummaryError),
}

impl SlideResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, SlideResult::Failed(_))
    }
}

pub fn failure_marker(err: &SummaryError) -> String {
    format!("Error processing slide {}: {}\n\n", err.slide_index, err.cause)
}

/// Joins slide results in order. Summaries are appended as they are and
/// each failure contributes its marker; nothing is inserted between
/// fragments.
pub fn aggregate(results: &[SlideResult]) -> String {
    let mut out = String::new();
    for result in results {
        match result {
            SlideResult::Summary(text) => out.push_str(text),
            SlideResult::Failed(err) => out.push_str(&failure_marker(err)),
        }
    }
    out
}
