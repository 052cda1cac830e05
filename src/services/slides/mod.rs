mod pptx;

pub use pptx::PptxSlideSource;

use crate::core::future::BoxFuture;
use crate::services::errors::ExtractionError;

/// Produces the ordered slide texts of a stored document.
pub trait SlideSource: Send + Sync {
    fn extract<'a>(
        &'a self,
        document_ref: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ExtractionError>>;
}
