use thiserror::Error;

/// No slide could be obtained from the source artifact.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("source artifact not found: {0}")]
    NotFound(String),
    #[error("source artifact unreadable: {0}")]
    Unreadable(String),
    #[error("malformed presentation: {0}")]
    Malformed(String),
}

/// One slide could not be summarized. Local to that slide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("slide {slide_index}: {cause}")]
pub struct SummaryError {
    /// 1-based position of the slide in the document.
    pub slide_index: usize,
    pub cause: String,
}

impl SummaryError {
    pub fn new(slide_index: usize, cause: impl Into<String>) -> Self {
        Self {
            slide_index,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("write output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode output failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("artifact io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("upload {uid} cannot move to {target}")]
    InvalidTransition { uid: String, target: &'static str },
}

impl From<String> for StoreError {
    fn from(value: String) -> Self {
        StoreError::Database(value)
    }
}
