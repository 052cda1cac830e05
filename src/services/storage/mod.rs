mod artifacts;
mod outputs;

pub use artifacts::LocalArtifactStore;
pub use outputs::JsonOutputSink;

use crate::core::future::BoxFuture;
use crate::services::errors::{ArtifactError, PersistError};

/// Durable destination for an upload's aggregated summary.
pub trait OutputSink: Send + Sync {
    /// Persists the aggregate and returns its location (`resultRef`).
    fn write<'a>(
        &'a self,
        uid: &'a str,
        aggregate: &'a str,
    ) -> BoxFuture<'a, Result<String, PersistError>>;
}

/// Holds uploaded source documents until they are processed.
pub trait ArtifactStore: Send + Sync {
    /// Location of the document stored for `uid`.
    fn document_ref(&self, uid: &str) -> String;

    fn delete<'a>(&'a self, document_ref: &'a str) -> BoxFuture<'a, Result<(), ArtifactError>>;
}
