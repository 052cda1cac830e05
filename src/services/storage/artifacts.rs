use std::io::ErrorKind;
use std::path::PathBuf;

use super::ArtifactStore;
use crate::core::future::BoxFuture;
use crate::services::errors::ArtifactError;

const ARTIFACT_EXTENSION: &str = "pptx";

/// Uploaded documents stored as `<upload_dir>/<uid>.pptx`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    upload_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub async fn save(&self, uid: &str, bytes: &[u8]) -> Result<String, ArtifactError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let document_ref = self.document_ref(uid);
        tokio::fs::write(&document_ref, bytes).await?;
        Ok(document_ref)
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn document_ref(&self, uid: &str) -> String {
        self.upload_dir
            .join(format!("{uid}.{ARTIFACT_EXTENSION}"))
            .to_string_lossy()
            .to_string()
    }

    fn delete<'a>(&'a self, document_ref: &'a str) -> BoxFuture<'a, Result<(), ArtifactError>> {
        Box::pin(async move {
            match tokio::fs::remove_file(document_ref).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    Err(ArtifactError::NotFound(document_ref.to_string()))
                }
                Err(err) => Err(ArtifactError::Io(err)),
            }
        })
    }
}
