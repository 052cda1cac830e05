use std::io::ErrorKind;
use std::path::PathBuf;

use super::OutputSink;
use crate::core::future::BoxFuture;
use crate::services::errors::PersistError;

/// Writes each aggregate as a single JSON string to `<output_dir>/<uid>.json`.
#[derive(Debug, Clone)]
pub struct JsonOutputSink {
    output_dir: PathBuf,
}

impl JsonOutputSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Decoded aggregate behind `result_ref`, `None` when the file is gone.
    pub async fn read(&self, result_ref: &str) -> Result<Option<String>, PersistError> {
        let raw = match tokio::fs::read(result_ref).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice::<String>(&raw)?))
    }
}

impl OutputSink for JsonOutputSink {
    fn write<'a>(
        &'a self,
        uid: &'a str,
        aggregate: &'a str,
    ) -> BoxFuture<'a, Result<String, PersistError>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.output_dir).await?;
            let path = self.output_dir.join(format!("{uid}.json"));
            let body = serde_json::to_vec(aggregate)?;
            tokio::fs::write(&path, body).await?;
            Ok(path.to_string_lossy().to_string())
        })
    }
}
