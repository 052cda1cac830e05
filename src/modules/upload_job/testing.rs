//! Recording collaborators for worker tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::executor::Pipeline;
use super::store::{memory_store, DbUploadStore};
use crate::core::future::BoxFuture;
use crate::services::errors::{ArtifactError, ExtractionError, PersistError, SummaryError};
use crate::services::slides::SlideSource;
use crate::services::storage::{ArtifactStore, OutputSink};
use crate::services::summarizer::SummarizationClient;

pub(crate) struct StaticSlides {
    result: Result<Vec<String>, String>,
    panic_on: Option<String>,
}

impl SlideSource for StaticSlides {
    fn extract<'a>(
        &'a self,
        document_ref: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ExtractionError>> {
        Box::pin(async move {
            if self.panic_on.as_deref() == Some(document_ref) {
                panic!("parser blew up on {document_ref}");
            }
            self.result.clone().map_err(ExtractionError::Malformed)
        })
    }
}

pub(crate) struct RecordingSummarizer {
    fail_on: Vec<usize>,
    pub calls: Mutex<Vec<usize>>,
}

impl SummarizationClient for RecordingSummarizer {
    fn summarize<'a>(
        &'a self,
        slide_index: usize,
        slide_text: &'a str,
    ) -> BoxFuture<'a, Result<String, SummaryError>> {
        self.calls.lock().push(slide_index);
        let fail = self.fail_on.contains(&slide_index);
        Box::pin(async move {
            if fail {
                Err(SummaryError::new(slide_index, "upstream unavailable"))
            } else {
                Ok(format!("summary of {slide_text}"))
            }
        })
    }
}

#[derive(Default)]
pub(crate) struct MemoryOutput {
    fail: bool,
    writes: Mutex<HashMap<String, String>>,
}

impl MemoryOutput {
    pub fn written(&self, uid: &str) -> Option<String> {
        self.writes.lock().get(uid).cloned()
    }
}

impl OutputSink for MemoryOutput {
    fn write<'a>(
        &'a self,
        uid: &'a str,
        aggregate: &'a str,
    ) -> BoxFuture<'a, Result<String, PersistError>> {
        Box::pin(async move {
            if self.fail {
                return Err(PersistError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.writes
                .lock()
                .insert(uid.to_string(), aggregate.to_string());
            Ok(format!("mem-out://{uid}"))
        })
    }
}

#[derive(Default)]
pub(crate) struct MemoryArtifacts {
    fail_delete: bool,
    pub deleted: Mutex<Vec<String>>,
}

impl ArtifactStore for MemoryArtifacts {
    fn document_ref(&self, uid: &str) -> String {
        format!("mem://{uid}")
    }

    fn delete<'a>(&'a self, document_ref: &'a str) -> BoxFuture<'a, Result<(), ArtifactError>> {
        Box::pin(async move {
            if self.fail_delete {
                return Err(ArtifactError::NotFound(document_ref.to_string()));
            }
            self.deleted.lock().push(document_ref.to_string());
            Ok(())
        })
    }
}

pub(crate) struct Harness {
    pub store: Arc<DbUploadStore>,
    pub slides: Arc<StaticSlides>,
    pub summarizer: Arc<RecordingSummarizer>,
    pub output: Arc<MemoryOutput>,
    pub artifacts: Arc<MemoryArtifacts>,
}

impl Harness {
    pub async fn new(slides: Result<Vec<String>, String>) -> Self {
        Self {
            store: Arc::new(memory_store().await),
            slides: Arc::new(StaticSlides {
                result: slides,
                panic_on: None,
            }),
            summarizer: Arc::new(RecordingSummarizer {
                fail_on: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }),
            output: Arc::new(MemoryOutput::default()),
            artifacts: Arc::new(MemoryArtifacts::default()),
        }
    }

    pub fn failing_slides(mut self, slide_indexes: &[usize]) -> Self {
        self.summarizer = Arc::new(RecordingSummarizer {
            fail_on: slide_indexes.to_vec(),
            calls: Mutex::new(Vec::new()),
        });
        self
    }

    pub fn failing_output(mut self) -> Self {
        self.output = Arc::new(MemoryOutput {
            fail: true,
            ..MemoryOutput::default()
        });
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.artifacts = Arc::new(MemoryArtifacts {
            fail_delete: true,
            ..MemoryArtifacts::default()
        });
        self
    }

    pub fn panicking_on(mut self, uid: &str) -> Self {
        let result = self.slides.result.clone();
        self.slides = Arc::new(StaticSlides {
            result,
            panic_on: Some(format!("mem://{uid}")),
        });
        self
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline {
            store: self.store.clone(),
            slides: self.slides.clone(),
            summarizer: self.summarizer.clone(),
            output: self.output.clone(),
            artifacts: self.artifacts.clone(),
        }
    }
}
