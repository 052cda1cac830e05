use std::sync::Arc;

use tracing::{info, warn};

use crate::core::time::now_rfc3339;
use crate::models::upload::{Upload, UploadStatus};
use crate::services::errors::StoreError;
use crate::services::slides::SlideSource;
use crate::services::storage::{ArtifactStore, OutputSink};
use crate::services::summarizer::{aggregate, SlideResult, SummarizationClient};

use super::store::UploadStore;
use super::types::ProcessOutcome;

/// Collaborators of one worker.
#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<dyn UploadStore>,
    pub slides: Arc<dyn SlideSource>,
    /// Already rate governed.
    pub summarizer: Arc<dyn SummarizationClient>,
    pub output: Arc<dyn OutputSink>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

pub async fn summarize_slides(
    summarizer: &dyn SummarizationClient,
    slides: &[String],
) -> Vec<SlideResult> {
    let mut results = Vec::with_capacity(slides.len());
    for (i, text) in slides.iter().enumerate() {
        let slide_index = i + 1;
        match summarizer.summarize(slide_index, text).await {
            Ok(summary) => results.push(SlideResult::Summary(summary)),
            Err(err) => {
                warn!(
                    "[UPLOAD-JOB] slide summary failed: slide={} error={}",
                    slide_index, err.cause
                );
                results.push(SlideResult::Failed(err));
            }
        }
    }
    results
}

/// Runs a claimed upload to a terminal state.
pub async fn process_one(
    pipeline: &Pipeline,
    upload: &Upload,
) -> Result<ProcessOutcome, StoreError> {
    let uid = upload.uid.as_str();
    let document_ref = pipeline.artifacts.document_ref(uid);

    let slides = match pipeline.slides.extract(&document_ref).await {
        Ok(slides) => slides,
        Err(err) => {
            warn!(
                "[UPLOAD-JOB] extraction failed: uid={} error={}",
                uid, err
            );
            pipeline
                .store
                .mark_failed(uid, &err.to_string(), &now_rfc3339())
                .await?;
            return Ok(ProcessOutcome::failed(uid, 0));
        }
    };

    let results = summarize_slides(pipeline.summarizer.as_ref(), &slides).await;
    let failed_slides = results.iter().filter(|r| r.is_failed()).count();
    let text = aggregate(&results);

    let result_ref = match pipeline.output.write(uid, &text).await {
        Ok(result_ref) => result_ref,
        Err(err) => {
            warn!("[UPLOAD-JOB] persist failed: uid={} error={}", uid, err);
            pipeline
                .store
                .mark_failed(uid, &err.to_string(), &now_rfc3339())
                .await?;
            return Ok(ProcessOutcome::failed(uid, slides.len()));
        }
    };

    pipeline
        .store
        .mark_done(uid, &result_ref, &now_rfc3339())
        .await?;

    if let Err(err) = pipeline.artifacts.delete(&document_ref).await {
        warn!(
            "[UPLOAD-JOB] artifact cleanup failed: uid={} error={}",
            uid, err
        );
    }

    info!(
        "[UPLOAD-JOB] upload done: uid={} slides={} failed_slides={}",
        uid,
        slides.len(),
        failed_slides
    );
    Ok(ProcessOutcome {
        uid: uid.to_string(),
        status: UploadStatus::Done,
        slide_count: slides.len(),
        failed_slides,
        result_ref: Some(result_ref),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::testing::*;
    use super::*;
    use crate::core::time::parse_rfc3339;
    use crate::models::upload::UploadMeta;
    use crate::services::summarizer::clock::ManualClock;
    use crate::services::summarizer::{GovernedSummarizer, RateGovernor};

    async fn claimed(harness: &Harness, uid: &str) -> Upload {
        harness
            .store
            .insert_pending(
                uid,
                UploadMeta {
                    filename: format!("{uid}.pptx"),
                    owner_id: None,
                },
            )
            .await
            .unwrap();
        assert!(harness.store.try_claim(uid).await.unwrap());
        harness.store.get(uid).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn all_slides_summarized_ends_done() {
        let harness = Harness::new(Ok(vec!["a".into(), "b".into(), "c".into()])).await;
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&harness.pipeline(), &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Done);
        assert_eq!(outcome.slide_count, 3);
        assert_eq!(outcome.failed_slides, 0);

        let stored = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, UploadStatus::Done);
        assert_eq!(stored.result_ref, outcome.result_ref);
        assert!(stored.error_message.is_none());
        let submitted = parse_rfc3339(&stored.submitted_at).unwrap();
        let finished = parse_rfc3339(stored.finished_at.as_deref().unwrap()).unwrap();
        assert!(finished >= submitted);

        assert_eq!(
            harness.output.written("u1").as_deref(),
            Some("summary of asummary of bsummary of c")
        );
        assert_eq!(*harness.artifacts.deleted.lock(), vec!["mem://u1".to_string()]);
    }

    #[tokio::test]
    async fn failing_slide_is_inlined_and_others_kept() {
        let harness = Harness::new(Ok(vec!["a".into(), "b".into(), "c".into(), "d".into()]))
            .await
            .failing_slides(&[3]);
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&harness.pipeline(), &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Done);
        assert_eq!(outcome.failed_slides, 1);

        let text = harness.output.written("u1").unwrap();
        assert_eq!(text.matches("Error processing slide").count(), 1);
        assert_eq!(
            text,
            "summary of asummary of bError processing slide 3: upstream unavailable\n\nsummary of d"
        );
        assert_eq!(*harness.summarizer.calls.lock(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_presentation_completes_with_empty_aggregate() {
        let harness = Harness::new(Ok(Vec::new())).await;
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&harness.pipeline(), &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Done);
        assert_eq!(outcome.slide_count, 0);
        assert_eq!(harness.output.written("u1").as_deref(), Some(""));
        assert!(harness.summarizer.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_fails_without_summarizing() {
        let harness = Harness::new(Err("not a zip package".into())).await;
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&harness.pipeline(), &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Failed);
        assert!(outcome.result_ref.is_none());

        let stored = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, UploadStatus::Failed);
        assert!(stored.result_ref.is_none());
        assert!(stored.finished_at.is_some());
        assert!(stored
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("not a zip package"));
        assert!(harness.summarizer.calls.lock().is_empty());
        assert!(harness.artifacts.deleted.lock().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_marks_failed() {
        let harness = Harness::new(Ok(vec!["a".into()])).await.failing_output();
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&harness.pipeline(), &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Failed);

        let stored = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, UploadStatus::Failed);
        assert!(stored
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("disk full"));
        assert!(harness.artifacts.deleted.lock().is_empty());
    }

    #[tokio::test]
    async fn artifact_cleanup_failure_keeps_done() {
        let harness = Harness::new(Ok(vec!["a".into()])).await.failing_cleanup();
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&harness.pipeline(), &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Done);
        let stored = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, UploadStatus::Done);
    }

    #[tokio::test]
    async fn unclaimed_upload_is_rejected_at_completion() {
        let harness = Harness::new(Ok(vec!["a".into()])).await;
        let upload = harness
            .store
            .insert_pending(
                "u1",
                UploadMeta {
                    filename: "u1.pptx".to_string(),
                    owner_id: None,
                },
            )
            .await
            .unwrap();

        let err = process_one(&harness.pipeline(), &upload).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        let stored = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.status, UploadStatus::Pending);
    }

    #[tokio::test]
    async fn governed_slides_wait_for_the_next_window() {
        let harness = Harness::new(Ok((1..=5).map(|n| format!("s{n}")).collect())).await;
        let clock = Arc::new(ManualClock::new());
        let governor = Arc::new(RateGovernor::new(3, Duration::from_secs(60), clock.clone()));
        let mut pipeline = harness.pipeline();
        pipeline.summarizer = Arc::new(GovernedSummarizer::new(
            harness.summarizer.clone(),
            governor,
        ));
        let upload = claimed(&harness, "u1").await;

        let outcome = process_one(&pipeline, &upload).await.unwrap();
        assert_eq!(outcome.status, UploadStatus::Done);
        assert_eq!(*harness.summarizer.calls.lock(), vec![1, 2, 3, 4, 5]);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }
}
