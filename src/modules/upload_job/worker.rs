use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::time::now_rfc3339;
use crate::models::upload::{Upload, UploadStatus};
use crate::services::errors::StoreError;

use super::executor::{process_one, Pipeline};
use super::store::UploadStore;
use super::types::UploadJobDefaults;

struct TickRunningGuard {
    running: Arc<AtomicBool>,
}

impl Drop for TickRunningGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub fn start_worker(
    pipeline: Pipeline,
    defaults: UploadJobDefaults,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !defaults.enabled {
        info!("[UPLOAD-JOB] disabled by env");
        return None;
    }

    info!(
        "[UPLOAD-JOB] starting background worker, poll_interval={}s, max_uploads_per_tick={}",
        defaults.poll_interval_seconds, defaults.max_uploads_per_tick
    );

    Some(tokio::spawn(async move {
        let pipeline = Arc::new(pipeline);
        let running = Arc::new(AtomicBool::new(false));
        let mut current: Option<JoinHandle<()>> = None;
        let mut ticker = time::interval(defaults.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if running.swap(true, Ordering::AcqRel) {
                info!("[UPLOAD-JOB] previous tick still running, skip this tick");
                continue;
            }

            let pipeline_clone = Arc::clone(&pipeline);
            let running_clone = Arc::clone(&running);
            let shutdown_clone = shutdown.clone();
            let limit = defaults.max_uploads_per_tick;
            current = Some(tokio::spawn(async move {
                let _guard = TickRunningGuard {
                    running: running_clone,
                };
                if let Err(err) = run_once(pipeline_clone, limit, &shutdown_clone).await {
                    warn!("[UPLOAD-JOB] tick failed: {}", err);
                }
            }));
        }

        info!("[UPLOAD-JOB] shutdown requested, waiting for current upload");
        if let Some(handle) = current {
            let _ = handle.await;
        }
        info!("[UPLOAD-JOB] stopped");
    }))
}

/// One polling pass: claim and process pending uploads in submission order.
pub async fn run_once(
    pipeline: Arc<Pipeline>,
    limit: i64,
    shutdown: &CancellationToken,
) -> Result<usize, StoreError> {
    let uids = pipeline.store.list_pending(limit).await?;
    let mut processed = 0usize;

    for uid in uids {
        if shutdown.is_cancelled() {
            break;
        }
        match pipeline.store.try_claim(&uid).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("[UPLOAD-JOB] claim lost: uid={}", uid);
                continue;
            }
            Err(err) => {
                warn!("[UPLOAD-JOB] claim failed: uid={} error={}", uid, err);
                continue;
            }
        }
        let upload = match pipeline.store.get(&uid).await {
            Ok(Some(upload)) => upload,
            Ok(None) => continue,
            Err(err) => {
                warn!("[UPLOAD-JOB] load upload failed: uid={} error={}", uid, err);
                mark_failed_if_processing(&pipeline, &uid, &err.to_string()).await;
                continue;
            }
        };

        run_isolated(Arc::clone(&pipeline), upload).await;
        processed += 1;
    }

    Ok(processed)
}

async fn run_isolated(pipeline: Arc<Pipeline>, upload: Upload) {
    let uid = upload.uid.clone();
    let task_pipeline = Arc::clone(&pipeline);
    let handle = tokio::spawn(async move { process_one(&task_pipeline, &upload).await });

    match handle.await {
        Ok(Ok(outcome)) => {
            info!(
                "[UPLOAD-JOB] processed uid={} status={} slides={} failed_slides={}",
                outcome.uid, outcome.status, outcome.slide_count, outcome.failed_slides
            );
        }
        Ok(Err(err)) => {
            warn!("[UPLOAD-JOB] process upload failed: uid={} error={}", uid, err);
            mark_failed_if_processing(&pipeline, &uid, &err.to_string()).await;
        }
        Err(join_err) => {
            error!("[UPLOAD-JOB] upload task aborted: uid={} error={}", uid, join_err);
            let cause = if join_err.is_panic() {
                "worker panicked while processing upload".to_string()
            } else {
                join_err.to_string()
            };
            mark_failed_if_processing(&pipeline, &uid, &cause).await;
        }
    }
}

async fn mark_failed_if_processing(pipeline: &Pipeline, uid: &str, cause: &str) {
    let current = match pipeline.store.get(uid).await {
        Ok(Some(upload)) => upload.status,
        Ok(None) => return,
        Err(err) => {
            warn!("[UPLOAD-JOB] recovery lookup failed: uid={} error={}", uid, err);
            return;
        }
    };
    if !current.can_transition_to(UploadStatus::Failed) {
        return;
    }
    if let Err(err) = pipeline.store.mark_failed(uid, cause, &now_rfc3339()).await {
        warn!("[UPLOAD-JOB] mark failed failed: uid={} error={}", uid, err);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::testing::Harness;
    use super::*;
    use crate::models::upload::UploadMeta;

    async fn submit(harness: &Harness, uid: &str) {
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
    }

    #[tokio::test]
    async fn panic_in_one_upload_does_not_stop_the_pass() {
        let harness = Harness::new(Ok(vec!["a".into()]))
            .await
            .panicking_on("u1");
        submit(&harness, "u1").await;
        submit(&harness, "u2").await;

        let processed = run_once(
            Arc::new(harness.pipeline()),
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(processed, 2);

        let broken = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(broken.status, UploadStatus::Failed);
        assert!(broken.error_message.unwrap().contains("panicked"));
        let healthy = harness.store.get("u2").await.unwrap().unwrap();
        assert_eq!(healthy.status, UploadStatus::Done);
    }

    #[tokio::test]
    async fn already_claimed_uploads_are_skipped() {
        let harness = Harness::new(Ok(vec!["a".into()])).await;
        submit(&harness, "u1").await;
        submit(&harness, "u2").await;
        assert!(harness.store.try_claim("u1").await.unwrap());

        let processed = run_once(
            Arc::new(harness.pipeline()),
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(processed, 1);
        let other = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(other.status, UploadStatus::Processing);
    }

    #[tokio::test]
    async fn cancelled_pass_claims_nothing() {
        let harness = Harness::new(Ok(vec!["a".into()])).await;
        submit(&harness, "u1").await;
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let processed = run_once(Arc::new(harness.pipeline()), 10, &shutdown)
            .await
            .unwrap();
        assert_eq!(processed, 0);
        let upload = harness.store.get("u1").await.unwrap().unwrap();
        assert_eq!(upload.status, UploadStatus::Pending);
    }

    #[tokio::test]
    async fn background_worker_drains_queue_and_stops_on_shutdown() {
        let harness = Harness::new(Ok(vec!["a".into(), "b".into()])).await;
        submit(&harness, "u1").await;
        let shutdown = CancellationToken::new();
        let defaults = UploadJobDefaults {
            poll_interval_seconds: 1,
            ..UploadJobDefaults::default()
        };

        let handle = start_worker(harness.pipeline(), defaults, shutdown.clone())
            .expect("worker enabled");

        let done = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let upload = harness.store.get("u1").await.unwrap().unwrap();
                if upload.status.is_terminal() {
                    return upload.status;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("upload processed");
        assert_eq!(done, UploadStatus::Done);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker stopped")
            .expect("worker task");
    }

    #[tokio::test]
    async fn disabled_worker_does_not_start() {
        let harness = Harness::new(Ok(Vec::new())).await;
        let defaults = UploadJobDefaults {
            enabled: false,
            ..UploadJobDefaults::default()
        };
        assert!(start_worker(harness.pipeline(), defaults, CancellationToken::new()).is_none());
    }
}
