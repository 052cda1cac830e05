use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::upload::UploadStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJobDefaults {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    pub max_uploads_per_tick: i64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u64,
}

impl Default for UploadJobDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 10,
            max_uploads_per_tick: 50,
            rate_limit_max_requests: 3,
            rate_limit_window_seconds: 60,
        }
    }
}

impl UploadJobDefaults {
    pub fn from_env() -> Self {
        let base = Self::default();
        let enabled = std::env::var("UPLOAD_JOB_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .to_lowercase()
            != "false";
        let poll_interval_seconds = std::env::var("UPLOAD_JOB_POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(base.poll_interval_seconds)
            .max(1);
        let max_uploads_per_tick = std::env::var("UPLOAD_JOB_MAX_UPLOADS_PER_TICK")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(base.max_uploads_per_tick)
            .max(1);
        let rate_limit_max_requests = std::env::var("SUMMARY_RATE_LIMIT_MAX_REQUESTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(base.rate_limit_max_requests)
            .max(1);
        let rate_limit_window_seconds = std::env::var("SUMMARY_RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(base.rate_limit_window_seconds)
            .max(1);

        Self {
            enabled,
            poll_interval_seconds,
            max_uploads_per_tick,
            rate_limit_max_requests,
            rate_limit_window_seconds,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub uid: String,
    pub status: UploadStatus,
    pub slide_count: usize,
    pub failed_slides: usize,
    pub result_ref: Option<String>,
}

impl ProcessOutcome {
    pub(super) fn failed(uid: &str, slide_count: usize) -> Self {
        Self {
            uid: uid.to_string(),
            status: UploadStatus::Failed,
            slide_count,
            failed_slides: 0,
            result_ref: None,
        }
    }
}
