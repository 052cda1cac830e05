use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Done => "done",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Done | UploadStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (UploadStatus::Pending, UploadStatus::Processing)
                | (UploadStatus::Processing, UploadStatus::Done)
                | (UploadStatus::Processing, UploadStatus::Failed)
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pending" => Ok(UploadStatus::Pending),
            "processing" => Ok(UploadStatus::Processing),
            "done" => Ok(UploadStatus::Done),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("unknown upload status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub uid: String,
    pub filename: String,
    pub status: UploadStatus,
    pub submitted_at: String,
    pub claimed_at: Option<String>,
    pub finished_at: Option<String>,
    pub result_ref: Option<String>,
    pub error_message: Option<String>,
    pub owner_id: Option<String>,
}

/// Ingestion-side metadata for a new upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub filename: String,
    pub owner_id: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct UploadRow {
    pub uid: String,
    pub filename: String,
    pub status: String,
    pub submitted_at: String,
    pub claimed_at: Option<String>,
    pub finished_at: Option<String>,
    pub result_ref: Option<String>,
    pub error_message: Option<String>,
    pub owner_id: Option<String>,
}

impl UploadRow {
    pub fn to_upload(self) -> Result<Upload, String> {
        Ok(Upload {
            status: self.status.parse()?,
            uid: self.uid,
            filename: self.filename,
            submitted_at: self.submitted_at,
            claimed_at: self.claimed_at,
            finished_at: self.finished_at,
            result_ref: self.result_ref,
            error_message: self.error_message,
            owner_id: self.owner_id,
        })
    }
}

impl Upload {
    pub fn new_pending(uid: String, meta: UploadMeta) -> Upload {
        Upload {
            uid,
            filename: meta.filename,
            status: UploadStatus::Pending,
            submitted_at: crate::core::time::now_rfc3339(),
            claimed_at: None,
            finished_at: None,
            result_ref: None,
            error_message: None,
            owner_id: meta.owner_id,
        }
    }
}

pub fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn is_valid_uid(value: &str) -> bool {
    value.len() == 32
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            UploadStatus::Pending,
            UploadStatus::Processing,
            UploadStatus::Done,
            UploadStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<UploadStatus>(), Ok(status));
        }
        assert!("archived".parse::<UploadStatus>().is_err());
    }

    #[test]
    fn transitions_only_move_forward() {
        use UploadStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Done));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Done));
        assert!(!Pending.can_transition_to(Failed));
        for terminal in [Done, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Processing, Done, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn generated_uids_are_valid_and_distinct() {
        let a = new_uid();
        let b = new_uid();
        assert!(is_valid_uid(&a));
        assert_ne!(a, b);
        assert!(!is_valid_uid("../etc/passwd"));
        assert!(!is_valid_uid("ABCDEF0123456789ABCDEF0123456789"));
    }
}
