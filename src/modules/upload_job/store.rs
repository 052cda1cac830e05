use std::sync::Arc;

use tracing::warn;

use crate::core::future::BoxFuture;
use crate::core::time::now_rfc3339;
use crate::db::Database;
use crate::models::upload::{Upload, UploadMeta, UploadStatus};
use crate::repositories::uploads;
use crate::services::errors::StoreError;

/// Durable upload records. Every mutation is a single atomic statement.
pub trait UploadStore: Send + Sync {
    fn insert_pending<'a>(
        &'a self,
        uid: &'a str,
        meta: UploadMeta,
    ) -> BoxFuture<'a, Result<Upload, StoreError>>;

    /// `pending -> processing`. False when the upload is not pending.
    fn try_claim<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<bool, StoreError>>;

    /// Pending uids, oldest submission first.
    fn list_pending(&self, limit: i64) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    fn get<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<Option<Upload>, StoreError>>;

    fn mark_done<'a>(
        &'a self,
        uid: &'a str,
        result_ref: &'a str,
        finished_at: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn mark_failed<'a>(
        &'a self,
        uid: &'a str,
        cause: &'a str,
        finished_at: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

#[derive(Clone)]
pub struct DbUploadStore {
    db: Arc<Database>,
}

impl DbUploadStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn rejected(uid: &str, target: UploadStatus) -> StoreError {
        warn!(
            "[UPLOAD-JOB] rejected transition: uid={} target={}",
            uid, target
        );
        StoreError::InvalidTransition {
            uid: uid.to_string(),
            target: target.as_str(),
        }
    }
}

impl UploadStore for DbUploadStore {
    fn insert_pending<'a>(
        &'a self,
        uid: &'a str,
        meta: UploadMeta,
    ) -> BoxFuture<'a, Result<Upload, StoreError>> {
        Box::pin(async move {
            let upload = Upload::new_pending(uid.to_string(), meta);
            uploads::insert_pending(&self.db, &upload).await?;
            Ok(upload)
        })
    }

    fn try_claim<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move { Ok(uploads::try_claim(&self.db, uid, &now_rfc3339()).await?) })
    }

    fn list_pending(&self, limit: i64) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(async move { Ok(uploads::list_pending(&self.db, Some(limit)).await?) })
    }

    fn get<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<Option<Upload>, StoreError>> {
        Box::pin(async move { Ok(uploads::get_by_uid(&self.db, uid).await?) })
    }

    fn mark_done<'a>(
        &'a self,
        uid: &'a str,
        result_ref: &'a str,
        finished_at: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if uploads::mark_done(&self.db, uid, result_ref, finished_at).await? {
                Ok(())
            } else {
                Err(Self::rejected(uid, UploadStatus::Done))
            }
        })
    }

    fn mark_failed<'a>(
        &'a self,
        uid: &'a str,
        cause: &'a str,
        finished_at: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if uploads::mark_failed(&self.db, uid, cause, finished_at).await? {
                Ok(())
            } else {
                Err(Self::rejected(uid, UploadStatus::Failed))
            }
        })
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> DbUploadStore {
    let pool = crate::db::sqlite::memory_pool().await;
    DbUploadStore::new(Arc::new(Database::Sqlite(pool)))
}
