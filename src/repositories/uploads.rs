use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions};

use crate::core::mongo_cursor::{collect_and_map, collect_string_field};
use crate::core::values::optional_string_bson;
use crate::db::Database;
use crate::models::upload::{Upload, UploadRow, UploadStatus};
use crate::repositories::db::{doc_from_pairs, to_doc, with_db};

const COLLECTION: &str = "uploads";

fn normalize_from_doc(doc: &Document) -> Option<Upload> {
    let optional = |key: &str| doc.get_str(key).ok().map(|v| v.to_string());
    Some(Upload {
        uid: doc.get_str("uid").ok()?.to_string(),
        filename: doc.get_str("filename").ok().unwrap_or("").to_string(),
        status: doc.get_str("status").ok()?.parse().ok()?,
        submitted_at: doc.get_str("submitted_at").ok().unwrap_or("").to_string(),
        claimed_at: optional("claimed_at"),
        finished_at: optional("finished_at"),
        result_ref: optional("result_ref"),
        error_message: optional("error_message"),
        owner_id: optional("owner_id"),
    })
}

pub async fn insert_pending(db: &Database, upload: &Upload) -> Result<(), String> {
    let mongo_upload = upload.clone();
    let sqlite_upload = upload.clone();
    with_db(
        db,
        |db| {
            let doc = to_doc(doc_from_pairs(vec![
                ("uid", Bson::String(mongo_upload.uid.clone())),
                ("filename", Bson::String(mongo_upload.filename.clone())),
                ("status", Bson::String(UploadStatus::Pending.as_str().to_string())),
                ("submitted_at", Bson::String(mongo_upload.submitted_at.clone())),
                ("owner_id", optional_string_bson(mongo_upload.owner_id.clone())),
            ]));
            Box::pin(async move {
                db.collection::<Document>(COLLECTION)
                    .insert_one(doc, None)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            })
        },
        |pool| {
            Box::pin(async move {
                sqlx::query("INSERT INTO uploads (uid, filename, status, submitted_at, owner_id) VALUES (?, ?, ?, ?, ?)")
                    .bind(&sqlite_upload.uid)
                    .bind(&sqlite_upload.filename)
                    .bind(UploadStatus::Pending.as_str())
                    .bind(&sqlite_upload.submitted_at)
                    .bind(&sqlite_upload.owner_id)
                    .execute(pool)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            })
        },
    )
    .await
}

/// Compare-and-set `pending -> processing`. Returns false when the upload is
/// missing or not pending; nothing is written in that case.
pub async fn try_claim(db: &Database, uid: &str, claimed_at: &str) -> Result<bool, String> {
    let uid = uid.to_string();
    let claimed_at = claimed_at.to_string();
    let (mongo_uid, mongo_claimed_at) = (uid.clone(), claimed_at.clone());
    with_db(
        db,
        |db| {
            Box::pin(async move {
                let previous = db
                    .collection::<Document>(COLLECTION)
                    .find_one_and_update(
                        doc! { "uid": mongo_uid, "status": UploadStatus::Pending.as_str() },
                        doc! { "$set": {
                            "status": UploadStatus::Processing.as_str(),
                            "claimed_at": mongo_claimed_at,
                        } },
                        FindOneAndUpdateOptions::default(),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(previous.is_some())
            })
        },
        |pool| {
            Box::pin(async move {
                let result = sqlx::query(
                    "UPDATE uploads SET status = ?, claimed_at = ? WHERE uid = ? AND status = ?",
                )
                .bind(UploadStatus::Processing.as_str())
                .bind(&claimed_at)
                .bind(&uid)
                .bind(UploadStatus::Pending.as_str())
                .execute(pool)
                .await
                .map_err(|e| e.to_string())?;
                Ok(result.rows_affected() == 1)
            })
        },
    )
    .await
}

/// Pending uids, oldest submission first.
pub async fn list_pending(db: &Database, limit: Option<i64>) -> Result<Vec<String>, String> {
    with_db(
        db,
        |db| {
            Box::pin(async move {
                let options = FindOptions::builder()
                    .sort(doc! { "submitted_at": 1 })
                    .limit(limit)
                    .projection(doc! { "uid": 1 })
                    .build();
                let cursor = db
                    .collection::<Document>(COLLECTION)
                    .find(doc! { "status": UploadStatus::Pending.as_str() }, options)
                    .await
                    .map_err(|e| e.to_string())?;
                collect_string_field(cursor, "uid").await
            })
        },
        |pool| {
            Box::pin(async move {
                let mut query =
                    "SELECT uid FROM uploads WHERE status = ? ORDER BY submitted_at ASC".to_string();
                if limit.is_some() {
                    query.push_str(" LIMIT ?");
                }
                let mut q = sqlx::query_scalar::<_, String>(&query)
                    .bind(UploadStatus::Pending.as_str());
                if let Some(l) = limit {
                    q = q.bind(l);
                }
                q.fetch_all(pool).await.map_err(|e| e.to_string())
            })
        },
    )
    .await
}

pub async fn get_by_uid(db: &Database, uid: &str) -> Result<Option<Upload>, String> {
    let uid = uid.to_string();
    let mongo_uid = uid.clone();
    with_db(
        db,
        |db| {
            Box::pin(async move {
                let doc = db
                    .collection::<Document>(COLLECTION)
                    .find_one(doc! { "uid": mongo_uid }, None)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(doc.as_ref().and_then(normalize_from_doc))
            })
        },
        |pool| {
            Box::pin(async move {
                let row = sqlx::query_as::<_, UploadRow>("SELECT * FROM uploads WHERE uid = ?")
                    .bind(&uid)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| e.to_string())?;
                row.map(UploadRow::to_upload).transpose()
            })
        },
    )
    .await
}

pub async fn list_by_owner(
    db: &Database,
    owner_id: &str,
    limit: i64,
) -> Result<Vec<Upload>, String> {
    let owner_id = owner_id.to_string();
    let mongo_owner_id = owner_id.clone();
    with_db(
        db,
        |db| {
            Box::pin(async move {
                let options = FindOptions::builder()
                    .sort(doc! { "submitted_at": -1 })
                    .limit(limit)
                    .build();
                let cursor = db
                    .collection::<Document>(COLLECTION)
                    .find(doc! { "owner_id": mongo_owner_id }, options)
                    .await
                    .map_err(|e| e.to_string())?;
                collect_and_map(cursor, normalize_from_doc).await
            })
        },
        |pool| {
            Box::pin(async move {
                let rows = sqlx::query_as::<_, UploadRow>(
                    "SELECT * FROM uploads WHERE owner_id = ? ORDER BY submitted_at DESC LIMIT ?",
                )
                .bind(&owner_id)
                .bind(limit)
                .fetch_all(pool)
                .await
                .map_err(|e| e.to_string())?;
                rows.into_iter().map(UploadRow::to_upload).collect()
            })
        },
    )
    .await
}

/// `processing -> done`. Returns false when the upload is not processing.
pub async fn mark_done(
    db: &Database,
    uid: &str,
    result_ref: &str,
    finished_at: &str,
) -> Result<bool, String> {
    finish(
        db,
        uid,
        UploadStatus::Done,
        vec![
            ("finished_at", finished_at.to_string()),
            ("result_ref", result_ref.to_string()),
        ],
    )
    .await
}

/// `processing -> failed`. Returns false when the upload is not processing.
pub async fn mark_failed(
    db: &Database,
    uid: &str,
    cause: &str,
    finished_at: &str,
) -> Result<bool, String> {
    finish(
        db,
        uid,
        UploadStatus::Failed,
        vec![
            ("finished_at", finished_at.to_string()),
            ("error_message", cause.to_string()),
        ],
    )
    .await
}

async fn finish(
    db: &Database,
    uid: &str,
    status: UploadStatus,
    fields: Vec<(&'static str, String)>,
) -> Result<bool, String> {
    let uid = uid.to_string();
    let mongo_uid = uid.clone();
    let mongo_fields = fields.clone();
    with_db(
        db,
        |db| {
            Box::pin(async move {
                let mut set = doc! { "status": status.as_str() };
                for (key, value) in mongo_fields {
                    set.insert(key, value);
                }
                let result = db
                    .collection::<Document>(COLLECTION)
                    .update_one(
                        doc! { "uid": mongo_uid, "status": UploadStatus::Processing.as_str() },
                        doc! { "$set": set },
                        None,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(result.matched_count == 1)
            })
        },
        |pool| {
            Box::pin(async move {
                let assignments = fields
                    .iter()
                    .map(|(key, _)| format!("{key} = ?"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let query = format!(
                    "UPDATE uploads SET status = ?, {assignments} WHERE uid = ? AND status = ?"
                );
                let mut q = sqlx::query(&query).bind(status.as_str());
                for (_, value) in &fields {
                    q = q.bind(value);
                }
                let result = q
                    .bind(&uid)
                    .bind(UploadStatus::Processing.as_str())
                    .execute(pool)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(result.rows_affected() == 1)
            })
        },
    )
    .await
}
