use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::AppState;
use crate::models::upload::{is_valid_uid, new_uid, Upload, UploadMeta, UploadStatus};
use crate::models::user::is_plausible_email;
use crate::modules::upload_job::store::UploadStore;
use crate::repositories::{uploads, users};
use crate::services::storage::ArtifactStore;

static PPTX_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[^/\\]+\.pptx$").expect("valid filename regex"));

const USER_UPLOADS_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
struct CreateUploadQuery {
    filename: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadOut {
    uid: String,
    filename: String,
    status: UploadStatus,
    submitted_at: String,
    finished_at: Option<String>,
    error_message: Option<String>,
    explanation: Option<String>,
}

impl From<Upload> for UploadOut {
    fn from(upload: Upload) -> Self {
        UploadOut {
            uid: upload.uid,
            filename: upload.filename,
            status: upload.status,
            submitted_at: upload.submitted_at,
            finished_at: upload.finished_at,
            error_message: upload.error_message,
            explanation: None,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/uploads", post(create_upload))
        .route("/api/uploads/{uid}", get(get_upload))
        .route("/api/users/uploads", get(list_user_uploads))
        .route("/api/users", delete(delete_user))
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message.into() })),
    )
}

async fn create_upload(
    State(state): State<AppState>,
    Query(query): Query<CreateUploadQuery>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let filename = query.filename.unwrap_or_default().trim().to_string();
    if filename.is_empty() {
        return bad_request("filename is required");
    }
    if !PPTX_NAME_RE.is_match(&filename) {
        return bad_request("only .pptx files are accepted");
    }
    if body.is_empty() {
        return bad_request("request body is empty");
    }

    let owner_id = match query.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) if !is_plausible_email(email) => return bad_request("invalid email"),
        Some(email) => match users::find_or_create_by_email(&state.db, email).await {
            Ok(user) => Some(user.id),
            Err(err) => return internal_error(err),
        },
        None => None,
    };

    let uid = new_uid();
    let document_ref = match state.artifacts.save(&uid, &body).await {
        Ok(document_ref) => document_ref,
        Err(err) => {
            error!("[API] save artifact failed: uid={} error={}", uid, err);
            return internal_error(err.to_string());
        }
    };

    let meta = UploadMeta {
        filename,
        owner_id,
    };
    match state.store.insert_pending(&uid, meta).await {
        Ok(upload) => {
            info!(
                "[API] upload accepted: uid={} filename={} bytes={}",
                upload.uid,
                upload.filename,
                body.len()
            );
            (
                StatusCode::CREATED,
                Json(json!({
                    "uid": upload.uid,
                    "filename": upload.filename,
                    "status": upload.status,
                })),
            )
        }
        Err(err) => {
            error!("[API] insert upload failed: uid={} error={}", uid, err);
            if let Err(cleanup) = state.artifacts.delete(&document_ref).await {
                warn!("[API] artifact cleanup failed: uid={} error={}", uid, cleanup);
            }
            internal_error(err.to_string())
        }
    }
}

async fn get_upload(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !is_valid_uid(&uid) {
        return bad_request("malformed upload id");
    }

    let upload = match state.store.get(&uid).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "upload not found" })),
            )
        }
        Err(err) => return internal_error(err.to_string()),
    };

    let result_ref = upload.result_ref.clone();
    let mut out = UploadOut::from(upload);
    if out.status == UploadStatus::Done {
        if let Some(result_ref) = result_ref {
            match state.outputs.read(&result_ref).await {
                Ok(explanation) => out.explanation = explanation,
                Err(err) => {
                    warn!("[API] read output failed: uid={} error={}", out.uid, err);
                }
            }
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::to_value(out).unwrap_or(Value::Null)),
    )
}

async fn list_user_uploads(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> (StatusCode, Json<Value>) {
    let Some(email) = query.email.filter(|e| !e.trim().is_empty()) else {
        return bad_request("email is required");
    };

    let user = match users::find_by_email(&state.db, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::OK, Json(json!([]))),
        Err(err) => return internal_error(err),
    };

    match uploads::list_by_owner(&state.db, &user.id, USER_UPLOADS_LIMIT).await {
        Ok(list) => {
            let out: Vec<UploadOut> = list.into_iter().map(UploadOut::from).collect();
            (
                StatusCode::OK,
                Json(serde_json::to_value(out).unwrap_or(Value::Null)),
            )
        }
        Err(err) => internal_error(err),
    }
}

/// Removes the user; their uploads stay and lose the owner reference.
async fn delete_user(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> (StatusCode, Json<Value>) {
    let Some(email) = query.email.filter(|e| !e.trim().is_empty()) else {
        return bad_request("email is required");
    };

    let user = match users::find_by_email(&state.db, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "user not found" })),
            )
        }
        Err(err) => return internal_error(err),
    };

    match users::delete_user(&state.db, &user.id).await {
        Ok(deleted) => {
            info!("[API] user deleted: id={}", user.id);
            (StatusCode::OK, Json(json!({ "deleted": deleted })))
        }
        Err(err) => internal_error(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::api::{router as api_router, ApiSettings};
    use crate::core::time::now_rfc3339;
    use crate::db::sqlite::memory_pool;
    use crate::db::Database;
    use crate::modules::upload_job::store::DbUploadStore;
    use crate::services::storage::{JsonOutputSink, LocalArtifactStore, OutputSink};

    struct TestServer {
        base: String,
        state: AppState,
        _dir: tempfile::TempDir,
    }

    async fn spawn_server() -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::Sqlite(memory_pool().await));
        let state = AppState {
            db: db.clone(),
            store: Arc::new(DbUploadStore::new(db)),
            artifacts: Arc::new(LocalArtifactStore::new(dir.path().join("uploads"))),
            outputs: Arc::new(JsonOutputSink::new(dir.path().join("outputs"))),
            started_at: Instant::now(),
        };
        let settings = ApiSettings {
            cors_origins: vec!["*".to_string()],
            max_upload_bytes: 1024 * 1024,
        };
        let app = api_router(state.clone(), &settings);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        TestServer {
            base: format!("http://{addr}"),
            state,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn accepts_pptx_and_reports_pending() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!(
                "{}/api/uploads?filename=Lecture%201.PPTX&email=ada@example.com",
                server.base
            ))
            .body(b"PK\x03\x04deck".to_vec())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let created: Value = resp.json().await.unwrap();
        assert_eq!(created["status"], "pending");
        assert_eq!(created["filename"], "Lecture 1.PPTX");
        let uid = created["uid"].as_str().unwrap().to_string();
        assert!(is_valid_uid(&uid));

        let artifact = server.state.artifacts.document_ref(&uid);
        assert_eq!(std::fs::read(&artifact).unwrap(), b"PK\x03\x04deck");

        let status: Value = client
            .get(format!("{}/api/uploads/{uid}", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "pending");
        assert!(status["finished_at"].is_null());

        let listed: Value = client
            .get(format!("{}/api/users/uploads?email=ada@example.com", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["uid"], uid.as_str());
    }

    #[tokio::test]
    async fn rejects_bad_names_and_empty_bodies() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let wrong_ext = client
            .post(format!("{}/api/uploads?filename=notes.pdf", server.base))
            .body("data")
            .send()
            .await
            .unwrap();
        assert_eq!(wrong_ext.status(), reqwest::StatusCode::BAD_REQUEST);

        let empty = client
            .post(format!("{}/api/uploads?filename=deck.pptx", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);

        let missing_name = client
            .post(format!("{}/api/uploads", server.base))
            .body("data")
            .send()
            .await
            .unwrap();
        assert_eq!(missing_name.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let unknown = client
            .get(format!("{}/api/uploads/{}", server.base, new_uid()))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

        let malformed = client
            .get(format!("{}/api/uploads/not-a-uid", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn done_upload_includes_explanation() {
        let server = spawn_server().await;
        let uid = new_uid();
        let store = &server.state.store;
        store
            .insert_pending(
                &uid,
                UploadMeta {
                    filename: "deck.pptx".to_string(),
                    owner_id: None,
                },
            )
            .await
            .unwrap();
        assert!(store.try_claim(&uid).await.unwrap());
        let result_ref = server
            .state
            .outputs
            .write(&uid, "Slide one covers ownership.")
            .await
            .unwrap();
        store.mark_done(&uid, &result_ref, &now_rfc3339()).await.unwrap();

        let status: Value = reqwest::get(format!("{}/api/uploads/{uid}", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "done");
        assert_eq!(status["explanation"], "Slide one covers ownership.");
        assert!(status["finished_at"].is_string());
    }

    #[tokio::test]
    async fn deleting_user_keeps_their_uploads() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let created: Value = client
            .post(format!(
                "{}/api/uploads?filename=deck.pptx&email=grace@example.com",
                server.base
            ))
            .body("deck")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let uid = created["uid"].as_str().unwrap().to_string();

        let resp = client
            .delete(format!("{}/api/users?email=grace@example.com", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let upload = server.state.store.get(&uid).await.unwrap().unwrap();
        assert_eq!(upload.status, UploadStatus::Pending);
        assert!(upload.owner_id.is_none());

        let again = client
            .delete(format!("{}/api/users?email=grace@example.com", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = spawn_server().await;
        let health: Value = reqwest::get(format!("{}/health", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert!(health["uptime_seconds"].is_number());
    }
}
