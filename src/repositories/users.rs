use mongodb::bson::{doc, Bson, Document};

use crate::db::Database;
use crate::models::user::{normalize_email, User};
use crate::repositories::db::with_db;

fn normalize_from_doc(doc: &Document) -> Option<User> {
    Some(User {
        id: doc.get_str("id").ok()?.to_string(),
        email: doc.get_str("email").ok()?.to_string(),
        created_at: doc.get_str("created_at").ok().unwrap_or("").to_string(),
    })
}

pub async fn find_by_email(db: &Database, email: &str) -> Result<Option<User>, String> {
    let email = normalize_email(email);
    let mongo_email = email.clone();
    with_db(
        db,
        |db| {
            Box::pin(async move {
                let doc = db
                    .collection::<Document>("users")
                    .find_one(doc! { "email": mongo_email }, None)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(doc.as_ref().and_then(normalize_from_doc))
            })
        },
        |pool| {
            Box::pin(async move {
                sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE email = ?")
                    .bind(&email)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| e.to_string())
            })
        },
    )
    .await
}

async fn insert_if_absent(db: &Database, user: &User) -> Result<(), String> {
    let mongo_user = user.clone();
    let sqlite_user = user.clone();
    with_db(
        db,
        |db| {
            Box::pin(async move {
                db.collection::<Document>("users")
                    .update_one(
                        doc! { "email": mongo_user.email.as_str() },
                        doc! { "$setOnInsert": {
                            "id": mongo_user.id.as_str(),
                            "email": mongo_user.email.as_str(),
                            "created_at": mongo_user.created_at.as_str(),
                        } },
                        mongodb::options::UpdateOptions::builder().upsert(true).build(),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            })
        },
        |pool| {
            Box::pin(async move {
                sqlx::query("INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?, ?, ?)")
                    .bind(&sqlite_user.id)
                    .bind(&sqlite_user.email)
                    .bind(&sqlite_user.created_at)
                    .execute(pool)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            })
        },
    )
    .await
}

/// Returns the user registered under `email`, creating it on first use.
/// Concurrent first uses resolve to the same row.
pub async fn find_or_create_by_email(db: &Database, email: &str) -> Result<User, String> {
    if let Some(existing) = find_by_email(db, email).await? {
        return Ok(existing);
    }
    insert_if_absent(db, &User::new(email)).await?;
    find_by_email(db, email)
        .await?
        .ok_or_else(|| format!("user {} vanished after insert", normalize_email(email)))
}

/// Deletes the user. Their uploads stay, with the owner reference cleared.
pub async fn delete_user(db: &Database, user_id: &str) -> Result<bool, String> {
    let user_id = user_id.to_string();
    let mongo_user_id = user_id.clone();
    with_db(
        db,
        |db| {
            Box::pin(async move {
                db.collection::<Document>("uploads")
                    .update_many(
                        doc! { "owner_id": mongo_user_id.as_str() },
                        doc! { "$set": { "owner_id": Bson::Null } },
                        None,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                let result = db
                    .collection::<Document>("users")
                    .delete_one(doc! { "id": mongo_user_id.as_str() }, None)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(result.deleted_count > 0)
            })
        },
        |pool| {
            Box::pin(async move {
                let result = sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(&user_id)
                    .execute(pool)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(result.rows_affected() > 0)
            })
        },
    )
    .await
}
