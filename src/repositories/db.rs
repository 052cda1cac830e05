use mongodb::bson::{Bson, Document};

use crate::core::future::BoxFuture;
use crate::db::Database;

pub fn to_doc(doc: Document) -> Document {
    doc.into_iter()
        .filter(|(_, v)| !matches!(v, Bson::Null))
        .collect()
}

pub fn doc_from_pairs(pairs: Vec<(&str, Bson)>) -> Document {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub async fn with_db<'a, T, Fmongo, Fsqlite>(
    db: &'a Database,
    mongo_fn: Fmongo,
    sqlite_fn: Fsqlite,
) -> Result<T, String>
where
    Fmongo: FnOnce(&'a mongodb::Database) -> BoxFuture<'a, Result<T, String>>,
    Fsqlite: FnOnce(&'a sqlx::SqlitePool) -> BoxFuture<'a, Result<T, String>>,
{
    match db {
        Database::Mongo { db, .. } => mongo_fn(db).await,
        Database::Sqlite(pool) => sqlite_fn(pool).await,
    }
}
