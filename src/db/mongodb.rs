use std::time::Duration;

use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions, ResolverConfig};
use mongodb::{Client, IndexModel};
use tracing::{info, warn};

use super::types::{Database, MongoConfig};

pub(super) async fn init_mongodb(cfg: &MongoConfig) -> Result<Database, String> {
    let connection_string = if let Some(conn) = cfg.connection_string.clone() {
        conn
    } else {
        let host = cfg.host.clone().unwrap_or_else(|| "localhost".to_string());
        let port = cfg.port.unwrap_or(27017);
        let database = cfg
            .database
            .clone()
            .unwrap_or_else(|| "slide_summary".to_string());
        let cred = match (&cfg.username, &cfg.password) {
            (Some(u), Some(p)) => format!("{}:{}@", urlencoding::encode(u), urlencoding::encode(p)),
            _ => "".to_string(),
        };
        format!("mongodb://{}{}:{}/{}", cred, host, port, database)
    };

    let mut options =
        ClientOptions::parse_with_resolver_config(&connection_string, ResolverConfig::cloudflare())
            .await
            .map_err(|e| format!("mongodb parse options failed: {e}"))?;
    if let Some(max_pool) = cfg.max_pool_size {
        options.max_pool_size = Some(max_pool);
    }
    if let Some(min_pool) = cfg.min_pool_size {
        options.min_pool_size = Some(min_pool);
    }
    if let Some(ms) = cfg.server_selection_timeout_ms {
        options.server_selection_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = cfg.connect_timeout_ms {
        options.connect_timeout = Some(Duration::from_millis(ms));
    }

    let client =
        Client::with_options(options).map_err(|e| format!("mongodb client failed: {e}"))?;
    let db_name = cfg
        .database
        .clone()
        .unwrap_or_else(|| "slide_summary".to_string());
    let db = client.database(&db_name);

    let existing = db
        .list_collection_names(None)
        .await
        .map_err(|e| e.to_string())?;
    for name in ["uploads", "users"] {
        if !existing.contains(&name.to_string()) {
            let _ = db.create_collection(name, None).await;
        }
    }

    let unique = || IndexOptions::builder().unique(true).build();
    let indexes = [
        (
            "uploads",
            IndexModel::builder()
                .keys(doc! { "uid": 1 })
                .options(unique())
                .build(),
        ),
        (
            "uploads",
            IndexModel::builder()
                .keys(doc! { "status": 1, "submitted_at": 1 })
                .build(),
        ),
        (
            "uploads",
            IndexModel::builder().keys(doc! { "owner_id": 1 }).build(),
        ),
        (
            "users",
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        ),
    ];
    for (collection, index) in indexes {
        if let Err(err) = db
            .collection::<Document>(collection)
            .create_index(index, None)
            .await
        {
            warn!("[MongoDB] create index on {} failed: {}", collection, err);
        }
    }

    info!("[MongoDB] database initialized: {}", db_name);
    Ok(Database::Mongo { client, db })
}
