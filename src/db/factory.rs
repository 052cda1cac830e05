use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use super::mongodb::init_mongodb;
use super::sqlite::init_sqlite;
use super::types::{Database, DatabaseConfig, DatabaseType};

pub fn load_config(config_path: Option<PathBuf>) -> Result<DatabaseConfig, String> {
    let path = config_path.unwrap_or_else(|| PathBuf::from("config/database.json"));
    let cfg = if path.exists() {
        let raw = std::fs::read_to_string(&path).map_err(|e| format!("read config failed: {e}"))?;
        let trimmed = raw.trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            warn!("[DatabaseFactory] config empty at {:?}, using default", path);
            DatabaseConfig::default()
        } else {
            serde_json::from_str::<DatabaseConfig>(trimmed)
                .map_err(|e| format!("parse config failed: {e}"))?
        }
    } else {
        warn!("[DatabaseFactory] config not found at {:?}, using default", path);
        DatabaseConfig::default()
    };

    Ok(apply_env_overrides(cfg))
}

async fn create_adapter(config: &DatabaseConfig) -> Result<Arc<Database>, String> {
    match config.db_type.clone().unwrap_or(DatabaseType::Sqlite) {
        DatabaseType::Sqlite => {
            let sqlite_cfg = config.sqlite.clone().unwrap_or_default();
            let pool = init_sqlite(&sqlite_cfg).await?;
            Ok(Arc::new(Database::Sqlite(pool)))
        }
        DatabaseType::Mongodb => {
            let mongo_cfg = config.mongodb.clone().unwrap_or_default();
            let db = init_mongodb(&mongo_cfg).await?;
            Ok(Arc::new(db))
        }
    }
}

pub async fn connect() -> Result<Arc<Database>, String> {
    let config = load_config(None)?;
    create_adapter(&config).await
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_env_overrides(mut cfg: DatabaseConfig) -> DatabaseConfig {
    match env_non_empty("DATABASE_TYPE").map(|s| s.to_lowercase()).as_deref() {
        Some("sqlite") => cfg.db_type = Some(DatabaseType::Sqlite),
        Some("mongodb") => cfg.db_type = Some(DatabaseType::Mongodb),
        _ => {}
    }

    if let Some(path) = env_non_empty("SQLITE_DB_PATH") {
        let mut sqlite = cfg.sqlite.clone().unwrap_or_default();
        sqlite.db_path = Some(path);
        cfg.sqlite = Some(sqlite);
    }

    let has_mongo_env = [
        "MONGODB_CONNECTION_STRING",
        "MONGODB_HOST",
        "MONGODB_PORT",
        "MONGODB_DB",
        "MONGODB_USER",
        "MONGODB_PASSWORD",
    ]
    .iter()
    .any(|k| env_non_empty(k).is_some());

    if has_mongo_env {
        cfg.db_type = Some(DatabaseType::Mongodb);
        let mut mongo = cfg.mongodb.clone().unwrap_or_default();
        if let Some(host) = env_non_empty("MONGODB_HOST") {
            mongo.host = Some(host);
        }
        if let Some(port) = env_non_empty("MONGODB_PORT").and_then(|v| v.parse::<u16>().ok()) {
            mongo.port = Some(port);
        }
        if let Some(database) = env_non_empty("MONGODB_DB") {
            mongo.database = Some(database);
        }
        if let Some(user) = env_non_empty("MONGODB_USER") {
            mongo.username = Some(user);
        }
        if let Some(password) = env_non_empty("MONGODB_PASSWORD") {
            mongo.password = Some(password);
        }
        if let Some(conn) = env_non_empty("MONGODB_CONNECTION_STRING") {
            mongo.connection_string = Some(conn);
        }
        cfg.mongodb = Some(mongo);
    }

    cfg
}
