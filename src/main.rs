mod api;
mod config;
mod core;
mod db;
mod logger;
mod models;
mod modules;
mod repositories;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{ApiSettings, AppState};
use crate::modules::upload_job::store::DbUploadStore;
use crate::modules::upload_job::types::UploadJobDefaults;
use crate::modules::upload_job::Pipeline;
use crate::services::slides::PptxSlideSource;
use crate::services::storage::{JsonOutputSink, LocalArtifactStore};
use crate::services::summarizer::{
    GovernedSummarizer, OpenAiSettings, OpenAiSummarizer, RateGovernor, SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cfg = config::Config::init_global()
        .map_err(|err| anyhow!(err))
        .context("failed to load config")?;
    logger::init_logger(cfg)
        .map_err(|err| anyhow!(err))
        .context("failed to init logger")?;

    let db = db::connect()
        .await
        .map_err(|err| anyhow!(err))
        .context("failed to init database")?;
    info!("Database ready: {}", db.kind());

    cfg.print();

    let store = Arc::new(DbUploadStore::new(db.clone()));
    let artifacts = Arc::new(LocalArtifactStore::new(&cfg.upload_dir));
    let outputs = Arc::new(JsonOutputSink::new(&cfg.output_dir));

    let defaults = UploadJobDefaults::from_env();
    let governor = Arc::new(RateGovernor::new(
        defaults.rate_limit_max_requests,
        defaults.rate_limit_window(),
        Arc::new(SystemClock),
    ));
    info!(
        "[RATE-GOVERNOR] {} requests per {:?}",
        governor.max_requests(),
        governor.window()
    );
    let backend = OpenAiSummarizer::new(OpenAiSettings::from_config(cfg))
        .map_err(|err| anyhow!(err))
        .context("failed to build summarization client")?;

    let pipeline = Pipeline {
        store: store.clone(),
        slides: Arc::new(PptxSlideSource),
        summarizer: Arc::new(GovernedSummarizer::new(Arc::new(backend), governor)),
        output: outputs.clone(),
        artifacts: artifacts.clone(),
    };

    let shutdown = CancellationToken::new();
    let worker = modules::upload_job::start_background(pipeline, defaults, shutdown.clone());

    let state = AppState {
        db,
        store,
        artifacts,
        outputs,
        started_at: Instant::now(),
    };
    let settings = ApiSettings {
        cors_origins: cfg.cors_origins.clone(),
        max_upload_bytes: cfg.max_upload_bytes,
    };
    let app = api::router(state, &settings);

    let host = cfg
        .host
        .parse()
        .with_context(|| format!("invalid HOST {}", cfg.host))?;
    let addr = SocketAddr::new(host, cfg.port);
    info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    if let Some(worker) = worker {
        worker.await.context("upload worker panicked")?;
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("Shutdown signal received"),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
