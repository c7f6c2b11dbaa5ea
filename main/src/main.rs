use std::{path::PathBuf, sync::Arc};

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    storage::vector::VectorStore,
    utils::{config::get_config, embedding::EmbeddingClient},
};
use ingestion_pipeline::{pipeline::IngestionPipeline, run_worker_loop};
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let api_state = ApiState::new(&config)?;

    // Periodically drop expired chat sessions
    let sessions = Arc::clone(&api_state.sessions);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sessions.purge_expired().await;
        }
    });

    // Run the ingestion worker in-process when a document feed is configured
    if let Some(path) = config.documents_path.clone() {
        let embedding = Arc::new(EmbeddingClient::from_config(&config)?);
        let store = Arc::new(VectorStore::from_config(&config)?);
        let pipeline = Arc::new(IngestionPipeline::new(
            embedding,
            store,
            config.tuning.clone(),
        )?);
        let interval = config.ingest_interval_secs.map(Duration::from_secs);

        info!("Starting ingestion worker");
        tokio::spawn(async move {
            if let Err(e) = run_worker_loop(pipeline, PathBuf::from(path), interval).await {
                error!("Ingestion worker error: {}", e);
            }
        });
    } else {
        warn!("documents_path not configured; running without the ingestion worker");
    }

    let app = build_router(api_state);

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!("Starting server listening on {}", serve_address);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { api_state })
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}
