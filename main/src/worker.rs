use std::{path::PathBuf, sync::Arc};

use common::{
    error::AppError,
    storage::vector::VectorStore,
    utils::{config::get_config, embedding::EmbeddingClient},
};
use ingestion_pipeline::{pipeline::IngestionPipeline, run_worker_loop};
use tokio::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ingestion only: reads the configured document file and indexes it, either
/// once or on the configured interval.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let documents_path = config.documents_path.clone().ok_or_else(|| {
        AppError::Validation("documents_path must be configured for the ingestion worker".into())
    })?;

    let embedding = Arc::new(EmbeddingClient::from_config(&config)?);
    let store = Arc::new(VectorStore::from_config(&config)?);
    let pipeline = Arc::new(IngestionPipeline::new(
        embedding,
        store,
        config.tuning.clone(),
    )?);

    let interval = config.ingest_interval_secs.map(Duration::from_secs);
    run_worker_loop(pipeline, PathBuf::from(documents_path), interval).await?;

    Ok(())
}
